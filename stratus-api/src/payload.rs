use http::StatusCode;
use axum_core::response::{Response, IntoResponse};
use serde::{Serialize, Deserialize};

use crate::response::{serialize_json, error_json};

/// wraps every successful json body as `{"payload": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct Payload<T> {
    payload: T
}

impl<T> Payload<T> {
    pub fn new(payload: T) -> Self {
        Payload { payload }
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T> IntoResponse for Payload<T>
where
    T: Serialize
{
    fn into_response(self) -> Response {
        serialize_json(StatusCode::OK, &self).unwrap_or_else(|err| {
            tracing::error!("failed to serialize payload: {err}");

            error_json()
        })
    }
}
