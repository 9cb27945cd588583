use http::{header, HeaderValue, StatusCode};
use axum_core::body::Body;
use axum_core::response::Response;
use bytes::{BytesMut, BufMut};
use serde::Serialize;

fn json_response(status: StatusCode, body: bytes::Bytes) -> Response {
    let len = body.len();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    response
}

pub fn serialize_json(
    status: StatusCode,
    data: &impl Serialize
) -> Result<Response, serde_json::Error> {
    let mut buf = BytesMut::with_capacity(128).writer();
    serde_json::to_writer(&mut buf, data)?;

    Ok(json_response(status, buf.into_inner().freeze()))
}

/// the fallback body when a response could not be serialized
pub fn error_json() -> Response {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        bytes::Bytes::from_static(br#"{"kind":{"General":"InternalFailure"}}"#)
    )
}
