//! the error body every json endpoint answers with on failure

use http::StatusCode;
use axum_core::response::{Response, IntoResponse};
use serde::{Serialize, Deserialize};

use crate::response::{serialize_json, error_json};

/// declares a kind enum along with the status each variant answers with
macro_rules! kinds {
    ($group:ident: $name:ident { $($variant:ident => $status:ident),* $(,)? }) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq,
            strum::Display, strum::AsRefStr,
            Serialize, Deserialize
        )]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn status(&self) -> StatusCode {
                match self {
                    $($name::$variant => StatusCode::$status,)*
                }
            }
        }

        impl From<$name> for ApiErrorKind {
            fn from(v: $name) -> Self {
                ApiErrorKind::$group(v)
            }
        }
    };
}

kinds!(General: GeneralKind {
    InternalFailure => INTERNAL_SERVER_ERROR,
    NotFound => NOT_FOUND,
    ValidationFailed => BAD_REQUEST,
    MissingData => BAD_REQUEST,
    InvalidHeaderValue => BAD_REQUEST,
    InvalidRequest => BAD_REQUEST,
});

kinds!(Auth: AuthKind {
    Unauthenticated => UNAUTHORIZED,
    Inactive => FORBIDDEN,
});

kinds!(Fs: FsKind {
    NotFound => NOT_FOUND,
    AlreadyExists => CONFLICT,
    Cycle => CONFLICT,
    InvalidName => BAD_REQUEST,
    InvalidReference => BAD_REQUEST,
    NotDirectory => BAD_REQUEST,
    NotFile => BAD_REQUEST,
    QuotaExceeded => INSUFFICIENT_STORAGE,
    MaxSize => PAYLOAD_TOO_LARGE,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorKind {
    General(GeneralKind),
    Auth(AuthKind),
    Fs(FsKind),
}

impl ApiErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorKind::General(v) => v.status(),
            ApiErrorKind::Auth(v) => v.status(),
            ApiErrorKind::Fs(v) => v.status(),
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiErrorKind::General(v) => write!(f, "General::{v}"),
            ApiErrorKind::Auth(v) => write!(f, "Auth::{v}"),
            ApiErrorKind::Fs(v) => write!(f, "Fs::{v}"),
        }
    }
}

/// the request fields that caused the failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Detail {
    Keys(Vec<String>),
}

impl Detail {
    pub fn with_key(key: impl Into<String>) -> Self {
        Detail::Keys(vec![key.into()])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    kind: ApiErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<Detail>,
}

impl ApiError {
    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }

    pub fn detail(&self) -> Option<&Detail> {
        self.detail.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl Default for ApiError {
    fn default() -> Self {
        ApiError::from(GeneralKind::InternalFailure)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(Detail::Keys(keys)) => write!(f, "{} ({})", self.kind, keys.join(",")),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        serialize_json(self.status(), &self).unwrap_or_else(|err| {
            tracing::error!("failed to serialize api error: {err}");

            error_json()
        })
    }
}

impl<K> From<K> for ApiError
where
    K: Into<ApiErrorKind>
{
    fn from(kind: K) -> Self {
        ApiError {
            kind: kind.into(),
            detail: None,
        }
    }
}

impl<K> From<(K, Detail)> for ApiError
where
    K: Into<ApiErrorKind>
{
    fn from((kind, detail): (K, Detail)) -> Self {
        ApiError {
            kind: kind.into(),
            detail: Some(detail),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds_map_to_status() {
        let checks: [(ApiErrorKind, StatusCode); 6] = [
            (FsKind::NotFound.into(), StatusCode::NOT_FOUND),
            (FsKind::AlreadyExists.into(), StatusCode::CONFLICT),
            (FsKind::QuotaExceeded.into(), StatusCode::INSUFFICIENT_STORAGE),
            (FsKind::InvalidName.into(), StatusCode::BAD_REQUEST),
            (AuthKind::Unauthenticated.into(), StatusCode::UNAUTHORIZED),
            (AuthKind::Inactive.into(), StatusCode::FORBIDDEN),
        ];

        for (kind, expected) in checks {
            assert_eq!(kind.status(), expected, "kind: {kind}");
        }
    }

    #[test]
    fn serialized_shape() {
        let err = ApiError::from((FsKind::InvalidName, Detail::with_key("name")));
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json, serde_json::json!({
            "kind": {"Fs": "InvalidName"},
            "detail": {"Keys": ["name"]}
        }));
        assert_eq!(err.to_string(), "Fs::InvalidName (name)");
    }

    #[test]
    fn default_is_internal() {
        let err = ApiError::default();

        assert_eq!(err.kind(), &ApiErrorKind::General(GeneralKind::InternalFailure));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail().is_none());
    }
}
