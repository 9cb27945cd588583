use axum::response::{Response, IntoResponse};

pub use stratus_api::error::{
    Detail,
    ApiError,
    AuthKind,
    FsKind,
    GeneralKind,
};

use crate::fs;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// request error of the json adapter. the inner [`ApiError`] is what the
/// client sees, context and source only go to the log
#[derive(Debug)]
pub struct Error {
    inner: ApiError,
    context: Option<String>,
    src: Option<BoxDynError>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// an internal failure, the client only sees a generic body
    pub fn new() -> Self {
        Error::api(ApiError::default())
    }

    pub fn api<T>(value: T) -> Self
    where
        T: Into<ApiError>
    {
        Error {
            inner: value.into(),
            context: None,
            src: None
        }
    }

    pub fn context<C>(mut self, ctx: C) -> Self
    where
        C: Into<String>
    {
        self.context = Some(ctx.into());
        self
    }

    pub fn source<S>(mut self, src: S) -> Self
    where
        S: Into<BoxDynError>
    {
        self.src = Some(src.into());
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)?;

        if let Some(cxt) = &self.context {
            write!(f, ": {cxt}")?;
        }

        if let Some(err) = &self.src {
            write!(f, ": {err}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.src.as_deref().map(|err| err as _)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // only errors carrying a source are unexpected, the rest are plain
        // client mistakes
        if let Some(err) = &self.src {
            tracing::error!(
                kind = %self.inner,
                context = self.context.as_deref().unwrap_or(""),
                "request failed: {err:?}"
            );
        }

        self.inner.into_response()
    }
}

impl From<ApiError> for Error {
    fn from(api_err: ApiError) -> Self {
        Error::api(api_err)
    }
}

impl From<fs::Error> for Error {
    fn from(err: fs::Error) -> Self {
        match err {
            fs::Error::NotFound => Error::api(FsKind::NotFound),
            fs::Error::Conflict => Error::api(FsKind::AlreadyExists),
            fs::Error::QuotaExceeded => Error::api(FsKind::QuotaExceeded),
            fs::Error::InvalidName => Error::api((FsKind::InvalidName, Detail::with_key("name"))),
            fs::Error::Cycle => Error::api(FsKind::Cycle),
            fs::Error::InvalidReference => Error::api(FsKind::InvalidReference),
            fs::Error::NotDirectory => Error::api(FsKind::NotDirectory),
            fs::Error::NotFile => Error::api(FsKind::NotFile),
            fs::Error::TooLarge => Error::api(FsKind::MaxSize),
            fs::Error::Stream(src) => Error::api(GeneralKind::InvalidRequest)
                .context("request body stream failed")
                .source(src),
            err => Error::new().source(err),
        }
    }
}

/// failures that carry their source into the log
macro_rules! internal_from {
    ($($e:path),* $(,)?) => {
        $(
            impl From<$e> for Error {
                fn from(err: $e) -> Self {
                    Error::new().source(err)
                }
            }
        )*
    };
}

internal_from!(
    std::io::Error,
    axum::Error,
    axum::http::Error,
);

impl From<axum::http::header::ToStrError> for Error {
    fn from(err: axum::http::header::ToStrError) -> Self {
        Error::api(GeneralKind::InvalidHeaderValue).source(err)
    }
}
