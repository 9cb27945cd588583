//! the WebDAV view of the namespace.
//!
//! every verb is path addressed below the configured mount prefix and answers
//! with bare status codes. locks are advisory only: a LOCK hands out a token
//! but no other verb ever checks it, so concurrent writers are not excluded.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use stratus_lib::ids;

use crate::fs;
use crate::sec::{self, LookupError};
use crate::state::{ArcShared, Shared};

mod href;
mod read;
mod write;
mod xml;

const ALLOW: &str = "OPTIONS, GET, HEAD, PUT, DELETE, MKCOL, COPY, MOVE, PROPFIND, LOCK, UNLOCK";

const LOCK_TIMEOUT: &str = "Second-3600";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fs(#[from] fs::Error),

    #[error(transparent)]
    Destination(#[from] href::DestinationError),

    #[error("request ended with {0}")]
    Status(StatusCode),

    #[error("failed to render xml body")]
    Xml(#[from] std::fmt::Error),

    #[error(transparent)]
    Http(#[from] axum::http::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::Fs(err) => match err {
                fs::Error::NotFound => StatusCode::NOT_FOUND,
                fs::Error::Conflict |
                fs::Error::NotDirectory => StatusCode::CONFLICT,
                fs::Error::QuotaExceeded => StatusCode::INSUFFICIENT_STORAGE,
                fs::Error::InvalidName |
                fs::Error::InvalidReference |
                fs::Error::Stream(_) => StatusCode::BAD_REQUEST,
                fs::Error::Cycle |
                fs::Error::NotFile => StatusCode::FORBIDDEN,
                fs::Error::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                fs::Error::Io(_) |
                fs::Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Destination(_) => StatusCode::BAD_REQUEST,
            Error::Status(status) => *status,
            Error::Xml(_) |
            Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() && status != StatusCode::INSUFFICIENT_STORAGE {
            tracing::error!("webdav request failed: {self:?}");
        } else {
            tracing::debug!("webdav request rejected: {self}");
        }

        status.into_response()
    }
}

/// what every verb needs to know about the request
pub(crate) struct Dav<'a> {
    state: &'a Shared,
    owner: &'a str,
    path: &'a str,
    headers: &'a HeaderMap,
}

impl Dav<'_> {
    fn prefix(&self) -> &str {
        self.state.webdav_prefix()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    }
}

/// answers every request below the mount prefix. anything outside of it is
/// not found
pub async fn handle(State(state): State<ArcShared>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let Some(path) = href::strip_prefix(parts.uri.path(), state.webdav_prefix()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Some(path) = href::decode(path) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if parts.method == Method::OPTIONS {
        return options();
    }

    let initiator = match sec::lookup(&parts, &state).await {
        Ok(initiator) => initiator,
        Err(err) => return rejected(err),
    };

    let dav = Dav {
        state: &state,
        owner: initiator.owner_id(),
        path: &path,
        headers: &parts.headers,
    };

    let result = match parts.method.as_str() {
        "PROPFIND" => read::propfind(&dav).await,
        "GET" => read::get(&dav, true).await,
        "HEAD" => read::get(&dav, false).await,
        "PUT" => write::put(&dav, body).await,
        "MKCOL" => write::mkcol(&dav).await,
        "DELETE" => write::delete(&dav).await,
        "MOVE" => write::transfer(&dav, write::Transfer::Move).await,
        "COPY" => write::transfer(&dav, write::Transfer::Copy).await,
        "LOCK" => lock(&dav),
        "UNLOCK" => Ok(StatusCode::NO_CONTENT.into_response()),
        _ => Err(Error::Status(StatusCode::METHOD_NOT_ALLOWED)),
    };

    match result {
        Ok(res) => res,
        Err(err) => err.into_response(),
    }
}

fn rejected(err: LookupError) -> Response {
    let status = match err {
        LookupError::Missing |
        LookupError::InvalidHeader(_) |
        LookupError::UnknownOwner => StatusCode::UNAUTHORIZED,
        LookupError::Inactive => StatusCode::FORBIDDEN,
        LookupError::Store(err) => {
            tracing::error!("failed to look up webdav owner: {err}");

            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    status.into_response()
}

fn options() -> Response {
    (
        StatusCode::OK,
        [
            (header::ALLOW, HeaderValue::from_static(ALLOW)),
            (header::HeaderName::from_static("dav"), HeaderValue::from_static("1, 2")),
            (header::HeaderName::from_static("ms-author-via"), HeaderValue::from_static("DAV")),
        ]
    ).into_response()
}

/// hands out a fresh token for any path. nothing is stored
fn lock(dav: &Dav<'_>) -> Result<Response> {
    let token = format!("opaquelocktoken:{}", ids::create_uid());
    let depth = dav.header("depth").unwrap_or("infinity");
    let root = href::encode(dav.prefix(), dav.path, false);

    let body = xml::lock_discovery(&token, &root, depth, LOCK_TIMEOUT);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, xml::CONTENT_TYPE)
        .header("lock-token", format!("<{token}>"))
        .body(Body::from(body))?)
}

#[cfg(test)]
pub(crate) mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    use crate::state::{self, ArcShared};

    pub(crate) fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(crate::config::DEFAULT_AUTH_HEADER, state::test::OWNER)
            .body(body)
            .unwrap()
    }

    pub(crate) async fn send(state: &ArcShared, req: Request<Body>) -> Response {
        crate::routing::routes(state).oneshot(req).await.unwrap()
    }

    pub(crate) async fn text(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();

        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn options_advertise_dav() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        let req = Request::builder()
            .method("OPTIONS")
            .uri("/webdav/")
            .body(Body::empty())
            .unwrap();
        let res = send(&state, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["dav"], "1, 2");
        assert_eq!(res.headers()["ms-author-via"], "DAV");
        assert!(res.headers()["allow"].to_str().unwrap().contains("PROPFIND"));
    }

    #[tokio::test]
    async fn principal_is_required() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        let req = Request::builder()
            .method("PROPFIND")
            .uri("/webdav/")
            .body(Body::empty())
            .unwrap();

        assert_eq!(send(&state, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .method("PROPFIND")
            .uri("/webdav/")
            .header(crate::config::DEFAULT_AUTH_HEADER, "inactive")
            .body(Body::empty())
            .unwrap();

        assert_eq!(send(&state, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn outside_of_prefix_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        let res = send(&state, request("GET", "/elsewhere/a.txt", Body::empty())).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lock_is_advisory() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        let res = send(&state, request("LOCK", "/webdav/a.txt", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::OK);

        let token = res.headers()["lock-token"].to_str().unwrap().to_owned();
        assert!(token.starts_with("<opaquelocktoken:"));

        let body = text(res).await;
        assert!(body.contains(token.trim_start_matches('<').trim_end_matches('>')));
        assert!(body.contains("Second-3600"));

        // nothing checks the token
        let res = send(&state, request("PUT", "/webdav/a.txt", Body::from("data"))).await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = send(&state, request("UNLOCK", "/webdav/a.txt", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unknown_method_is_not_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        let res = send(&state, request("PROPPATCH", "/webdav/", Body::empty())).await;

        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
