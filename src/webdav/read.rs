use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use stratus_lib::fs as lib_fs;
use tokio_util::io::ReaderStream;

use crate::activity::{ActivityType, Event};
use crate::fs::{self, Entry};

use super::{xml, Dav, Result};

/// the multistatus document of the resource at the request path and, when
/// `children` is set and it is a collection, of everything directly inside it
async fn multistatus(dav: &Dav<'_>, children: bool) -> Result<String> {
    let ns = dav.state.namespace();
    let entry = ns.resolve(dav.owner, dav.path).await?;
    let mut doc = xml::Multistatus::new(dav.prefix());

    let base = match &entry {
        Entry::Root => {
            doc.root()?;

            lib_fs::ROOT_PATH.to_owned()
        }
        Entry::Node(node) => {
            let path = ns.path_of(node).await?;

            doc.node(&path, node)?;

            path
        }
    };

    if children && entry.is_directory() {
        let parent = entry.id().map(|id| id.as_str());

        for child in ns.list(dav.owner, parent).await? {
            doc.node(&lib_fs::join_path(&base, &child.name), &child)?;
        }
    }

    Ok(doc.finish())
}

fn xml_response(status: StatusCode, body: String) -> Result<Response> {
    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, xml::CONTENT_TYPE)
        .body(Body::from(body))?)
}

/// `Depth: 0` describes only the resource itself, anything else includes the
/// immediate children
pub async fn propfind(dav: &Dav<'_>) -> Result<Response> {
    let children = dav.header("depth") != Some("0");

    xml_response(StatusCode::MULTI_STATUS, multistatus(dav, children).await?)
}

/// streams a file. collections answer with their listing, or nothing at all
/// for HEAD
pub async fn get(dav: &Dav<'_>, with_body: bool) -> Result<Response> {
    let ns = dav.state.namespace();

    let node = match ns.resolve(dav.owner, dav.path).await? {
        Entry::Node(node) if !node.is_directory() => node,
        _ if with_body => return xml_response(StatusCode::OK, multistatus(dav, true).await?),
        _ => return Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Body::empty())?),
    };

    let content = node.content.as_ref().ok_or(fs::Error::NotFile)?;

    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content.mime.as_ref())
        .header(header::CONTENT_LENGTH, content.size)
        .header(header::ETAG, format!("\"{}\"", content.checksum))
        .header(header::LAST_MODIFIED, xml::http_date(&node.updated_at))
        .header(header::ACCEPT_RANGES, "bytes");

    if !with_body {
        return Ok(builder.body(Body::empty())?);
    }

    let file = ns.open(&node).await?;
    let res = builder.body(Body::from_stream(ReaderStream::new(file)))?;

    dav.state.activity().record(Event::on(ActivityType::FileDownloaded, &node));

    Ok(res)
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::StatusCode;

    use crate::state;
    use crate::webdav::test::{request, send, text};

    #[tokio::test]
    async fn propfind_lists_collection() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        send(&state, request("MKCOL", "/webdav/docs", Body::empty())).await;
        send(&state, request("PUT", "/webdav/docs/a.txt", Body::from("hello"))).await;
        send(&state, request("PUT", "/webdav/top.txt", Body::from("x"))).await;

        let res = send(&state, request("PROPFIND", "/webdav/", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::MULTI_STATUS);

        let body = text(res).await;
        assert_eq!(body.matches("<D:response>").count(), 3);
        assert!(body.contains("<D:href>/webdav/docs/</D:href>"));
        assert!(body.contains("<D:href>/webdav/top.txt</D:href>"));
        assert!(!body.contains("a.txt"));

        let res = send(&state, request("PROPFIND", "/webdav/docs", Body::empty())).await;
        let body = text(res).await;
        assert_eq!(body.matches("<D:response>").count(), 2);
        assert!(body.contains("<D:href>/webdav/docs/a.txt</D:href>"));
        assert!(body.contains("<D:getcontentlength>5</D:getcontentlength>"));
        assert!(body.contains("<D:getcontenttype>text/plain</D:getcontenttype>"));
    }

    #[tokio::test]
    async fn propfind_depth_zero() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        send(&state, request("MKCOL", "/webdav/docs", Body::empty())).await;
        send(&state, request("PUT", "/webdav/docs/a.txt", Body::from("hello"))).await;

        let mut req = request("PROPFIND", "/webdav/docs", Body::empty());
        req.headers_mut().insert("depth", "0".parse().unwrap());

        let body = text(send(&state, req).await).await;

        assert_eq!(body.matches("<D:response>").count(), 1);
        assert!(body.contains("<D:collection/>"));
    }

    #[tokio::test]
    async fn propfind_on_file_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        send(&state, request("PUT", "/webdav/a%20b.txt", Body::from("hello"))).await;

        let res = send(&state, request("PROPFIND", "/webdav/a%20b.txt", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::MULTI_STATUS);

        let body = text(res).await;
        assert_eq!(body.matches("<D:response>").count(), 1);
        assert!(body.contains("<D:displayname>a b.txt</D:displayname>"));
        assert!(body.contains("<D:href>/webdav/a%20b.txt</D:href>"));

        let res = send(&state, request("PROPFIND", "/webdav/missing", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_and_head() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);

        send(&state, request("PUT", "/webdav/a.txt", Body::from("hello"))).await;

        let res = send(&state, request("HEAD", "/webdav/a.txt", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-length"], "5");
        assert_eq!(res.headers()["content-type"], "text/plain");
        assert!(res.headers().contains_key("etag"));
        assert!(text(res).await.is_empty());

        let res = send(&state, request("GET", "/webdav/a.txt", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["accept-ranges"], "bytes");
        assert_eq!(text(res).await, "hello");

        let res = send(&state, request("HEAD", "/webdav/", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!res.headers().contains_key("content-type"));

        let res = send(&state, request("GET", "/webdav/", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(text(res).await.contains("<D:href>/webdav/a.txt</D:href>"));

        let res = send(&state, request("GET", "/webdav/missing.txt", Body::empty())).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
