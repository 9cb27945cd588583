use axum::http::{header, HeaderMap};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use stratus_lib::fs as lib_fs;

/// characters escaped in a single path segment of an href
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'^')
    .add(b'|')
    .add(b'[')
    .add(b']');

#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("destination header is missing")]
    Missing,

    #[error("destination header is not valid utf8")]
    InvalidHeader(#[from] header::ToStrError),

    #[error("destination is not a valid url")]
    InvalidUrl(#[from] url::ParseError),

    #[error("destination path is not valid utf8")]
    InvalidPath,
}

/// the remainder of `path` below the mount `prefix`, always starting with a
/// slash. `None` when the path is outside of the mount
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');

    if prefix.is_empty() {
        return Some(if path.is_empty() { lib_fs::ROOT_PATH } else { path });
    }

    let rest = path.strip_prefix(prefix)?;

    if rest.is_empty() {
        Some(lib_fs::ROOT_PATH)
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// percent decodes a request path
pub fn decode(path: &str) -> Option<String> {
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// the decoded namespace path a MOVE or COPY targets.
///
/// the header may hold an absolute url or an absolute path. the mount prefix
/// is removed when present.
pub fn destination(headers: &HeaderMap, prefix: &str) -> Result<String, DestinationError> {
    let value = headers.get("destination")
        .ok_or(DestinationError::Missing)?
        .to_str()?;

    let parsed;
    let raw = if value.starts_with('/') {
        value
    } else {
        parsed = url::Url::parse(value)?;
        parsed.path()
    };

    let stripped = strip_prefix(raw, prefix).unwrap_or(raw);

    decode(stripped).ok_or(DestinationError::InvalidPath)
}

/// the href of a namespace path under the mount prefix. collections end with
/// a slash
pub fn encode(prefix: &str, path: &str, collection: bool) -> String {
    let mut rtn = prefix.trim_end_matches('/').to_owned();

    for seg in lib_fs::segments(path) {
        rtn.push('/');
        rtn.extend(utf8_percent_encode(seg, SEGMENT));
    }

    if collection || rtn.is_empty() {
        rtn.push('/');
    }

    rtn
}

#[cfg(test)]
mod test {
    use super::*;

    use axum::http::HeaderValue;

    #[test]
    fn prefix_stripping() {
        assert_eq!(strip_prefix("/webdav", "/webdav"), Some("/"));
        assert_eq!(strip_prefix("/webdav/", "/webdav"), Some("/"));
        assert_eq!(strip_prefix("/webdav/a/b", "/webdav"), Some("/a/b"));
        assert_eq!(strip_prefix("/webdavx/a", "/webdav"), None);
        assert_eq!(strip_prefix("/api/files", "/webdav"), None);
        assert_eq!(strip_prefix("/a", "/"), Some("/a"));
    }

    #[test]
    fn destination_forms() {
        let checks = [
            ("http://localhost:8080/webdav/docs/a%20b.txt", "/docs/a b.txt"),
            ("/webdav/docs/b.txt", "/docs/b.txt"),
            ("/docs/c.txt", "/docs/c.txt"),
            ("https://host/webdav/%C3%BC.txt", "/ü.txt"),
        ];

        for (given, expected) in checks {
            let mut headers = HeaderMap::new();
            headers.insert("destination", HeaderValue::from_static(given));

            assert_eq!(destination(&headers, "/webdav").unwrap(), expected, "given: {given}");
        }

        assert!(matches!(
            destination(&HeaderMap::new(), "/webdav"),
            Err(DestinationError::Missing)
        ));

        let mut headers = HeaderMap::new();
        headers.insert("destination", HeaderValue::from_static("not a url"));

        assert!(matches!(
            destination(&headers, "/webdav"),
            Err(DestinationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn href_encoding() {
        assert_eq!(encode("/webdav", "/", true), "/webdav/");
        assert_eq!(encode("/webdav", "/docs", true), "/webdav/docs/");
        assert_eq!(encode("/webdav", "/docs/a b#1.txt", false), "/webdav/docs/a%20b%231.txt");
        assert_eq!(encode("/", "/a.txt", false), "/a.txt");
        assert_eq!(encode("/", "/", true), "/");
    }
}
