use std::borrow::Cow;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::fs::FileNode;

use super::href;

const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

pub const CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// display name of the top level collection
const ROOT_NAME: &str = "root";

pub fn escape(given: &str) -> Cow<'_, str> {
    if !given.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(given);
    }

    let mut rtn = String::with_capacity(given.len() + 8);

    for ch in given.chars() {
        match ch {
            '&' => rtn.push_str("&amp;"),
            '<' => rtn.push_str("&lt;"),
            '>' => rtn.push_str("&gt;"),
            '"' => rtn.push_str("&quot;"),
            '\'' => rtn.push_str("&apos;"),
            _ => rtn.push(ch),
        }
    }

    Cow::Owned(rtn)
}

/// the date format of http headers and getlastmodified
pub fn http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// builds a 207 multistatus body one resource at a time
pub struct Multistatus<'a> {
    prefix: &'a str,
    buf: String,
}

impl<'a> Multistatus<'a> {
    pub fn new(prefix: &'a str) -> Self {
        let mut buf = String::with_capacity(1024);
        buf.push_str(HEADER);
        buf.push_str(r#"<D:multistatus xmlns:D="DAV:">"#);

        Multistatus { prefix, buf }
    }

    /// the top level collection of the owner
    pub fn root(&mut self) -> std::fmt::Result {
        let href = href::encode(self.prefix, "/", true);

        write!(
            self.buf,
            "<D:response><D:href>{}</D:href><D:propstat><D:prop>\
            <D:displayname>{ROOT_NAME}</D:displayname>\
            <D:resourcetype><D:collection/></D:resourcetype>",
            escape(&href)
        )?;

        self.close_response();

        Ok(())
    }

    /// a node found at `path`
    pub fn node(&mut self, path: &str, node: &FileNode) -> std::fmt::Result {
        let href = href::encode(self.prefix, path, node.is_directory());

        write!(
            self.buf,
            "<D:response><D:href>{}</D:href><D:propstat><D:prop>\
            <D:displayname>{}</D:displayname>\
            <D:creationdate>{}</D:creationdate>\
            <D:getlastmodified>{}</D:getlastmodified>",
            escape(&href),
            escape(&node.name),
            node.created_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            http_date(&node.updated_at),
        )?;

        match &node.content {
            Some(content) => {
                write!(
                    self.buf,
                    "<D:resourcetype/>\
                    <D:getcontentlength>{}</D:getcontentlength>\
                    <D:getcontenttype>{}</D:getcontenttype>\
                    <D:getetag>&quot;{}&quot;</D:getetag>",
                    content.size,
                    escape(content.mime.as_ref()),
                    escape(&content.checksum),
                )?;
            }
            None => {
                self.buf.push_str("<D:resourcetype><D:collection/></D:resourcetype>");
            }
        }

        self.close_response();

        Ok(())
    }

    fn close_response(&mut self) {
        self.buf.push_str(
            "</D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>"
        );
    }

    pub fn finish(mut self) -> String {
        self.buf.push_str("</D:multistatus>");
        self.buf
    }
}

/// the lock discovery body returned for a granted LOCK
pub fn lock_discovery(token: &str, root: &str, depth: &str, timeout: &str) -> String {
    format!(
        "{HEADER}<D:prop xmlns:D=\"DAV:\"><D:lockdiscovery><D:activelock>\
        <D:locktype><D:write/></D:locktype>\
        <D:lockscope><D:exclusive/></D:lockscope>\
        <D:depth>{}</D:depth>\
        <D:timeout>{}</D:timeout>\
        <D:locktoken><D:href>{}</D:href></D:locktoken>\
        <D:lockroot><D:href>{}</D:href></D:lockroot>\
        </D:activelock></D:lockdiscovery></D:prop>",
        escape(depth),
        escape(timeout),
        escape(token),
        escape(root),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    use chrono::TimeZone;

    use crate::fs::{Content, Kind};

    #[test]
    fn escaping() {
        assert!(matches!(escape("plain.txt"), Cow::Borrowed(_)));
        assert_eq!(escape("a&b<c>\"d'"), "a&amp;b&lt;c&gt;&quot;d&apos;");
    }

    #[test]
    fn http_dates() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();

        assert_eq!(http_date(&dt), "Thu, 07 Mar 2024 09:05:01 GMT");
    }

    #[test]
    fn file_and_directory_responses() {
        let dir = FileNode::new("owner".into(), None, "R&D".into(), Kind::Directory);
        let file = FileNode::new("owner".into(), None, "a b.txt".into(), Kind::File(Content {
            storage_ref: "x/y".into(),
            mime: mime::TEXT_PLAIN,
            size: 5,
            checksum: "abc".into(),
            version: 1,
        }));

        let mut doc = Multistatus::new("/webdav");
        doc.root().unwrap();
        doc.node("/R&D", &dir).unwrap();
        doc.node("/a b.txt", &file).unwrap();

        let body = doc.finish();

        assert!(body.starts_with(HEADER));
        assert!(body.ends_with("</D:multistatus>"));
        assert_eq!(body.matches("<D:response>").count(), 3);
        assert!(body.contains("<D:href>/webdav/</D:href>"));
        assert!(body.contains("<D:displayname>root</D:displayname>"));
        assert!(body.contains("<D:href>/webdav/R&amp;D/</D:href>"));
        assert!(body.contains("<D:displayname>R&amp;D</D:displayname>"));
        assert!(body.contains("<D:href>/webdav/a%20b.txt</D:href>"));
        assert!(body.contains("<D:getcontentlength>5</D:getcontentlength>"));
        assert!(body.contains("<D:getcontenttype>text/plain</D:getcontenttype>"));
        assert!(body.contains("<D:getetag>&quot;abc&quot;</D:getetag>"));
    }

    #[test]
    fn lock_body() {
        let body = lock_discovery("opaquelocktoken:abc", "/webdav/a.txt", "infinity", "Second-3600");

        assert!(body.contains("<D:href>opaquelocktoken:abc</D:href>"));
        assert!(body.contains("<D:timeout>Second-3600</D:timeout>"));
        assert!(body.contains("<D:depth>infinity</D:depth>"));
    }
}
