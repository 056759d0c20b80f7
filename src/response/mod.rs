//! `response` module
//!
//! Turns a parsed [`RequestHead`] into the status line and headers written
//! to the scratch buffer, plus the opened body file for a `200 OK`.
//!
//! Error statuses carry their short `text/plain` body right behind the
//! headers in the same buffer, so only a file body ever needs the payload
//! phase.

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{Result as IoResult, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::fcntl::OFlag;

use crate::buffer::ScratchBuffer;
use crate::common::{mime, StatusCode};
use crate::log;
use crate::request::RequestHead;
use crate::sanitize::sanitize;

use self::date_header::DateHeader;

mod date_header;

const SERVER_NAME: &str = "brick";
const INDEX_FILE: &str = "index.html";

/// Outcome of building a response whose head is waiting in the buffer
#[derive(Debug)]
pub(crate) struct Response {
    pub(crate) status: StatusCode,
    /// File to stream during the payload phase, `None` if there is nothing
    /// left to send after the head
    pub(crate) body: Option<File>,
    pub(crate) content_length: u64,
}

/// Builds responses for files below a document root
#[derive(Debug)]
pub(crate) struct ResponseBuilder {
    root: PathBuf,
    date: DateHeader,
}

impl ResponseBuilder {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self {
            root,
            date: DateHeader::new(),
        }
    }

    /// Resolves `head` and writes the response head into the cleared `buf`.
    ///
    /// # Errors
    ///
    /// Writing failed because `buf` is too small for the head.
    pub(crate) fn respond(
        &mut self,
        mut head: RequestHead,
        buf: &mut ScratchBuffer,
    ) -> IoResult<Response> {
        log::debug!("requested path {}", String::from_utf8_lossy(head.path()));

        let resolved = match sanitize(head.path_mut()) {
            Ok(()) => {
                log::debug!("sanitized path {}", String::from_utf8_lossy(head.path()));
                self.resolve(head.path())
            }
            Err(_) => Err(StatusCode::BAD_REQUEST),
        };

        buf.clear();
        match resolved {
            Ok((file, content_length, content_type)) => {
                self.write_head(buf, StatusCode::OK, content_type, content_length)?;
                Ok(Response {
                    status: StatusCode::OK,
                    body: (content_length > 0).then_some(file),
                    content_length,
                })
            }
            Err(status) => {
                let reason = status.default_reason_phrase();
                // three digit code, a space, the reason
                let body_length = 4 + reason.len() as u64;
                self.write_head(buf, status, mime::ERROR_MIME_TYPE, body_length)?;
                write!(buf, "{status} {reason}")?;
                Ok(Response {
                    status,
                    body: None,
                    content_length: 0,
                })
            }
        }
    }

    /// Opens the regular file `path` names below the root, or the
    /// `index.html` of the directory it names.
    fn resolve(&self, path: &[u8]) -> Result<(File, u64, &'static str), StatusCode> {
        let relative = Path::new(OsStr::from_bytes(path.strip_prefix(b"/").unwrap_or(path)));
        let target = self.root.join(relative);

        let file = open_nonblocking(&target).ok_or(StatusCode::NOT_FOUND)?;
        let metadata = file.metadata().map_err(|_| StatusCode::NOT_FOUND)?;

        if metadata.is_dir() {
            drop(file);
            let index = open_nonblocking(&target.join(INDEX_FILE)).ok_or(StatusCode::NOT_FOUND)?;
            let metadata = index.metadata().map_err(|_| StatusCode::NOT_FOUND)?;
            if !metadata.is_file() {
                return Err(StatusCode::NOT_FOUND);
            }
            return Ok((index, metadata.len(), mime::INDEX_MIME_TYPE));
        }

        if !metadata.is_file() {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok((file, metadata.len(), mime::lookup(path)))
    }

    fn write_head(
        &mut self,
        buf: &mut ScratchBuffer,
        status: StatusCode,
        content_type: &str,
        content_length: u64,
    ) -> IoResult<()> {
        write!(
            buf,
            "HTTP/1.1 {status} {}\r\nServer: {SERVER_NAME}\r\nDate: {}\r\nContent-Type: {content_type}\r\nContent-Length: {content_length}\r\n\r\n",
            status.default_reason_phrase(),
            self.date.current(),
        )
    }
}

fn open_nonblocking(path: &Path) -> Option<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
        .ok()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read;

    use super::*;
    use crate::request::parse;

    fn build(root: &Path, request: &str) -> (Response, String) {
        let mut builder = ResponseBuilder::new(root.to_owned());
        let mut buf = ScratchBuffer::with_capacity(2048);
        let head = parse(request.as_bytes()).unwrap();
        let response = builder.respond(head, &mut buf).unwrap();
        (response, String::from_utf8(buf.filled().to_vec()).unwrap())
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.split("\r\n")
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(": "))
    }

    fn docroot() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
        fs::write(dir.path().join("empty.md"), "").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "<p>docs</p>").unwrap();
        fs::create_dir(dir.path().join("bare")).unwrap();
        dir
    }

    #[test]
    fn serves_regular_file() {
        let root = docroot();
        let (response, head) = build(root.path(), "GET /hello.txt HTTP/1.1\r\n");

        assert_eq!(response.status, 200);
        assert_eq!(response.content_length, 11);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\nServer: brick\r\nDate: "));
        assert!(head.ends_with("\r\n\r\n"));
        assert_eq!(header(&head, "Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(header(&head, "Content-Length"), Some("11"));

        let mut body = String::new();
        let _ = response.body.unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello world");
    }

    #[test]
    fn empty_file_has_no_body() {
        let root = docroot();
        let (response, head) = build(root.path(), "GET /empty.md HTTP/1.1\r\n");
        assert_eq!(response.status, 200);
        assert!(response.body.is_none());
        assert_eq!(header(&head, "Content-Length"), Some("0"));
    }

    #[test]
    fn missing_file_is_404_with_inline_body() {
        let root = docroot();
        let (response, head) = build(root.path(), "GET /nope.html HTTP/1.1\r\n");

        assert_eq!(response.status, 404);
        assert!(response.body.is_none());
        assert_eq!(response.content_length, 0);
        assert!(head.starts_with("HTTP/1.1 404 File Not Found\r\n"));
        assert_eq!(header(&head, "Content-Type"), Some("text/plain"));
        assert_eq!(header(&head, "Content-Length"), Some("18"));
        assert!(head.ends_with("\r\n\r\n404 File Not Found"));
    }

    #[test]
    fn dot_segment_is_400() {
        let root = docroot();
        let (response, head) = build(root.path(), "GET /docs/../hello.txt HTTP/1.1\r\n");
        assert_eq!(response.status, 400);
        assert!(head.ends_with("\r\n\r\n400 Bad Request"));
        assert_eq!(header(&head, "Content-Length"), Some("15"));
    }

    #[test]
    fn directory_resolves_to_index() {
        let root = docroot();
        let (dir, dir_head) = build(root.path(), "GET /docs/ HTTP/1.1\r\n");
        assert_eq!(dir.status, 200);
        assert_eq!(dir.content_length, 11);
        assert_eq!(header(&dir_head, "Content-Type"), Some("text/html;charset=UTF-8"));

        let (slashless, _) = build(root.path(), "GET //docs HTTP/1.1\r\n");
        assert_eq!(slashless.content_length, 11);

        let (direct, direct_head) = build(root.path(), "GET /docs/index.html HTTP/1.1\r\n");
        assert_eq!(direct.status, 200);
        assert_eq!(direct.content_length, dir.content_length);
        assert_eq!(header(&direct_head, "Content-Type"), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn directory_without_index_is_404() {
        let root = docroot();
        let (response, _) = build(root.path(), "GET /bare/ HTTP/1.1\r\n");
        assert_eq!(response.status, 404);
        let (response, _) = build(root.path(), "GET / HTTP/1.1\r\n");
        assert_eq!(response.status, 404);
    }

    #[test]
    fn head_not_fitting_is_an_error() {
        let root = docroot();
        let mut builder = ResponseBuilder::new(root.path().to_owned());
        let mut buf = ScratchBuffer::with_capacity(32);
        let head = parse(b"GET /hello.txt HTTP/1.1\r\n").unwrap();
        assert!(builder.respond(head, &mut buf).is_err());
    }
}
