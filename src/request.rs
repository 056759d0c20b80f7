//! Strict, line oriented parser for the head of a `GET` request

use arrayvec::ArrayVec;

use crate::common::limits::{MAX_HEADER, MAX_PATH};

const METHOD: &[u8] = b"GET ";
const VERSION_LINE: &[u8] = b"HTTP/1.1\r\n";
const CRLF: &[u8] = b"\r\n";

/// Header fields whose values are kept, matched case-insensitively.
/// Everything else is skipped.
const HEADER_KEYS: &[&str] = &["Host"];

/// Error parsing the request head
///
/// Every variant is connection-fatal: after a malformed request line the
/// framing of anything following it can't be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Request line doesn't start with `GET `
    Method,
    /// No space after the request target
    RequestLine,
    /// Request target is empty
    EmptyTarget,
    /// Version is not exactly `HTTP/1.1` followed by `CRLF`
    Version,
    /// Recognized header field without a colon
    HeaderColon,
    /// Header line without terminating `CRLF`
    UnterminatedLine,
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ParseError::Method => "method not allowed",
            ParseError::RequestLine => "malformed request line",
            ParseError::EmptyTarget => "empty request target",
            ParseError::Version => "unsupported http version",
            ParseError::HeaderColon => "header field without colon",
            ParseError::UnterminatedLine => "header line without CRLF",
        })
    }
}

/// Parsed request head in fixed capacity fields
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestHead {
    path: ArrayVec<u8, MAX_PATH>,
    headers: [ArrayVec<u8, MAX_HEADER>; HEADER_KEYS.len()],
}

impl RequestHead {
    /// Request target, truncated to [`MAX_PATH`] bytes
    #[must_use]
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// Mutable request target for in place sanitizing
    pub(crate) fn path_mut(&mut self) -> &mut ArrayVec<u8, MAX_PATH> {
        &mut self.path
    }

    /// Value of the `Host` field, empty if absent
    #[must_use]
    pub fn host(&self) -> &[u8] {
        &self.headers[0]
    }
}

/// Parses `buf`, the request head up to and including the `CRLF` of its
/// last line; the blank line ending the head is not part of `buf`.
///
/// # Errors
///
/// [`ParseError`] for anything but `GET <target> HTTP/1.1` followed by
/// well terminated header lines.
pub fn parse(buf: &[u8]) -> Result<RequestHead, ParseError> {
    let mut head = RequestHead::default();

    let rest = buf.strip_prefix(METHOD).ok_or(ParseError::Method)?;

    let space = rest
        .iter()
        .position(|&b| b == b' ')
        .ok_or(ParseError::RequestLine)?;
    if space == 0 {
        return Err(ParseError::EmptyTarget);
    }
    copy_truncated(&mut head.path, &rest[..space]);

    let mut rest = rest[space + 1..]
        .strip_prefix(VERSION_LINE)
        .ok_or(ParseError::Version)?;

    while !rest.is_empty() {
        let end = find(rest, CRLF).ok_or(ParseError::UnterminatedLine)?;
        let line = &rest[..end];
        rest = &rest[end + CRLF.len()..];

        let colon = line.iter().position(|&b| b == b':');
        let name = colon.map_or(line, |c| &line[..c]);
        let Some(idx) = HEADER_KEYS
            .iter()
            .position(|key| key.as_bytes().eq_ignore_ascii_case(name))
        else {
            continue;
        };
        let colon = colon.ok_or(ParseError::HeaderColon)?;

        let value = &line[colon + 1..];
        let start = value
            .iter()
            .position(|&b| b != b' ' && b != b'\t')
            .unwrap_or(value.len());
        head.headers[idx].clear();
        copy_truncated(&mut head.headers[idx], &value[start..]);
    }

    Ok(head)
}

fn copy_truncated<const N: usize>(field: &mut ArrayVec<u8, N>, src: &[u8]) {
    let n = src.len().min(N);
    // capacity checked above
    let _ = field.try_extend_from_slice(&src[..n]);
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
