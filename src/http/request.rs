//! HTTP/1.1 request parsing. `parse_request` and `is_complete` are pure
//! functions over a byte slice: no I/O, no mutation of shared state. The
//! reactor (`crate::server::reactor`) is the only caller that touches a
//! socket; it decides *when* to call these, not *how* they parse.

use std::collections::HashMap;

use crate::http::path::is_path_safe;

pub const MAX_URI_LEN: usize = 2048;
pub const MAX_HEADER_BYTES: usize = 8192;
pub const MAX_HEADERS: usize = 100;
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;
pub const MAX_CHUNKS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
    Put,
    Head,
    Options,
    Patch,
    Unknown,
}

impl Method {
    pub fn from_token(token: &str) -> Method {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "DELETE" => Method::Delete,
            "PUT" => Method::Put,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            _ => Method::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Put => "PUT",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn from_token(token: &str) -> Option<Version> {
        match token {
            "HTTP/1.0" => Some(Version::Http10),
            "HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub uri: String,
    pub version: Version,
}

/// Case-insensitive header map with unique keys; stores lowercased names.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap(HashMap<String, String>);

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap(HashMap::new())
    }

    pub fn insert(&mut self, name: &str, value: String) {
        self.0.insert(name.to_ascii_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub line: RequestLine,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub keep_alive: bool,
    pub chunked: bool,
    pub content_length: Option<usize>,
}

impl Request {
    pub fn method(&self) -> Method {
        self.line.method
    }

    pub fn uri(&self) -> &str {
        &self.line.uri
    }

    pub fn version(&self) -> Version {
        self.line.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    BadRequest(String),
    PayloadTooLarge,
}

impl ParseError {
    pub fn status_code(&self) -> u16 {
        match self {
            ParseError::BadRequest(_) => 400,
            ParseError::PayloadTooLarge => 413,
        }
    }

    fn bad(msg: impl Into<String>) -> ParseError {
        ParseError::BadRequest(msg.into())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::BadRequest(m) => write!(f, "bad request: {m}"),
            ParseError::PayloadTooLarge => write!(f, "payload too large"),
        }
    }
}

/// The completeness test: decides, from the bytes buffered so far,
/// whether a full request has arrived. Monotone: once true for `buf`,
/// stays true for any `buf` with bytes appended.
pub fn is_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find_subsequence(buf, b"\r\n\r\n") else {
        return false;
    };
    let body_start = header_end + 4;
    let header_block = &buf[..header_end];

    if let Some(len) = content_length_of(header_block) {
        return buf.len() >= body_start + len;
    }
    if is_chunked(header_block) {
        return find_subsequence(&buf[body_start..], b"0\r\n\r\n").is_some();
    }
    true
}

fn content_length_of(header_block: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(header_block).ok()?;
    for line in text.split("\r\n").skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse::<usize>().ok();
            }
        }
    }
    None
}

fn is_chunked(header_block: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(header_block) else {
        return false;
    };
    text.split("\r\n").skip(1).any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value.trim().eq_ignore_ascii_case("chunked")
        })
    })
}

/// Parses a complete request out of `buf`. Callers must have already
/// established completeness (`is_complete`) — this function does not ask
/// for more bytes, it only succeeds or rejects.
pub fn parse_request(buf: &[u8]) -> Result<Request, ParseError> {
    let mut cursor = 0usize;

    let line = parse_request_line(buf, &mut cursor)?;
    if !is_path_safe(&line.uri) {
        return Err(ParseError::bad("path traversal rejected"));
    }

    let (headers, header_bytes) = parse_headers(buf, &mut cursor)?;
    let _ = header_bytes;

    if line.version == Version::Http11 {
        match headers.get("host") {
            Some(h) if !h.is_empty() => {}
            _ => return Err(ParseError::bad("HTTP/1.1 request missing Host header")),
        }
    }

    let has_content_length = headers.contains("content-length");
    let transfer_chunked = headers
        .get("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));

    if has_content_length && transfer_chunked {
        return Err(ParseError::bad(
            "both Content-Length and Transfer-Encoding: chunked present",
        ));
    }

    let mut content_length = None;
    let body = if let Some(raw) = headers.get("content-length") {
        let len: usize = raw
            .trim()
            .parse()
            .map_err(|_| ParseError::bad("invalid Content-Length"))?;
        if len > MAX_BODY_SIZE {
            return Err(ParseError::PayloadTooLarge);
        }
        content_length = Some(len);
        let remaining = &buf[cursor..];
        if remaining.len() < len {
            return Err(ParseError::bad("body shorter than Content-Length"));
        }
        remaining[..len].to_vec()
    } else if transfer_chunked {
        parse_chunked_body(&buf[cursor..])?
    } else {
        Vec::new()
    };

    let keep_alive = headers
        .get("connection")
        .map(|v| v.eq_ignore_ascii_case("keep-alive"))
        .unwrap_or(line.version == Version::Http11);

    Ok(Request {
        line,
        headers,
        body,
        keep_alive,
        chunked: transfer_chunked,
        content_length,
    })
}

fn parse_request_line(buf: &[u8], cursor: &mut usize) -> Result<RequestLine, ParseError> {
    let idx = find_crlf(&buf[*cursor..]).ok_or_else(|| ParseError::bad("incomplete request line"))?;
    let line_bytes = &buf[*cursor..*cursor + idx];
    *cursor += idx + 2;

    let line = std::str::from_utf8(line_bytes).map_err(|_| ParseError::bad("invalid utf-8"))?;
    let parts: Vec<&str> = line.split(' ').filter(|s| !s.is_empty()).collect();
    if parts.len() != 3 {
        return Err(ParseError::bad("malformed request line"));
    }

    let method = Method::from_token(parts[0]);
    if method == Method::Unknown {
        return Err(ParseError::bad("unrecognized method"));
    }

    let uri = parts[1];
    if uri.is_empty() || !uri.starts_with('/') {
        return Err(ParseError::bad("uri must start with '/'"));
    }
    if uri.len() > MAX_URI_LEN {
        return Err(ParseError::bad("uri too long"));
    }

    let version =
        Version::from_token(parts[2]).ok_or_else(|| ParseError::bad("unsupported HTTP version"))?;

    Ok(RequestLine {
        method,
        uri: uri.to_string(),
        version,
    })
}

fn parse_headers(buf: &[u8], cursor: &mut usize) -> Result<(HeaderMap, usize), ParseError> {
    let mut headers = HeaderMap::new();
    let mut count = 0usize;
    let start = *cursor;

    loop {
        let idx = find_crlf(&buf[*cursor..]).ok_or_else(|| ParseError::bad("incomplete headers"))?;
        if idx == 0 {
            *cursor += 2;
            break;
        }
        if *cursor - start > MAX_HEADER_BYTES {
            return Err(ParseError::bad("header block too large"));
        }
        count += 1;
        if count > MAX_HEADERS {
            return Err(ParseError::bad("too many headers"));
        }

        let line_bytes = &buf[*cursor..*cursor + idx];
        *cursor += idx + 2;
        let line = std::str::from_utf8(line_bytes).map_err(|_| ParseError::bad("invalid utf-8 header"))?;
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::bad("malformed header, missing ':'"))?;
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return Err(ParseError::bad("empty header name"));
        }
        headers.insert(name, value.to_string());
    }

    Ok((headers, *cursor - start))
}

fn parse_chunked_body(mut data: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut body = Vec::new();
    let mut chunk_count = 0usize;

    loop {
        let idx = find_crlf(data).ok_or_else(|| ParseError::bad("malformed chunk size line"))?;
        let size_line = std::str::from_utf8(&data[..idx]).map_err(|_| ParseError::bad("invalid chunk size"))?;
        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_token, 16).map_err(|_| ParseError::bad("invalid chunk size"))?;
        data = &data[idx + 2..];

        if size == 0 {
            break;
        }

        if size > MAX_CHUNK_SIZE {
            return Err(ParseError::PayloadTooLarge);
        }
        chunk_count += 1;
        if chunk_count > MAX_CHUNKS {
            return Err(ParseError::PayloadTooLarge);
        }
        if data.len() < size + 2 {
            return Err(ParseError::bad("chunk shorter than declared size"));
        }
        if &data[size..size + 2] != b"\r\n" {
            return Err(ParseError::bad("missing CRLF after chunk data"));
        }

        body.extend_from_slice(&data[..size]);
        if body.len() > MAX_BODY_SIZE {
            return Err(ParseError::PayloadTooLarge);
        }
        data = &data[size + 2..];
    }

    Ok(body)
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(is_complete(raw));
        let req = parse_request(raw).unwrap();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.uri(), "/index.html");
        assert_eq!(req.version(), Version::Http11);
        assert_eq!(req.headers.get("host"), Some("localhost"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn http11_requires_host() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let err = parse_request(raw).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn rejects_fewer_than_three_tokens() {
        let raw = b"GET /\r\nHost: x\r\n\r\n";
        assert!(parse_request(raw).is_err());
    }

    #[test]
    fn content_length_exact_vs_one_over() {
        let exact = b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
        let req = parse_request(exact).unwrap();
        assert_eq!(req.body, b"hello");

        let short = b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 6\r\n\r\nhello";
        assert!(parse_request(short).is_err());
    }

    #[test]
    fn rejects_conflicting_length_and_chunked() {
        let raw = b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\nhello";
        assert!(parse_request(raw).is_err());
    }

    #[test]
    fn parses_chunked_body() {
        let raw = b"POST /x HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        assert!(is_complete(raw));
        let req = parse_request(raw).unwrap();
        assert_eq!(req.body, b"Wikipedia");
        assert!(req.chunked);
    }

    #[test]
    fn uri_at_and_over_limit() {
        let ok_uri = format!("/{}", "a".repeat(MAX_URI_LEN - 1));
        let raw_ok = format!("GET {ok_uri} HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(parse_request(raw_ok.as_bytes()).is_ok());

        let bad_uri = format!("/{}", "a".repeat(MAX_URI_LEN));
        let raw_bad = format!("GET {bad_uri} HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(parse_request(raw_bad.as_bytes()).is_err());
    }

    #[test]
    fn completeness_is_monotone() {
        let partial = b"GET /x HTTP/1.1\r\nHost: x\r\n";
        assert!(!is_complete(partial));
        let mut full = partial.to_vec();
        full.extend_from_slice(b"\r\n");
        assert!(is_complete(&full));
        full.extend_from_slice(b"extra-garbage");
        assert!(is_complete(&full));
    }

    #[test]
    fn traversal_in_uri_rejected_before_any_fs_access() {
        let raw = b"GET /../etc/passwd HTTP/1.1\r\nHost: x\r\n\r\n";
        let err = parse_request(raw).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
