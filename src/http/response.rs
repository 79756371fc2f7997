//! Response construction: status line, standard headers, and the two
//! framing disciplines (Content-Length or chunked).

use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framing {
    ContentLength,
    Chunked,
    None,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub reason: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub framing: Framing,
}

impl Response {
    pub fn new(status_code: u16) -> Self {
        Response {
            status_code,
            reason: reason_phrase(status_code).to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            framing: Framing::ContentLength,
        }
    }

    pub fn set_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.headers
            .insert("Content-Type".to_string(), content_type.to_string());
        self.body = body;
        self.framing = Framing::ContentLength;
        self
    }

    pub fn with_chunked_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.headers
            .insert("Content-Type".to_string(), content_type.to_string());
        self.headers
            .insert("Transfer-Encoding".to_string(), "chunked".to_string());
        self.body = body;
        self.framing = Framing::Chunked;
        self
    }

    /// Plain-text status + message, used for quick error/ack responses.
    pub fn simple(status_code: u16, message: impl Into<String>) -> Self {
        Response::new(status_code).with_body(message.into().into_bytes(), "text/plain")
    }

    /// Status with a default HTML error body, overridable by a custom error
    /// page loaded by the caller (see `handlers::error_page`).
    pub fn error(status_code: u16) -> Self {
        let reason = reason_phrase(status_code);
        let body = format!(
            "<!DOCTYPE html><html><head><title>{status_code} {reason}</title></head><body><h1>{status_code} {reason}</h1></body></html>"
        );
        Response::new(status_code).with_body(body.into_bytes(), "text/html")
    }

    /// Status, bytes, content-type. Cache-control differs for HTML vs other
    /// static assets.
    pub fn file(status_code: u16, bytes: Vec<u8>, content_type: &str) -> Self {
        let cache_control = if crate::http::mime::is_html(content_type) {
            "no-cache"
        } else {
            "public, max-age=3600"
        };
        Response::new(status_code)
            .with_body(bytes, content_type)
            .set_header("Cache-Control", cache_control)
    }

    pub fn chunked_file(status_code: u16, bytes: Vec<u8>, content_type: &str) -> Self {
        let cache_control = if crate::http::mime::is_html(content_type) {
            "no-cache"
        } else {
            "public, max-age=3600"
        };
        Response::new(status_code)
            .with_chunked_body(bytes, content_type)
            .set_header("Cache-Control", cache_control)
    }

    /// 301/302/303/307/308 with a `Location` header and empty body.
    pub fn redirect(status_code: u16, location: &str) -> Self {
        Response::new(status_code)
            .set_header("Location", location)
            .with_body(Vec::new(), "text/plain")
    }

    pub fn no_content() -> Self {
        let mut res = Response::new(204);
        res.framing = Framing::None;
        res
    }

    /// Serializes the status line, standard headers (added unless the
    /// caller already set them), and body into wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.reason).into_bytes();

        if !self.headers.contains_key("Date") {
            out.extend_from_slice(format!("Date: {}\r\n", http_date(SystemTime::now())).as_bytes());
        }
        if !self.headers.contains_key("Server") {
            out.extend_from_slice(b"Server: webserv/1.0\r\n");
        }
        match self.framing {
            Framing::ContentLength => {
                if !self.headers.contains_key("Content-Length") {
                    out.extend_from_slice(
                        format!("Content-Length: {}\r\n", self.body.len()).as_bytes(),
                    );
                }
            }
            Framing::Chunked => {}
            Framing::None => {}
        }
        if !self.headers.contains_key("Connection") {
            out.extend_from_slice(b"Connection: close\r\n");
        }

        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");

        match self.framing {
            Framing::Chunked => {
                if !self.body.is_empty() {
                    out.extend_from_slice(format!("{:x}\r\n", self.body.len()).as_bytes());
                    out.extend_from_slice(&self.body);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(b"0\r\n\r\n");
            }
            _ => out.extend_from_slice(&self.body),
        }

        out
    }
}

pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// RFC 1123 date in GMT, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
pub fn http_date(time: SystemTime) -> String {
    let secs = time
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let days_since_epoch = secs / 86400;
    let day_of_week = DAYS[((days_since_epoch + 4) % 7) as usize];
    let secs_of_day = secs % 86400;
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;

    let (year, month, day) = civil_from_days(days_since_epoch as i64);

    format!(
        "{day_of_week}, {day:02} {} {year} {hour:02}:{minute:02}:{second:02} GMT",
        MONTHS[(month - 1) as usize]
    )
}

/// Howard Hinnant's days-from-civil algorithm, inverted, valid for the
/// proleptic Gregorian calendar.
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as i64;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as i64;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_framing_header_set() {
        let r = Response::file(200, b"hi".to_vec(), "text/html");
        let bytes = r.to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Content-Length: 2"));
        assert!(!text.contains("Transfer-Encoding"));
    }

    #[test]
    fn chunked_framing_omits_content_length() {
        let r = Response::chunked_file(200, b"hello".to_vec(), "application/octet-stream");
        let bytes = r.to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Transfer-Encoding: chunked"));
        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("0\r\n\r\n"));
    }

    #[test]
    fn redirect_has_location_and_empty_body() {
        let r = Response::redirect(301, "/v2");
        assert_eq!(r.status_code, 301);
        assert_eq!(r.headers.get("Location").map(String::as_str), Some("/v2"));
        assert!(r.body.is_empty());
    }

    #[test]
    fn http_date_matches_known_instant() {
        let t = std::time::UNIX_EPOCH + std::time::Duration::from_secs(784_111_777);
        assert_eq!(http_date(t), "Tue, 06 Nov 1994 08:49:37 GMT");
    }
}
