//! Invokes an external interpreter against a script and maps its output
//! back to an HTTP response. Run synchronously to completion within a
//! single dispatch: there is no event-driven state machine here, only a
//! blocking call with a wall-clock kill.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::config::{Config, LocationBlock};
use crate::http::request::{find_subsequence, Request};
use crate::http::response::{reason_phrase, Response};

const CGI_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Resolves the interpreter for a script extension. A location's own
/// `cgi_ext`/`cgi_path` pair wins over the process-wide registry; binaries
/// are configuration, never hard-coded at this layer.
pub fn resolve_interpreter<'a>(
    config: &'a Config,
    location: Option<&'a LocationBlock>,
    ext: &str,
) -> Option<&'a str> {
    if let Some(loc) = location {
        if let (Some(cgi_ext), Some(cgi_path)) = (&loc.cgi_extension, &loc.cgi_path) {
            if cgi_ext.trim_start_matches('.').eq_ignore_ascii_case(ext) {
                return Some(cgi_path.as_str());
            }
        }
    }
    config.cgi_registry.get(ext).map(String::as_str)
}

/// Runs `interpreter script_path`, feeding it the request body on stdin and
/// the CGI environment, then parses its stdout into a `Response`. Any
/// spawn/I-O failure or timeout collapses to a 500 (504 on timeout); a
/// missing script is a 404, not a 500, since that's a client-visible
/// not-found rather than a collaborator failure.
pub fn run(script_path: &Path, interpreter: &str, req: &Request) -> Response {
    if !script_path.exists() {
        return Response::error(404);
    }

    let mut child = match Command::new(interpreter)
        .arg(script_path)
        .envs(build_env(script_path, req))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return Response::error(500),
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(&req.body);
    }

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_status)) => break,
            Ok(None) => {
                if start.elapsed() > CGI_TIMEOUT {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Response::error(504);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(_) => return Response::error(500),
        }
    }

    let mut output = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        if stdout.read_to_end(&mut output).is_err() {
            return Response::error(500);
        }
    }

    parse_cgi_output(&output)
}

fn build_env(script_path: &Path, req: &Request) -> HashMap<String, String> {
    let mut env = HashMap::new();
    let (path_info, query_string) = match req.uri().split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (req.uri().to_string(), String::new()),
    };

    env.insert("GATEWAY_INTERFACE".into(), "CGI/1.1".into());
    env.insert("SERVER_PROTOCOL".into(), req.version().as_str().to_string());
    env.insert("REQUEST_METHOD".into(), req.method().as_str().to_string());
    env.insert("SCRIPT_FILENAME".into(), script_path.to_string_lossy().into_owned());
    env.insert(
        "SCRIPT_NAME".into(),
        script_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
    );
    env.insert("PATH_INFO".into(), path_info);
    env.insert("QUERY_STRING".into(), query_string);
    env.insert(
        "CONTENT_LENGTH".into(),
        req.content_length.unwrap_or(req.body.len()).to_string(),
    );
    if let Some(content_type) = req.headers.get("content-type") {
        env.insert("CONTENT_TYPE".into(), content_type.to_string());
    }
    if let Some(host) = req.headers.get("host") {
        env.insert("SERVER_NAME".into(), host.to_string());
    }

    for (name, value) in req.headers.iter() {
        if name == "content-length" || name == "content-type" {
            continue;
        }
        let key = format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_"));
        env.insert(key, value.clone());
    }

    env
}

/// Splits CGI output at the header/body separator. A leading `Status:`
/// header sets the HTTP status; everything else becomes a response header.
fn parse_cgi_output(raw: &[u8]) -> Response {
    let separator = find_subsequence(raw, b"\r\n\r\n")
        .map(|pos| (pos, 4))
        .or_else(|| find_subsequence(raw, b"\n\n").map(|pos| (pos, 2)));

    let Some((pos, sep_len)) = separator else {
        return Response::error(500);
    };

    let header_text = String::from_utf8_lossy(&raw[..pos]);
    let body = raw[pos + sep_len..].to_vec();

    let mut status = 200u16;
    let mut response = Response::new(200);

    for line in header_text.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("status") {
            status = value
                .split_whitespace()
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200);
        } else {
            response.headers.insert(name.to_string(), value.to_string());
        }
    }

    response.status_code = status;
    response.reason = reason_phrase(status).to_string();
    let content_type = response
        .headers
        .remove("Content-Type")
        .unwrap_or_else(|| "text/html".to_string());
    response.with_body(body, &content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn location_override_wins_over_registry() {
        let mut config = Config::new();
        config.register_cgi("py", "python3");
        let mut location = LocationBlock::new("/cgi-bin");
        location.cgi_extension = Some(".py".to_string());
        location.cgi_path = Some("/usr/bin/python2".to_string());

        assert_eq!(
            resolve_interpreter(&config, Some(&location), "py"),
            Some("/usr/bin/python2")
        );
    }

    #[test]
    fn falls_back_to_process_registry() {
        let mut config = Config::new();
        config.register_cgi("php", "php-cgi");
        assert_eq!(resolve_interpreter(&config, None, "php"), Some("php-cgi"));
        assert_eq!(resolve_interpreter(&config, None, "rb"), None);
    }

    #[test]
    fn parses_status_and_headers_from_cgi_output() {
        let raw = b"Status: 302 Found\r\nLocation: /next\r\nContent-Type: text/plain\r\n\r\nbye";
        let response = parse_cgi_output(raw);
        assert_eq!(response.status_code, 302);
        assert_eq!(response.headers.get("Location").map(String::as_str), Some("/next"));
        assert_eq!(response.body, b"bye");
    }

    #[test]
    fn defaults_to_200_without_status_header() {
        let raw = b"Content-Type: text/html\r\n\r\n<p>hi</p>";
        let response = parse_cgi_output(raw);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, b"<p>hi</p>");
    }
}
