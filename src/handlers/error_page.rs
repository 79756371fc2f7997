//! Custom error page substitution: on a 4xx/5xx response, consult the
//! vhost's `error_page` map; if it names a file and that file loads
//! successfully, its bytes become the body under the original status code.
//! Any lookup failure keeps the caller's default HTML body untouched.

use std::path::Path;

use crate::config::ServerBlock;
use crate::fs;
use crate::http::response::Response;

pub fn decorate(vhost: Option<&ServerBlock>, response: Response) -> Response {
    if response.status_code < 400 {
        return response;
    }
    let Some(vhost) = vhost else {
        return response;
    };
    let Some(page_path) = vhost.error_pages.get(&response.status_code) else {
        return response;
    };

    match fs::read_file(Path::new(page_path)) {
        Ok(bytes) => Response::new(response.status_code).with_body(bytes, "text/html"),
        Err(_) => response,
    }
}
