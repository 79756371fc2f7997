//! Dispatch pipeline: vhost selection, redirect / method short-circuits,
//! CGI delegation, then the per-method static handlers. `handle_request`
//! is the single entry point the reactor calls per completed request.

pub mod delete;
pub mod error_page;
pub mod get;
pub mod post;

use std::path::PathBuf;

use crate::cgi;
use crate::config::Config;
use crate::http::path::{build_path, clean_uri, sanitize_path};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::router;

pub fn handle_request(config: &Config, bind_host: &str, bind_port: u16, req: &Request) -> Response {
    let vhost = match router::select_vhost(config, bind_host, bind_port, req.headers.get("host")) {
        Ok(v) => v,
        Err(_) => return Response::error(500),
    };

    let uri = sanitize_path(clean_uri(req.uri()));
    let route = router::route(vhost, &uri);

    if let Some(location) = route.location {
        if let Some(redirect) = router::redirect_response(location) {
            return redirect;
        }
        if router::check_method(location, req.method()).is_err() {
            return error_page::decorate(Some(vhost), Response::error(405));
        }
    } else if req.method() != Method::Get {
        return error_page::decorate(Some(vhost), Response::error(405));
    }

    let file_path = PathBuf::from(build_path(&route.effective_root, &uri));
    if !file_path.is_dir() {
        if let Some(ext) = file_path.extension().and_then(|e| e.to_str()) {
            if let Some(interpreter) = cgi::resolve_interpreter(config, route.location, ext) {
                let response = cgi::run(&file_path, interpreter, req);
                return error_page::decorate(Some(vhost), response);
            }
        }
    }

    let response = match req.method() {
        Method::Get => get::handle(&route, &uri),
        Method::Post => post::handle(&route, &uri, req),
        Method::Delete => delete::handle(&route, &uri),
        _ => Response::error(501),
    };

    error_page::decorate(Some(vhost), response)
}
