//! GET: directory resolution (index/autoindex/forbidden), then a plain
//! static-file read. CGI delegation happens one level up, in
//! `handlers::handle_request`, before a location is known to be a
//! directory or a file.

use std::path::{Path, PathBuf};

use crate::fs;
use crate::http::mime;
use crate::http::path::build_path;
use crate::http::response::Response;
use crate::router::RouteMatch;

pub fn handle(route: &RouteMatch, uri: &str) -> Response {
    let mut file_path = PathBuf::from(build_path(&route.effective_root, uri));

    if fs::is_directory(&file_path) {
        let index = route
            .location
            .and_then(|l| l.index.clone())
            .filter(|s| !s.is_empty())
            .or_else(|| route.vhost.index.clone());
        let autoindex = route.location.map(|l| l.autoindex).unwrap_or(false);

        match index {
            Some(name) => {
                let candidate = file_path.join(&name);
                if fs::exists(&candidate) && !fs::is_directory(&candidate) {
                    file_path = candidate;
                } else if autoindex {
                    return autoindex_response(&file_path, uri);
                } else {
                    return Response::error(403);
                }
            }
            None if autoindex => return autoindex_response(&file_path, uri),
            None => return Response::error(403),
        }
    }

    serve_file(&file_path)
}

fn serve_file(path: &Path) -> Response {
    let ext = path.extension().and_then(|e| e.to_str());
    let content_type = mime::lookup(ext);
    match fs::cached_read_file(path, content_type) {
        Ok(bytes) => {
            if bytes.len() > 1024 * 1024 {
                Response::chunked_file(200, bytes, content_type)
            } else {
                Response::file(200, bytes, content_type)
            }
        }
        Err(fs::FsStatus::NotFound) => Response::error(404),
        Err(fs::FsStatus::Forbidden) => Response::error(403),
    }
}

fn autoindex_response(dir: &Path, uri: &str) -> Response {
    match fs::list_directory_html(dir, uri) {
        Ok(html) => Response::new(200).with_body(html.into_bytes(), "text/html"),
        Err(_) => Response::error(403),
    }
}
