//! POST: the whole body is treated as opaque; multipart parsing is not
//! attempted. A location with uploads enabled either has a dedicated
//! `upload_store` directory, in which case the body lands in a timestamped
//! file there, or writes straight to the requested path under the
//! effective root.

use std::path::PathBuf;

use crate::fs;
use crate::http::path::build_path;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::router::RouteMatch;

pub fn handle(route: &RouteMatch, uri: &str, req: &Request) -> Response {
    let location = route
        .location
        .expect("POST only reaches a handler once a location has allowed it");

    if !location.upload_enable {
        return Response::error(403);
    }

    let target = match &location.upload_store {
        Some(store) => PathBuf::from(store).join(format!("upload_{}.txt", fs::unix_seconds())),
        None => PathBuf::from(build_path(&route.effective_root, uri)),
    };

    match fs::write_file(&target, &req.body) {
        Ok(true) => Response::simple(201, "Created"),
        Ok(false) => Response::simple(200, "OK"),
        Err(_) => Response::error(500),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::http::request::parse_request;
    use crate::router::{route, select_vhost};

    fn post_request(body: &str) -> Request {
        let raw = format!(
            "POST /upload HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        parse_request(raw.as_bytes()).unwrap()
    }

    #[test]
    fn writes_into_upload_store() {
        let dir = std::env::temp_dir().join(format!("webserv-post-test-{}", fs::unix_seconds()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = dir.join("uploads");
        let src = format!(
            "server {{ listen 80; root {}; location /upload {{ upload_enable on; upload_store {}; }} }}",
            dir.display(),
            store.display()
        );
        let config = parse_config(&src).unwrap();
        let vhost = select_vhost(&config, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/upload");
        let req = post_request("hello");

        let response = handle(&m, "/upload", &req);
        assert_eq!(response.status_code, 201);
        assert_eq!(std::fs::read_dir(&store).unwrap().count(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn disabled_uploads_are_forbidden() {
        let src = "server { listen 80; root ./www; location /upload { } }";
        let config = parse_config(src).unwrap();
        let vhost = select_vhost(&config, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/upload");
        let req = post_request("hello");

        assert_eq!(handle(&m, "/upload", &req).status_code, 403);
    }
}
