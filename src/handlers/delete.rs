//! DELETE: protected prefixes win over everything else, then directory and
//! existence checks.

use std::path::PathBuf;

use crate::fs;
use crate::http::path::build_path;
use crate::http::response::Response;
use crate::router::RouteMatch;

pub fn handle(route: &RouteMatch, uri: &str) -> Response {
    if is_protected(uri) {
        return Response::error(403);
    }

    let file_path = PathBuf::from(build_path(&route.effective_root, uri));
    if fs::is_directory(&file_path) {
        return Response::error(403);
    }
    if !fs::exists(&file_path) {
        return Response::error(404);
    }

    match fs::delete_file(&file_path) {
        Ok(()) => Response::no_content(),
        Err(_) => Response::error(500),
    }
}

fn is_protected(uri: &str) -> bool {
    uri == "/" || uri == "/index.html" || uri.starts_with("/errors/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::router::{route, select_vhost};

    #[test]
    fn protected_root_is_forbidden() {
        let src = "server { listen 80; root ./www; }";
        let config = parse_config(src).unwrap();
        let vhost = select_vhost(&config, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/");
        assert_eq!(handle(&m, "/").status_code, 403);
    }

    #[test]
    fn missing_file_is_404() {
        let dir = std::env::temp_dir().join(format!("webserv-delete-test-{}", fs::unix_seconds()));
        std::fs::create_dir_all(&dir).unwrap();
        let src = format!("server {{ listen 80; root {}; }}", dir.display());
        let config = parse_config(&src).unwrap();
        let vhost = select_vhost(&config, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/gone.txt");

        assert_eq!(handle(&m, "/gone.txt").status_code, 404);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn deletes_existing_file() {
        let dir = std::env::temp_dir().join(format!("webserv-delete-test2-{}", fs::unix_seconds()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.txt"), b"bye").unwrap();
        let src = format!("server {{ listen 80; root {}; }}", dir.display());
        let config = parse_config(&src).unwrap();
        let vhost = select_vhost(&config, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/a.txt");

        assert_eq!(handle(&m, "/a.txt").status_code, 204);
        assert!(!dir.join("a.txt").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
