//! Vhost selection, longest-prefix location matching, and the redirect /
//! method-policy short circuits.

use crate::config::{Config, LocationBlock, ServerBlock};
use crate::http::request::Method;
use crate::http::response::Response;

#[derive(Debug)]
pub enum RoutingError {
    NoVhost,
    MethodNotAllowed,
}

pub struct RouteMatch<'a> {
    pub vhost: &'a ServerBlock,
    pub location: Option<&'a LocationBlock>,
    pub effective_root: String,
}

/// Picks the vhost for a connection accepted on `(bind_host, bind_port)`,
/// honoring the `Host` header.
pub fn select_vhost<'a>(
    config: &'a Config,
    bind_host: &str,
    bind_port: u16,
    host_header: Option<&str>,
) -> Result<&'a ServerBlock, RoutingError> {
    config
        .select_vhost(bind_host, bind_port, host_header)
        .ok_or(RoutingError::NoVhost)
}

/// Matches `uri` against `vhost`'s locations and computes the effective
/// root. Does not itself reject on method policy — callers check that via
/// `check_method` once they have the match, since a redirect should win
/// over a 405 for the same location.
pub fn route<'a>(vhost: &'a ServerBlock, uri: &str) -> RouteMatch<'a> {
    let location = vhost.match_location(uri);
    let effective_root = location
        .and_then(|l| l.root.clone())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| {
            if vhost.root.is_empty() {
                "./www".to_string()
            } else {
                vhost.root.clone()
            }
        });

    RouteMatch {
        vhost,
        location,
        effective_root,
    }
}

/// Builds the redirect response for a location's `return` directive, if any.
pub fn redirect_response(location: &LocationBlock) -> Option<Response> {
    let (code, target) = location.redirection.as_ref()?;
    Some(Response::redirect(*code, target))
}

pub fn check_method(location: &LocationBlock, method: Method) -> Result<(), RoutingError> {
    if location.allows(method) {
        Ok(())
    } else {
        Err(RoutingError::MethodNotAllowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn config(src: &str) -> Config {
        parse_config(src).unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let c = config(
            "server { listen 80; root ./www; location / { } location /api { } location /api/v2 { } }",
        );
        let vhost = select_vhost(&c, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/api/v2/users");
        assert_eq!(m.location.unwrap().path, "/api/v2");
    }

    #[test]
    fn root_location_never_matches_non_root() {
        let c = config("server { listen 80; root ./www; location / { } }");
        let vhost = select_vhost(&c, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/anything");
        assert!(m.location.is_none());
        let root_match = route(vhost, "/");
        assert_eq!(root_match.location.unwrap().path, "/");
    }

    #[test]
    fn no_prefix_matches_returns_none() {
        let c = config("server { listen 80; root ./www; location /api { } }");
        let vhost = select_vhost(&c, "0.0.0.0", 80, None).unwrap();
        let m = route(vhost, "/other");
        assert!(m.location.is_none());
    }

    #[test]
    fn host_header_selects_matching_vhost() {
        let c = config(
            "server { listen 80; server_name a.com; root ./a; }\n\
             server { listen 80; server_name b.com; root ./b; }",
        );
        let vhost = select_vhost(&c, "0.0.0.0", 80, Some("b.com")).unwrap();
        assert_eq!(vhost.root, "./b");
    }

    #[test]
    fn unmatched_host_falls_back_to_endpoint_default() {
        let c = config(
            "server { listen 80; server_name a.com; root ./a; }\n\
             server { listen 80; server_name b.com; root ./b; }",
        );
        let vhost = select_vhost(&c, "0.0.0.0", 80, Some("nope.com")).unwrap();
        assert_eq!(vhost.root, "./a");
    }
}
