//! URI cleaning and path-safety checks. Pure functions, no filesystem I/O.

/// Drops the query string: everything from the first `?` onward.
pub fn clean_uri(uri: &str) -> &str {
    match uri.find('?') {
        Some(idx) => &uri[..idx],
        None => uri,
    }
}

/// Rejects any traversal attempt. Total: checked at every position, not just
/// segment boundaries, so `a/../b`, `a..\b`, `a/..b/..` all reject.
pub fn is_path_safe(path: &str) -> bool {
    if path.as_bytes().contains(&0) {
        return false;
    }
    const BAD: [&str; 4] = ["../", "..\\", "/..", "\\.."];
    !BAD.iter().any(|pat| path.contains(pat))
}

/// Strips one trailing `/` from `root`, ensures `relative` starts with `/`,
/// concatenates. No canonicalization against the filesystem.
pub fn build_path(root: &str, relative: &str) -> String {
    let root = root.strip_suffix('/').unwrap_or(root);
    if relative.starts_with('/') {
        format!("{root}{relative}")
    } else {
        format!("{root}/{relative}")
    }
}

/// Lexical-normal form: collapses `//` and resolves single-dot segments,
/// preserving a leading `/`. Does not touch `..` segments — those are
/// rejected upstream by `is_path_safe`, not silently resolved here. Run on
/// every request URI before routing, so `//a/./b` and `/a/b` match the same
/// location and resolve to the same file.
pub fn sanitize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        segments.push(seg);
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_uri_drops_query() {
        assert_eq!(clean_uri("/a/b?x=1&y=2"), "/a/b");
        assert_eq!(clean_uri("/a/b"), "/a/b");
    }

    #[test]
    fn clean_uri_is_idempotent() {
        let u = "/search?q=hello";
        assert_eq!(clean_uri(clean_uri(u)), clean_uri(u));
    }

    #[test]
    fn path_safety_is_total() {
        let bad = [
            "../etc/passwd",
            "/a/../etc/passwd",
            "/a/b/../../etc",
            "a..\\b",
            "/a/..\\b",
            "foo\0bar",
            "/a/b/..",
        ];
        for p in bad {
            assert!(!is_path_safe(p), "expected unsafe: {p}");
        }
    }

    #[test]
    fn path_safety_allows_normal_paths() {
        let ok = ["/index.html", "/a/b/c", "/", "/a.b..c/d", "/foo..bar"];
        for p in ok {
            assert!(is_path_safe(p), "expected safe: {p}");
        }
    }

    #[test]
    fn build_path_strips_trailing_slash_on_root() {
        assert_eq!(build_path("/www/", "/index.html"), "/www/index.html");
        assert_eq!(build_path("/www", "/index.html"), "/www/index.html");
        assert_eq!(build_path("/www", "index.html"), "/www/index.html");
    }

    #[test]
    fn build_path_root_slash_is_stable() {
        let once = build_path("/", "/a/b");
        let via_root_first = build_path("/www", &build_path("/", "/a/b"));
        assert_eq!(via_root_first, build_path("/www", "/a/b"));
        assert_eq!(once, "/a/b");
    }

    #[test]
    fn sanitize_keeps_leading_slash_and_collapses_dots() {
        assert_eq!(sanitize_path("/a//b/./c"), "/a/b/c");
        assert_eq!(sanitize_path("/"), "/");
    }
}
