//! MIME-type resolution by file extension.

pub fn lookup(extension: Option<&str>) -> &'static str {
    match extension.map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

pub fn is_html(content_type: &str) -> bool {
    content_type.starts_with("text/html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(lookup(Some("html")), "text/html");
        assert_eq!(lookup(Some("PNG")), "image/png");
        assert_eq!(lookup(Some("json")), "application/json");
    }

    #[test]
    fn unknown_falls_back_to_octet_stream() {
        assert_eq!(lookup(Some("xyz")), "application/octet-stream");
        assert_eq!(lookup(None), "application/octet-stream");
    }
}
