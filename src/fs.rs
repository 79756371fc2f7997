//! Filesystem primitives: read/write/delete, existence/directory checks,
//! directory listing, plus a small bounded file cache keyed by path,
//! holding file bytes and a MIME type.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsStatus {
    NotFound,
    Forbidden,
}

/// Reads a file's bytes, specialized to a single already-joined path
/// (callers build `root + uri` via `http::path::build_path` before
/// calling in).
pub fn read_file(path: &Path) -> Result<Vec<u8>, FsStatus> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) => Err(status_of(e.kind())),
    }
}

/// `write(root, uri, bytes) -> (created?, status)`: returns whether the
/// file was newly created (true) or overwrote an existing file (false).
pub fn write_file(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    let created = !path.exists();
    if let Some(parent) = path.parent() {
        mkdir_p(parent)?;
    }
    fs::write(path, bytes)?;
    invalidate_cache(path);
    Ok(created)
}

pub fn delete_file(path: &Path) -> Result<(), FsStatus> {
    fs::remove_file(path).map_err(|e| status_of(e.kind()))?;
    invalidate_cache(path);
    Ok(())
}

pub fn is_directory(path: &Path) -> bool {
    path.is_dir()
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn mkdir_p(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

fn status_of(kind: io::ErrorKind) -> FsStatus {
    match kind {
        io::ErrorKind::NotFound => FsStatus::NotFound,
        io::ErrorKind::PermissionDenied => FsStatus::Forbidden,
        _ => FsStatus::NotFound,
    }
}

/// Renders an HTML directory listing, used by the GET handler's
/// autoindex fallback.
pub fn list_directory_html(path: &Path, uri: &str) -> io::Result<String> {
    let mut entries: Vec<String> = fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if e.path().is_dir() {
                format!("{name}/")
            } else {
                name
            }
        })
        .collect();
    entries.sort();

    let mut body = String::new();
    body.push_str("<!DOCTYPE html><html><head><title>Index of ");
    body.push_str(uri);
    body.push_str("</title></head><body><h1>Index of ");
    body.push_str(uri);
    body.push_str("</h1><ul>");
    body.push_str("<li><a href=\"../\">../</a></li>");
    for name in entries {
        body.push_str(&format!("<li><a href=\"{name}\">{name}</a></li>"));
    }
    body.push_str("</ul></body></html>");
    Ok(body)
}

/// Unix timestamp used to name per-location uploads (`upload_<secs>.txt`).
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Bounded, single-threaded cache of file bytes + content-type keyed by
/// path. FIFO eviction on insertion past capacity.
pub struct FileCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, (Vec<u8>, String)>,
}

impl FileCache {
    pub fn new(capacity: usize) -> Self {
        FileCache {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&(Vec<u8>, String)> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: String, bytes: Vec<u8>, content_type: String) {
        if self.entries.contains_key(&path) {
            self.entries.insert(path, (bytes, content_type));
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(path.clone());
        self.entries.insert(path, (bytes, content_type));
    }

    pub fn invalidate(&mut self, path: &str) {
        if self.entries.remove(path).is_some() {
            self.order.retain(|p| p != path);
        }
    }
}

const DEFAULT_CACHE_CAPACITY: usize = 128;

thread_local! {
    /// One reactor thread per process, so a thread-local cache is enough;
    /// tests that spawn their own reactor thread get their own independent
    /// cache.
    static CACHE: RefCell<FileCache> = RefCell::new(FileCache::new(DEFAULT_CACHE_CAPACITY));
}

/// `read_file`, but consulting the process-local `FileCache` first. A
/// cache miss falls back to a real read and populates the entry;
/// `write_file`/`delete_file` evict the corresponding entry so a
/// subsequent GET never serves stale bytes after an upload or deletion.
pub fn cached_read_file(path: &Path, content_type: &str) -> Result<Vec<u8>, FsStatus> {
    let key = path.to_string_lossy().into_owned();
    if let Some(bytes) = CACHE.with(|c| c.borrow().get(&key).map(|(b, _)| b.clone())) {
        return Ok(bytes);
    }
    let bytes = read_file(path)?;
    CACHE.with(|c| c.borrow_mut().insert(key, bytes.clone(), content_type.to_string()));
    Ok(bytes)
}

fn invalidate_cache(path: &Path) {
    let key = path.to_string_lossy().into_owned();
    CACHE.with(|c| c.borrow_mut().invalidate(&key));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_evicts_oldest_on_overflow() {
        let mut cache = FileCache::new(2);
        cache.insert("a".into(), b"a".to_vec(), "text/plain".into());
        cache.insert("b".into(), b"b".to_vec(), "text/plain".into());
        cache.insert("c".into(), b"c".to_vec(), "text/plain".into());

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn cache_invalidate_drops_entry() {
        let mut cache = FileCache::new(4);
        cache.insert("a".into(), b"a".to_vec(), "text/plain".into());
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn cached_read_reflects_overwrite_after_write_file() {
        let dir = std::env::temp_dir().join(format!("webserv-fs-cache-test-{}", unix_seconds()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("a.txt");
        fs::write(&path, b"first").unwrap();

        assert_eq!(cached_read_file(&path, "text/plain").unwrap(), b"first");
        write_file(&path, b"second").unwrap();
        assert_eq!(cached_read_file(&path, "text/plain").unwrap(), b"second");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn directory_listing_contains_parent_link() {
        let dir = std::env::temp_dir().join(format!("webserv-fs-test-{}", unix_seconds()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.txt"), b"hi").unwrap();

        let html = list_directory_html(&dir, "/dir/").unwrap();
        assert!(html.contains("<a href=\"../\""));
        assert!(html.contains("a.txt"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
