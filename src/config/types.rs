use std::collections::{BTreeMap, HashMap};

use crate::http::request::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationBlock {
    /// URI prefix this location matches, e.g. `/api`.
    pub path: String,
    pub root: Option<String>,
    pub index: Option<String>,
    pub allowed_methods: Vec<Method>,
    pub autoindex: bool,
    pub upload_store: Option<String>,
    pub upload_enable: bool,
    /// `(status, target)` from a `return` directive.
    pub redirection: Option<(u16, String)>,
    pub cgi_extension: Option<String>,
    pub cgi_path: Option<String>,
    pub client_max_body_size: Option<usize>,
}

impl LocationBlock {
    pub fn new(path: impl Into<String>) -> Self {
        LocationBlock {
            path: path.into(),
            root: None,
            index: None,
            allowed_methods: vec![Method::Get],
            autoindex: false,
            upload_store: None,
            upload_enable: false,
            redirection: None,
            cgi_extension: None,
            cgi_path: None,
            client_max_body_size: None,
        }
    }

    pub fn allows(&self, method: Method) -> bool {
        self.allowed_methods.is_empty() || self.allowed_methods.contains(&method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerName {
    Exact(String),
    Any,
    WildcardSuffix(String),
}

impl ServerName {
    pub fn matches(&self, host: &str) -> bool {
        match self {
            ServerName::Exact(name) => name.eq_ignore_ascii_case(host),
            ServerName::Any => true,
            ServerName::WildcardSuffix(suffix) => {
                host.len() > suffix.len() && host.to_ascii_lowercase().ends_with(suffix.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBlock {
    /// `(host, port)` pairs this vhost listens on.
    pub listen: Vec<(String, u16)>,
    pub server_names: Vec<ServerName>,
    pub root: String,
    pub index: Option<String>,
    pub error_pages: HashMap<u16, String>,
    pub client_max_body_size: usize,
    /// Keyed by location path, for longest-prefix matching at dispatch time.
    pub locations: BTreeMap<String, LocationBlock>,
}

pub const DEFAULT_CLIENT_MAX_BODY_SIZE: usize = 1024 * 1024;
pub const DEFAULT_ROOT: &str = "./www";

impl ServerBlock {
    pub fn new() -> Self {
        ServerBlock {
            listen: Vec::new(),
            server_names: Vec::new(),
            root: DEFAULT_ROOT.to_string(),
            index: None,
            error_pages: HashMap::new(),
            client_max_body_size: DEFAULT_CLIENT_MAX_BODY_SIZE,
            locations: BTreeMap::new(),
        }
    }

    /// Longest prefix match: `P` matches `U` if `P == "/" && U == "/"`, or
    /// `U` starts with `P` and either they're equal in length or the next
    /// byte of `U` is `/`.
    pub fn match_location(&self, uri: &str) -> Option<&LocationBlock> {
        let mut best: Option<&LocationBlock> = None;
        for (prefix, loc) in &self.locations {
            if !location_prefix_matches(prefix, uri) {
                continue;
            }
            let better = match best {
                Some(b) => prefix.len() > b.path.len(),
                None => true,
            };
            if better {
                best = Some(loc);
            }
        }
        best
    }
}

impl Default for ServerBlock {
    fn default() -> Self {
        ServerBlock::new()
    }
}

fn location_prefix_matches(prefix: &str, uri: &str) -> bool {
    if prefix == "/" {
        return uri == "/";
    }
    if !uri.starts_with(prefix) {
        return false;
    }
    uri.len() == prefix.len() || uri.as_bytes()[prefix.len()] == b'/'
}

/// `host:port` → the vhosts bound to that endpoint, in registration order
/// (the first one is the endpoint's default).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub endpoints: BTreeMap<(String, u16), Vec<ServerBlock>>,
    /// Process-wide default CGI extension → interpreter path, assembled by
    /// the process orchestrator (`main`), not the core dispatch layer. A
    /// location's own `cgi_ext`/`cgi_path` pair always takes precedence.
    pub cgi_registry: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    pub fn register_cgi(&mut self, extension: &str, interpreter: &str) {
        self.cgi_registry
            .insert(extension.trim_start_matches('.').to_string(), interpreter.to_string());
    }

    pub fn push(&mut self, block: ServerBlock) {
        for (host, port) in &block.listen {
            self.endpoints
                .entry((host.clone(), *port))
                .or_default()
                .push(block.clone());
        }
    }

    /// All distinct `(host, port)` endpoints the process must bind.
    pub fn listen_endpoints(&self) -> impl Iterator<Item = &(String, u16)> {
        self.endpoints.keys()
    }

    /// Picks the vhost bound to `(bind_host, bind_port)` whose server_name
    /// matches `host_header`, falling back to the endpoint's default (the
    /// first-registered block for that `host:port`).
    pub fn select_vhost(
        &self,
        bind_host: &str,
        bind_port: u16,
        host_header: Option<&str>,
    ) -> Option<&ServerBlock> {
        let candidates = self.endpoint_candidates(bind_host, bind_port)?;
        if let Some(host) = host_header {
            let host = host.split(':').next().unwrap_or(host);
            for block in candidates {
                if block.server_names.iter().any(|n| n.matches(host)) {
                    return Some(block);
                }
            }
        }
        candidates.first()
    }

    fn endpoint_candidates(&self, bind_host: &str, bind_port: u16) -> Option<&Vec<ServerBlock>> {
        self.endpoints
            .get(&(bind_host.to_string(), bind_port))
            .or_else(|| self.endpoints.get(&("0.0.0.0".to_string(), bind_port)))
    }
}
