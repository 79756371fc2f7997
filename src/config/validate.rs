//! A validation pass over an already-parsed `Config`, kept separate from
//! parsing itself: one pass assembles the tree, a second pass checks it.

use config_lexer::Loc;

use super::types::{Config, LocationBlock, ServerBlock, ServerName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for config_lexer::ConfigError {
    fn from(e: ValidationError) -> Self {
        config_lexer::ConfigError {
            message: e.message,
            loc: Loc::start(),
            context: Vec::new(),
        }
    }
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    for blocks in config.endpoints.values() {
        for block in blocks {
            validate_server(block)?;
        }
    }
    Ok(())
}

fn validate_server(block: &ServerBlock) -> Result<(), ValidationError> {
    if block.listen.is_empty() {
        return Err(fail("server block must have at least one listen directive"));
    }
    for (host, port) in &block.listen {
        if !is_valid_ipv4(host) {
            return Err(fail(format!("'{host}' is not a valid IPv4 address")));
        }
        if *port == 0 {
            return Err(fail("port must be in 1..=65535"));
        }
    }
    for name in &block.server_names {
        validate_server_name(name)?;
    }
    validate_path(&block.root)?;
    for code in block.error_pages.keys() {
        if !(100..=599).contains(code) {
            return Err(fail(format!("error_page status {code} out of range 100-599")));
        }
    }
    for loc in block.locations.values() {
        validate_location(loc)?;
    }
    Ok(())
}

fn validate_location(loc: &LocationBlock) -> Result<(), ValidationError> {
    validate_path(&loc.path)?;
    if let Some(root) = &loc.root {
        validate_path(root)?;
    }
    if let Some((code, _)) = &loc.redirection {
        const VALID: [u16; 5] = [301, 302, 303, 307, 308];
        if !VALID.contains(code) {
            return Err(fail(format!("invalid redirect code {code}")));
        }
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') || path.starts_with('.') {
        Ok(())
    } else {
        Err(fail(format!("path '{path}' must begin with '/' or '.'")))
    }
}

fn validate_server_name(name: &ServerName) -> Result<(), ValidationError> {
    let literal = match name {
        ServerName::Any => return Ok(()),
        ServerName::Exact(s) => s,
        ServerName::WildcardSuffix(s) => return validate_name_chars(s.trim_start_matches('.')),
    };
    validate_name_chars(literal)
}

fn validate_name_chars(s: &str) -> Result<(), ValidationError> {
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(fail(format!("invalid server_name '{s}'")));
    }
    Ok(())
}

fn is_valid_ipv4(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    if octets.len() != 4 {
        return false;
    }
    octets.iter().all(|o| {
        !o.is_empty() && o.len() <= 3 && o.chars().all(|c| c.is_ascii_digit()) && o.parse::<u16>().map(|n| n <= 255).unwrap_or(false)
    })
}

fn fail(message: impl Into<String>) -> ValidationError {
    ValidationError { message: message.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_config;

    #[test]
    fn rejects_bad_ipv4() {
        let src = "server { listen 999.1.1.1:80; root ./www; }";
        let config = parse_config(src).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn accepts_wildcard_and_suffix_names() {
        let src = "server { listen 80; server_name * *.example.com; root ./www; }";
        let config = parse_config(src).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_location_path_without_slash_or_dot() {
        let src = "server { listen 80; root ./www; location api { } }";
        let config = parse_config(src).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_out_of_range_error_page_code() {
        let src = "server { listen 80; root ./www; error_page 999 /errors/x.html; }";
        let config = parse_config(src).unwrap();
        assert!(validate(&config).is_err());
    }
}
