use core::fmt;
use std::{
    error::Error,
    fmt::{Debug, Display, Formatter},
};

use config_lexer::ConfigError;

/// Wraps process-startup-level failures: config load, socket bind, address
/// parsing. Per-request failures are modeled as HTTP status codes, not this
/// type — see `src/handlers/error_page.rs`.
pub struct ServerError(pub Box<dyn Error>);

impl Debug for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\r\x1b[K{}", self)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[31mERROR\x1b[0m: {}", self.0)
    }
}

impl Error for ServerError {}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(e: std::net::AddrParseError) -> Self {
        ServerError(Box::new(e))
    }
}

#[derive(Debug)]
struct Generic(String);

impl fmt::Display for Generic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for Generic {}

impl From<String> for ServerError {
    fn from(s: String) -> Self {
        ServerError(Box::new(Generic(s)))
    }
}

impl From<&str> for ServerError {
    fn from(s: &str) -> Self {
        ServerError(Box::new(Generic(s.to_string())))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
