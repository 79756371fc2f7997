pub mod parse;
pub mod types;
pub mod validate;

pub use parse::parse_config;
pub use types::{Config, LocationBlock, ServerBlock, ServerName};
pub use validate::validate;

use crate::error::Result;

pub fn load(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text)?;
    validate(&config).map_err(config_lexer::ConfigError::from)?;
    Ok(config)
}
