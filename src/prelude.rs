//! Common imports for modules that touch both config and HTTP types. The
//! pure leaf modules (`http::path`, `http::mime`, `http::request`) import
//! precisely what they need instead and don't pull this in.

pub use crate::config::{Config, LocationBlock, ServerBlock};
pub use crate::error::{Result, ServerError};
pub use crate::http::request::{Method, Request};
pub use crate::http::response::Response;

pub use weblog::{debug, error, info, trace, warn};

pub use std::sync::Arc;
