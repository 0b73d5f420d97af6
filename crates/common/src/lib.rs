//! Shopcheck Common Library
//!
//! Request, outcome and configuration types shared by the journey engine,
//! the HTTP boundary and the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::{RunDefaults, ServiceConfig, WebDriverSettings};
pub use error::{Error, Result};
pub use types::*;

/// Shopcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
