//! Common infrastructure for the faxgw stack
//!
//! Shared by every faxgw crate:
//!
//! - [`logging`]: tracing subscriber setup
//! - [`errors`]: the infrastructure error type and error context helpers
//! - [`config`]: TOML configuration file loading

pub mod config;
pub mod errors;
pub mod logging;

pub use errors::types::{Error, Result};
pub use logging::{setup_logging, LoggingConfig};
