//! Error types shared by the infrastructure helpers

pub mod context;
pub mod types;

pub use context::{ErrorContext, ErrorExt};
pub use types::{Error, Result};
