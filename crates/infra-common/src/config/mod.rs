//! TOML configuration loading
//!
//! Every faxgw configuration struct is a serde type with `#[serde(default)]`
//! so a file only needs to name the values it overrides.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::errors::{Error, ErrorContext, ErrorExt, Result};

/// Parse a configuration value from TOML text
pub fn from_toml_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
}

/// Read and parse a TOML configuration file
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let ctx = || ErrorContext::new("config", "load").with_details(path.display().to_string());

    let text = fs::read_to_string(path).context(ctx())?;
    from_toml_str(&text).context(ctx())
}
