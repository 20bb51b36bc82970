//! # faxgw - FAX-over-IP gateway control plane
//!
//! Accepts UDP signaling requesting a fax call between two IP endpoints,
//! allocates a pair of media legs for it and bridges audio between them until
//! the call is released.
//!
//! - [`sig_core`]: signaling messages, parser and serializer
//! - [`gateway_core`]: allocators, sessions, call orchestration, media bridge
//!   and event loop
//! - [`infra_common`]: logging setup, error context and config loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use faxgw::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let runtime = tokio::runtime::Runtime::new()?;
//! let config = GatewayConfig::default().with_control_port(23232);
//! let mut gateway = Gateway::new(config, Arc::new(PassthroughFactory), runtime.handle().clone())?;
//! gateway.run()?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]

pub use faxgw_gateway_core as gateway_core;
pub use faxgw_infra_common as infra_common;
pub use faxgw_sig_core as sig_core;

pub mod cli;

pub mod prelude {
    //! Common imports for faxgw applications

    pub use crate::gateway_core::{
        FaxEngine, FaxEngineFactory, Gateway, GatewayConfig, GatewayStats, PassthroughFactory,
        ShutdownHandle,
    };
    pub use crate::sig_core::{CallId, ErrorKind, FaxMode, Message};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
