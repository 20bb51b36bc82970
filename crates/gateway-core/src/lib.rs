//! # faxgw gateway core
//!
//! Control plane of a FAX-over-IP gateway. A [`Gateway`] owns one control
//! session listening for signaling on UDP and a bounded [`SessionTable`] of
//! media legs. Each accepted SETUP creates two linked legs, each with its own
//! UDP socket and [`FaxEngine`], and a [`MediaBridge`] task moving audio
//! between the two engines until the call is released.
//!
//! ```text
//!            SETUP / RELEASE                 OK / ERROR
//! peer ──────────────────────► control ───────────────────► peer
//!                                 │
//!                     CallOrchestrator
//!                                 │
//!        src ◄──► inbound leg ◄─ MediaBridge ─► outbound leg ◄──► dst / terminal
//! ```
//!
//! The event loop is a blocking [`mio::Poll`] loop; bridge tasks run on a
//! tokio runtime passed in by the caller.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use faxgw_gateway_core::{Gateway, GatewayConfig, PassthroughFactory};
//!
//! # fn main() -> faxgw_gateway_core::Result<()> {
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let mut gateway = Gateway::new(
//!     GatewayConfig::default(),
//!     Arc::new(PassthroughFactory),
//!     runtime.handle().clone(),
//! )?;
//! let shutdown = gateway.shutdown_handle();
//! # shutdown.trigger();
//! gateway.run()?;
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod net;
pub mod orchestrator;
pub mod resources;
pub mod session;
pub mod stats;

pub use allocator::{IdAllocator, PortAllocator, SessionId};
pub use bridge::MediaBridge;
pub use config::GatewayConfig;
pub use engine::{
    AudioFrame, AudioPassthroughEngine, EngineConfig, FaxEngine, FaxEngineFactory, LegInfo,
    MediaSender, PassthroughFactory, SharedEngine, T38Options,
};
pub use error::{Error, Result};
pub use gateway::{Gateway, ShutdownHandle};
pub use orchestrator::CallOrchestrator;
pub use resources::GatewayResources;
pub use session::{Direction, PollDescriptor, Session, SessionMode, SessionState, SessionTable};
pub use stats::GatewayStats;
