//! Signaling message types

pub mod call_id;
pub mod message;
