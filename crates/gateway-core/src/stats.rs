use serde::Serialize;

/// Snapshot of gateway activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    /// Live sessions, control session included
    pub active_sessions: usize,
    pub active_calls: usize,
    pub calls_established: u64,
    /// SETUP requests answered with an error
    pub calls_rejected: u64,
    pub calls_released: u64,
    /// Control datagrams that failed to parse
    pub parse_failures: u64,
    /// Calls torn down after a media socket error
    pub media_errors: u64,
}
