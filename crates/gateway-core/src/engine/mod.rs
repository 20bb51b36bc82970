//! Fax engine contract
//!
//! The gateway never touches fax signal processing itself. Each media leg
//! owns one [`FaxEngine`], created by a [`FaxEngineFactory`] when the leg is
//! initialized. The session layer feeds it raw datagrams, the media bridge
//! moves audio frames between the two engines of a call, and the engine sends
//! encoded network data back out through the leg's [`MediaSender`].

mod passthrough;

pub use passthrough::{AudioPassthroughEngine, PassthroughFactory};

use std::net::{SocketAddrV4, UdpSocket};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use faxgw_sig_core::CallId;

use crate::allocator::SessionId;
use crate::error::{Error, Result};
use crate::session::{Direction, SessionMode};

/// Samples per audio frame moved by one bridge step
pub const DEFAULT_FRAME_SAMPLES: usize = 160;

/// A block of linear 16-bit PCM samples
pub type AudioFrame = Vec<i16>;

/// Engine shared between a session and the media bridge running against it
pub type SharedEngine = Arc<Mutex<Box<dyn FaxEngine>>>;

/// Signal processing for one media leg
pub trait FaxEngine: Send {
    /// Prepare the engine for `leg`. `sender` transmits on the leg's socket.
    fn init(&mut self, leg: &LegInfo, sender: MediaSender) -> Result<()>;

    /// Release engine state. Called once, after any bridge has stopped.
    fn destroy(&mut self);

    /// Consume one datagram received on the leg's socket
    fn receive_network_bytes(&mut self, buf: &[u8]) -> Result<()>;

    /// Consume audio coming from the peer leg
    fn receive_audio_frame(&mut self, samples: &[i16]) -> Result<()>;

    /// Produce the next audio frame for the peer leg. Empty when there is none.
    fn produce_audio_frame(&mut self) -> AudioFrame;
}

/// Creates one engine per media leg
pub trait FaxEngineFactory: Send + Sync {
    fn create(&self, config: &EngineConfig) -> Result<Box<dyn FaxEngine>>;
}

/// What an engine learns about its leg at init time
#[derive(Debug, Clone)]
pub struct LegInfo {
    pub id: SessionId,
    pub call_id: CallId,
    pub mode: SessionMode,
    pub direction: Direction,
    pub local: SocketAddrV4,
    pub remote: Option<SocketAddrV4>,
}

impl LegInfo {
    /// Tag used to prefix engine traces, `<id>-<call-id>`
    pub fn log_tag(&self) -> String {
        format!("{}-{}", self.id, self.call_id)
    }
}

/// Transmit handle onto a media leg's socket.
///
/// The remote address is shared with the session: a terminal leg learns its
/// peer from the first datagram it receives, and the sender follows.
#[derive(Debug, Clone)]
pub struct MediaSender {
    socket: Arc<UdpSocket>,
    remote: Arc<RwLock<Option<SocketAddrV4>>>,
}

impl MediaSender {
    pub(crate) fn new(socket: UdpSocket, remote: Arc<RwLock<Option<SocketAddrV4>>>) -> Self {
        Self {
            socket: Arc::new(socket),
            remote,
        }
    }

    /// Current destination, if known
    pub fn remote(&self) -> Option<SocketAddrV4> {
        *self.remote.read()
    }

    /// Send one datagram to the leg's remote address
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        let remote = self
            .remote()
            .ok_or_else(|| Error::engine("media leg has no remote address yet"))?;
        self.socket
            .send_to(buf, remote)
            .map_err(|e| Error::socket(format!("send to {}", remote), e))
    }
}

/// T.38 parameters for engines that speak T.38
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct T38Options {
    pub max_bitrate: u32,
    pub max_buffer: u32,
    pub max_datagram: u32,
    pub ecm: bool,
    pub v17: bool,
    /// UDPTL redundancy depth for signal packets
    pub redundancy_span: u32,
    /// UDPTL redundancy depth for image data packets
    pub redundancy_entries: u32,
}

impl Default for T38Options {
    fn default() -> Self {
        Self {
            max_bitrate: 9600,
            max_buffer: 72,
            max_datagram: 316,
            ecm: true,
            v17: true,
            redundancy_span: 3,
            redundancy_entries: 3,
        }
    }
}

/// Parameters handed to every engine the factory creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per audio frame
    pub frame_samples: usize,
    /// Received audio kept before the oldest samples are dropped, in frames
    pub max_queued_frames: usize,
    pub t38: T38Options,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_samples: DEFAULT_FRAME_SAMPLES,
            max_queued_frames: 50,
            t38: T38Options::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        // a frame must fit one UDP datagram
        if self.frame_samples == 0 || self.frame_samples * 2 > 65507 {
            return Err(Error::config(format!(
                "engine frame_samples out of range: {}",
                self.frame_samples
            )));
        }
        if self.max_queued_frames == 0 {
            return Err(Error::config("engine max_queued_frames must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_tag() {
        let leg = LegInfo {
            id: SessionId(1030),
            call_id: CallId::new("fax-42").unwrap(),
            mode: SessionMode::Gateway,
            direction: Direction::Outbound,
            local: "127.0.0.1:37000".parse().unwrap(),
            remote: None,
        };
        assert_eq!(leg.log_tag(), "0406-fax-42");
    }

    #[test]
    fn test_t38_defaults() {
        let opts = T38Options::default();
        assert_eq!(opts.max_bitrate, 9600);
        assert_eq!(opts.max_datagram, 316);
        assert_eq!(opts.redundancy_span, 3);
        assert!(opts.ecm && opts.v17);
    }

    #[test]
    fn test_sender_without_remote() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sender = MediaSender::new(socket, Arc::new(RwLock::new(None)));
        assert!(matches!(sender.send(b"x"), Err(Error::FaxEngine { .. })));
    }

    #[test]
    fn test_engine_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        let config = EngineConfig {
            frame_samples: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
