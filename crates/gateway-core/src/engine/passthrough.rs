//! Linear PCM passthrough engine
//!
//! Carries audio as big-endian 16-bit samples, one frame per datagram. Useful
//! for audio-transport legs and for running the gateway without a T.38 stack.

use std::collections::VecDeque;

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace, warn};

use super::{AudioFrame, EngineConfig, FaxEngine, FaxEngineFactory, LegInfo, MediaSender};
use crate::error::{Error, Result};

/// Creates [`AudioPassthroughEngine`]s
#[derive(Debug, Default, Clone)]
pub struct PassthroughFactory;

impl FaxEngineFactory for PassthroughFactory {
    fn create(&self, config: &EngineConfig) -> Result<Box<dyn FaxEngine>> {
        Ok(Box::new(AudioPassthroughEngine::new(config)))
    }
}

#[derive(Debug)]
pub struct AudioPassthroughEngine {
    frame_samples: usize,
    max_queued: usize,
    rx: VecDeque<i16>,
    sender: Option<MediaSender>,
    tag: String,
    dropped_samples: u64,
}

impl AudioPassthroughEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            frame_samples: config.frame_samples,
            max_queued: config.frame_samples * config.max_queued_frames,
            rx: VecDeque::new(),
            sender: None,
            tag: String::new(),
            dropped_samples: 0,
        }
    }

    /// Samples waiting to be produced
    pub fn queued_samples(&self) -> usize {
        self.rx.len()
    }

    /// Samples discarded because the receive queue was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }
}

impl FaxEngine for AudioPassthroughEngine {
    fn init(&mut self, leg: &LegInfo, sender: MediaSender) -> Result<()> {
        self.tag = leg.log_tag();
        self.sender = Some(sender);
        debug!(tag = %self.tag, local = %leg.local, "Passthrough engine initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        debug!(tag = %self.tag, dropped = self.dropped_samples, "Passthrough engine destroyed");
        self.sender = None;
        self.rx.clear();
    }

    fn receive_network_bytes(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() % 2 != 0 {
            trace!(tag = %self.tag, len = buf.len(), "Odd-length audio datagram, trailing byte ignored");
        }
        self.rx.extend(
            buf.chunks_exact(2)
                .map(|pair| i16::from_be_bytes([pair[0], pair[1]])),
        );

        let excess = self.rx.len().saturating_sub(self.max_queued);
        if excess > 0 {
            self.rx.drain(..excess);
            self.dropped_samples += excess as u64;
            trace!(tag = %self.tag, excess, "Receive queue full, dropped oldest samples");
        }
        Ok(())
    }

    fn receive_audio_frame(&mut self, samples: &[i16]) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::engine("passthrough engine used before init"))?;

        if sender.remote().is_none() {
            trace!(tag = %self.tag, "No remote address yet, audio frame dropped");
            return Ok(());
        }

        let mut out = BytesMut::with_capacity(samples.len() * 2);
        for &sample in samples {
            out.put_i16(sample);
        }

        match sender.send(&out) {
            Ok(_) => Ok(()),
            Err(Error::Socket { source, .. }) if source.kind() == std::io::ErrorKind::WouldBlock => {
                warn!(tag = %self.tag, "Media socket busy, audio frame dropped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn produce_audio_frame(&mut self) -> AudioFrame {
        let n = self.frame_samples.min(self.rx.len());
        self.rx.drain(..n).collect()
    }
}
