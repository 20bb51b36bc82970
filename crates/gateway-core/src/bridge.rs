//! Media bridge task
//!
//! One bridge runs per active call. Each pass moves one audio frame from the
//! inbound engine to the outbound engine and one frame back, then sleeps for
//! the bridge interval. The bridge only locks one engine at a time.
//!
//! Cancellation is cooperative: the token is checked before every pass and
//! raced against the sleep. A socket error while forwarding ends the task and
//! marks the bridge failed; the event loop reaps failed calls, the bridge
//! never touches the session table. [`MediaBridge::stop`] cancels and then blocks
//! until the task has exited, so it must be called from a thread that is not
//! driving the runtime, such as the event loop thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::SharedEngine;
use crate::error::{Error, Result};

/// Handle on a running media bridge task
#[derive(Debug)]
pub struct MediaBridge {
    tag: String,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    frames: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
}

impl MediaBridge {
    /// Spawn a bridge between two initialized engines
    pub fn start(
        runtime: &Handle,
        inbound: SharedEngine,
        outbound: SharedEngine,
        interval: Duration,
        tag: impl Into<String>,
    ) -> Self {
        let tag = tag.into();
        let cancel_token = CancellationToken::new();
        let frames = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicBool::new(false));

        let task = run_bridge(
            tag.clone(),
            inbound,
            outbound,
            interval,
            cancel_token.clone(),
            frames.clone(),
            failed.clone(),
        );
        let handle = runtime.spawn(task);
        debug!(tag = %tag, "Media bridge started");

        Self {
            tag,
            cancel_token,
            handle: Some(handle),
            frames,
            failed,
        }
    }

    /// Frames moved in either direction so far
    pub fn frames_forwarded(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// True once a leg's socket failed and the task gave up
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Cancel the task and wait for it to exit
    pub fn stop(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = futures::executor::block_on(handle) {
                if e.is_panic() {
                    warn!(tag = %self.tag, "Media bridge task panicked");
                }
            }
        }
        debug!(tag = %self.tag, frames = self.frames_forwarded(), "Media bridge stopped");
    }
}

impl Drop for MediaBridge {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run_bridge(
    tag: String,
    inbound: SharedEngine,
    outbound: SharedEngine,
    interval: Duration,
    cancel_token: CancellationToken,
    frames: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
) {
    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let pass = forward(&tag, &inbound, &outbound, &frames)
            .and_then(|()| forward(&tag, &outbound, &inbound, &frames));
        if let Err(e) = pass {
            warn!(tag = %tag, error = %e, "Media socket failed, bridge stopping");
            failed.store(true, Ordering::Release);
            break;
        }

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Move one frame. Only socket errors are fatal to the bridge.
fn forward(tag: &str, from: &SharedEngine, to: &SharedEngine, frames: &AtomicU64) -> Result<()> {
    let frame = from.lock().produce_audio_frame();
    if frame.is_empty() {
        return Ok(());
    }
    match to.lock().receive_audio_frame(&frame) {
        Ok(()) => {
            frames.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        Err(e @ Error::Socket { .. }) => Err(e),
        Err(e) => {
            warn!(tag = %tag, error = %e, "Failed to forward audio frame");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioFrame, FaxEngine, LegInfo, MediaSender};
    use parking_lot::Mutex;

    /// Produces a fixed frame forever and records what it receives
    struct Tone {
        value: i16,
        received: Arc<Mutex<Vec<i16>>>,
    }

    impl FaxEngine for Tone {
        fn init(&mut self, _leg: &LegInfo, _sender: MediaSender) -> Result<()> {
            Ok(())
        }
        fn destroy(&mut self) {}
        fn receive_network_bytes(&mut self, _buf: &[u8]) -> Result<()> {
            Ok(())
        }
        fn receive_audio_frame(&mut self, samples: &[i16]) -> Result<()> {
            self.received.lock().extend_from_slice(samples);
            Ok(())
        }
        fn produce_audio_frame(&mut self) -> AudioFrame {
            vec![self.value; 4]
        }
    }

    fn tone(value: i16) -> (SharedEngine, Arc<Mutex<Vec<i16>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let engine: Box<dyn FaxEngine> = Box::new(Tone {
            value,
            received: received.clone(),
        });
        (Arc::new(Mutex::new(engine)), received)
    }

    #[test]
    fn test_bridge_moves_frames_both_ways_and_stops() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let (inbound, heard_by_inbound) = tone(1);
        let (outbound, heard_by_outbound) = tone(2);

        let bridge = MediaBridge::start(
            runtime.handle(),
            inbound,
            outbound,
            Duration::from_millis(2),
            "0000-test",
        );
        std::thread::sleep(Duration::from_millis(50));
        assert!(bridge.is_running());
        let failed = bridge.failed.clone();
        bridge.stop();

        let outbound_samples = heard_by_outbound.lock().clone();
        let inbound_samples = heard_by_inbound.lock().clone();
        assert!(!outbound_samples.is_empty());
        assert!(outbound_samples.iter().all(|&s| s == 1));
        assert!(inbound_samples.iter().all(|&s| s == 2));

        // nothing moves after stop returned
        let frozen = heard_by_outbound.lock().len();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(heard_by_outbound.lock().len(), frozen);
        assert!(!failed.load(Ordering::Acquire));
    }

    /// Accepts frames until its socket "breaks"
    struct Broken {
        error: fn() -> Error,
    }

    impl FaxEngine for Broken {
        fn init(&mut self, _leg: &LegInfo, _sender: MediaSender) -> Result<()> {
            Ok(())
        }
        fn destroy(&mut self) {}
        fn receive_network_bytes(&mut self, _buf: &[u8]) -> Result<()> {
            Ok(())
        }
        fn receive_audio_frame(&mut self, _samples: &[i16]) -> Result<()> {
            Err((self.error)())
        }
        fn produce_audio_frame(&mut self) -> AudioFrame {
            AudioFrame::new()
        }
    }

    fn broken(error: fn() -> Error) -> SharedEngine {
        let engine: Box<dyn FaxEngine> = Box::new(Broken { error });
        Arc::new(Mutex::new(engine))
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap()
    }

    #[test]
    fn test_socket_error_fails_bridge() {
        let runtime = runtime();
        let (inbound, _) = tone(1);
        let outbound = broken(|| {
            Error::socket(
                "send to 255.255.255.255:6000",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            )
        });

        let bridge = MediaBridge::start(runtime.handle(), inbound, outbound, Duration::from_millis(2), "0001-dead");
        for _ in 0..100 {
            if bridge.has_failed() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(bridge.has_failed());
        std::thread::sleep(Duration::from_millis(10));
        assert!(!bridge.is_running());
        assert_eq!(bridge.frames_forwarded(), 0);
        bridge.stop();
    }

    #[test]
    fn test_engine_error_keeps_bridge_running() {
        let runtime = runtime();
        let (inbound, _) = tone(1);
        let outbound = broken(|| Error::engine("frame rejected"));

        let bridge = MediaBridge::start(runtime.handle(), inbound, outbound, Duration::from_millis(2), "0002-busy");
        std::thread::sleep(Duration::from_millis(30));
        assert!(bridge.is_running());
        assert!(!bridge.has_failed());
        bridge.stop();
    }
}
