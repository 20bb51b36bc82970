//! # Sessions
//!
//! A [`Session`] is one socket endpoint: either the control session that
//! carries signaling, or one media leg of a call. Media legs come in pairs
//! and point at each other by [`SessionId`], never by reference; the
//! [`SessionTable`] resolves those handles.
//!
//! ## Lifecycle
//!
//! ```text
//! create ─► Null ─► init_control / init_media_leg ─► Setup
//!                                                    │
//!                                       start_bridge ▼
//!                                                 Progress
//!                                                    │
//!                                            destroy ▼
//!                                                 Complete
//! ```
//!
//! `destroy` may be called in any state, any number of times. It releases
//! exactly what the session acquired, so it also unwinds a leg whose
//! initialization failed halfway.

mod table;

pub use table::{PollDescriptor, SessionTable, CONTROL_INDEX};

use std::fmt;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use mio::{Interest, Token};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use faxgw_sig_core::CallId;

use crate::allocator::{IdAllocator, SessionId};
use crate::bridge::MediaBridge;
use crate::engine::{LegInfo, MediaSender, SharedEngine};
use crate::error::{Error, Result};
use crate::net;
use crate::resources::GatewayResources;

/// Role of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    /// The signaling endpoint
    Control,
    /// A leg talking to another gateway
    Gateway,
    /// A leg talking to a fax terminal
    Terminal,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Control => "control",
            SessionMode::Gateway => "gateway",
            SessionMode::Terminal => "terminal",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which id range a session draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("in"),
            Direction::Outbound => f.write_str("out"),
        }
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Null,
    Setup,
    Progress,
    Complete,
}

/// One control or media endpoint
pub struct Session {
    id: SessionId,
    id_owned: bool,
    call_id: Option<CallId>,
    table_index: usize,
    mode: SessionMode,
    direction: Direction,
    state: SessionState,
    local: Option<SocketAddrV4>,
    // shared with the engine's MediaSender; for the control session this is the reply-to address
    remote: Arc<RwLock<Option<SocketAddrV4>>>,
    port: Option<u16>,
    socket: Option<mio::net::UdpSocket>,
    peer: Option<SessionId>,
    engine: Option<SharedEngine>,
    bridge: Option<MediaBridge>,
    bridge_active: bool,
}

impl Session {
    /// Create a session and reserve its id.
    ///
    /// The control session must be inbound and a terminal leg outbound.
    pub fn create(
        mode: SessionMode,
        table_index: usize,
        direction: Direction,
        ids: &mut IdAllocator,
    ) -> Result<Self> {
        match (mode, direction) {
            (SessionMode::Control, Direction::Outbound) => {
                return Err(Error::invalid_session("control session must be inbound"));
            }
            (SessionMode::Terminal, Direction::Inbound) => {
                return Err(Error::invalid_session("terminal leg must be outbound"));
            }
            _ => {}
        }

        let id = ids.allocate(direction)?;
        trace!(session = %id, %mode, %direction, table_index, "Session created");

        Ok(Self {
            id,
            id_owned: true,
            call_id: None,
            table_index,
            mode,
            direction,
            state: SessionState::Null,
            local: None,
            remote: Arc::new(RwLock::new(None)),
            port: None,
            socket: None,
            peer: None,
            engine: None,
            bridge: None,
            bridge_active: false,
        })
    }

    /// Bind the control socket and join the poll set
    pub fn init_control(&mut self, addr: SocketAddrV4, res: &mut GatewayResources) -> Result<()> {
        if self.mode != SessionMode::Control || self.state != SessionState::Null {
            return Err(Error::invalid_session(format!(
                "init_control on {} session in state {:?}",
                self.mode, self.state
            )));
        }

        let std_socket = net::bind_udp(addr)?;
        let local = net::local_v4(&std_socket)?;
        self.attach_socket(std_socket, res)?;
        self.local = Some(local);
        self.state = SessionState::Setup;

        info!(session = %self.id, addr = %local, "Control session listening");
        Ok(())
    }

    /// Allocate a port, bind the leg's socket and initialize its fax engine.
    ///
    /// `remote` is required for gateway legs. A terminal leg may leave it
    /// unset and learns it from the first datagram received.
    pub fn init_media_leg(
        &mut self,
        call_id: CallId,
        remote: Option<SocketAddrV4>,
        res: &mut GatewayResources,
    ) -> Result<()> {
        if self.mode == SessionMode::Control || self.state != SessionState::Null {
            return Err(Error::invalid_session(format!(
                "init_media_leg on {} session in state {:?}",
                self.mode, self.state
            )));
        }
        if self.mode == SessionMode::Gateway && remote.is_none() {
            return Err(Error::invalid_session("gateway leg needs a remote address"));
        }

        self.call_id = Some(call_id.clone());
        *self.remote.write() = remote;

        let port = res.ports.allocate()?;
        self.port = Some(port);

        let local = SocketAddrV4::new(res.media_ip, port);
        let std_socket = net::bind_udp(local)?;
        let sender_socket = std_socket
            .try_clone()
            .map_err(|e| Error::socket("clone media socket", e))?;
        self.attach_socket(std_socket, res)?;
        self.local = Some(local);

        let mut engine = res.factory.create(&res.engine_config)?;
        let sender = MediaSender::new(sender_socket, self.remote.clone());
        engine.init(&self.leg_info(local, call_id), sender)?;
        self.engine = Some(Arc::new(Mutex::new(engine)));
        self.state = SessionState::Setup;

        debug!(
            session = %self.id,
            call_id = %self.call_id_str(),
            mode = %self.mode,
            local = %local,
            remote = ?remote,
            "Media leg initialized"
        );
        Ok(())
    }

    /// Tear the session down. Idempotent.
    pub fn destroy(&mut self, res: &mut GatewayResources) {
        if self.state == SessionState::Complete {
            return;
        }

        self.stop_bridge();

        if let Some(engine) = self.engine.take() {
            engine.lock().destroy();
        }
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = res.registry.deregister(&mut socket) {
                warn!(session = %self.id, error = %e, "Failed to deregister socket");
            }
        }
        if let Some(port) = self.port.take() {
            report_release(self.id, res.ports.release(port));
        }
        if self.id_owned {
            self.id_owned = false;
            report_release(self.id, res.ids.release(self.id));
        }

        self.peer = None;
        self.state = SessionState::Complete;
        debug!(session = %self.id, call_id = %self.call_id_str(), "Session destroyed");
    }

    /// Read one datagram. `None` when the socket has nothing queued.
    ///
    /// On the control session the sender becomes the reply-to address.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::invalid_session("receive on a session without socket"))?;

        loop {
            match socket.recv_from(buf) {
                Ok((n, SocketAddr::V4(from))) => {
                    if self.mode == SessionMode::Control {
                        *self.remote.write() = Some(from);
                    }
                    return Ok(Some((n, from)));
                }
                Ok((_, SocketAddr::V6(from))) => {
                    trace!(session = %self.id, %from, "Ignoring IPv6 datagram");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::socket(format!("receive on session {}", self.id), e)),
            }
        }
    }

    /// Send one datagram to the remote (or reply-to) address
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::invalid_session("send on a session without socket"))?;
        let remote = self
            .remote_addr()
            .ok_or_else(|| Error::invalid_session(format!("session {} has no remote address", self.id)))?;

        socket
            .send_to(buf, SocketAddr::V4(remote))
            .map_err(|e| Error::socket(format!("send to {}", remote), e))
    }

    /// Drain the media socket into the fax engine. Returns the datagram count.
    ///
    /// Readiness is edge-triggered, so this reads until the socket is empty.
    /// Engine errors are logged; socket errors are returned.
    pub fn on_readable(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut count = 0;
        while let Some((n, from)) = self.receive(buf)? {
            count += 1;
            self.latch_remote(from);

            if let Some(engine) = &self.engine {
                if let Err(e) = engine.lock().receive_network_bytes(&buf[..n]) {
                    warn!(session = %self.id, error = %e, "Fax engine rejected datagram");
                }
            }
        }
        Ok(count)
    }

    /// Start the media bridge between this inbound leg and its peer
    pub fn start_bridge(&mut self, peer: &mut Session, res: &GatewayResources) -> Result<()> {
        if self.direction != Direction::Inbound || self.peer != Some(peer.id) {
            return Err(Error::invalid_session("bridge must start on the inbound leg of a linked pair"));
        }
        if self.bridge.is_some() {
            return Err(Error::invalid_session("bridge already running"));
        }
        let (Some(inbound), Some(outbound)) = (self.engine.clone(), peer.engine.clone()) else {
            return Err(Error::invalid_session("bridge needs both legs initialized"));
        };

        let tag = format!("{}-{}", self.id, self.call_id_str());
        self.bridge = Some(MediaBridge::start(
            &res.runtime,
            inbound,
            outbound,
            res.bridge_interval,
            tag,
        ));
        for session in [&mut *self, peer] {
            session.bridge_active = true;
            session.state = SessionState::Progress;
        }
        Ok(())
    }

    /// Stop a bridge running on this session and clear the bridge flag
    pub fn stop_bridge(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.stop();
        }
        self.bridge_active = false;
    }

    /// Cross-link two media legs
    pub fn link(a: &mut Session, b: &mut Session) -> Result<()> {
        if a.is_control() || b.is_control() {
            return Err(Error::invalid_session("the control session never pairs"));
        }
        a.peer = Some(b.id);
        b.peer = Some(a.id);
        Ok(())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.call_id.as_ref()
    }

    pub fn table_index(&self) -> usize {
        self.table_index
    }

    pub(crate) fn set_table_index(&mut self, index: usize) {
        self.table_index = index;
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_control(&self) -> bool {
        self.mode == SessionMode::Control
    }

    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.local
    }

    pub fn remote_addr(&self) -> Option<SocketAddrV4> {
        *self.remote.read()
    }

    /// Media port owned by this leg
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn peer(&self) -> Option<SessionId> {
        self.peer
    }

    pub fn is_bridge_active(&self) -> bool {
        self.bridge_active
    }

    /// True when this leg's bridge stopped on a socket error
    pub fn is_bridge_failed(&self) -> bool {
        self.bridge.as_ref().map_or(false, MediaBridge::has_failed)
    }

    /// Poll token of the live socket, `None` once closed
    pub fn token(&self) -> Option<Token> {
        self.socket.as_ref().map(|_| token_for(self.id))
    }

    fn attach_socket(&mut self, std_socket: std::net::UdpSocket, res: &GatewayResources) -> Result<()> {
        let mut socket = mio::net::UdpSocket::from_std(std_socket);
        res.registry
            .register(&mut socket, token_for(self.id), Interest::READABLE)
            .map_err(|e| Error::socket("register socket", e))?;
        self.socket = Some(socket);
        Ok(())
    }

    fn latch_remote(&self, from: SocketAddrV4) {
        if self.mode != SessionMode::Terminal {
            return;
        }
        let mut remote = self.remote.write();
        if remote.is_none() {
            *remote = Some(from);
            info!(session = %self.id, call_id = %self.call_id_str(), remote = %from, "Terminal address learned");
        }
    }

    fn leg_info(&self, local: SocketAddrV4, call_id: CallId) -> LegInfo {
        LegInfo {
            id: self.id,
            call_id,
            mode: self.mode,
            direction: self.direction,
            local,
            remote: self.remote_addr(),
        }
    }

    fn call_id_str(&self) -> &str {
        self.call_id.as_ref().map_or("-", |c| c.as_str())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("call_id", &self.call_id)
            .field("table_index", &self.table_index)
            .field("mode", &self.mode)
            .field("direction", &self.direction)
            .field("state", &self.state)
            .field("local", &self.local)
            .field("remote", &self.remote_addr())
            .field("peer", &self.peer)
            .field("bridge_active", &self.bridge_active)
            .finish()
    }
}

pub(crate) fn token_for(id: SessionId) -> Token {
    Token(id.as_u32() as usize)
}

fn report_release(id: SessionId, result: Result<()>) {
    if let Err(e) = result {
        error!(session = %id, error = %e, "Resource release failed");
        debug_assert!(!e.is_invariant_violation(), "{}", e);
    }
}
