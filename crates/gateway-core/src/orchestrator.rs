//! Call orchestration
//!
//! Turns signaling into session changes. A SETUP creates the inbound leg
//! against the source address, then the outbound leg, links them and starts
//! the media bridge; any failure unwinds what was built. A RELEASE tears both
//! legs down. The orchestrator owns no sessions: the table and the gateway
//! resources are passed in by the event loop.
//!
//! ```text
//! NoCall ──SETUP──► LegsCreated ──bridge started──► Bridging
//!    ▲                   │ failure                      │ RELEASE / media error
//!    └───── unwound ◄────┘                              ▼
//!                                                   Torn down
//! ```

use std::net::SocketAddrV4;

use tracing::{debug, error, info, trace, warn};

use faxgw_sig_core::{CallId, ErrorKind, FaxMode, Message, Setup};

use crate::error::{Error, Result};
use crate::resources::GatewayResources;
use crate::session::{Direction, Session, SessionMode, SessionTable};
use crate::stats::GatewayStats;

/// SETUP/RELEASE state machine and control channel handler
#[derive(Debug, Default)]
pub struct CallOrchestrator {
    stats: GatewayStats,
}

impl CallOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the control socket, answering each request on it
    pub fn handle_control(
        &mut self,
        table: &mut SessionTable,
        res: &mut GatewayResources,
        buf: &mut [u8],
    ) {
        loop {
            let Some(control) = table.control_mut() else {
                return;
            };
            let (n, from) = match control.receive(buf) {
                Ok(Some(received)) => received,
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "Control socket receive failed");
                    return;
                }
            };

            if let Some(reply) = self.handle_datagram(table, res, &buf[..n], from) {
                send_reply(table, &reply);
            }
        }
    }

    /// Handle one signaling datagram and return the reply to send, if any
    pub fn handle_datagram(
        &mut self,
        table: &mut SessionTable,
        res: &mut GatewayResources,
        datagram: &[u8],
        from: SocketAddrV4,
    ) -> Option<Message> {
        let message = match faxgw_sig_core::parse_message(datagram) {
            Ok(message) => message,
            Err(e) => {
                self.stats.parse_failures += 1;
                warn!(%from, error = %e, "Malformed signaling message");
                let call_id = e.call_id().cloned().unwrap_or_else(CallId::placeholder);
                return Some(Message::error(call_id, ErrorKind::InvalidMessage));
            }
        };
        debug!(%from, message = %message, "Signaling received");

        match message {
            Message::Setup(setup) => Some(match self.setup_call(table, res, &setup) {
                Ok(addr) => Message::ok(setup.call_id, addr),
                Err(e) => {
                    self.stats.calls_rejected += 1;
                    warn!(call_id = %setup.call_id, error = %e, "Call setup failed");
                    Message::error(setup.call_id, ErrorKind::Internal)
                }
            }),
            Message::Release(release) => {
                self.release_call(table, res, &release.call_id);
                None
            }
            other @ (Message::Ok(_) | Message::Error(_)) => {
                info!(%from, message = %other, "Unexpected reply on control channel ignored");
                None
            }
        }
    }

    /// Create, link and bridge the two legs of a call.
    ///
    /// Returns the inbound leg's local media address.
    pub fn setup_call(
        &mut self,
        table: &mut SessionTable,
        res: &mut GatewayResources,
        setup: &Setup,
    ) -> Result<SocketAddrV4> {
        let outbound_mode = match setup.mode {
            FaxMode::GatewayToGateway => SessionMode::Gateway,
            FaxMode::GatewayToTerminal => SessionMode::Terminal,
            FaxMode::Unknown => {
                return Err(Error::UnsupportedMode {
                    mode: setup.mode.to_string(),
                })
            }
        };
        if table.control().is_none() {
            return Err(Error::invalid_session("no control session"));
        }
        if table.remaining() < 2 {
            return Err(Error::CapacityExceeded {
                active: table.len(),
                max: table.capacity(),
            });
        }
        if table.find_by_call_id(&setup.call_id).is_some() {
            return Err(Error::DuplicateCall {
                call_id: setup.call_id.to_string(),
            });
        }

        let base = table.len();
        let mut inbound = Session::create(SessionMode::Gateway, base, Direction::Inbound, &mut res.ids)?;
        if let Err(e) = inbound.init_media_leg(setup.call_id.clone(), Some(setup.src), res) {
            inbound.destroy(res);
            return Err(e);
        }

        let mut outbound = match Session::create(outbound_mode, base + 1, Direction::Outbound, &mut res.ids) {
            Ok(session) => session,
            Err(e) => {
                inbound.destroy(res);
                return Err(e);
            }
        };
        if let Err(e) = bridge_legs(&mut inbound, &mut outbound, setup, res) {
            outbound.destroy(res);
            inbound.destroy(res);
            return Err(e);
        }

        let Some(local) = inbound.local_addr() else {
            inbound.destroy(res);
            outbound.destroy(res);
            return Err(Error::invalid_session("inbound leg has no local address"));
        };
        let (inbound_id, outbound_id) = (inbound.id(), outbound.id());

        if let Err(e) = table.admit(&inbound) {
            inbound.destroy(res);
            outbound.destroy(res);
            return Err(e);
        }
        let inbound_index = table.insert(inbound);
        if let Err(e) = table.admit(&outbound) {
            error!(call_id = %setup.call_id, error = %e, "Outbound leg could not be registered");
            // inbound holds the bridge: stop it before the outbound engine goes
            if let Err(e) = table.destroy_call(inbound_index, res) {
                error!(error = %e, "Call teardown failed");
            }
            outbound.destroy(res);
            return Err(e);
        }
        table.insert(outbound);

        self.stats.calls_established += 1;
        info!(
            call_id = %setup.call_id,
            mode = %setup.mode,
            inbound = %inbound_id,
            outbound = %outbound_id,
            local = %local,
            "Call established"
        );
        Ok(local)
    }

    /// Tear down the call with this call-id. Returns false if it is unknown.
    pub fn release_call(
        &mut self,
        table: &mut SessionTable,
        res: &mut GatewayResources,
        call_id: &CallId,
    ) -> bool {
        let Some(index) = table.find_by_call_id(call_id) else {
            info!(call_id = %call_id, "Release for unknown call ignored");
            return false;
        };
        match table.destroy_call(index, res) {
            Ok(()) => {
                self.stats.calls_released += 1;
                info!(call_id = %call_id, "Call released");
                true
            }
            Err(e) => {
                error!(call_id = %call_id, error = %e, "Call release failed");
                false
            }
        }
    }

    /// Feed a readable media leg; a socket failure tears its call down
    pub fn handle_media(
        &mut self,
        table: &mut SessionTable,
        res: &mut GatewayResources,
        index: usize,
        buf: &mut [u8],
    ) {
        let Some(session) = table.get_mut(index) else {
            return;
        };
        match session.on_readable(buf) {
            Ok(count) => trace!(session = %session.id(), count, "Media datagrams received"),
            Err(e) => {
                self.stats.media_errors += 1;
                warn!(session = %session.id(), error = %e, "Media socket failed, tearing down call");
                if let Err(e) = table.destroy_call(index, res) {
                    error!(error = %e, "Call teardown failed");
                }
            }
        }
    }

    /// Tear down every call whose bridge hit a socket error. Returns the count.
    pub fn reap_failed_bridges(&mut self, table: &mut SessionTable, res: &mut GatewayResources) -> usize {
        let mut reaped = 0;
        for index in table.failed_bridges() {
            let Some(session) = table.get(index) else {
                continue;
            };
            self.stats.media_errors += 1;
            warn!(
                session = %session.id(),
                call_id = ?session.call_id().map(CallId::as_str),
                "Media bridge failed, tearing down call"
            );
            match table.destroy_call(index, res) {
                Ok(()) => reaped += 1,
                Err(e) => error!(error = %e, "Call teardown failed"),
            }
        }
        reaped
    }

    /// Counters plus the table's live totals
    pub fn stats(&self, table: &SessionTable) -> GatewayStats {
        let media = table.media_sessions();
        GatewayStats {
            active_sessions: table.sessions().count(),
            active_calls: media / 2,
            ..self.stats
        }
    }
}

/// Finish the outbound leg, cross-link the pair and start its bridge
fn bridge_legs(
    inbound: &mut Session,
    outbound: &mut Session,
    setup: &Setup,
    res: &mut GatewayResources,
) -> Result<()> {
    outbound.init_media_leg(setup.call_id.clone(), setup.dst, res)?;
    Session::link(inbound, outbound)?;
    inbound.start_bridge(outbound, res)
}

fn send_reply(table: &SessionTable, reply: &Message) {
    let bytes = match reply.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to encode reply");
            return;
        }
    };
    let Some(control) = table.control() else {
        return;
    };
    match control.send(&bytes) {
        Ok(_) => debug!(to = ?control.remote_addr(), message = %reply, "Reply sent"),
        Err(e) => warn!(error = %e, message = %reply, "Failed to send reply"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::engine::PassthroughFactory;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    fn resources(poll: &mio::Poll, runtime: &tokio::runtime::Runtime) -> GatewayResources {
        let config = GatewayConfig::default()
            .with_media_ip(Ipv4Addr::LOCALHOST)
            .with_port_range(39300, 8);
        GatewayResources::new(
            &config,
            poll.registry().try_clone().unwrap(),
            Arc::new(PassthroughFactory),
            runtime.handle().clone(),
            Ipv4Addr::LOCALHOST,
        )
    }

    #[test]
    fn test_media_failure_tears_down_both_legs() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let poll = mio::Poll::new().unwrap();
        let mut res = resources(&poll, &runtime);
        let mut table = SessionTable::new(8);

        let control = Session::create(SessionMode::Control, 0, Direction::Inbound, &mut res.ids).unwrap();
        table.push(control).unwrap();
        // legs without sockets fail their first receive
        let mut a = Session::create(SessionMode::Gateway, 1, Direction::Inbound, &mut res.ids).unwrap();
        let mut b = Session::create(SessionMode::Gateway, 2, Direction::Outbound, &mut res.ids).unwrap();
        Session::link(&mut a, &mut b).unwrap();
        table.push(a).unwrap();
        table.push(b).unwrap();

        let mut orchestrator = CallOrchestrator::new();
        let mut buf = [0u8; 64];
        orchestrator.handle_media(&mut table, &mut res, 1, &mut buf);

        assert!(table.descriptor(1).unwrap().is_closed());
        assert!(table.descriptor(2).unwrap().is_closed());
        assert_eq!(res.ids.in_use(), 1);
        let stats = orchestrator.stats(&table);
        assert_eq!(stats.media_errors, 1);
        assert_eq!(stats.active_calls, 0);

        assert_eq!(table.compact(|_, _| {}), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reap_ignores_healthy_calls() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let poll = mio::Poll::new().unwrap();
        let mut res = resources(&poll, &runtime);
        let mut table = SessionTable::new(8);
        let control = Session::create(SessionMode::Control, 0, Direction::Inbound, &mut res.ids).unwrap();
        table.push(control).unwrap();
        let mut a = Session::create(SessionMode::Gateway, 1, Direction::Inbound, &mut res.ids).unwrap();
        let mut b = Session::create(SessionMode::Gateway, 2, Direction::Outbound, &mut res.ids).unwrap();
        Session::link(&mut a, &mut b).unwrap();
        table.push(a).unwrap();
        table.push(b).unwrap();

        let mut orchestrator = CallOrchestrator::new();
        assert_eq!(orchestrator.reap_failed_bridges(&mut table, &mut res), 0);
        assert_eq!(table.media_sessions(), 2);
        assert_eq!(orchestrator.stats(&table).media_errors, 0);
    }
}
