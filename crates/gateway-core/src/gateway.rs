//! Gateway context and event loop

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::{Events, Poll};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::engine::FaxEngineFactory;
use crate::error::{Error, Result};
use crate::net;
use crate::orchestrator::CallOrchestrator;
use crate::resources::GatewayResources;
use crate::session::{Direction, Session, SessionMode, SessionTable, CONTROL_INDEX};
use crate::stats::GatewayStats;

/// Cloneable flag that stops [`Gateway::run`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the event loop to stop after its current iteration
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The gateway: control session, session table, allocators and event loop.
///
/// The event loop is synchronous and must run on a thread that is not a
/// runtime worker (for example inside `spawn_blocking`): tearing a call down
/// waits for its bridge task on `runtime`.
pub struct Gateway {
    config: GatewayConfig,
    poll: Poll,
    events: Events,
    table: SessionTable,
    resources: GatewayResources,
    orchestrator: CallOrchestrator,
    shutdown: ShutdownHandle,
    buf: Vec<u8>,
}

impl Gateway {
    /// Validate the configuration and stand up the control session.
    ///
    /// Failing to bind the control socket is the one fatal error.
    pub fn new(
        config: GatewayConfig,
        factory: Arc<dyn FaxEngineFactory>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;

        let poll = Poll::new().map_err(|e| Error::socket("create poll", e))?;
        let registry = poll
            .registry()
            .try_clone()
            .map_err(|e| Error::socket("clone poll registry", e))?;
        let media_ip = resolve_media_ip(&config);
        let mut resources = GatewayResources::new(&config, registry, factory, runtime, media_ip);

        let mut table = SessionTable::new(config.max_sessions);
        let mut control = Session::create(
            SessionMode::Control,
            CONTROL_INDEX,
            Direction::Inbound,
            &mut resources.ids,
        )?;
        let control_addr = SocketAddrV4::new(config.control_ip, config.control_port);
        if let Err(e) = control.init_control(control_addr, &mut resources) {
            control.destroy(&mut resources);
            return Err(e);
        }
        table.push(control)?;

        info!(
            control = %control_addr,
            media_ip = %media_ip,
            ports = %format!("{}-{}", config.port_base, u32::from(config.port_base) + u32::from(config.port_count) - 1),
            max_sessions = config.max_sessions,
            "Gateway initialized"
        );

        Ok(Self {
            events: Events::with_capacity(config.max_sessions),
            buf: vec![0; config.buffer_size],
            config,
            poll,
            table,
            resources,
            orchestrator: CallOrchestrator::new(),
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Bound address of the control socket
    pub fn control_addr(&self) -> Option<SocketAddrV4> {
        self.table.control().and_then(Session::local_addr)
    }

    /// Address advertised in `OK` replies
    pub fn media_ip(&self) -> Ipv4Addr {
        self.resources.media_ip()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn resources(&self) -> &GatewayResources {
        &self.resources
    }

    pub fn stats(&self) -> GatewayStats {
        self.orchestrator.stats(&self.table)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// One event loop iteration: wait, dispatch control, reap failed
    /// bridges, compact and dispatch media. Returns the number of ready events.
    pub fn poll_once(&mut self, timeout: Duration) -> Result<usize> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => self.events.clear(),
            Err(e) => return Err(Error::socket("poll", e)),
        }

        let mut ready = 0;
        for event in self.events.iter() {
            ready += 1;
            self.table.mark_readable(event.token());
        }

        let Self {
            table,
            resources,
            orchestrator,
            buf,
            ..
        } = self;

        if ready > 0 {
            table.take_readable(CONTROL_INDEX);
            orchestrator.handle_control(table, resources, buf);
        }
        orchestrator.reap_failed_bridges(table, resources);
        let removed = table.compact(|table, index| orchestrator.handle_media(table, resources, index, buf));
        if removed > 0 {
            debug!(removed, size = table.len(), "Session table compacted");
        }
        Ok(ready)
    }

    /// Run until the shutdown handle is triggered, then tear every call down
    pub fn run(&mut self) -> Result<()> {
        let timeout = self.config.poll_timeout();
        info!(control = ?self.control_addr(), "Gateway event loop running");

        while !self.shutdown.is_triggered() {
            if let Err(e) = self.poll_once(timeout) {
                error!(error = %e, "Event loop iteration failed");
                std::thread::sleep(timeout);
            }
        }

        self.shutdown_sessions();
        Ok(())
    }

    /// Destroy every call and the control session
    pub fn shutdown_sessions(&mut self) {
        let calls = self.table.destroy_all(&mut self.resources);
        let stats = self.stats();
        info!(
            calls_torn_down = calls,
            established = stats.calls_established,
            rejected = stats.calls_rejected,
            released = stats.calls_released,
            parse_failures = stats.parse_failures,
            media_errors = stats.media_errors,
            "Gateway stopped"
        );
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        if !self.table.is_empty() {
            self.shutdown_sessions();
        }
    }
}

fn resolve_media_ip(config: &GatewayConfig) -> Ipv4Addr {
    let Some(name) = config.interface.as_deref() else {
        return config.media_ip;
    };
    match net::discover_interface_ip(name) {
        Ok(ip) => {
            info!(interface = name, %ip, "Media address taken from interface");
            ip
        }
        Err(e) => {
            warn!(interface = name, error = %e, fallback = %config.media_ip, "Interface lookup failed");
            config.media_ip
        }
    }
}
