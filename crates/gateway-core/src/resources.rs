//! Shared gateway context injected into sessions and the orchestrator

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use mio::Registry;
use tokio::runtime::Handle;

use crate::allocator::{IdAllocator, PortAllocator};
use crate::config::GatewayConfig;
use crate::engine::{EngineConfig, FaxEngineFactory};

/// Everything a session needs beyond its own state: the allocators, the poll
/// registry its socket joins, the engine factory and the runtime bridge tasks
/// run on. Owned by the gateway; only the event loop thread mutates it.
pub struct GatewayResources {
    pub ids: IdAllocator,
    pub ports: PortAllocator,
    pub(crate) registry: Registry,
    pub(crate) factory: Arc<dyn FaxEngineFactory>,
    pub(crate) engine_config: EngineConfig,
    pub(crate) runtime: Handle,
    pub(crate) media_ip: Ipv4Addr,
    pub(crate) bridge_interval: Duration,
}

impl GatewayResources {
    pub(crate) fn new(
        config: &GatewayConfig,
        registry: Registry,
        factory: Arc<dyn FaxEngineFactory>,
        runtime: Handle,
        media_ip: Ipv4Addr,
    ) -> Self {
        Self {
            ids: IdAllocator::new(config.id_pool_size),
            ports: PortAllocator::new(config.port_base, config.port_count),
            registry,
            factory,
            engine_config: config.engine.clone(),
            runtime,
            media_ip,
            bridge_interval: config.bridge_interval(),
        }
    }

    /// Address media sockets bind to and advertise
    pub fn media_ip(&self) -> Ipv4Addr {
        self.media_ip
    }

    pub fn bridge_interval(&self) -> Duration {
        self.bridge_interval
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }
}

impl std::fmt::Debug for GatewayResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayResources")
            .field("ids", &self.ids)
            .field("ports", &self.ports)
            .field("media_ip", &self.media_ip)
            .field("bridge_interval", &self.bridge_interval)
            .finish_non_exhaustive()
    }
}
