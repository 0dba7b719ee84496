//! `VestibuleServer` builder and server loop.
//!
//! Ties the layers together: transport → matchmaker → registry/presence.
//! Single-node deployments run on the in-process backends; a fleet
//! injects shared ones.

use std::sync::Arc;

use vestibule_matchmaker::{Matchmaker, RoomType};
use vestibule_presence::{LocalPresence, Presence};
use vestibule_registry::{Driver, MemoryDriver};
use vestibule_transport::{TransportConfig, WsTransport};

use crate::VestibuleError;

/// Builder for configuring and starting a Vestibule server.
///
/// # Example
///
/// ```rust,ignore
/// let server = VestibuleServerBuilder::new()
///     .bind("0.0.0.0:2567")
///     .build()
///     .await?;
/// server.define("chat", RoomType::new(|| ChatRoom::default())).await?;
/// server.run().await
/// ```
pub struct VestibuleServerBuilder<P = LocalPresence, D = MemoryDriver> {
    bind_addr: String,
    transport_config: TransportConfig,
    presence: Arc<P>,
    driver: Arc<D>,
}

impl VestibuleServerBuilder<LocalPresence, MemoryDriver> {
    /// Creates a builder on the in-process presence and registry.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:2567".to_string(),
            transport_config: TransportConfig::default(),
            presence: Arc::new(LocalPresence::new()),
            driver: Arc::new(MemoryDriver::new()),
        }
    }
}

impl Default for VestibuleServerBuilder<LocalPresence, MemoryDriver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Presence, D: Driver> VestibuleServerBuilder<P, D> {
    /// Sets the address to bind the transport to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the transport liveness configuration.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Replaces the presence backend (e.g. a network-backed one shared
    /// by the fleet).
    pub fn presence<P2: Presence>(self, presence: Arc<P2>) -> VestibuleServerBuilder<P2, D> {
        VestibuleServerBuilder {
            bind_addr: self.bind_addr,
            transport_config: self.transport_config,
            presence,
            driver: self.driver,
        }
    }

    /// Replaces the registry driver.
    pub fn driver<D2: Driver>(self, driver: Arc<D2>) -> VestibuleServerBuilder<P, D2> {
        VestibuleServerBuilder {
            bind_addr: self.bind_addr,
            transport_config: self.transport_config,
            presence: self.presence,
            driver,
        }
    }

    /// Builds the server and binds its transport.
    pub async fn build(self) -> Result<VestibuleServer<P, D>, VestibuleError> {
        let matchmaker = Arc::new(Matchmaker::new(self.presence, self.driver));
        let transport = WsTransport::bind(
            &self.bind_addr,
            self.transport_config,
            Arc::clone(&matchmaker),
        )
        .await?;
        Ok(VestibuleServer {
            matchmaker,
            transport,
        })
    }
}

/// A bound Vestibule server.
///
/// Register room types with [`define`](Self::define), then call
/// [`run`](Self::run) to serve connections.
pub struct VestibuleServer<P: Presence = LocalPresence, D: Driver = MemoryDriver> {
    matchmaker: Arc<Matchmaker<P, D>>,
    transport: WsTransport<P, D>,
}

impl<P: Presence, D: Driver> VestibuleServer<P, D> {
    /// Creates a new builder.
    pub fn builder() -> VestibuleServerBuilder {
        VestibuleServerBuilder::new()
    }

    /// Registers a room type. Re-registering a name replaces the
    /// previous handler and reaps stale listings of that type.
    pub async fn define(&self, name: &str, room_type: RoomType) -> Result<(), VestibuleError> {
        self.matchmaker.define(name, room_type).await?;
        Ok(())
    }

    /// The matchmaker, for remote room calls, queries, and shutdown.
    pub fn matchmaker(&self) -> Arc<Matchmaker<P, D>> {
        Arc::clone(&self.matchmaker)
    }

    /// The local address the transport is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the transport accept loop. Runs until the process stops.
    pub async fn run(self) -> Result<(), VestibuleError> {
        tracing::info!("vestibule server running");
        self.transport.run().await?;
        Ok(())
    }

    /// Disconnects every locally hosted room and resolves when their
    /// cleanup has finished. New matchmaking is rejected from the first
    /// call on.
    pub async fn shutdown(&self) -> Result<(), VestibuleError> {
        self.matchmaker.gracefully_shutdown().await?;
        Ok(())
    }
}
