//! Service Container
//!
//! Builds and owns every long-lived component: one router, one stream
//! connection, one gateway and the two stores. Constructed once at startup
//! and torn down explicitly at shutdown.

use std::sync::Arc;

use super::settings::SyncConfig;
use crate::application::ports::{FleetGateway, GatewayError, StreamPort};
use crate::application::services::{FleetStore, StoreError, SystemStore};
use crate::domain::subscription::MessageRouter;
use crate::infrastructure::rest::HttpFleetGateway;
use crate::infrastructure::stream::{StreamConfig, StreamConnection};

/// Wired synchronization layer.
pub struct SyncContainer {
    config: SyncConfig,
    router: MessageRouter,
    stream: StreamConnection,
    gateway: Arc<dyn FleetGateway>,
    fleet: Arc<FleetStore>,
    system: Arc<SystemStore>,
}

impl std::fmt::Debug for SyncContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContainer")
            .field("origin", &self.config.origin)
            .field("stream", &self.stream)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl SyncContainer {
    /// Wire all components against the HTTP gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SyncConfig) -> Result<Self, GatewayError> {
        let gateway = Arc::new(HttpFleetGateway::new(&config.rest)?);
        Ok(Self::with_gateway(config, gateway))
    }

    /// Wire all components against a caller-supplied gateway.
    #[must_use]
    pub fn with_gateway(config: SyncConfig, gateway: Arc<dyn FleetGateway>) -> Self {
        let router = MessageRouter::new();
        let stream = StreamConnection::new(StreamConfig::from_settings(&config.stream), router.clone());
        let stream_port: Arc<dyn StreamPort> = Arc::new(stream.clone());

        let fleet = Arc::new(FleetStore::new(Arc::clone(&gateway), router.clone()));
        let system = Arc::new(SystemStore::new(stream_port, router.clone()));

        Self {
            config,
            router,
            stream,
            gateway,
            fleet,
            system,
        }
    }

    /// Open the stream and start routing metrics into both stores.
    pub fn start(&self) {
        tracing::info!(
            stream_url = %self.config.stream.url,
            api_base = %self.config.rest.base_url,
            "Starting fleet synchronization"
        );
        self.fleet.subscribe_to_container_stats();
        self.system.connect();
    }

    /// `start`, then load every collection once.
    ///
    /// # Errors
    ///
    /// Returns the containers or stacks read failure. The stream stays up.
    pub async fn start_and_load(&self) -> Result<(), StoreError> {
        self.start();
        self.fleet.fetch_all().await
    }

    /// Stop routing and close the stream. Store contents are kept.
    pub fn shutdown(&self) {
        self.fleet.unsubscribe_from_container_stats();
        self.system.disconnect();
        tracing::info!("Fleet synchronization stopped");
    }

    /// Configuration the container was built from.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Shared message router.
    #[must_use]
    pub const fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Stream connection.
    #[must_use]
    pub const fn stream(&self) -> &StreamConnection {
        &self.stream
    }

    /// REST gateway.
    #[must_use]
    pub fn gateway(&self) -> Arc<dyn FleetGateway> {
        Arc::clone(&self.gateway)
    }

    /// Fleet store.
    #[must_use]
    pub fn fleet(&self) -> Arc<FleetStore> {
        Arc::clone(&self.fleet)
    }

    /// System store.
    #[must_use]
    pub fn system(&self) -> Arc<SystemStore> {
        Arc::clone(&self.system)
    }
}
