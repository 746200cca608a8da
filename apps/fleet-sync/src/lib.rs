#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::default_trait_access
    )
)]

//! Fleet Sync - Container Fleet Synchronization Layer
//!
//! Keeps a live, observable view of a container-fleet manager. Collections
//! (containers, stacks, volumes, networks, images) are loaded over REST and
//! re-fetched after mutations; host and per-container metrics arrive over a
//! single WebSocket stream and are routed to subscribers by message type.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Fleet resource types and message routing
//!   - `fleet`: Containers, stacks, volumes, networks, images, metrics
//!   - `streaming`: Stream envelope and connection state
//!   - `subscription`: Type-keyed handler registry
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Fleet gateway and stream interfaces
//!   - `services`: Fleet store and system store
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: WebSocket client with reconnect backoff
//!   - `rest`: HTTP fleet gateway
//!   - `config`: Configuration and dependency injection
//!
//! # Data Flow
//!
//! ```text
//!                      ┌───────────────┐
//! Fleet WS ──frames──► │ MessageRouter │──"stats"───────────► SystemStore
//!                      └───────────────┘──"container_stats"─► FleetStore
//!                                                                  ▲
//! Fleet REST ◄──list / mutate / re-fetch───────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Fleet types and routing with no I/O.
pub mod domain;

/// Application layer - Stores and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::fleet::{
    ContainerInfo, ContainerStats, CreateNetworkRequest, CreateVolumeRequest, ImageInfo,
    NetworkInfo, StackInfo, SystemStats, VolumeInfo,
};
pub use domain::streaming::{CONTAINER_STATS, ConnectionState, SYSTEM_STATS, StreamEnvelope};
pub use domain::subscription::{HandlerError, MessageRouter, Subscription};

// Application
pub use application::observable::Observable;
pub use application::ports::{FleetGateway, GatewayError, StreamPort};
pub use application::services::{
    Collection, FleetState, FleetStore, Mutation, StoreError, SystemState, SystemStore,
};

// Infrastructure
pub use infrastructure::config::{ConfigError, Endpoints, SyncConfig, SyncContainer};
pub use infrastructure::rest::HttpFleetGateway;
pub use infrastructure::stream::{
    ReconnectConfig, ReconnectPolicy, StreamConfig, StreamConnection, StreamError,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
