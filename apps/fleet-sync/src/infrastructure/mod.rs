//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// WebSocket stream client (connection lifecycle, backoff, framing).
pub mod stream;

/// HTTP adapter for the fleet manager's REST API.
pub mod rest;

/// Configuration and dependency injection.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
