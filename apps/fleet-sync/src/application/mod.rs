//! Application Layer - Stores, state containers and port definitions.
//!
//! This layer contains the dashboard stores and the port interfaces that
//! define how they reach the fleet manager.

/// Change-notifying state container used by the stores.
pub mod observable;

/// Port interfaces for external systems (REST gateway, stream).
pub mod ports;

/// Fleet and system metrics stores.
pub mod services;
