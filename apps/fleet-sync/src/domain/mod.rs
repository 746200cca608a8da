//! Domain Layer - Fleet inventory, stream envelopes and message routing.
//!
//! This layer contains the core domain types for the dashboard with no
//! I/O of its own. All types here are pure Rust with serialization support.

/// Fleet inventory and metrics records (containers, stacks, volumes, ...).
pub mod fleet;

/// Stream envelope and connection state types.
pub mod streaming;

/// Type-keyed message subscriptions and dispatch.
pub mod subscription;
