//! Fleet Manager REST Adapter
//!
//! `reqwest` implementation of the `FleetGateway` port.

pub mod api_types;
mod http_client;

pub use http_client::HttpFleetGateway;
