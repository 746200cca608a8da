//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FleetGateway`: Request/response access to the fleet manager's REST API
//! - `StreamPort`: Lifecycle of the metrics stream connection

mod fleet_gateway_port;
mod stream_port;

#[cfg(test)]
pub use fleet_gateway_port::MockFleetGateway;
pub use fleet_gateway_port::{DEFAULT_LOG_TAIL, FleetGateway, GatewayError};
pub use stream_port::StreamPort;
