//! Stream Infrastructure
//!
//! WebSocket client for the fleet manager's push stream.
//!
//! - `connection`: Socket lifecycle and frame dispatch
//! - `reconnect`: Exponential backoff policy
//! - `codec`: `{type, payload}` envelope framing

pub mod codec;
pub mod connection;
pub mod reconnect;

pub use codec::{CodecError, EnvelopeCodec};
pub use connection::{StreamConfig, StreamConnection, StreamError};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
