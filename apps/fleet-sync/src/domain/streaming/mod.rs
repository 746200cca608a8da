//! Stream Types
//!
//! The envelope every stream frame carries, the message types this
//! client consumes, and the lifecycle states of the stream connection.

use serde::{Deserialize, Serialize};

/// Message type carrying the whole-system metrics snapshot.
pub const SYSTEM_STATS: &str = "stats";

/// Message type carrying the per-container metrics map.
pub const CONTAINER_STATS: &str = "container_stats";

/// A single decoded stream frame: `{ "type": ..., "payload": ... }`.
///
/// The payload stays untyped until a subscriber decodes it, so frames of
/// message types nobody listens to are never deserialized further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEnvelope {
    /// Message type used as the routing key.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket and no pending reconnect.
    #[default]
    Disconnected,
    /// Socket handshake in progress.
    Connecting,
    /// Socket open.
    Connected,
    /// Waiting for the backoff timer before the next attempt.
    ReconnectScheduled,
}

impl ConnectionState {
    /// Whether the underlying socket reports an open state.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ReconnectScheduled => "reconnect_scheduled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_type_key() {
        let envelope = StreamEnvelope {
            message_type: SYSTEM_STATS.to_string(),
            payload: serde_json::json!({"cpuUsage": 1.5}),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "stats");
        assert_eq!(json["payload"]["cpuUsage"], 1.5);
    }

    #[test]
    fn envelope_payload_defaults_to_null() {
        let envelope: StreamEnvelope = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(envelope.message_type, "ping");
        assert!(envelope.payload.is_null());
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::ReconnectScheduled.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}
