//! Stream Port (Driven Port)
//!
//! Lifecycle control of the push stream. Decoded payloads do not flow
//! through this trait; they reach subscribers via the message router the
//! connection feeds.

use tokio::sync::watch;

use crate::domain::streaming::ConnectionState;

/// Port for the metrics stream connection.
pub trait StreamPort: Send + Sync {
    /// Open the stream unless a socket is already live.
    fn connect(&self);

    /// Close the stream and cancel any pending reconnect.
    fn disconnect(&self);

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Receiver for the connected flag; `true` only while the socket is open.
    fn connected(&self) -> watch::Receiver<bool>;

    /// Whether the socket is open right now.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }
}
