//! System Store
//!
//! Keeps the latest whole-system metrics snapshot pushed over the stream
//! and exposes the connection flag.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;

use crate::application::observable::Observable;
use crate::application::ports::StreamPort;
use crate::domain::fleet::SystemStats;
use crate::domain::streaming::{ConnectionState, SYSTEM_STATS};
use crate::domain::subscription::{HandlerError, MessageRouter, Subscription};

/// Snapshot held by the system store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemState {
    /// Latest metrics. All zero until the first message arrives.
    pub stats: SystemStats,
    /// Last payload that could not be read.
    pub error: Option<String>,
    /// When `stats` was last replaced.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Whole-system metrics store.
pub struct SystemStore {
    stream: Arc<dyn StreamPort>,
    router: MessageRouter,
    state: Observable<SystemState>,
    subscription: Mutex<Option<Subscription>>,
}

impl fmt::Debug for SystemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemStore")
            .field("stream_state", &self.stream.state())
            .field("subscribed", &self.subscription.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl SystemStore {
    /// Create a store driving `stream` and listening on `router`.
    ///
    /// `router` must be the one the stream dispatches into.
    #[must_use]
    pub fn new(stream: Arc<dyn StreamPort>, router: MessageRouter) -> Self {
        Self {
            stream,
            router,
            state: Observable::default(),
            subscription: Mutex::new(None),
        }
    }

    /// Open the stream and start listening for `stats` messages.
    ///
    /// Safe to call repeatedly: the socket is opened at most once and the
    /// handler is registered at most once.
    pub fn connect(&self) {
        self.stream.connect();

        let mut slot = self.subscription.lock();
        if slot.is_some() {
            return;
        }

        let state = self.state.clone();
        let subscription = self.router.on(SYSTEM_STATS, move |payload| {
            match SystemStats::deserialize(payload) {
                Ok(stats) => {
                    let received_at = Utc::now();
                    state.update(|s| {
                        s.stats = stats;
                        s.error = None;
                        s.updated_at = Some(received_at);
                    });
                    Ok(())
                }
                Err(source) => {
                    let err = HandlerError::Payload {
                        message_type: SYSTEM_STATS.to_string(),
                        source,
                    };
                    let message = err.to_string();
                    state.update(|s| s.error = Some(message));
                    Err(err)
                }
            }
        });
        *slot = Some(subscription);
    }

    /// Stop listening and close the stream. The last snapshot is kept.
    pub fn disconnect(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.stream.disconnect();
    }

    /// Receiver for the connected flag.
    #[must_use]
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.stream.connected()
    }

    /// Whether the stream is open right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    /// Stream lifecycle state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    /// Latest metrics.
    #[must_use]
    pub fn stats(&self) -> SystemStats {
        self.state.with(|s| s.stats.clone())
    }

    /// Last payload error.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.with(|s| s.error.clone())
    }

    /// Clone of the full state.
    #[must_use]
    pub fn state(&self) -> SystemState {
        self.state.get()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.state.subscribe()
    }
}
