//! Stream Connection
//!
//! Owns the single WebSocket to the fleet manager's `/ws` endpoint.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──open──▶ Connected
//!      ▲                          │                    │
//!      │                        error                close
//!      │                          ▼                    ▼
//!      └──────── cap reached ── Disconnected ◀─────────┘
//!                                 │
//!                          schedule backoff
//!                                 ▼
//!                         ReconnectScheduled ──timer──▶ Connecting
//! ```
//!
//! `disconnect()` cancels the session and any pending timer from any state.
//!
//! Every session and timer is tagged with a generation. Callbacks from a
//! session or timer whose generation is no longer current are ignored, so at
//! most one socket is live and no stale reconnect fires after teardown.

use std::fmt;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_util::sync::CancellationToken;

use super::codec::EnvelopeCodec;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::observable::Observable;
use crate::application::ports::StreamPort;
use crate::domain::streaming::ConnectionState;
use crate::domain::subscription::MessageRouter;
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Reasons a session ended. Logged, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The handshake failed.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(#[source] tokio_tungstenite::tungstenite::Error),

    /// The socket failed after opening.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server sent a close frame.
    #[error("closed by server{}", .0.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    ClosedByPeer(Option<String>),

    /// The socket ended without a close frame.
    #[error("connection ended")]
    Ended,
}

impl StreamError {
    const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connect",
            Self::WebSocket(_) => "websocket",
            Self::ClosedByPeer(_) => "closed",
            Self::Ended => "ended",
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the stream connection.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
}

impl StreamConfig {
    /// Create a configuration with the default backoff schedule.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            reconnect: ReconnectConfig::from_settings(settings),
        }
    }

    /// Replace the reconnection configuration.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Mutable lifecycle bookkeeping, guarded by one lock.
struct Control {
    generation: u64,
    session: Option<CancellationToken>,
    reconnect_timer: Option<CancellationToken>,
    policy: ReconnectPolicy,
}

struct Inner {
    config: StreamConfig,
    router: MessageRouter,
    codec: EnvelopeCodec,
    state: Observable<ConnectionState>,
    connected: Observable<bool>,
    control: Mutex<Control>,
}

/// WebSocket stream connection with automatic reconnection.
///
/// Decoded frames are dispatched into the [`MessageRouter`] given at
/// construction. Cloning yields another handle to the same connection.
///
/// `connect()` and reconnect timers spawn onto the current Tokio runtime;
/// calling `connect()` outside one logs an error and does nothing.
#[derive(Clone)]
pub struct StreamConnection {
    inner: Arc<Inner>,
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.inner.control.lock();
        f.debug_struct("StreamConnection")
            .field("url", &self.inner.config.url)
            .field("state", &self.inner.state.get())
            .field("generation", &control.generation)
            .field("attempts", &control.policy.attempt_count())
            .finish_non_exhaustive()
    }
}

impl StreamConnection {
    /// Create a disconnected stream feeding `router`.
    #[must_use]
    pub fn new(config: StreamConfig, router: MessageRouter) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                router,
                codec: EnvelopeCodec::new(),
                state: Observable::default(),
                connected: Observable::new(false),
                control: Mutex::new(Control {
                    generation: 0,
                    session: None,
                    reconnect_timer: None,
                    policy,
                }),
            }),
        }
    }

    /// Open the socket unless one is already open or opening.
    ///
    /// A pending reconnect timer is superseded by the new attempt. Opening
    /// successfully resets the backoff.
    pub fn connect(&self) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::error!("Stream connect requested outside a Tokio runtime");
            return;
        };

        let mut control = self.inner.control.lock();
        match self.inner.state.get() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                tracing::debug!("Stream already connected or connecting");
                return;
            }
            ConnectionState::ReconnectScheduled => {
                if let Some(timer) = control.reconnect_timer.take() {
                    timer.cancel();
                }
            }
            ConnectionState::Disconnected => {}
        }

        Inner::open_session(&self.inner, &mut control, &runtime);
    }

    /// Close the socket, cancel any pending reconnect and reset the backoff.
    ///
    /// This is the only way to stop automatic reconnection.
    pub fn disconnect(&self) {
        let mut control = self.inner.control.lock();
        control.generation += 1;

        if let Some(timer) = control.reconnect_timer.take() {
            timer.cancel();
        }
        if let Some(session) = control.session.take() {
            session.cancel();
        }
        control.policy.reset();

        self.inner.set_state(ConnectionState::Disconnected);
        tracing::info!(url = %self.inner.config.url, "Stream disconnected");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Receiver for lifecycle state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receiver for the connected flag.
    #[must_use]
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Whether the socket is open right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    /// Reconnect attempts claimed since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.control.lock().policy.attempt_count()
    }

    /// Router decoded frames are dispatched into.
    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    /// Connection configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }
}

impl StreamPort for StreamConnection {
    fn connect(&self) {
        Self::connect(self);
    }

    fn disconnect(&self) {
        Self::disconnect(self);
    }

    fn state(&self) -> ConnectionState {
        Self::state(self)
    }

    fn connected(&self) -> watch::Receiver<bool> {
        Self::connected(self)
    }

    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.set(state);
        let connected = state.is_connected();
        if self.connected.update_if(|flag| {
            let changed = *flag != connected;
            *flag = connected;
            changed
        }) {
            metrics::set_stream_connected(connected);
        }
    }

    /// Start a new session. Caller holds the control lock.
    fn open_session(this: &Arc<Self>, control: &mut Control, runtime: &Handle) {
        control.generation += 1;
        let generation = control.generation;

        let token = CancellationToken::new();
        control.session = Some(token.clone());
        this.set_state(ConnectionState::Connecting);

        tracing::info!(url = %this.config.url, generation, "Connecting to stream");
        runtime.spawn(Self::run_session(Arc::clone(this), generation, token));
    }

    async fn run_session(this: Arc<Self>, generation: u64, cancel: CancellationToken) {
        let handshake = tokio::select! {
            () = cancel.cancelled() => return,
            result = tokio_tungstenite::connect_async(this.config.url.as_str()) => result,
        };

        let ws_stream = match handshake {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                Self::session_ended(&this, generation, &StreamError::ConnectionFailed(e));
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        if !this.session_opened(generation) {
            let _ = write.send(Message::Close(None)).await;
            return;
        }

        let reason = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    return;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            this.handle_text(text.as_str());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if let Err(e) = this.codec.decode_binary(&data) {
                                tracing::warn!(error = %e, "Dropping stream frame");
                                metrics::record_frame_dropped(e.reason());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                break StreamError::WebSocket(e);
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break StreamError::ClosedByPeer(frame.map(close_reason));
                        }
                        Some(Ok(_)) => {
                            // Pong and raw frames
                        }
                        Some(Err(e)) => break StreamError::WebSocket(e),
                        None => break StreamError::Ended,
                    }
                }
            }
        };

        Self::session_ended(&this, generation, &reason);
    }

    /// Returns `false` when the session was superseded while connecting.
    fn session_opened(&self, generation: u64) -> bool {
        let mut control = self.control.lock();
        if control.generation != generation {
            tracing::debug!(generation, "Discarding superseded stream session");
            return false;
        }

        control.policy.reset();
        self.set_state(ConnectionState::Connected);
        tracing::info!(url = %self.config.url, "Stream connected");
        true
    }

    fn session_ended(this: &Arc<Self>, generation: u64, reason: &StreamError) {
        let mut control = this.control.lock();
        if control.generation != generation {
            return;
        }

        control.session = None;
        this.set_state(ConnectionState::Disconnected);
        tracing::warn!(error = %reason, "Stream connection lost");
        metrics::record_stream_error(reason.kind());

        Self::schedule_reconnect(this, &mut control);
    }

    /// Arm the backoff timer, or give up once the attempt cap is reached.
    fn schedule_reconnect(this: &Arc<Self>, control: &mut Control) {
        let Some(delay) = control.policy.next_delay() else {
            tracing::warn!(
                attempts = control.policy.attempt_count(),
                "Reconnect attempts exhausted, stream stays disconnected"
            );
            metrics::record_reconnects_exhausted();
            return;
        };

        let Ok(runtime) = Handle::try_current() else {
            tracing::error!("Cannot schedule stream reconnect outside a Tokio runtime");
            return;
        };

        let attempt = control.policy.attempt_count();
        let generation = control.generation;
        let timer = CancellationToken::new();
        control.reconnect_timer = Some(timer.clone());
        this.set_state(ConnectionState::ReconnectScheduled);

        tracing::info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnecting to stream"
        );
        metrics::record_reconnect();

        let inner = Arc::clone(this);
        runtime.spawn(async move {
            tokio::select! {
                () = timer.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    Self::reconnect_fired(&inner, generation, &timer);
                }
            }
        });
    }

    fn reconnect_fired(this: &Arc<Self>, generation: u64, timer: &CancellationToken) {
        let mut control = this.control.lock();
        if timer.is_cancelled() || control.generation != generation {
            return;
        }
        control.reconnect_timer = None;

        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        Self::open_session(this, &mut control, &runtime);
    }

    fn handle_text(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(envelope) => {
                metrics::record_frame_received(&envelope.message_type);
                let outcome = self.router.dispatch(&envelope.message_type, &envelope.payload);

                if outcome.is_unrouted() {
                    tracing::trace!(message_type = %envelope.message_type, "No handlers for stream message");
                }
                if outcome.failed > 0 {
                    metrics::record_handler_failures(&envelope.message_type, outcome.failed);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed stream frame");
                metrics::record_frame_dropped(e.reason());
            }
        }
    }
}

fn close_reason(frame: CloseFrame) -> String {
    let code = u16::from(frame.code);
    if frame.reason.is_empty() {
        code.to_string()
    } else {
        format!("{} ({code})", frame.reason.as_str())
    }
}
