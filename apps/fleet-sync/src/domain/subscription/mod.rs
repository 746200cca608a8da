//! Message Routing
//!
//! Type-keyed subscription registry for decoded stream payloads.
//!
//! # Design
//!
//! The router tracks:
//! - An ordered handler list per message type (registration order)
//! - A unique id per registration, used to unsubscribe
//!
//! Dispatch works on a snapshot of the handler list taken when the dispatch
//! starts. Handlers may subscribe or unsubscribe from inside a dispatch
//! without deadlocking; a handler added during a dispatch first runs on the
//! next one.
//!
//! Every handler call is isolated. A handler that returns an error or
//! panics is logged and counted, and the remaining handlers still run.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

// =============================================================================
// Types
// =============================================================================

/// Identifier of one handler registration.
pub type HandlerId = u64;

/// A message handler. Receives the raw payload of a matching frame.
pub type Handler = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

/// Failure reported by a handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload did not match the shape the handler expects.
    #[error("invalid {message_type} payload: {source}")]
    Payload {
        /// Message type being handled.
        message_type: String,
        /// Decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// Handler-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Result of delivering one payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers invoked.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl DispatchOutcome {
    /// Whether no handler was registered for the message type.
    #[must_use]
    pub const fn is_unrouted(&self) -> bool {
        self.delivered == 0
    }
}

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    handler: Handler,
}

#[derive(Default)]
struct RouterInner {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl RouterInner {
    fn remove(&self, message_type: &str, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(message_type) else {
            return false;
        };

        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;

        if list.is_empty() {
            handlers.remove(message_type);
        }

        removed
    }
}

// =============================================================================
// Router
// =============================================================================

/// Type-keyed publish/subscribe dispatcher.
///
/// Cloning is cheap; all clones share one registry.
///
/// # Example
///
/// ```rust
/// use fleet_sync::domain::subscription::MessageRouter;
///
/// let router = MessageRouter::new();
/// let sub = router.on("stats", |_payload| Ok(()));
///
/// let outcome = router.dispatch("stats", &serde_json::json!({}));
/// assert_eq!(outcome.delivered, 1);
///
/// sub.unsubscribe();
/// assert!(router.dispatch("stats", &serde_json::json!({})).is_unrouted());
/// ```
#[derive(Clone, Default)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.inner.handlers.read();
        let counts: HashMap<&str, usize> = handlers
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("MessageRouter")
            .field("handlers", &counts)
            .finish()
    }
}

impl MessageRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `message_type`.
    pub fn on<F>(&self, message_type: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on_shared(message_type, Arc::new(handler))
    }

    /// Register a shared handler for `message_type`.
    ///
    /// Registering the same handler twice for one type keeps a single
    /// registration; the returned subscription refers to it.
    pub fn on_shared(&self, message_type: impl Into<String>, handler: Handler) -> Subscription {
        let message_type = message_type.into();
        let mut handlers = self.inner.handlers.write();
        let list = handlers.entry(message_type.clone()).or_default();

        let id = if let Some(existing) = list.iter().find(|r| Arc::ptr_eq(&r.handler, &handler)) {
            existing.id
        } else {
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            list.push(Registration { id, handler });
            id
        };

        tracing::trace!(message_type = %message_type, handler_id = id, "Handler registered");

        Subscription {
            router: Arc::downgrade(&self.inner),
            message_type,
            id,
        }
    }

    /// Register a handler that receives the payload decoded as `T`.
    ///
    /// A payload that does not decode is reported as a handler failure.
    pub fn on_payload<T, F>(&self, message_type: impl Into<String>, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let message_type = message_type.into();
        let key = message_type.clone();
        self.on(message_type, move |payload| {
            let decoded =
                T::deserialize(payload).map_err(|source| HandlerError::Payload {
                    message_type: key.clone(),
                    source,
                })?;
            handler(decoded)
        })
    }

    /// Remove one handler, or every handler for `message_type` when `handler`
    /// is `None`.
    pub fn off(&self, message_type: &str, handler: Option<HandlerId>) {
        match handler {
            Some(id) => {
                self.inner.remove(message_type, id);
            }
            None => {
                self.inner.handlers.write().remove(message_type);
            }
        }
    }

    /// Deliver `payload` to every handler registered for `message_type`.
    ///
    /// A type without handlers is a no-op.
    pub fn dispatch(&self, message_type: &str, payload: &Value) -> DispatchOutcome {
        let snapshot: Vec<Registration> = match self.inner.handlers.read().get(message_type) {
            Some(list) => list.clone(),
            None => return DispatchOutcome::default(),
        };

        let mut outcome = DispatchOutcome::default();

        for registration in &snapshot {
            outcome.delivered += 1;

            match catch_unwind(AssertUnwindSafe(|| (registration.handler)(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    tracing::error!(
                        message_type,
                        handler_id = registration.id,
                        error = %e,
                        "Handler failed"
                    );
                }
                Err(panic) => {
                    outcome.failed += 1;
                    tracing::error!(
                        message_type,
                        handler_id = registration.id,
                        panic = %panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                }
            }
        }

        outcome
    }

    /// Number of handlers registered for `message_type`.
    #[must_use]
    pub fn handler_count(&self, message_type: &str) -> usize {
        self.inner
            .handlers
            .read()
            .get(message_type)
            .map_or(0, Vec::len)
    }

    /// Message types with at least one handler.
    #[must_use]
    pub fn message_types(&self) -> Vec<String> {
        self.inner.handlers.read().keys().cloned().collect()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// Subscription handle
// =============================================================================

/// Handle returned by [`MessageRouter::on`].
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it. Unsubscribing more than once,
/// or after the router is gone, is a no-op.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    router: Weak<RouterInner>,
    message_type: String,
    id: HandlerId,
}

impl Subscription {
    /// Registration id.
    pub const fn id(&self) -> HandlerId {
        self.id
    }

    /// Message type this subscription listens to.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Remove the handler from the router.
    pub fn unsubscribe(&self) {
        if let Some(router) = self.router.upgrade()
            && router.remove(&self.message_type, self.id)
        {
            tracing::trace!(
                message_type = %self.message_type,
                handler_id = self.id,
                "Handler unregistered"
            );
        }
    }
}
