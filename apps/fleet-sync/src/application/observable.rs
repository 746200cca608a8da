//! Observable State
//!
//! A value holder that tells interested parties when it changes. Stores
//! keep their state in an [`Observable`]; consumers either read the
//! current value or register for change notifications explicitly.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Shared, change-notifying state container.
///
/// Cloning yields another handle to the same value.
#[derive(Debug, Clone)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Observable<T> {
    /// Create a container holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.tx.send_modify(f);
    }

    /// Mutate the value in place, notifying only when `f` returns `true`.
    pub fn update_if<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        self.tx.send_if_modified(f)
    }

    /// Read the value through a closure without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Receiver that is notified on every change.
    ///
    /// The current value is marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone> Observable<T> {
    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Stream that yields the current value, then every subsequent change.
    #[must_use]
    pub fn changes(&self) -> WatchStream<T> {
        WatchStream::new(self.tx.subscribe())
    }
}
