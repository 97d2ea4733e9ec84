//! Correlation registry: matches an asynchronous reply to the one caller
//! waiting for it.

use nahs_protocol::{CorrelationError, InstanceKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

type Delivery<T> = Result<T, CorrelationError>;
type Pending<T> = Arc<Mutex<HashMap<InstanceKey, oneshot::Sender<Delivery<T>>>>>;

fn lock<T>(pending: &Pending<T>) -> MutexGuard<'_, HashMap<InstanceKey, oneshot::Sender<Delivery<T>>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pending single-delivery waiters keyed by instance.
///
/// Every entry is a one-shot channel: a value is delivered at most once and
/// the entry is consumed by the delivery. All map mutation happens under one
/// lock, which is never held across an await. A [`Waiter`] dropped before
/// delivery removes its own entry.
pub struct CorrelationRegistry<T> {
    pending: Pending<T>,
}

impl<T: Send> CorrelationRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pending: Arc::default(),
        }
    }

    /// Create the single pending entry for `key`.
    pub async fn register(&self, key: InstanceKey) -> Result<Waiter<T>, CorrelationError> {
        let mut pending = lock(&self.pending);
        if pending.contains_key(&key) {
            return Err(CorrelationError::AlreadyPending(key.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(key.clone(), tx);
        Ok(Waiter {
            key,
            rx,
            pending: Arc::clone(&self.pending),
        })
    }

    /// Deliver `value` to the waiter for `key`, consuming the entry.
    pub async fn resolve(&self, key: &InstanceKey, value: T) -> Result<(), CorrelationError> {
        let tx = lock(&self.pending).remove(key);
        match tx {
            Some(tx) => tx
                .send(Ok(value))
                .map_err(|_| CorrelationError::NotPending(key.to_string())),
            None => {
                tracing::warn!(instance = %key, "nahs.correlation.orphan_reply");
                Err(CorrelationError::NotPending(key.to_string()))
            }
        }
    }

    /// Remove the entry for `key` and wake its waiter with a cancellation.
    /// Returns whether an entry existed.
    pub async fn discard(&self, key: &InstanceKey, reason: &str) -> bool {
        let tx = lock(&self.pending).remove(key);
        match tx {
            Some(tx) => {
                // The waiter may already be gone after a timeout.
                let _ = tx.send(Err(CorrelationError::Cancelled {
                    reason: reason.to_owned(),
                }));
                true
            }
            None => false,
        }
    }

    /// Whether a waiter is registered for `key`.
    pub async fn is_pending(&self, key: &InstanceKey) -> bool {
        lock(&self.pending).contains_key(key)
    }

    /// Number of pending waiters.
    pub async fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T: Send> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving half of a registered correlation entry.
pub struct Waiter<T> {
    key: InstanceKey,
    rx: oneshot::Receiver<Delivery<T>>,
    pending: Pending<T>,
}

impl<T> std::fmt::Debug for Waiter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter").field("key", &self.key).finish_non_exhaustive()
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        self.rx.close();
        let mut pending = lock(&self.pending);
        // Only the entry whose receiver is this one; a later registration
        // under the same key is left alone.
        if pending.get(&self.key).is_some_and(|tx| tx.is_closed()) {
            pending.remove(&self.key);
            tracing::debug!(instance = %self.key, "nahs.correlation.abandoned");
        }
    }
}

impl<T> Waiter<T> {
    /// Key this waiter is registered under.
    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    /// Suspend until the reply is resolved or the entry is discarded.
    pub async fn wait(mut self) -> Result<T, CorrelationError> {
        match (&mut self.rx).await {
            Ok(delivery) => delivery,
            Err(_) => Err(CorrelationError::Cancelled {
                reason: "registry closed".into(),
            }),
        }
    }

    /// Like [`Waiter::wait`] with an optional deadline. On expiry the entry
    /// is removed along with the waiter.
    pub async fn wait_for(self, deadline: Option<Duration>) -> Result<T, CorrelationError> {
        let Some(deadline) = deadline else {
            return self.wait().await;
        };
        let key = self.key.clone();
        match tokio::time::timeout(deadline, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(CorrelationError::TimedOut(key.to_string())),
        }
    }
}
