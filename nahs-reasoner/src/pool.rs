//! Resource pool: the bikes docked at one station.

use std::collections::{HashSet, VecDeque};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct PoolState {
    available: VecDeque<String>,
    reserved: HashSet<String>,
}

impl PoolState {
    fn contains(&self, id: &str) -> bool {
        self.reserved.contains(id) || self.available.iter().any(|a| a == id)
    }
}

/// Available queue plus reserved set of resource identifiers.
///
/// An identifier is in at most one of the two at any time. Reservation pops
/// and inserts under one lock, so concurrent callers never receive the same
/// identifier.
#[derive(Debug, Default)]
pub struct ResourcePool {
    state: Mutex<PoolState>,
}

impl ResourcePool {
    /// Create a pool with `ids` available, in order. Duplicates are ignored.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = PoolState::default();
        for id in ids {
            let id = id.into();
            if !state.contains(&id) {
                state.available.push_back(id);
            }
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Take the first available identifier and mark it reserved.
    pub async fn reserve(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        let id = state.available.pop_front()?;
        state.reserved.insert(id.clone());
        Some(id)
    }

    /// Reserve exactly `n` identifiers, or none at all.
    pub async fn reserve_many(&self, n: usize) -> Option<Vec<String>> {
        let mut state = self.state.lock().await;
        if state.available.len() < n {
            return None;
        }
        let ids: Vec<String> = state.available.drain(..n).collect();
        state.reserved.extend(ids.iter().cloned());
        Some(ids)
    }

    /// Forget a reserved identifier: the resource left the pool.
    pub async fn release(&self, id: &str) -> bool {
        self.state.lock().await.reserved.remove(id)
    }

    /// Make `id` available again. No-op if it is already available.
    pub async fn dock(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.reserved.remove(id);
        if state.available.iter().any(|a| a == id) {
            return false;
        }
        state.available.push_back(id.to_owned());
        true
    }

    /// Whether `id` is available or reserved.
    pub async fn has(&self, id: &str) -> bool {
        self.state.lock().await.contains(id)
    }

    /// Number of available identifiers.
    pub async fn available(&self) -> usize {
        self.state.lock().await.available.len()
    }

    /// Number of reserved identifiers.
    pub async fn reserved(&self) -> usize {
        self.state.lock().await.reserved.len()
    }

    /// Available identifiers in queue order.
    pub async fn available_ids(&self) -> Vec<String> {
        self.state.lock().await.available.iter().cloned().collect()
    }
}
