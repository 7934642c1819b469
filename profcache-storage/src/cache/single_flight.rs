//! Per-key single-flight gate.
//!
//! Serializes upstream fetches for the same key. The orchestrator holds a
//! [`FlightGuard`] while fetching and writing back; a concurrent request for
//! the same key waits on the guard, then re-reads the backend and joins the
//! entry written by the leader.
//!
//! Each table slot counts the requests holding or waiting on its key. The
//! count is released by [`FlightGuard`]'s drop, which also runs when a
//! waiting request is cancelled, and the slot is removed once it reaches
//! zero, so the table only ever contains in-flight keys.

use std::sync::Arc;

use dashmap::DashMap;
use profcache_core::CacheKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Slot {
    lock: Arc<Mutex<()>>,
    /// Holders plus waiters. Only changed under the table's shard lock.
    users: usize,
}

/// Lock table keyed by cache key.
#[derive(Debug, Default)]
pub struct SingleFlight {
    locks: DashMap<CacheKey, Slot>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds the flight for `key`, then take it.
    pub async fn acquire(&self, key: &CacheKey) -> FlightGuard<'_> {
        let lock = {
            let mut slot = self.locks.entry(key.clone()).or_default();
            slot.users += 1;
            slot.lock.clone()
        };

        // Registered before waiting so a cancelled wait still releases the slot.
        let mut flight = FlightGuard {
            flight: self,
            key: key.clone(),
            guard: None,
        };
        flight.guard = Some(lock.lock_owned().await);
        flight
    }

    /// Number of keys with a holder or waiters.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

/// Held while a request owns, or waits for, the flight for a key.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.flight.locks.remove_if_mut(&self.key, |_, slot| {
            slot.users -= 1;
            slot.users == 0
        });
    }
}
