//! ============================================================================
//! In-Flight Guard - One outstanding request per reward / point
//! ============================================================================
//! A second purchase or submission for the same key is refused locally while
//! the first is still waiting for the backend. Tickets release on drop, so
//! error paths and early returns free the key too.
//! ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TrashCashError};

/// What a request is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKey {
    /// Reward id
    Purchase(i64),
    /// Recycling point id
    Submission(i64),
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKey::Purchase(id) => write!(f, "purchase:{}", id),
            FlowKey::Submission(id) => write!(f, "submission:{}", id),
        }
    }
}

type HeldMap = Arc<Mutex<HashMap<FlowKey, Uuid>>>;

#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    held: HeldMap,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, failing with `InFlight` if it is already held
    pub fn try_acquire(&self, key: FlowKey) -> Result<InFlightTicket> {
        let mut held = lock(&self.held);
        if held.contains_key(&key) {
            debug!("Rejected duplicate request {}", key);
            return Err(TrashCashError::InFlight(key.to_string()));
        }
        let id = Uuid::new_v4();
        held.insert(key, id);
        debug!("Acquired {} ({})", key, id);
        Ok(InFlightTicket {
            key,
            id,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, key: FlowKey) -> bool {
        lock(&self.held).contains_key(&key)
    }

    pub fn held_count(&self) -> usize {
        lock(&self.held).len()
    }
}

/// Proof of an outstanding request; releases its key when dropped
#[derive(Debug)]
pub struct InFlightTicket {
    key: FlowKey,
    id: Uuid,
    held: HeldMap,
}

impl InFlightTicket {
    pub fn key(&self) -> FlowKey {
        self.key
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let mut held = lock(&self.held);
        if held.get(&self.key) == Some(&self.id) {
            held.remove(&self.key);
            debug!("Released {} ({})", self.key, self.id);
        }
    }
}

// A panic while holding the lock leaves the map itself consistent
fn lock(held: &HeldMap) -> MutexGuard<'_, HashMap<FlowKey, Uuid>> {
    held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let guard = InFlightGuard::new();
        let _ticket = guard.try_acquire(FlowKey::Purchase(1)).unwrap();
        assert_eq!(
            guard.try_acquire(FlowKey::Purchase(1)).unwrap_err(),
            TrashCashError::InFlight("purchase:1".into())
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let guard = InFlightGuard::new();
        let _a = guard.try_acquire(FlowKey::Purchase(1)).unwrap();
        let _b = guard.try_acquire(FlowKey::Purchase(2)).unwrap();
        let _c = guard.try_acquire(FlowKey::Submission(1)).unwrap();
        assert_eq!(guard.held_count(), 3);
    }

    #[test]
    fn test_drop_releases() {
        let guard = InFlightGuard::new();
        {
            let ticket = guard.try_acquire(FlowKey::Submission(4)).unwrap();
            assert_eq!(ticket.key(), FlowKey::Submission(4));
            assert!(guard.is_held(FlowKey::Submission(4)));
        }
        assert!(!guard.is_held(FlowKey::Submission(4)));
        assert!(guard.try_acquire(FlowKey::Submission(4)).is_ok());
    }

    #[test]
    fn test_clones_share_state() {
        let guard = InFlightGuard::new();
        let other = guard.clone();
        let _ticket = guard.try_acquire(FlowKey::Purchase(9)).unwrap();
        assert!(other.try_acquire(FlowKey::Purchase(9)).is_err());
    }
}
