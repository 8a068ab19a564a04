//! ============================================================================
//! Ledger - Balance, history and derived progress of the signed-in user
//! ============================================================================
//! The backend is the source of truth. Every setter here replaces a whole
//! slice with the value a completed request returned; nothing is predicted
//! or decremented locally.
//! ============================================================================

pub mod achievements;
pub mod cache;
pub mod stats;

pub use achievements::{compute_achievements, Achievement, Metric, MilestoneDef, DEFAULT_CATALOG};
pub use cache::{CacheStats, LedgerCache, LedgerSnapshot};
pub use stats::{compute_stats, level_and_points, Stats};

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::types::{OwnedReward, Transaction};

/// Where the effective stats came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    Backend,
    Computed,
}

/// Client-side copy of the user's ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    balance: i64,
    transactions: Vec<Transaction>,
    owned_rewards: Vec<OwnedReward>,
    owned_rewards_loaded: bool,
    backend_stats: Option<Stats>,
    stats: Stats,
    stats_source: StatsSource,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            balance: 0,
            transactions: Vec::new(),
            owned_rewards: Vec::new(),
            owned_rewards_loaded: false,
            backend_stats: None,
            stats: Stats::default(),
            stats_source: StatsSource::Computed,
        }
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn owned_rewards(&self) -> &[OwnedReward] {
        &self.owned_rewards
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_source(&self) -> StatsSource {
        self.stats_source
    }

    /// Replace the balance with a server-confirmed value
    pub fn set_balance(&mut self, balance: i64) {
        debug!("Ledger balance {} -> {}", self.balance, balance);
        self.balance = balance;
    }

    pub fn set_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
    }

    pub fn set_owned_rewards(&mut self, owned: Vec<OwnedReward>) {
        self.owned_rewards = owned;
        self.owned_rewards_loaded = true;
    }

    /// Use stats supplied by the backend verbatim
    pub fn apply_backend_stats(&mut self, stats: Stats) {
        self.backend_stats = Some(stats);
        self.stats = stats;
        self.stats_source = StatsSource::Backend;
    }

    /// Fall back to the local calculator
    pub fn recompute_stats(&mut self) -> Stats {
        let owned = self
            .owned_rewards_loaded
            .then_some(self.owned_rewards.len());
        self.stats = compute_stats(&self.transactions, owned);
        self.stats_source = StatsSource::Computed;
        self.stats
    }

    /// Last stats the backend reported, even if since superseded
    pub fn backend_stats(&self) -> Option<&Stats> {
        self.backend_stats.as_ref()
    }

    /// Transactions not present in a previous id set
    pub fn transactions_since(&self, previous: &HashSet<i64>) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| !previous.contains(&t.id))
            .cloned()
            .collect()
    }

    pub fn transaction_ids(&self) -> HashSet<i64> {
        self.transactions.iter().map(|t| t.id).collect()
    }

    pub fn achievements(&self) -> Vec<Achievement> {
        compute_achievements(&self.stats, DEFAULT_CATALOG)
    }

    /// Server-confirmed slices for the offline cache
    pub fn snapshot(&self, user_id: i64) -> LedgerSnapshot {
        LedgerSnapshot {
            user_id,
            balance: self.balance,
            transactions: self.transactions.clone(),
            owned_rewards: self.owned_rewards.clone(),
            saved_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RewardKind, TransactionKind};
    use chrono::Utc;

    fn tx(id: i64, kind: TransactionKind, weight: Option<f64>) -> Transaction {
        Transaction {
            id,
            date: Utc::now(),
            kind,
            coins: 10,
            point_id: None,
            point_name: None,
            material_type: None,
            weight,
            method: None,
            reward_id: None,
            reward_name: None,
        }
    }

    fn owned(id: i64) -> OwnedReward {
        OwnedReward {
            id,
            reward_id: 1,
            reward_name: "Coffee".into(),
            date: Utc::now(),
            price: 50,
            kind: RewardKind::Promo,
        }
    }

    #[test]
    fn test_new_ledger() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance(), 0);
        assert_eq!(*ledger.stats(), Stats::default());
        assert_eq!(ledger.stats_source(), StatsSource::Computed);
    }

    #[test]
    fn test_backend_stats_used_verbatim() {
        let mut ledger = Ledger::new();
        ledger.set_transactions(vec![tx(1, TransactionKind::Recycling, Some(3.0))]);
        let server = Stats {
            total_recycled: 42.0,
            total_transactions: 7,
            total_rewards: 2,
            level: 1,
            points: 42,
        };
        ledger.apply_backend_stats(server);
        assert_eq!(*ledger.stats(), server);
        assert_eq!(ledger.stats_source(), StatsSource::Backend);
    }

    #[test]
    fn test_recompute_prefers_loaded_owned_rewards() {
        let mut ledger = Ledger::new();
        ledger.set_transactions(vec![
            tx(1, TransactionKind::Recycling, Some(12.0)),
            tx(2, TransactionKind::Purchase, None),
        ]);
        assert_eq!(ledger.recompute_stats().total_rewards, 1);

        ledger.set_owned_rewards(vec![owned(1), owned(2), owned(3)]);
        let stats = ledger.recompute_stats();
        assert_eq!(stats.total_rewards, 3);
        assert_eq!(stats.total_recycled, 12.0);
        assert_eq!(ledger.stats_source(), StatsSource::Computed);
        assert_eq!(ledger.achievements()[0].id, "first_10kg");
    }

    #[test]
    fn test_transactions_since() {
        let mut ledger = Ledger::new();
        ledger.set_transactions(vec![tx(1, TransactionKind::Recycling, Some(1.0))]);
        let before = ledger.transaction_ids();

        ledger.set_transactions(vec![
            tx(2, TransactionKind::Purchase, None),
            tx(1, TransactionKind::Recycling, Some(1.0)),
        ]);
        let delta = ledger.transactions_since(&before);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].id, 2);
    }

    #[test]
    fn test_snapshot_carries_confirmed_slices() {
        let mut ledger = Ledger::new();
        ledger.set_balance(120);
        ledger.set_owned_rewards(vec![owned(5)]);
        let snap = ledger.snapshot(123456);
        assert_eq!(snap.user_id, 123456);
        assert_eq!(snap.balance, 120);
        assert_eq!(snap.owned_rewards.len(), 1);
    }
}
