// ============================================================================
// LedgerCache — Offline ledger snapshots (redb)
// ============================================================================
// Last server-confirmed balance, history and owned rewards per user.
// Read only when the matching backend load fails. Stats are never stored.
// Default path: ~/.trashcash/ledger.redb (override via TRASHCASH_CACHE_PATH)
// ============================================================================

use anyhow::{anyhow, Result};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{OwnedReward, Transaction};

const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Server-confirmed ledger slices of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub user_id: i64,
    pub balance: i64,
    pub transactions: Vec<Transaction>,
    pub owned_rewards: Vec<OwnedReward>,
    /// Unix seconds
    pub saved_at: i64,
}

/// Cache summary for the CLI
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub path: PathBuf,
    pub snapshots: usize,
    pub total_transactions: usize,
}

pub struct LedgerCache {
    db: Database,
    path: PathBuf,
}

impl LedgerCache {
    /// Open (or create) the cache.
    /// If `path` is None, uses TRASHCASH_CACHE_PATH or ~/.trashcash/ledger.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_cache_path()?,
        };

        info!("Opening ledger cache at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open ledger cache: {}", e))?;

        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| anyhow!("Failed to create snapshots table: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let key = snapshot_key(snapshot.user_id);
        let value = bincode::serialize(snapshot)
            .map_err(|e| anyhow!("Failed to serialize snapshot: {}", e))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| anyhow!("Failed to open snapshots table: {}", e))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert snapshot: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!(
            "Cached ledger for user {} ({} transactions)",
            snapshot.user_id,
            snapshot.transactions.len()
        );
        Ok(())
    }

    pub fn load(&self, user_id: i64) -> Result<Option<LedgerSnapshot>> {
        let key = snapshot_key(user_id);

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(SNAPSHOTS)
            .map_err(|e| anyhow!("Failed to open snapshots table: {}", e))?;

        match table
            .get(key.as_str())
            .map_err(|e| anyhow!("Failed to get snapshot: {}", e))?
        {
            Some(value) => {
                let snapshot: LedgerSnapshot = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize snapshot: {}", e))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Drop the snapshot of one user. Returns whether one existed.
    pub fn clear(&self, user_id: i64) -> Result<bool> {
        let key = snapshot_key(user_id);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn
                .open_table(SNAPSHOTS)
                .map_err(|e| anyhow!("Failed to open snapshots table: {}", e))?;
            removed = table
                .remove(key.as_str())
                .map_err(|e| anyhow!("Failed to remove snapshot: {}", e))?
                .is_some();
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            info!("Cleared cached ledger for user {}", user_id);
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(SNAPSHOTS)
            .map_err(|e| anyhow!("Failed to open snapshots table: {}", e))?;

        let mut snapshots = 0;
        let mut total_transactions = 0;
        let iter = table
            .range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate snapshots: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let snapshot: LedgerSnapshot = bincode::deserialize(value.value())
                .map_err(|e| anyhow!("Failed to deserialize snapshot: {}", e))?;
            snapshots += 1;
            total_transactions += snapshot.transactions.len();
        }

        Ok(CacheStats {
            path: self.path.clone(),
            snapshots,
            total_transactions,
        })
    }
}

fn snapshot_key(user_id: i64) -> String {
    format!("ledger:{}", user_id)
}

fn default_cache_path() -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var("TRASHCASH_CACHE_PATH") {
        return Ok(PathBuf::from(env_path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
    let dir = home.join(".trashcash");
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow!("Failed to create .trashcash directory: {}", e))?;
    Ok(dir.join("ledger.redb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RewardKind, SubmissionMethod, TransactionKind};
    use chrono::{TimeZone, Utc};

    fn snapshot(user_id: i64) -> LedgerSnapshot {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        LedgerSnapshot {
            user_id,
            balance: 120,
            transactions: vec![
                Transaction {
                    id: 1,
                    date,
                    kind: TransactionKind::Recycling,
                    coins: 20,
                    point_id: Some(1),
                    point_name: Some("EcoPoint Nevsky".into()),
                    material_type: Some("paper".into()),
                    weight: Some(2.0),
                    method: Some(SubmissionMethod::Qr),
                    reward_id: None,
                    reward_name: None,
                },
                Transaction {
                    id: 2,
                    date,
                    kind: TransactionKind::Other,
                    coins: 5,
                    point_id: None,
                    point_name: None,
                    material_type: None,
                    weight: None,
                    method: None,
                    reward_id: None,
                    reward_name: None,
                },
            ],
            owned_rewards: vec![OwnedReward {
                id: 1,
                reward_id: 2,
                reward_name: "Eco bag".into(),
                date,
                price: 100,
                kind: RewardKind::Product,
            }],
            saved_at: date.timestamp(),
        }
    }

    fn open_temp() -> (tempfile::TempDir, LedgerCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = LedgerCache::open(Some(dir.path().join("ledger.redb").as_path())).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_store_and_load() {
        let (_dir, cache) = open_temp();
        assert_eq!(cache.load(123456).unwrap(), None);

        let snap = snapshot(123456);
        cache.store(&snap).unwrap();
        assert_eq!(cache.load(123456).unwrap(), Some(snap));
        assert_eq!(cache.load(7).unwrap(), None);
    }

    #[test]
    fn test_store_replaces_previous_snapshot() {
        let (_dir, cache) = open_temp();
        let mut snap = snapshot(1);
        cache.store(&snap).unwrap();
        snap.balance = 20;
        snap.transactions.truncate(1);
        cache.store(&snap).unwrap();

        let loaded = cache.load(1).unwrap().unwrap();
        assert_eq!(loaded.balance, 20);
        assert_eq!(loaded.transactions.len(), 1);
    }

    #[test]
    fn test_clear_and_stats() {
        let (_dir, cache) = open_temp();
        cache.store(&snapshot(1)).unwrap();
        cache.store(&snapshot(2)).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.snapshots, 2);
        assert_eq!(stats.total_transactions, 4);

        assert!(cache.clear(1).unwrap());
        assert!(!cache.clear(1).unwrap());
        assert_eq!(cache.stats().unwrap().snapshots, 1);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");
        {
            let cache = LedgerCache::open(Some(path.as_path())).unwrap();
            cache.store(&snapshot(9)).unwrap();
        }
        let cache = LedgerCache::open(Some(path.as_path())).unwrap();
        assert_eq!(cache.load(9).unwrap().map(|s| s.balance), Some(120));
    }
}
