//! Stats calculator: transaction history -> aggregate progress.
//!
//! Used only when the backend stats endpoint does not answer. Whenever the
//! backend supplies stats they are taken verbatim.

use serde::{Deserialize, Serialize};

use crate::types::{Transaction, TransactionKind};

/// Kilograms per level
pub const KG_PER_LEVEL: f64 = 100.0;

/// Aggregate progress of one user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Kilograms, one decimal
    pub total_recycled: f64,
    pub total_transactions: u32,
    pub total_rewards: u32,
    /// Starts at 1
    pub level: u32,
    /// Progress toward the next level, 0..=99
    pub points: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            total_recycled: 0.0,
            total_transactions: 0,
            total_rewards: 0,
            level: 1,
            points: 0,
        }
    }
}

/// Derive stats from a transaction history.
///
/// `owned_rewards` is the number of owned-reward records when that list was
/// loaded; a missing or zero count falls back to counting purchases.
pub fn compute_stats(transactions: &[Transaction], owned_rewards: Option<usize>) -> Stats {
    let raw_total: f64 = transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Recycling)
        .filter_map(|t| t.weight)
        .filter(|w| w.is_finite() && *w > 0.0)
        .sum();
    let total_recycled = round_tenths(raw_total);

    let purchases = transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Purchase)
        .count();
    let total_rewards = match owned_rewards {
        Some(count) if count > 0 => count,
        _ => purchases,
    };

    let (level, points) = level_and_points(total_recycled);

    Stats {
        total_recycled,
        total_transactions: saturating_u32(transactions.len()),
        total_rewards: saturating_u32(total_rewards),
        level,
        points,
    }
}

/// Level and in-level progress for a (rounded) recycled total.
/// A remainder that rounds up to 100 stays at 99 until the level flips.
pub fn level_and_points(total_recycled: f64) -> (u32, u32) {
    let total = total_recycled.max(0.0);
    let level = (total / KG_PER_LEVEL).floor() as u32 + 1;
    let points = ((total % KG_PER_LEVEL).round() as u32).min(99);
    (level, points)
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
