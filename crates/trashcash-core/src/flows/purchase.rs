//! Reward purchase: local preconditions and the result of a confirmed buy.
//!
//! The affordability check is advisory. The backend re-validates every
//! purchase and its answer always wins.

use crate::error::{Result, TrashCashError};
use crate::types::{OwnedReward, Reward, Transaction};

pub const PURCHASE_SUCCESS: &str = "Reward purchased successfully!";

/// Find the reward and refuse it locally when the balance is short
pub fn check_purchase(rewards: &[Reward], reward_id: i64, balance: i64) -> Result<&Reward> {
    let reward = rewards
        .iter()
        .find(|r| r.id == reward_id)
        .ok_or(TrashCashError::RewardNotFound(reward_id))?;

    if !reward.is_affordable(balance) {
        return Err(TrashCashError::InsufficientBalance {
            needed: reward.price,
            available: balance,
        });
    }
    Ok(reward)
}

/// Question put to the user before any request is sent
pub fn confirm_prompt(reward: &Reward) -> String {
    format!(
        "Are you sure you want to buy \"{}\" for {} coins?",
        reward.name, reward.price
    )
}

/// Server-confirmed result of a purchase
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseReceipt {
    pub reward_id: i64,
    pub new_balance: i64,
    /// Transactions that appeared in the refreshed history
    pub transactions_delta: Vec<Transaction>,
    pub purchase: Option<OwnedReward>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Purchased(PurchaseReceipt),
    /// User declined the confirmation; nothing was sent
    Declined,
}
