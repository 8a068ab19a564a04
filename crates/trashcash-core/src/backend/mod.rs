//! ============================================================================
//! Backend - Typed interface to the rewards HTTP API
//! ============================================================================
//! One method per endpoint. Replies are explicit per-endpoint types so a
//! malformed body fails with a Parse error instead of yielding empty fields.
//! Purchase and submission replies are folded into ack types: `success:false`
//! becomes a Business error carrying the backend's reason.
//! ============================================================================

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, TrashCashError};
use crate::flows::SubmissionRequest;
use crate::ledger::Stats;
use crate::types::{GeoPoint, OwnedReward, RecyclingPoint, Reward, Transaction, UserProfile};

/// Rewards backend. The server is authoritative for everything it returns.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/validate`
    async fn validate(&self, init_data: &str) -> Result<ValidateReply>;

    /// `GET /api/user/balance`
    async fn balance(&self, init_data: &str) -> Result<i64>;

    /// `GET /api/user/stats`
    async fn stats(&self, init_data: &str) -> Result<Stats>;

    /// `GET /api/recycling-points`, sorted by distance when `near` is given
    async fn recycling_points(&self, near: Option<GeoPoint>) -> Result<Vec<RecyclingPoint>>;

    /// `GET /api/recycling-points/{id}`
    async fn recycling_point(&self, id: i64) -> Result<RecyclingPoint>;

    /// `GET /api/rewards`
    async fn rewards(&self) -> Result<Vec<Reward>>;

    /// `GET /api/rewards/my`
    async fn my_rewards(&self, init_data: &str) -> Result<Vec<OwnedReward>>;

    /// `POST /api/rewards/{id}/purchase`
    async fn purchase(&self, init_data: &str, reward_id: i64) -> Result<PurchaseAck>;

    /// `POST /api/recycling/submit`
    async fn submit(&self, init_data: &str, request: &SubmissionRequest) -> Result<SubmitAck>;

    /// `GET /api/transactions`, newest first
    async fn transactions(&self, init_data: &str, limit: Option<u32>) -> Result<Vec<Transaction>>;
}

// ============================================================================
// Wire replies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidateReply {
    pub valid: bool,
    #[serde(rename = "userId", default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BalanceReply {
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsReply {
    pub stats: Stats,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PointsReply {
    pub points: Vec<RecyclingPoint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RewardsReply {
    pub rewards: Vec<Reward>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnedRewardsReply {
    pub rewards: Vec<OwnedReward>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionsReply {
    pub transactions: Vec<Transaction>,
}

/// Error body of any non-2xx reply
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorReply {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PurchaseReply {
    pub success: bool,
    #[serde(default)]
    pub balance: Option<i64>,
    #[serde(default)]
    pub purchase: Option<OwnedReward>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitReply {
    pub success: bool,
    #[serde(default)]
    pub coins: Option<i64>,
    #[serde(default)]
    pub balance: Option<i64>,
    #[serde(default)]
    pub transaction: Option<Transaction>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Confirmed purchase
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseAck {
    pub balance: i64,
    pub purchase: Option<OwnedReward>,
}

/// Confirmed submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitAck {
    pub coins: i64,
    pub balance: i64,
    pub transaction: Option<Transaction>,
}

const UNKNOWN_REFUSAL: &str = "Operation failed";

impl PurchaseReply {
    pub(crate) fn into_ack(self, endpoint: &str) -> Result<PurchaseAck> {
        if !self.success {
            return Err(TrashCashError::Business(
                self.error.unwrap_or_else(|| UNKNOWN_REFUSAL.to_string()),
            ));
        }
        let balance = self
            .balance
            .ok_or_else(|| TrashCashError::parse(endpoint, "success reply without balance"))?;
        Ok(PurchaseAck {
            balance,
            purchase: self.purchase,
        })
    }
}

impl SubmitReply {
    pub(crate) fn into_ack(self, endpoint: &str) -> Result<SubmitAck> {
        if !self.success {
            return Err(TrashCashError::Business(
                self.error.unwrap_or_else(|| UNKNOWN_REFUSAL.to_string()),
            ));
        }
        match (self.coins, self.balance) {
            (Some(coins), Some(balance)) => Ok(SubmitAck {
                coins,
                balance,
                transaction: self.transaction,
            }),
            _ => Err(TrashCashError::parse(
                endpoint,
                "success reply without coins/balance",
            )),
        }
    }
}
