//! ============================================================================
//! Core Types for the TrashCash client
//! ============================================================================
//! Reference data (points, rewards), ledger records (transactions, owned
//! rewards), the host user profile, and the render effects emitted by state
//! transitions. Field names follow the backend JSON.
//! ============================================================================

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::Stats;

/// Kind of ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Recycling,
    Purchase,
    /// Anything newer than this client; kept in history, ignored by stats
    #[serde(other)]
    Other,
}

/// How a recycling report reached the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMethod {
    Qr,
    Receipt,
}

impl SubmissionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMethod::Qr => "qr",
            SubmissionMethod::Receipt => "receipt",
        }
    }
}

/// Immutable ledger record issued by the backend.
/// The client only ever replaces its cached list with a fresh server copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(with = "iso_date")]
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Signed coin delta (negative for purchases)
    pub coins: i64,
    #[serde(default)]
    pub point_id: Option<i64>,
    #[serde(default)]
    pub point_name: Option<String>,
    #[serde(default)]
    pub material_type: Option<String>,
    /// Kilograms, recycling only
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub method: Option<SubmissionMethod>,
    #[serde(default)]
    pub reward_id: Option<i64>,
    #[serde(default)]
    pub reward_name: Option<String>,
}

impl Transaction {
    /// One-line description for the history list
    pub fn describe(&self) -> String {
        match self.kind {
            TransactionKind::Recycling => format!(
                "Recycled {} ({} kg) at {}",
                self.material_type.as_deref().unwrap_or("?"),
                self.weight.unwrap_or(0.0),
                self.point_name.as_deref().unwrap_or("?"),
            ),
            TransactionKind::Purchase => format!(
                "Purchase: {}",
                self.reward_name.as_deref().unwrap_or("?")
            ),
            TransactionKind::Other => "Ledger operation".to_string(),
        }
    }

    /// Coin delta with an explicit sign for positive amounts
    pub fn signed_coins(&self) -> String {
        if self.coins > 0 {
            format!("+{}", self.coins)
        } else {
            self.coins.to_string()
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.kind {
            TransactionKind::Recycling => "♻️",
            TransactionKind::Purchase => "🎁",
            TransactionKind::Other => "💰",
        }
    }
}

/// Collection point, reference data from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecyclingPoint {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub hours: String,
    /// Accepted material types
    pub types: Vec<String>,
    pub qr_code: String,
    /// Kilometres from the user, present only for location-aware queries
    #[serde(default)]
    pub distance: Option<f64>,
}

impl RecyclingPoint {
    pub fn accepts(&self, material: &str) -> bool {
        self.types.iter().any(|t| t == material)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Promo,
    Product,
    Donation,
    #[serde(other)]
    Other,
}

impl RewardKind {
    pub fn icon(&self) -> &'static str {
        match self {
            RewardKind::Promo => "🎫",
            RewardKind::Donation => "❤️",
            RewardKind::Product | RewardKind::Other => "🎁",
        }
    }
}

/// Catalog entry that can be bought with coins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    #[serde(rename = "type")]
    pub kind: RewardKind,
    #[serde(default)]
    pub image: Option<String>,
    /// Charity receiving the coins for donation rewards
    #[serde(default)]
    pub charity_id: Option<String>,
}

impl Reward {
    /// Advisory check only; the backend re-validates every purchase
    pub fn is_affordable(&self, balance: i64) -> bool {
        balance >= self.price
    }
}

/// A reward the user has already redeemed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedReward {
    pub id: i64,
    pub reward_id: i64,
    pub reward_name: String,
    #[serde(with = "iso_date")]
    pub date: DateTime<Utc>,
    pub price: i64,
    #[serde(rename = "type")]
    pub kind: RewardKind,
}

/// Messenger user as reported by the host or the validation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            "User".to_string()
        } else {
            full.to_string()
        }
    }

    /// Avatar placeholder letter
    pub fn initial(&self) -> char {
        self.first_name
            .chars()
            .next()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('U')
    }
}

/// Geographic position used to sort points by distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Render instruction produced by a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    BalanceChanged(i64),
    StatsChanged(Stats),
    TransactionsChanged(usize),
    RewardsChanged(usize),
    OwnedRewardsChanged(usize),
    PointsChanged(usize),
    PointSelected(i64),
    /// User-facing success message
    Notice(String),
}

/// Parse the backend's ISO-8601 timestamps.
/// Offset-less values (Python `isoformat()`) are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

mod iso_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
