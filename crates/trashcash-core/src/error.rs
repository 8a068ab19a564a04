//! ============================================================================
//! Errors - Failure taxonomy for every client flow
//! ============================================================================
//! - Auth: init data rejected, fatal during startup validation
//! - Network: transport failure or unexpected HTTP status, retryable by user
//! - Validation: client-side precondition failed, nothing was sent
//! - Business: backend said no (success:false / {error}), shown verbatim
//! - Parse: backend answered with a body we could not decode
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Coarse error category, used by the UI to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Network,
    Validation,
    Business,
    Parse,
}

/// Error type shared by the backend client, the ledger and the flows
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrashCashError {
    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response from {endpoint}: {reason}")]
    Parse { endpoint: String, reason: String },

    /// Backend refused the operation; the reason is passed through untouched
    #[error("{0}")]
    Business(String),

    #[error("Invalid weight: {0}")]
    InvalidWeight(String),

    #[error("QR code not recognized: {0}")]
    QrNotRecognized(String),

    #[error("Point '{point}' does not accept {material}")]
    MaterialNotAccepted { material: String, point: String },

    #[error("Recycling point not found: {0}")]
    PointNotFound(i64),

    #[error("Reward not found: {0}")]
    RewardNotFound(i64),

    #[error("Insufficient balance: need {needed} coins, have {available}")]
    InsufficientBalance { needed: i64, available: i64 },

    /// A request for the same reward/point is still outstanding
    #[error("Request already in progress: {0}")]
    InFlight(String),
}

impl TrashCashError {
    pub fn parse(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        TrashCashError::Parse {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TrashCashError::Auth(_) => ErrorKind::Auth,
            TrashCashError::Network(_) => ErrorKind::Network,
            TrashCashError::Parse { .. } => ErrorKind::Parse,
            TrashCashError::Business(_) => ErrorKind::Business,
            TrashCashError::InvalidWeight(_)
            | TrashCashError::QrNotRecognized(_)
            | TrashCashError::MaterialNotAccepted { .. }
            | TrashCashError::PointNotFound(_)
            | TrashCashError::RewardNotFound(_)
            | TrashCashError::InsufficientBalance { .. }
            | TrashCashError::InFlight(_) => ErrorKind::Validation,
        }
    }

    /// Only a failed startup validation ends the session
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Text shown to the user through the host alert
    pub fn user_message(&self) -> String {
        match self {
            TrashCashError::Auth(_) => {
                "Authorization failed. Please restart the app.".to_string()
            }
            TrashCashError::Network(_) | TrashCashError::Parse { .. } => {
                "Could not reach the server. Please try again.".to_string()
            }
            TrashCashError::QrNotRecognized(_) => {
                "QR code not recognized. Make sure you scan a TrashCash collection point code."
                    .to_string()
            }
            TrashCashError::InvalidWeight(_) => "Invalid weight".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrashCashError>;
