//! ============================================================================
//! TRASHCASH-CORE: Recycling rewards client
//! ============================================================================
//! Client-side ledger and flows for the TrashCash mini-app:
//! - Ledger store, stats calculator and achievement engine
//! - Reward purchase and recycling submission flows
//! - Typed HTTP client for the rewards backend (reqwest)
//! - Host bridge capabilities and an in-flight request guard
//! - Offline ledger cache (redb)
//! ============================================================================

pub mod app;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod flows;
pub mod guard;
pub mod ledger;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use app::{App, AppState, Slice, SliceFailure, StartupReport, Transition};
pub use backend::{Backend, HttpBackend};
pub use bridge::{DevBridge, FixedPrompter, HapticKind, HostBridge, Prompter};
pub use config::{ClientConfig, ConfigError};
pub use error::{ErrorKind, Result, TrashCashError};
pub use flows::{PurchaseOutcome, SubmissionOutcome};
pub use guard::{FlowKey, InFlightGuard};
pub use ledger::{Achievement, Ledger, LedgerCache, Stats, StatsSource};
pub use types::*;
