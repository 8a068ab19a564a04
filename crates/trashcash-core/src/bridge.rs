//! ============================================================================
//! Host Bridge - Capabilities consumed from the messenger host
//! ============================================================================
//! The core needs exactly six things from its host: init data, the user
//! profile, alerts, yes/no confirmations, haptics, and the camera. Dialogs
//! are futures so flows can await an answer and be driven by fakes in tests.
//! ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DEV_INIT_DATA;
use crate::types::UserProfile;

/// Haptic pattern requested from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticKind {
    Light,
    Medium,
    Heavy,
    Success,
    Warning,
    Error,
}

/// Capabilities provided by the host app
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Signed launch parameters, forwarded to the backend on every call
    fn init_data(&self) -> String;

    fn user_data(&self) -> Option<UserProfile>;

    async fn show_alert(&self, message: &str);

    /// Yes/no dialog
    async fn show_confirm(&self, message: &str) -> bool;

    fn haptic_feedback(&self, kind: HapticKind);

    /// Scan a code; None when the user closes the camera
    async fn open_camera(&self) -> Option<String>;
}

/// Interactive selection used by the QR flow
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Pick one of the point's accepted materials; None cancels the flow
    async fn choose_material(&self, types: &[String]) -> Option<String>;

    /// Raw weight input in kg; None or empty means the default weight
    async fn ask_weight(&self) -> Option<String>;
}

/// Host development mode: fixed test user, dialogs answered by policy
#[derive(Debug, Clone)]
pub struct DevBridge {
    confirm: bool,
    scanned_code: Option<String>,
}

impl Default for DevBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl DevBridge {
    pub const USER_ID: i64 = 123456;

    pub fn new() -> Self {
        Self {
            confirm: true,
            scanned_code: None,
        }
    }

    /// Answer every confirmation with `answer`
    pub fn confirming(mut self, answer: bool) -> Self {
        self.confirm = answer;
        self
    }

    /// Code returned by the camera
    pub fn with_scanned_code(mut self, code: impl Into<String>) -> Self {
        self.scanned_code = Some(code.into());
        self
    }

    pub fn test_user() -> UserProfile {
        UserProfile {
            id: Self::USER_ID,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            username: "test_user".to_string(),
            photo_url: None,
            language_code: Some("ru".to_string()),
        }
    }
}

#[async_trait]
impl HostBridge for DevBridge {
    fn init_data(&self) -> String {
        DEV_INIT_DATA.to_string()
    }

    fn user_data(&self) -> Option<UserProfile> {
        Some(Self::test_user())
    }

    async fn show_alert(&self, message: &str) {
        info!("[dev alert] {}", message);
    }

    async fn show_confirm(&self, message: &str) -> bool {
        info!("[dev confirm] {} -> {}", message, self.confirm);
        self.confirm
    }

    fn haptic_feedback(&self, kind: HapticKind) {
        info!("[dev haptic] {:?}", kind);
    }

    async fn open_camera(&self) -> Option<String> {
        self.scanned_code.clone()
    }
}

/// Prompter with preset answers (CLI flags, scripted sessions)
#[derive(Debug, Clone, Default)]
pub struct FixedPrompter {
    pub material: Option<String>,
    pub weight: Option<String>,
}

#[async_trait]
impl Prompter for FixedPrompter {
    async fn choose_material(&self, types: &[String]) -> Option<String> {
        match &self.material {
            Some(m) => Some(m.clone()),
            // a point with a single material needs no choice
            None if types.len() == 1 => types.first().cloned(),
            None => None,
        }
    }

    async fn ask_weight(&self) -> Option<String> {
        self.weight.clone()
    }
}
