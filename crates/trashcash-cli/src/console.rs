// ============================================================================
// ConsoleBridge — terminal implementation of the host capabilities
// ============================================================================
// Alerts print to stdout, confirmations and prompts read from stdin.
// Answers given as CLI flags skip the matching prompt.
// ============================================================================

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::debug;
use trashcash_core::{HapticKind, HostBridge, Prompter, UserProfile};

pub struct ConsoleBridge {
    init_data: String,
    auto_confirm: bool,
    material: Option<String>,
    weight: Option<String>,
    input: Mutex<BufReader<Stdin>>,
}

impl ConsoleBridge {
    pub fn new(init_data: String) -> Self {
        Self {
            init_data,
            auto_confirm: false,
            material: None,
            weight: None,
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    /// Answer confirmations with yes without asking
    pub fn auto_confirm(mut self, yes: bool) -> Self {
        self.auto_confirm = yes;
        self
    }

    pub fn with_answers(mut self, material: Option<String>, weight: Option<String>) -> Self {
        self.material = material;
        self.weight = weight;
        self
    }

    /// Print a prompt and read one line; None on EOF
    async fn ask(&self, prompt: &str) -> Option<String> {
        print!("{} ", prompt);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

#[async_trait]
impl HostBridge for ConsoleBridge {
    fn init_data(&self) -> String {
        self.init_data.clone()
    }

    fn user_data(&self) -> Option<UserProfile> {
        None
    }

    async fn show_alert(&self, message: &str) {
        println!("» {}", message);
    }

    async fn show_confirm(&self, message: &str) -> bool {
        if self.auto_confirm {
            println!("{} [y/N] y", message);
            return true;
        }
        self.ask(&format!("{} [y/N]", message))
            .await
            .map(|answer| is_yes(&answer))
            .unwrap_or(false)
    }

    fn haptic_feedback(&self, kind: HapticKind) {
        debug!("haptic: {:?}", kind);
    }

    async fn open_camera(&self) -> Option<String> {
        self.ask("Scan code (empty to cancel):")
            .await
            .filter(|code| !code.is_empty())
    }
}

#[async_trait]
impl Prompter for ConsoleBridge {
    async fn choose_material(&self, types: &[String]) -> Option<String> {
        if let Some(material) = &self.material {
            return Some(material.clone());
        }
        println!("Accepted materials:");
        for (i, t) in types.iter().enumerate() {
            println!("  {}. {}", i + 1, t);
        }
        let answer = self.ask("Material (number or name, empty to cancel):").await?;
        parse_choice(&answer, types)
    }

    async fn ask_weight(&self) -> Option<String> {
        if let Some(weight) = &self.weight {
            return Some(weight.clone());
        }
        self.ask("Weight in kg [1.0]:").await
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// A 1-based index into `types` or a material name typed out.
/// Names pass through unchecked; the flow rejects unaccepted ones.
pub fn parse_choice(answer: &str, types: &[String]) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    match answer.parse::<usize>() {
        Ok(n) if n >= 1 => types.get(n - 1).cloned(),
        Ok(_) => None,
        Err(_) => Some(answer.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> Vec<String> {
        vec!["plastic".into(), "paper".into()]
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("1", &types()), Some("plastic".into()));
        assert_eq!(parse_choice(" 2 ", &types()), Some("paper".into()));
        assert_eq!(parse_choice("3", &types()), None);
        assert_eq!(parse_choice("0", &types()), None);
        assert_eq!(parse_choice("", &types()), None);
        assert_eq!(parse_choice("glass", &types()), Some("glass".into()));
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes("YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[tokio::test]
    async fn test_preset_answers_skip_prompts() {
        let console = ConsoleBridge::new("dev_mode".into())
            .auto_confirm(true)
            .with_answers(Some("paper".into()), Some("2".into()));
        assert!(console.show_confirm("Buy?").await);
        assert_eq!(console.choose_material(&types()).await, Some("paper".into()));
        assert_eq!(console.ask_weight().await, Some("2".into()));
        assert_eq!(console.init_data(), "dev_mode");
    }
}
