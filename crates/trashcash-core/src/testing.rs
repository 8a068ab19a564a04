//! In-memory backend and host used by the flow tests.
//! The fake backend behaves like the paired server and records every call.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::backend::{Backend, PurchaseAck, SubmitAck, ValidateReply};
use crate::bridge::{HapticKind, HostBridge};
use crate::error::{Result, TrashCashError};
use crate::flows::SubmissionRequest;
use crate::ledger::{compute_stats, Stats};
use crate::types::{
    GeoPoint, OwnedReward, RecyclingPoint, Reward, RewardKind, SubmissionMethod, Transaction,
    TransactionKind, UserProfile,
};

pub const TEST_USER: i64 = 123456;

pub fn point(id: i64, qr: &str, types: &[&str]) -> RecyclingPoint {
    RecyclingPoint {
        id,
        name: format!("EcoPoint #{}", id),
        address: format!("Nevsky pr., {}", id),
        lat: 59.93,
        lng: 30.33,
        hours: "09:00-21:00".to_string(),
        types: types.iter().map(|t| t.to_string()).collect(),
        qr_code: qr.to_string(),
        distance: None,
    }
}

pub fn reward(id: i64, name: &str, price: i64) -> Reward {
    Reward {
        id,
        name: name.to_string(),
        description: format!("{} from a partner", name),
        price,
        kind: RewardKind::Product,
        image: None,
        charity_id: None,
    }
}

pub fn recycling_tx(id: i64, weight: f64, coins: i64) -> Transaction {
    Transaction {
        id,
        date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        kind: TransactionKind::Recycling,
        coins,
        point_id: Some(1),
        point_name: Some("EcoPoint #1".to_string()),
        material_type: Some("plastic".to_string()),
        weight: Some(weight),
        method: Some(SubmissionMethod::Qr),
        reward_id: None,
        reward_name: None,
    }
}

/// Server stand-in. Endpoints listed in `failing` answer with a network error.
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    pub valid: bool,
    pub balance: Mutex<i64>,
    pub points: Vec<RecyclingPoint>,
    pub rewards: Vec<Reward>,
    pub transactions: Mutex<Vec<Transaction>>,
    pub owned: Mutex<Vec<OwnedReward>>,
    /// Fixed reply for the next submissions instead of the simulated one
    pub submit_override: Mutex<Option<SubmitAck>>,
    /// Business refusal for purchases
    pub purchase_refusal: Mutex<Option<String>>,
    pub delay: Option<Duration>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            valid: true,
            balance: Mutex::new(100),
            points: vec![
                point(1, "TRASH_001", &["plastic", "paper", "glass"]),
                point(2, "TRASH_002", &["paper"]),
            ],
            rewards: vec![reward(1, "Coffee", 50), reward(2, "Eco bag", 150)],
            transactions: Mutex::new(vec![recycling_tx(1, 12.0, 100)]),
            owned: Mutex::new(Vec::new()),
            submit_override: Mutex::new(None),
            purchase_refusal: Mutex::new(None),
            delay: None,
        }
    }

    pub fn failing(self, endpoint: &'static str) -> Self {
        self.failing.lock().unwrap().insert(endpoint);
        self
    }

    /// Bring a failing endpoint back
    pub fn recover(&self, endpoint: &'static str) {
        self.failing.lock().unwrap().remove(endpoint);
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == endpoint)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_submission(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.starts_with("submit:"))
            .cloned()
    }

    async fn call(&self, endpoint: &'static str) -> Result<()> {
        self.record(endpoint.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(endpoint) {
            return Err(TrashCashError::Network(format!("{} unavailable", endpoint)));
        }
        Ok(())
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_tx_id(&self) -> i64 {
        self.transactions.lock().unwrap().len() as i64 + 1
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn validate(&self, init_data: &str) -> Result<ValidateReply> {
        self.call("validate").await?;
        if init_data.is_empty() {
            return Err(TrashCashError::Auth("init data missing".to_string()));
        }
        Ok(ValidateReply {
            valid: self.valid,
            user_id: Some(TEST_USER),
            user: Some(UserProfile {
                id: TEST_USER,
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                username: "test_user".to_string(),
                photo_url: None,
                language_code: None,
            }),
        })
    }

    async fn balance(&self, _init_data: &str) -> Result<i64> {
        self.call("balance").await?;
        Ok(*self.balance.lock().unwrap())
    }

    async fn stats(&self, _init_data: &str) -> Result<Stats> {
        self.call("stats").await?;
        let txs = self.transactions.lock().unwrap();
        let owned = self.owned.lock().unwrap().len();
        Ok(compute_stats(&txs, Some(owned)))
    }

    async fn recycling_points(&self, _near: Option<GeoPoint>) -> Result<Vec<RecyclingPoint>> {
        self.call("points").await?;
        Ok(self.points.clone())
    }

    async fn recycling_point(&self, id: i64) -> Result<RecyclingPoint> {
        self.call("point").await?;
        self.points
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| TrashCashError::Business("Point not found".to_string()))
    }

    async fn rewards(&self) -> Result<Vec<Reward>> {
        self.call("rewards").await?;
        Ok(self.rewards.clone())
    }

    async fn my_rewards(&self, _init_data: &str) -> Result<Vec<OwnedReward>> {
        self.call("my_rewards").await?;
        Ok(self.owned.lock().unwrap().clone())
    }

    async fn purchase(&self, _init_data: &str, reward_id: i64) -> Result<PurchaseAck> {
        self.call("purchase").await?;
        if let Some(reason) = self.purchase_refusal.lock().unwrap().clone() {
            return Err(TrashCashError::Business(reason));
        }
        let reward = self
            .rewards
            .iter()
            .find(|r| r.id == reward_id)
            .cloned()
            .ok_or_else(|| TrashCashError::Business("Reward not found".to_string()))?;

        let mut balance = self.balance.lock().unwrap();
        if *balance < reward.price {
            return Err(TrashCashError::Business("Недостаточно средств".to_string()));
        }
        *balance -= reward.price;

        let date = Utc::now();
        let purchase = OwnedReward {
            id: self.owned.lock().unwrap().len() as i64 + 1,
            reward_id,
            reward_name: reward.name.clone(),
            date,
            price: reward.price,
            kind: reward.kind,
        };
        self.owned.lock().unwrap().push(purchase.clone());

        let tx = Transaction {
            id: self.next_tx_id(),
            date,
            kind: TransactionKind::Purchase,
            coins: -reward.price,
            point_id: None,
            point_name: None,
            material_type: None,
            weight: None,
            method: None,
            reward_id: Some(reward_id),
            reward_name: Some(reward.name),
        };
        self.transactions.lock().unwrap().insert(0, tx);

        Ok(PurchaseAck {
            balance: *balance,
            purchase: Some(purchase),
        })
    }

    async fn submit(&self, _init_data: &str, request: &SubmissionRequest) -> Result<SubmitAck> {
        self.record(format!(
            "submit:{}:{}:{}:{}",
            request.method.as_str(),
            request.point_id,
            request.material_type,
            request.weight
        ));
        self.call("submit").await?;

        let coins = (request.weight * 10.0) as i64;
        let tx = Transaction {
            id: self.next_tx_id(),
            date: Utc::now(),
            kind: TransactionKind::Recycling,
            coins,
            point_id: Some(request.point_id),
            point_name: Some(format!("EcoPoint #{}", request.point_id)),
            material_type: Some(request.material_type.clone()),
            weight: Some(request.weight),
            method: Some(request.method),
            reward_id: None,
            reward_name: None,
        };
        self.transactions.lock().unwrap().insert(0, tx.clone());

        if let Some(ack) = self.submit_override.lock().unwrap().clone() {
            return Ok(ack);
        }
        let mut balance = self.balance.lock().unwrap();
        *balance += coins;
        Ok(SubmitAck {
            coins,
            balance: *balance,
            transaction: Some(tx),
        })
    }

    async fn transactions(&self, _init_data: &str, limit: Option<u32>) -> Result<Vec<Transaction>> {
        self.call("transactions").await?;
        let txs = self.transactions.lock().unwrap();
        let limit = limit.unwrap_or(50) as usize;
        Ok(txs.iter().take(limit).cloned().collect())
    }
}

/// Host stand-in that records every dialog and haptic
pub struct FakeBridge {
    pub confirm: bool,
    pub camera: Option<String>,
    pub alerts: Mutex<Vec<String>>,
    pub confirms: Mutex<Vec<String>>,
    pub haptics: Mutex<Vec<HapticKind>>,
}

impl FakeBridge {
    pub fn new() -> Self {
        Self {
            confirm: true,
            camera: None,
            alerts: Mutex::new(Vec::new()),
            confirms: Mutex::new(Vec::new()),
            haptics: Mutex::new(Vec::new()),
        }
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn haptics(&self) -> Vec<HapticKind> {
        self.haptics.lock().unwrap().clone()
    }

    pub fn confirm_count(&self) -> usize {
        self.confirms.lock().unwrap().len()
    }
}

#[async_trait]
impl HostBridge for FakeBridge {
    fn init_data(&self) -> String {
        "dev_mode".to_string()
    }

    fn user_data(&self) -> Option<UserProfile> {
        None
    }

    async fn show_alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    async fn show_confirm(&self, message: &str) -> bool {
        self.confirms.lock().unwrap().push(message.to_string());
        self.confirm
    }

    fn haptic_feedback(&self, kind: HapticKind) {
        self.haptics.lock().unwrap().push(kind);
    }

    async fn open_camera(&self) -> Option<String> {
        self.camera.clone()
    }
}
