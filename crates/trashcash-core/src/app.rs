//! ============================================================================
//! App - Session orchestration over backend, host bridge and ledger
//! ============================================================================
//! Owns the application state explicitly (no ambient singleton). Every flow:
//! - checks its local preconditions before touching the network
//! - mutates state only after the backend confirmed, with the server's values
//! - reports errors once, at the flow boundary (alert + error haptic)
//! - returns its outcome together with the render effects it produced
//! ============================================================================

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::bridge::{HapticKind, HostBridge, Prompter};
use crate::error::{Result, TrashCashError};
use crate::flows::{
    check_purchase, confirm_prompt, parse_weight, resolve_qr, success_message, weight_or_default,
    PurchaseOutcome, PurchaseReceipt, SubmissionOutcome, SubmissionReceipt, SubmissionRequest,
    PURCHASE_SUCCESS,
};
use crate::guard::{FlowKey, InFlightGuard, InFlightTicket};
use crate::ledger::{Achievement, Ledger, LedgerCache, StatsSource};
use crate::types::{Effect, GeoPoint, RecyclingPoint, Reward, UserProfile};

/// Independently loaded piece of state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slice {
    Balance,
    Points,
    Rewards,
    Transactions,
    OwnedRewards,
    Stats,
}

/// Slices the offline cache keeps
const LEDGER_SLICES: [Slice; 3] = [Slice::Balance, Slice::Transactions, Slice::OwnedRewards];

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub user: Option<UserProfile>,
    pub user_id: Option<i64>,
    pub ledger: Ledger,
    pub points: Vec<RecyclingPoint>,
    pub rewards: Vec<Reward>,
    pub selected_point: Option<RecyclingPoint>,
    loaded: HashSet<Slice>,
    /// Ledger slices still showing offline data, and when it was saved
    from_cache: HashSet<Slice>,
    cache_saved_at: Option<i64>,
}

impl AppState {
    pub fn is_loaded(&self, slice: Slice) -> bool {
        self.loaded.contains(&slice)
    }

    pub fn achievements(&self) -> Vec<Achievement> {
        self.ledger.achievements()
    }

    fn mark_loaded(&mut self, slice: Slice) {
        self.loaded.insert(slice);
        self.from_cache.remove(&slice);
        if self.from_cache.is_empty() {
            self.cache_saved_at = None;
        }
    }
}

/// Outcome of a flow plus what the UI has to re-render
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    pub outcome: T,
    pub effects: Vec<Effect>,
}

impl<T> Transition<T> {
    fn quiet(outcome: T) -> Self {
        Self {
            outcome,
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceFailure {
    pub slice: Slice,
    pub error: TrashCashError,
}

/// Result of the initial fan-out load
#[derive(Debug, Clone, PartialEq)]
pub struct StartupReport {
    pub user: Option<UserProfile>,
    pub failures: Vec<SliceFailure>,
    /// Slices filled from the offline cache after their load failed
    pub restored: Vec<Slice>,
    pub stats_source: StatsSource,
    pub effects: Vec<Effect>,
}

/// Mini-app session
pub struct App {
    backend: Arc<dyn Backend>,
    bridge: Arc<dyn HostBridge>,
    prompter: Arc<dyn Prompter>,
    state: RwLock<AppState>,
    guard: InFlightGuard,
    cache: Option<Arc<LedgerCache>>,
    history_limit: Option<u32>,
    location: Option<GeoPoint>,
}

impl App {
    pub fn new(
        backend: Arc<dyn Backend>,
        bridge: Arc<dyn HostBridge>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            backend,
            bridge,
            prompter,
            state: RwLock::new(AppState::default()),
            guard: InFlightGuard::new(),
            cache: None,
            history_limit: None,
            location: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<LedgerCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_history_limit(mut self, limit: Option<u32>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    /// Copy of the current state
    pub async fn state(&self) -> AppState {
        self.state.read().await.clone()
    }

    pub fn guard(&self) -> &InFlightGuard {
        &self.guard
    }

    // ========================================================================
    // Startup & refresh
    // ========================================================================

    /// Validate the session, then load every slice concurrently.
    /// Only a failed validation is an error; slice failures are reported.
    pub async fn start(&self) -> Result<StartupReport> {
        let init_data = self.bridge.init_data();
        let reply = match self.backend.validate(&init_data).await {
            Ok(reply) => reply,
            Err(TrashCashError::Auth(reason)) => return self.fail(TrashCashError::Auth(reason)).await,
            Err(other) => return self.fail(TrashCashError::Auth(other.to_string())).await,
        };
        if !reply.valid {
            return self
                .fail(TrashCashError::Auth("init data rejected".to_string()))
                .await;
        }

        let user = reply.user.or_else(|| self.bridge.user_data());
        let user_id = reply.user_id.or(user.as_ref().map(|u| u.id));
        {
            let mut state = self.state.write().await;
            state.user = user.clone();
            state.user_id = user_id;
        }
        info!("Session validated for user {:?}", user_id);

        let (balance, points, rewards, transactions, owned) = tokio::join!(
            self.load(Slice::Balance),
            self.load(Slice::Points),
            self.load(Slice::Rewards),
            self.load(Slice::Transactions),
            self.load(Slice::OwnedRewards),
        );

        let mut effects = Vec::new();
        let mut failures = Vec::new();
        for (slice, result) in [
            (Slice::Balance, balance),
            (Slice::Points, points),
            (Slice::Rewards, rewards),
            (Slice::Transactions, transactions),
            (Slice::OwnedRewards, owned),
        ] {
            match result {
                Ok(effect) => effects.push(effect),
                Err(error) => {
                    warn!("Initial {:?} load failed: {}", slice, error);
                    failures.push(SliceFailure { slice, error });
                }
            }
        }

        let restored = self.restore_from_cache(&failures).await;
        let (stats_effect, stats_source) = self.reload_stats().await;
        effects.push(stats_effect);
        self.persist().await;

        info!(
            "Startup complete: {} slice(s) failed, stats from {:?}",
            failures.len(),
            stats_source
        );

        Ok(StartupReport {
            user,
            failures,
            restored,
            stats_source,
            effects,
        })
    }

    /// Reload one slice from the backend
    pub async fn refresh(&self, slice: Slice) -> Result<Effect> {
        let effect = self.load(slice).await?;
        if LEDGER_SLICES.contains(&slice) {
            self.persist().await;
        }
        Ok(effect)
    }

    async fn load(&self, slice: Slice) -> Result<Effect> {
        let init_data = self.bridge.init_data();
        debug!("Loading {:?}", slice);

        let effect = match slice {
            Slice::Balance => {
                let balance = self.backend.balance(&init_data).await?;
                self.apply_balance(balance).await
            }
            Slice::Points => {
                let points = self.backend.recycling_points(self.location).await?;
                let count = points.len();
                self.state.write().await.points = points;
                Effect::PointsChanged(count)
            }
            Slice::Rewards => {
                let rewards = self.backend.rewards().await?;
                let count = rewards.len();
                self.state.write().await.rewards = rewards;
                Effect::RewardsChanged(count)
            }
            Slice::Transactions => {
                let transactions = self
                    .backend
                    .transactions(&init_data, self.history_limit)
                    .await?;
                let count = transactions.len();
                self.state.write().await.ledger.set_transactions(transactions);
                Effect::TransactionsChanged(count)
            }
            Slice::OwnedRewards => {
                let owned = self.backend.my_rewards(&init_data).await?;
                let count = owned.len();
                self.state.write().await.ledger.set_owned_rewards(owned);
                Effect::OwnedRewardsChanged(count)
            }
            Slice::Stats => return Ok(self.reload_stats().await.0),
        };

        self.state.write().await.mark_loaded(slice);
        Ok(effect)
    }

    async fn apply_balance(&self, balance: i64) -> Effect {
        let mut state = self.state.write().await;
        state.ledger.set_balance(balance);
        state.mark_loaded(Slice::Balance);
        Effect::BalanceChanged(balance)
    }

    /// Backend stats when the endpoint answers, calculator otherwise
    async fn reload_stats(&self) -> (Effect, StatsSource) {
        let fetched = self.backend.stats(&self.bridge.init_data()).await;

        let mut state = self.state.write().await;
        let stats = match fetched {
            Ok(stats) => {
                state.ledger.apply_backend_stats(stats);
                stats
            }
            Err(e) => {
                warn!("Stats endpoint unavailable, computing locally: {}", e);
                state.ledger.recompute_stats()
            }
        };
        state.loaded.insert(Slice::Stats);
        info!(
            "Stats: {} kg, level {}, {} pts",
            stats.total_recycled, stats.level, stats.points
        );
        (Effect::StatsChanged(stats), state.ledger.stats_source())
    }

    /// Refresh the ledger after a confirmed flow. Failures keep the old slice.
    async fn refresh_after_flow(&self, include_rewards: bool) -> Vec<Effect> {
        let (rewards, owned, transactions) = tokio::join!(
            async {
                if include_rewards {
                    Some(self.load(Slice::Rewards).await)
                } else {
                    None
                }
            },
            self.load(Slice::OwnedRewards),
            self.load(Slice::Transactions),
        );

        let mut effects = Vec::new();
        for result in [rewards, Some(owned), Some(transactions)].into_iter().flatten() {
            match result {
                Ok(effect) => effects.push(effect),
                Err(e) => warn!("Refresh after flow failed, keeping previous data: {}", e),
            }
        }
        effects.push(self.reload_stats().await.0);
        effects
    }

    async fn restore_from_cache(&self, failures: &[SliceFailure]) -> Vec<Slice> {
        let Some(cache) = &self.cache else {
            return Vec::new();
        };
        let failed: Vec<Slice> = failures
            .iter()
            .map(|f| f.slice)
            .filter(|s| LEDGER_SLICES.contains(s))
            .collect();
        if failed.is_empty() {
            return failed;
        }

        let mut state = self.state.write().await;
        let Some(user_id) = state.user_id else {
            return Vec::new();
        };
        let snapshot = match cache.load(user_id) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Ledger cache unreadable: {}", e);
                return Vec::new();
            }
        };

        for slice in &failed {
            match slice {
                Slice::Balance => state.ledger.set_balance(snapshot.balance),
                Slice::Transactions => state.ledger.set_transactions(snapshot.transactions.clone()),
                Slice::OwnedRewards => state.ledger.set_owned_rewards(snapshot.owned_rewards.clone()),
                _ => continue,
            }
            state.loaded.insert(*slice);
            state.from_cache.insert(*slice);
        }
        state.cache_saved_at = Some(snapshot.saved_at);
        info!(
            "Restored {:?} from ledger cache saved at {}",
            failed, snapshot.saved_at
        );
        failed
    }

    /// Store the confirmed ledger once every cached slice has been loaded.
    /// While any slice still shows offline data the snapshot keeps its age.
    async fn persist(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        let state = self.state.read().await;
        let Some(user_id) = state.user_id else {
            return;
        };
        if !LEDGER_SLICES.iter().all(|s| state.loaded.contains(s)) {
            debug!("Ledger incomplete, not caching");
            return;
        }
        let mut snapshot = state.ledger.snapshot(user_id);
        if let Some(saved_at) = state.cache_saved_at {
            snapshot.saved_at = saved_at;
        }
        if let Err(e) = cache.store(&snapshot) {
            warn!("Failed to cache ledger: {}", e);
        }
    }

    // ========================================================================
    // Points
    // ========================================================================

    /// Fetch point detail and mark it selected
    pub async fn show_point(&self, point_id: i64) -> Result<Transition<RecyclingPoint>> {
        match self.backend.recycling_point(point_id).await {
            Ok(point) => {
                self.bridge.haptic_feedback(HapticKind::Light);
                self.state.write().await.selected_point = Some(point.clone());
                Ok(Transition {
                    outcome: point,
                    effects: vec![Effect::PointSelected(point_id)],
                })
            }
            Err(e) => self.fail(e).await,
        }
    }

    // ========================================================================
    // Purchase
    // ========================================================================

    /// Buy a reward after an explicit confirmation
    pub async fn purchase(&self, reward_id: i64) -> Result<Transition<PurchaseOutcome>> {
        match self.run_purchase(reward_id).await {
            Ok(transition) => Ok(transition),
            Err(e) => self.fail(e).await,
        }
    }

    async fn run_purchase(&self, reward_id: i64) -> Result<Transition<PurchaseOutcome>> {
        let _ticket = self.guard.try_acquire(FlowKey::Purchase(reward_id))?;

        let (reward, previous_ids) = {
            let state = self.state.read().await;
            let reward = check_purchase(&state.rewards, reward_id, state.ledger.balance())?.clone();
            (reward, state.ledger.transaction_ids())
        };

        if !self.bridge.show_confirm(&confirm_prompt(&reward)).await {
            info!("Purchase of reward {} declined", reward_id);
            return Ok(Transition::quiet(PurchaseOutcome::Declined));
        }

        let ack = self
            .backend
            .purchase(&self.bridge.init_data(), reward_id)
            .await?;
        info!(
            "Purchased reward {} ({}), balance now {}",
            reward_id, reward.name, ack.balance
        );

        let mut effects = vec![self.apply_balance(ack.balance).await];
        effects.extend(self.refresh_after_flow(true).await);
        let transactions_delta = self.state.read().await.ledger.transactions_since(&previous_ids);
        self.persist().await;

        self.bridge.haptic_feedback(HapticKind::Success);
        self.bridge.show_alert(PURCHASE_SUCCESS).await;
        effects.push(Effect::Notice(PURCHASE_SUCCESS.to_string()));

        Ok(Transition {
            outcome: PurchaseOutcome::Purchased(PurchaseReceipt {
                reward_id,
                new_balance: ack.balance,
                transactions_delta,
                purchase: ack.purchase,
            }),
            effects,
        })
    }

    // ========================================================================
    // Recycling submission
    // ========================================================================

    /// Open the camera and run the QR flow on the scanned code
    pub async fn scan_qr(&self) -> Result<Transition<SubmissionOutcome>> {
        self.bridge.haptic_feedback(HapticKind::Light);
        match self.bridge.open_camera().await {
            Some(code) => self.handle_qr_code(&code).await,
            None => {
                debug!("Camera closed without a code");
                Ok(Transition::quiet(SubmissionOutcome::Aborted))
            }
        }
    }

    pub async fn handle_qr_code(&self, code: &str) -> Result<Transition<SubmissionOutcome>> {
        match self.run_qr(code).await {
            Ok(transition) => Ok(transition),
            Err(e) => self.fail(e).await,
        }
    }

    async fn run_qr(&self, code: &str) -> Result<Transition<SubmissionOutcome>> {
        if self.state.read().await.points.is_empty() {
            self.load(Slice::Points).await?;
        }
        let point = {
            let state = self.state.read().await;
            resolve_qr(&state.points, code)?.clone()
        };
        let ticket = self.guard.try_acquire(FlowKey::Submission(point.id))?;

        let Some(material) = self.prompter.choose_material(&point.types).await else {
            info!("Material choice cancelled at point {}", point.id);
            return Ok(Transition::quiet(SubmissionOutcome::Aborted));
        };
        let weight = weight_or_default(self.prompter.ask_weight().await.as_deref())?;
        let request = SubmissionRequest::qr(&point, &material, weight)?;

        self.send_submission(request, ticket).await
    }

    /// Report recycling with a receipt photo (data URL)
    pub async fn submit_receipt(
        &self,
        point_id: i64,
        photo_data_url: String,
        material: &str,
        weight: &str,
    ) -> Result<Transition<SubmissionOutcome>> {
        match self
            .run_receipt(point_id, photo_data_url, material, weight)
            .await
        {
            Ok(transition) => Ok(transition),
            Err(e) => self.fail(e).await,
        }
    }

    async fn run_receipt(
        &self,
        point_id: i64,
        photo_data_url: String,
        material: &str,
        weight: &str,
    ) -> Result<Transition<SubmissionOutcome>> {
        let weight = parse_weight(weight)?;

        let cached = self
            .state
            .read()
            .await
            .points
            .iter()
            .find(|p| p.id == point_id)
            .cloned();
        let point = match cached {
            Some(point) => point,
            None => self
                .backend
                .recycling_point(point_id)
                .await
                .map_err(|e| match e {
                    TrashCashError::Business(_) => TrashCashError::PointNotFound(point_id),
                    other => other,
                })?,
        };

        let ticket = self.guard.try_acquire(FlowKey::Submission(point.id))?;
        let request = SubmissionRequest::receipt(&point, photo_data_url, material, weight)?;

        self.send_submission(request, ticket).await
    }

    async fn send_submission(
        &self,
        request: SubmissionRequest,
        _ticket: InFlightTicket,
    ) -> Result<Transition<SubmissionOutcome>> {
        let ack = self.backend.submit(&self.bridge.init_data(), &request).await?;
        info!(
            "Submitted {} kg of {} at point {}: +{} coins, balance now {}",
            request.weight, request.material_type, request.point_id, ack.coins, ack.balance
        );

        let mut effects = vec![self.apply_balance(ack.balance).await];
        effects.extend(self.refresh_after_flow(false).await);
        self.persist().await;

        let message = success_message(ack.coins, ack.balance);
        self.bridge.haptic_feedback(HapticKind::Success);
        self.bridge.show_alert(&message).await;
        effects.push(Effect::Notice(message));

        Ok(Transition {
            outcome: SubmissionOutcome::Submitted(SubmissionReceipt {
                point_id: request.point_id,
                new_balance: ack.balance,
                coins_awarded: ack.coins,
                transaction: ack.transaction,
            }),
            effects,
        })
    }

    /// Report an error to the user and hand it back
    async fn fail<T>(&self, err: TrashCashError) -> Result<T> {
        if err.is_fatal() {
            error!("{}", err);
        } else {
            warn!("{}", err);
        }
        self.bridge.haptic_feedback(HapticKind::Error);
        self.bridge.show_alert(&err.user_message()).await;
        Err(err)
    }
}
