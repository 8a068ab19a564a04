//! ============================================================================
//! HTTP Backend - reqwest client for the rewards API
//! ============================================================================
//! - GET endpoints carry initData URL-encoded in the query string
//! - POST endpoints carry initData in the JSON body and the X-Init-Data header
//! - Reply decoding is a pure function of (status, body), see `decode_reply`
//! ============================================================================

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    Backend, BalanceReply, ErrorReply, OwnedRewardsReply, PointsReply, PurchaseAck,
    PurchaseReply, RewardsReply, StatsReply, SubmitAck, SubmitReply, TransactionsReply,
    ValidateReply,
};
use crate::error::{Result, TrashCashError};
use crate::flows::SubmissionRequest;
use crate::ledger::Stats;
use crate::types::{GeoPoint, OwnedReward, RecyclingPoint, Reward, Transaction};

/// Header the backend reads the caller's init data from
pub const INIT_DATA_HEADER: &str = "X-Init-Data";

/// Backend client over HTTP/JSON
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct InitDataBody<'a> {
    #[serde(rename = "initData")]
    init_data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    init_data: &'a str,
    method: &'static str,
    point_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt_photo: Option<&'a str>,
    material_type: &'a str,
    weight: f64,
}

impl HttpBackend {
    /// Create a client for the given base URL (e.g. `http://localhost:5000`)
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = with_query(&format!("{}{}", self.base_url, path), query);
        debug!("GET {}", path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TrashCashError::Network(format!("GET {} failed: {}", path, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TrashCashError::Network(format!("Reading {} failed: {}", path, e)))?;

        decode_reply(path, status, &body)
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        init_data: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", path);

        let response = self
            .client
            .post(&url)
            .header(INIT_DATA_HEADER, init_data)
            .json(body)
            .send()
            .await
            .map_err(|e| TrashCashError::Network(format!("POST {} failed: {}", path, e)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TrashCashError::Network(format!("Reading {} failed: {}", path, e)))?;

        decode_reply(path, status, &text)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn validate(&self, init_data: &str) -> Result<ValidateReply> {
        let reply: ValidateReply = self
            .post("/api/validate", init_data, &InitDataBody { init_data })
            .await?;
        if !reply.valid {
            return Err(TrashCashError::Auth("init data rejected".to_string()));
        }
        info!("Session validated for user {:?}", reply.user_id);
        Ok(reply)
    }

    async fn balance(&self, init_data: &str) -> Result<i64> {
        let reply: BalanceReply = self
            .get("/api/user/balance", &[("initData", init_data.to_string())])
            .await?;
        Ok(reply.balance)
    }

    async fn stats(&self, init_data: &str) -> Result<Stats> {
        let reply: StatsReply = self
            .get("/api/user/stats", &[("initData", init_data.to_string())])
            .await?;
        Ok(reply.stats)
    }

    async fn recycling_points(&self, near: Option<GeoPoint>) -> Result<Vec<RecyclingPoint>> {
        let query: Vec<(&str, String)> = match near {
            Some(p) => vec![("lat", p.lat.to_string()), ("lng", p.lng.to_string())],
            None => Vec::new(),
        };
        let reply: PointsReply = self.get("/api/recycling-points", &query).await?;
        Ok(reply.points)
    }

    async fn recycling_point(&self, id: i64) -> Result<RecyclingPoint> {
        self.get(&format!("/api/recycling-points/{}", id), &[]).await
    }

    async fn rewards(&self) -> Result<Vec<Reward>> {
        let reply: RewardsReply = self.get("/api/rewards", &[]).await?;
        Ok(reply.rewards)
    }

    async fn my_rewards(&self, init_data: &str) -> Result<Vec<OwnedReward>> {
        let reply: OwnedRewardsReply = self
            .get("/api/rewards/my", &[("initData", init_data.to_string())])
            .await?;
        Ok(reply.rewards)
    }

    async fn purchase(&self, init_data: &str, reward_id: i64) -> Result<PurchaseAck> {
        let path = format!("/api/rewards/{}/purchase", reward_id);
        let reply: PurchaseReply = self
            .post(&path, init_data, &InitDataBody { init_data })
            .await?;
        let ack = reply.into_ack(&path);
        if let Err(e) = &ack {
            warn!("Purchase of reward {} refused: {}", reward_id, e);
        }
        ack
    }

    async fn submit(&self, init_data: &str, request: &SubmissionRequest) -> Result<SubmitAck> {
        let path = "/api/recycling/submit";
        let body = SubmitBody {
            init_data,
            method: request.method.as_str(),
            point_id: request.point_id,
            qr_code: request.qr_code.as_deref(),
            receipt_photo: request.receipt_photo.as_deref(),
            material_type: &request.material_type,
            weight: request.weight,
        };
        let reply: SubmitReply = self.post(path, init_data, &body).await?;
        let ack = reply.into_ack(path);
        if let Err(e) = &ack {
            warn!("Submission at point {} refused: {}", request.point_id, e);
        }
        ack
    }

    async fn transactions(&self, init_data: &str, limit: Option<u32>) -> Result<Vec<Transaction>> {
        let mut query = vec![("initData", init_data.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let reply: TransactionsReply = self.get("/api/transactions", &query).await?;
        Ok(reply.transactions)
    }
}

/// Append URL-encoded query parameters
pub fn with_query(url: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", url, query)
}

/// Map an HTTP reply onto the error taxonomy.
///
/// - 2xx: typed body, or `Parse` when it does not decode
/// - 401: `Auth`
/// - other non-2xx with an `{error}` body: `Business`, reason verbatim
/// - other non-2xx: `Network`
pub fn decode_reply<T: DeserializeOwned>(endpoint: &str, status: u16, body: &str) -> Result<T> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body).map_err(|e| TrashCashError::parse(endpoint, e));
    }

    let reason = serde_json::from_str::<ErrorReply>(body).ok().map(|r| r.error);

    if status == 401 {
        return Err(TrashCashError::Auth(
            reason.unwrap_or_else(|| "Unauthorized".to_string()),
        ));
    }

    match reason {
        Some(reason) => Err(TrashCashError::Business(reason)),
        None => Err(TrashCashError::Network(format!(
            "HTTP {} from {}",
            status, endpoint
        ))),
    }
}
