//! Balance-check protocol clients.
//!
//! One implementation per provider kind, all behind [`BalanceCheckClient`].
//! Each speaks its service's own billing endpoint and normalizes the answer
//! into a [`BalanceResult`]; the aggregator never sees wire formats.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::ApiKey;
use crate::error::{Error, Result};
use crate::types::BalanceResult;

/// Capability interface for querying the account balance behind one key.
///
/// Implementations return `Ok(BalanceResult)` for any in-protocol answer
/// (including "this key is invalid") and `Err` for transport or decode
/// failures. The aggregator isolates both the same way.
#[async_trait]
pub trait BalanceCheckClient: Send + Sync {
    async fn check_balance(&self, api_key: &ApiKey, base_url: &str) -> Result<BalanceResult>;
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Issue an authorized GET and decode the 2xx body as `T`.
async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    api_key: &ApiKey,
) -> Result<T> {
    let response = client
        .get(url)
        .bearer_auth(api_key.expose_secret())
        .send()
        .await
        .map_err(|e| Error::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::from_api_body(status.as_u16(), &body));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::Request(e.to_string()))?;
    Ok(serde_json::from_str(&body)?)
}

/// Coerce a JSON number-or-string into f64.
///
/// SiliconFlow and DeepSeek report balances as decimal strings.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OpenRouter
// ────────────────────────────────────────────────────────────────────────────

/// OpenRouter credits endpoint (`GET /v1/credits`).
pub struct OpenRouterBalance {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OpenRouterCredits {
    data: OpenRouterCreditsData,
}

#[derive(Debug, Deserialize)]
struct OpenRouterCreditsData {
    #[serde(default)]
    total_credits: f64,
    #[serde(default)]
    total_usage: f64,
}

impl OpenRouterBalance {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BalanceCheckClient for OpenRouterBalance {
    async fn check_balance(&self, api_key: &ApiKey, base_url: &str) -> Result<BalanceResult> {
        let url = join_url(base_url, "/v1/credits");
        let credits: OpenRouterCredits = get_json(&self.client, &url, api_key).await?;
        let remaining = credits.data.total_credits - credits.data.total_usage;
        Ok(BalanceResult::valid(remaining, "USD"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SiliconFlow
// ────────────────────────────────────────────────────────────────────────────

/// SiliconFlow user-info endpoint (`GET /v1/user/info`).
pub struct SiliconFlowBalance {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SiliconFlowUserInfo {
    data: SiliconFlowUserData,
}

#[derive(Debug, Deserialize)]
struct SiliconFlowUserData {
    #[serde(default, rename = "totalBalance")]
    total_balance: Option<Value>,
}

impl SiliconFlowBalance {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BalanceCheckClient for SiliconFlowBalance {
    async fn check_balance(&self, api_key: &ApiKey, base_url: &str) -> Result<BalanceResult> {
        let url = join_url(base_url, "/v1/user/info");
        let info: SiliconFlowUserInfo = get_json(&self.client, &url, api_key).await?;
        match info.data.total_balance.as_ref().and_then(coerce_f64) {
            Some(balance) => Ok(BalanceResult::valid(balance, "CNY")),
            None => Ok(BalanceResult::invalid("unparseable balance in user info")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DeepSeek
// ────────────────────────────────────────────────────────────────────────────

/// DeepSeek balance endpoint (`GET /user/balance`).
pub struct DeepSeekBalance {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DeepSeekBalanceResponse {
    #[serde(default)]
    balance_infos: Vec<DeepSeekBalanceInfo>,
}

#[derive(Debug, Deserialize)]
struct DeepSeekBalanceInfo {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    total_balance: Option<Value>,
}

impl DeepSeekBalance {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BalanceCheckClient for DeepSeekBalance {
    async fn check_balance(&self, api_key: &ApiKey, base_url: &str) -> Result<BalanceResult> {
        let url = join_url(base_url, "/user/balance");
        let response: DeepSeekBalanceResponse = get_json(&self.client, &url, api_key).await?;
        let Some(info) = response.balance_infos.first() else {
            return Ok(BalanceResult::invalid("no balance info for this account"));
        };
        match info.total_balance.as_ref().and_then(coerce_f64) {
            Some(balance) => Ok(BalanceResult::valid(
                balance,
                info.currency.clone().unwrap_or_else(|| "CNY".to_string()),
            )),
            None => Ok(BalanceResult::invalid("unparseable balance info")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generic OpenAI-compatible
// ────────────────────────────────────────────────────────────────────────────

/// Credit-grants endpoint exposed by OpenAI-compatible aggregators
/// (`GET /v1/dashboard/billing/credit_grants`).
///
/// Only dispatched for `openai`-kind providers on a non-default base URL;
/// the official endpoint no longer serves it.
pub struct OpenAiCompatibleBalance {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreditGrants {
    #[serde(default)]
    total_available: f64,
}

impl OpenAiCompatibleBalance {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BalanceCheckClient for OpenAiCompatibleBalance {
    async fn check_balance(&self, api_key: &ApiKey, base_url: &str) -> Result<BalanceResult> {
        let url = join_url(base_url, "/v1/dashboard/billing/credit_grants");
        let grants: CreditGrants = get_json(&self.client, &url, api_key).await?;
        Ok(BalanceResult::valid(grants.total_available, "USD"))
    }
}
