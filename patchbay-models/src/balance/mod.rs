//! Balance aggregation across a provider's credential pool.
//!
//! Fans a balance query out to every key in the pool concurrently, isolates
//! per-key failures, and folds the answers into one aggregate. Also prunes
//! keys that no longer hold a positive balance.
//!
//! The aggregate result doubles as a toggle: a second call for the same
//! provider clears the cached result instead of re-querying, so a UI can
//! bind one button to "show/hide balance".

mod clients;

use std::collections::HashMap;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub use clients::{
    BalanceCheckClient, DeepSeekBalance, OpenAiCompatibleBalance, OpenRouterBalance,
    SiliconFlowBalance,
};

use crate::auth::ApiKey;
use crate::types::{BalanceResult, Provider, ProviderKind};

/// Folded balance across every valid key of a pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateBalance {
    /// Currency of the first per-key result that reported one; empty when
    /// none did.
    pub currency: String,
    /// Sum over all valid keys, rounded to 2 decimals.
    pub total: f64,
}

/// Outcome of one [`BalanceAggregator::aggregate`] call.
///
/// `Unsupported` and `NoCredentials` are non-fatal: the provider simply has
/// nothing to aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AggregateOutcome {
    /// Balance queries are not available for this provider.
    Unsupported,
    /// The credential pool parsed to zero keys.
    NoCredentials,
    /// A cached aggregate existed and was cleared instead of re-queried.
    Cleared,
    /// Freshly computed aggregate.
    Balance(AggregateBalance),
}

/// Machine-readable reason a key was dropped by pruning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "class", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// The query itself failed (transport, decode, non-2xx); carries the
    /// error class code.
    RequestFailed(String),
    /// The protocol answered but marked the key invalid.
    InvalidKey(String),
    /// The key works but holds no positive balance.
    NonPositiveBalance,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::RequestFailed(code) => write!(f, "request_failed: {code}"),
            RejectReason::InvalidKey(detail) => write!(f, "invalid_key: {detail}"),
            RejectReason::NonPositiveBalance => write!(f, "non_positive_balance"),
        }
    }
}

/// One pruned key with its reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyRejection {
    pub key: String,
    pub reason: RejectReason,
}

/// Dispatch table mapping each provider kind to its balance protocol.
///
/// Selected once per aggregate call; the `openai` kind only resolves to the
/// generic OpenAI-compatible client on a non-default base URL, because the
/// official endpoint exposes no balance API.
pub struct ClientTable {
    openrouter: Box<dyn BalanceCheckClient>,
    siliconflow: Box<dyn BalanceCheckClient>,
    deepseek: Box<dyn BalanceCheckClient>,
    openai_compatible: Box<dyn BalanceCheckClient>,
}

impl ClientTable {
    /// Table backed by live HTTP clients sharing one connection pool.
    pub fn http() -> Self {
        let client = reqwest::Client::new();
        Self {
            openrouter: Box::new(OpenRouterBalance::new(client.clone())),
            siliconflow: Box::new(SiliconFlowBalance::new(client.clone())),
            deepseek: Box::new(DeepSeekBalance::new(client.clone())),
            openai_compatible: Box::new(OpenAiCompatibleBalance::new(client)),
        }
    }

    /// Table with explicit clients per protocol slot.
    pub fn new(
        openrouter: Box<dyn BalanceCheckClient>,
        siliconflow: Box<dyn BalanceCheckClient>,
        deepseek: Box<dyn BalanceCheckClient>,
        openai_compatible: Box<dyn BalanceCheckClient>,
    ) -> Self {
        Self {
            openrouter,
            siliconflow,
            deepseek,
            openai_compatible,
        }
    }

    fn select(&self, provider: &Provider) -> Option<&dyn BalanceCheckClient> {
        match provider.kind {
            ProviderKind::OpenRouter => Some(self.openrouter.as_ref()),
            ProviderKind::SiliconFlow => Some(self.siliconflow.as_ref()),
            ProviderKind::DeepSeek => Some(self.deepseek.as_ref()),
            ProviderKind::OpenAi
                if provider.effective_base_url() != ProviderKind::OpenAi.default_base_url() =>
            {
                Some(self.openai_compatible.as_ref())
            }
            ProviderKind::OpenAi => None,
        }
    }
}

#[derive(Clone)]
struct CachedAggregate {
    summary: AggregateBalance,
    per_key: HashMap<String, BalanceResult>,
}

/// Aggregates balances across a provider's credential pool.
///
/// Results are ephemeral view-state keyed by provider id; two providers
/// never contend, and repeated calls for one provider toggle its cache.
pub struct BalanceAggregator {
    clients: ClientTable,
    cache: RwLock<HashMap<String, CachedAggregate>>,
    prune_reports: RwLock<HashMap<String, Vec<KeyRejection>>>,
}

impl BalanceAggregator {
    /// Aggregator backed by live HTTP protocol clients.
    pub fn new() -> Self {
        Self::with_clients(ClientTable::http())
    }

    /// Aggregator with an explicit dispatch table.
    pub fn with_clients(clients: ClientTable) -> Self {
        Self {
            clients,
            cache: RwLock::new(HashMap::new()),
            prune_reports: RwLock::new(HashMap::new()),
        }
    }

    /// Aggregate the balance across every key in the provider's pool.
    ///
    /// Preconditions short-circuit without any network call: a cached
    /// result toggles to `Cleared`, the `#` sentinel and the no-protocol
    /// case yield `Unsupported`, an empty pool yields `NoCredentials`.
    ///
    /// The fan-out settles every per-key query; a failed or invalid key
    /// contributes zero and never aborts the aggregate. There is no
    /// aggregate-level deadline - each query is bounded only by the remote
    /// server.
    pub async fn aggregate(&self, provider: &Provider) -> AggregateOutcome {
        if self.cache.write().await.remove(&provider.id).is_some() {
            debug!(provider = %provider.name, "cleared cached balance");
            return AggregateOutcome::Cleared;
        }

        if !provider.balance_supported() {
            return AggregateOutcome::Unsupported;
        }
        let keys = provider.credentials();
        if keys.is_empty() {
            return AggregateOutcome::NoCredentials;
        }
        let Some(client) = self.clients.select(provider) else {
            return AggregateOutcome::Unsupported;
        };

        let base_url = provider.effective_base_url();
        let checks = keys.iter().map(|key| {
            let api_key = ApiKey::new(key.clone());
            async move {
                match client.check_balance(&api_key, base_url).await {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(provider = %provider.name, error = %err, "balance check failed");
                        BalanceResult::invalid(err.to_string())
                    }
                }
            }
        });
        let results = join_all(checks).await;

        let currency = results
            .iter()
            .find_map(|r| r.currency.clone().filter(|c| !c.is_empty()))
            .unwrap_or_default();
        let total = round2(
            results
                .iter()
                .filter(|r| r.is_valid)
                .filter_map(|r| r.total_balance)
                .sum(),
        );
        let summary = AggregateBalance { currency, total };

        let per_key = keys.into_iter().zip(results).collect();
        self.cache.write().await.insert(
            provider.id.clone(),
            CachedAggregate {
                summary: summary.clone(),
                per_key,
            },
        );
        debug!(provider = %provider.name, total = summary.total, "aggregated balance");

        AggregateOutcome::Balance(summary)
    }

    /// The cached aggregate for a provider, if one exists.
    pub async fn cached(&self, provider_id: &str) -> Option<AggregateBalance> {
        self.cache
            .read()
            .await
            .get(provider_id)
            .map(|c| c.summary.clone())
    }

    /// Drop every key that no longer holds a positive balance.
    ///
    /// Per-key results cached by a prior [`aggregate`](Self::aggregate) are
    /// reused when they were valid with a positive balance; everything else
    /// is re-queried. Returns the retained keys in pool order; the caller
    /// persists them as the provider's new pool. The per-key rejection
    /// report is retained and queryable via
    /// [`last_prune_report`](Self::last_prune_report).
    pub async fn prune_invalid_keys(&self, provider: &Provider) -> Vec<String> {
        let keys = provider.credentials();
        if !provider.balance_supported() {
            return keys;
        }
        let Some(client) = self.clients.select(provider) else {
            // No protocol to validate against; leave the pool untouched.
            return keys;
        };

        let cached_per_key: HashMap<String, BalanceResult> = self
            .cache
            .read()
            .await
            .get(&provider.id)
            .map(|c| c.per_key.clone())
            .unwrap_or_default();

        let base_url = provider.effective_base_url();
        let evaluations = join_all(keys.iter().map(|key| {
            let cached = cached_per_key.get(key).cloned();
            let api_key = ApiKey::new(key.clone());
            async move {
                let result = match cached {
                    Some(r) if r.is_valid && r.total_balance.unwrap_or(0.0) > 0.0 => r,
                    _ => match client.check_balance(&api_key, base_url).await {
                        Ok(r) => r,
                        Err(err) => {
                            return Err(RejectReason::RequestFailed(err.class_code()));
                        }
                    },
                };
                if !result.is_valid {
                    Err(RejectReason::InvalidKey(result.error.unwrap_or_default()))
                } else if result.total_balance.unwrap_or(0.0) > 0.0 {
                    Ok(())
                } else {
                    Err(RejectReason::NonPositiveBalance)
                }
            }
        }))
        .await;

        let mut valid = Vec::new();
        let mut rejections = Vec::new();
        for (key, outcome) in keys.into_iter().zip(evaluations) {
            match outcome {
                Ok(()) => valid.push(key),
                Err(reason) => {
                    warn!(provider = %provider.name, reason = %reason, "pruned credential");
                    rejections.push(KeyRejection { key, reason });
                }
            }
        }
        self.prune_reports
            .write()
            .await
            .insert(provider.id.clone(), rejections);

        valid
    }

    /// Rejections recorded by the most recent prune of this provider.
    pub async fn last_prune_report(&self, provider_id: &str) -> Vec<KeyRejection> {
        self.prune_reports
            .read()
            .await
            .get(provider_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for BalanceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
