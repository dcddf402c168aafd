//! Per-model availability probing.
//!
//! Issues one bounded chat-completion request per model and classifies the
//! answer as reachable (with latency) or failing (with an error code). The
//! result map outlives individual probes so the last outcome stays visible,
//! and probes for different models can run concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::ApiKey;
use crate::error::{Error, Result};
use crate::types::{ProbeResult, Provider};

/// Configuration for availability probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Deadline for one probe request. The request is cancelled when it
    /// elapses and the probe reports `TIMEOUT`.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

/// Probes model availability through a provider's completion endpoint.
///
/// Results are keyed by model name; probing a model again resets it to
/// `testing` and overwrites the prior result. Concurrent probes for
/// different models share nothing but the map.
pub struct AvailabilityProbe {
    client: reqwest::Client,
    config: ProbeConfig,
    results: Arc<RwLock<HashMap<String, ProbeResult>>>,
}

impl AvailabilityProbe {
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            results: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Probe one model through the provider's completion endpoint, using
    /// only the first credential of the pool.
    ///
    /// The deadline is owned by a single `tokio::time::timeout`: dropping
    /// the in-flight request future cancels it on every exit path, so
    /// nothing leaks across repeated probes.
    pub async fn probe(&self, provider: &Provider, model: &str) -> ProbeResult {
        self.results
            .write()
            .await
            .insert(model.to_string(), ProbeResult::testing());
        debug!(provider = %provider.name, model, "probing model");

        let result = match tokio::time::timeout(self.config.timeout, self.request(provider, model))
            .await
        {
            Err(_elapsed) => ProbeResult::error("TIMEOUT"),
            Ok(Ok(latency_ms)) => ProbeResult::success(latency_ms),
            Ok(Err(err)) => ProbeResult::error(err.class_code()),
        };

        self.results
            .write()
            .await
            .insert(model.to_string(), result.clone());
        result
    }

    /// Last recorded result for a model; `idle` when never probed.
    pub async fn result_for(&self, model: &str) -> ProbeResult {
        self.results
            .read()
            .await
            .get(model)
            .cloned()
            .unwrap_or_else(ProbeResult::idle)
    }

    /// Snapshot of every recorded result.
    pub async fn results(&self) -> HashMap<String, ProbeResult> {
        self.results.read().await.clone()
    }

    async fn request(&self, provider: &Provider, model: &str) -> Result<u64> {
        if provider.effective_base_url().trim().is_empty() {
            return Err(Error::MissingConfig("base_url".to_string()));
        }
        let keys = provider.credentials();
        let Some(key) = keys.into_iter().next().map(ApiKey::new) else {
            return Err(Error::MissingConfig("api key".to_string()));
        };

        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": "Hello. Please respond with 'OK'." }],
            "max_tokens": 20,
            "stream": false,
        });

        let started = Instant::now();
        let response = self
            .client
            .post(provider.completion_url())
            .bearer_auth(key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let status = response.status();
        if status.is_success() {
            return Ok(latency_ms);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::from_api_body(status.as_u16(), &body))
    }
}

impl Default for AvailabilityProbe {
    fn default() -> Self {
        Self::new()
    }
}
