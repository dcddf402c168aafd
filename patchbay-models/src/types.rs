//! Core types for the provider registry.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The balance-check/completion protocol family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenAI or any OpenAI-compatible aggregator endpoint.
    #[serde(rename = "openai")]
    OpenAi,
    /// SiliconFlow.
    #[serde(rename = "siliconflow")]
    SiliconFlow,
    /// DeepSeek.
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// OpenRouter.
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderKind {
    /// The well-known default base URL for this kind.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::SiliconFlow => "https://api.siliconflow.cn",
            ProviderKind::DeepSeek => "https://api.deepseek.com",
            ProviderKind::OpenRouter => "https://openrouter.ai/api",
        }
    }

    /// Path of the chat-completion endpoint relative to the base URL.
    ///
    /// DeepSeek exposes completions at the root, everything else under `/v1`.
    pub fn completion_path(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "/chat/completions",
            _ => "/v1/chat/completions",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::SiliconFlow => write!(f, "siliconflow"),
            ProviderKind::DeepSeek => write!(f, "deepseek"),
            ProviderKind::OpenRouter => write!(f, "openrouter"),
        }
    }
}

/// Whether a provider participates in catalog merging and name uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Active,
    Inactive,
}

impl ProviderStatus {
    /// The opposite status.
    pub fn toggled(self) -> Self {
        match self {
            ProviderStatus::Active => ProviderStatus::Inactive,
            ProviderStatus::Inactive => ProviderStatus::Active,
        }
    }
}

/// A model offered by a provider.
///
/// `name` is unique within a provider. `available` marks the model as
/// selected for use; only available models of active providers reach the
/// merged model table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl ModelEntry {
    /// Create an entry with just a name; everything else off.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            vision: false,
            available: false,
            is_default: false,
        }
    }

    /// Mark the entry as selected for use.
    pub fn available(mut self) -> Self {
        self.available = true;
        self
    }
}

/// A configured external AI service endpoint.
///
/// The credential pool is stored raw, exactly as the user entered it;
/// [`Provider::credentials`] parses it on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub credential_pool: String,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    pub status: ProviderStatus,
}

/// Sentinel suffix marking a provider as balance-query unsupported.
const UNSUPPORTED_SENTINEL: char = '#';

impl Provider {
    /// Parse the credential pool into an ordered, deduplicated key list.
    pub fn credentials(&self) -> Vec<String> {
        parse_credential_pool(&self.credential_pool)
    }

    /// Whether this provider participates in the merged catalog.
    pub fn is_active(&self) -> bool {
        self.status == ProviderStatus::Active
    }

    /// Whether balance queries are supported for this provider.
    ///
    /// A trailing `#` on the base URL opts the provider out.
    pub fn balance_supported(&self) -> bool {
        !self.base_url.ends_with(UNSUPPORTED_SENTINEL)
    }

    /// Base URL with the unsupported sentinel stripped, if present.
    pub fn effective_base_url(&self) -> &str {
        self.base_url.trim_end_matches(UNSUPPORTED_SENTINEL)
    }

    /// Full URL of the chat-completion endpoint for this provider.
    pub fn completion_url(&self) -> String {
        format!(
            "{}{}",
            self.effective_base_url().trim_end_matches('/'),
            self.kind.completion_path()
        )
    }
}

/// Parse a raw comma/whitespace-delimited credential string into an
/// order-preserving, deduplicated list of non-blank keys.
pub fn parse_credential_pool(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .filter(|key| seen.insert(key.to_string()))
        .map(str::to_string)
        .collect()
}

/// Outcome of one balance check against one credential.
///
/// Ephemeral view-state; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BalanceResult {
    /// A successful check with a balance and currency.
    pub fn valid(total_balance: f64, currency: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            total_balance: Some(total_balance),
            currency: Some(currency.into()),
            error: None,
        }
    }

    /// A failed check with a human-readable reason.
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            total_balance: None,
            currency: None,
            error: Some(error.into()),
        }
    }
}

/// State of an availability probe for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Idle,
    Testing,
    Success,
    Error,
}

/// Result of probing one model, kept in a map that outlives the probe so
/// the last outcome stays visible.
///
/// `detail` holds the latency in milliseconds on success, or a stable
/// error code (`TIMEOUT`, `NetworkError`, the body's `error.code`, ...) on
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeResult {
    pub fn idle() -> Self {
        Self {
            status: ProbeStatus::Idle,
            detail: None,
        }
    }

    pub fn testing() -> Self {
        Self {
            status: ProbeStatus::Testing,
            detail: None,
        }
    }

    pub fn success(latency_ms: u64) -> Self {
        Self {
            status: ProbeStatus::Success,
            detail: Some(latency_ms.to_string()),
        }
    }

    pub fn error(code: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            detail: Some(code.into()),
        }
    }

    /// Latency in milliseconds, when this is a success result.
    pub fn latency_ms(&self) -> Option<u64> {
        match self.status {
            ProbeStatus::Success => self.detail.as_deref().and_then(|d| d.parse().ok()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: ProviderKind, base_url: &str) -> Provider {
        Provider {
            id: "prov-1".to_string(),
            name: "Test".to_string(),
            kind,
            base_url: base_url.to_string(),
            credential_pool: String::new(),
            models: vec![],
            status: ProviderStatus::Active,
        }
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ProviderKind::SiliconFlow).unwrap();
        assert_eq!(json, "\"siliconflow\"");
        let kind: ProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
    }

    #[test]
    fn completion_path_differs_for_deepseek() {
        assert_eq!(ProviderKind::DeepSeek.completion_path(), "/chat/completions");
        assert_eq!(
            ProviderKind::OpenAi.completion_path(),
            "/v1/chat/completions"
        );
        assert_eq!(
            ProviderKind::OpenRouter.completion_path(),
            "/v1/chat/completions"
        );
    }

    #[test]
    fn completion_url_joins_without_double_slash() {
        let p = provider(ProviderKind::OpenAi, "https://api.example.com/");
        assert_eq!(
            p.completion_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn pool_parsing_splits_on_commas_and_whitespace() {
        let keys = parse_credential_pool("sk-a, sk-b\nsk-c\tsk-d");
        assert_eq!(keys, vec!["sk-a", "sk-b", "sk-c", "sk-d"]);
    }

    #[test]
    fn pool_parsing_drops_blanks_and_duplicates() {
        let keys = parse_credential_pool("sk-a,,  ,sk-b,sk-a,sk-b");
        assert_eq!(keys, vec!["sk-a", "sk-b"]);
    }

    #[test]
    fn pool_parsing_preserves_first_seen_order() {
        let keys = parse_credential_pool("sk-z,sk-a,sk-z,sk-m");
        assert_eq!(keys, vec!["sk-z", "sk-a", "sk-m"]);
    }

    #[test]
    fn empty_pool_parses_to_no_keys() {
        assert!(parse_credential_pool("").is_empty());
        assert!(parse_credential_pool("  , \n ").is_empty());
    }

    #[test]
    fn sentinel_marks_balance_unsupported() {
        let p = provider(ProviderKind::OpenAi, "https://api.example.com#");
        assert!(!p.balance_supported());
        assert_eq!(p.effective_base_url(), "https://api.example.com");

        let q = provider(ProviderKind::OpenAi, "https://api.example.com");
        assert!(q.balance_supported());
    }

    #[test]
    fn status_toggles() {
        assert_eq!(ProviderStatus::Active.toggled(), ProviderStatus::Inactive);
        assert_eq!(ProviderStatus::Inactive.toggled(), ProviderStatus::Active);
    }

    #[test]
    fn probe_result_success_carries_latency() {
        let result = ProbeResult::success(231);
        assert_eq!(result.status, ProbeStatus::Success);
        assert_eq!(result.detail.as_deref(), Some("231"));
        assert_eq!(result.latency_ms(), Some(231));
    }

    #[test]
    fn probe_result_error_has_no_latency() {
        let result = ProbeResult::error("TIMEOUT");
        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(result.latency_ms(), None);
    }

    #[test]
    fn provider_round_trips_through_json() {
        let mut p = provider(ProviderKind::DeepSeek, "https://api.deepseek.com");
        p.credential_pool = "sk-one,sk-two".to_string();
        p.models = vec![ModelEntry::new("deepseek-chat").available()];

        let json = serde_json::to_string(&p).unwrap();
        let back: Provider = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
