//! Error types for the provider registry.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during registry, balance, and probe operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration value is missing or blank.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// The operation is not supported for this provider.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Provider not found in the registry.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// The remote endpoint answered with a non-2xx status.
    ///
    /// `code` carries the error body's `error.code`/`error.type` when the
    /// body is parseable, falling back to the numeric HTTP status.
    #[error("api error {status}: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The HTTP request itself failed (connect, TLS, DNS, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// A deadline elapsed before the request settled.
    #[error("request timed out")]
    Timeout,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence collaborator failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Error body shape shared by the OpenAI-compatible protocol family.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Error {
    /// Build an [`Error::Api`] from a non-2xx response body.
    ///
    /// The code is the body's `error.code`, then `error.type`, then the
    /// numeric status when the body is missing or unparseable.
    pub(crate) fn from_api_body(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .map(|b| b.error);
        let code = detail
            .as_ref()
            .and_then(|d| d.code.clone().or_else(|| d.kind.clone()))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| status.to_string());
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| body.chars().take(200).collect());
        Error::Api {
            status,
            code,
            message,
        }
    }

    /// Stable machine-readable class code for this error.
    ///
    /// Probe results and prune reports carry these instead of free-form
    /// messages so callers can branch on them.
    pub fn class_code(&self) -> String {
        match self {
            Error::MissingConfig(_) => "ConfigError".to_string(),
            Error::Unsupported(_) => "Unsupported".to_string(),
            Error::ProviderNotFound(_) => "NotFound".to_string(),
            Error::Api { code, .. } => code.clone(),
            Error::Request(_) => "NetworkError".to_string(),
            Error::Timeout => "TIMEOUT".to_string(),
            Error::Serialization(_) => "ParseError".to_string(),
            Error::Storage(_) => "StorageError".to_string(),
        }
    }
}
