//! API key handling.
//!
//! Keys live inside each provider's raw credential pool; this module wraps
//! a single parsed key so it cannot leak through `Debug` or logs on its way
//! into an HTTP call.

use secrecy::{ExposeSecret, SecretString};

/// A secure API key that prevents accidental logging.
///
/// The key is wrapped in `SecretString` which:
/// - Implements `Debug` as `"[REDACTED]"`
/// - Zeroizes memory on drop
/// - Requires explicit `.expose_secret()` to access the value
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Expose the secret key value.
    ///
    /// Use sparingly - only when actually sending to an API.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret-key-12345");
        let debug = format!("{:?}", key);
        assert_eq!(debug, "ApiKey([REDACTED])");
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn api_key_expose_secret_returns_value() {
        let key = ApiKey::new("sk-secret-key-12345");
        assert_eq!(key.expose_secret(), "sk-secret-key-12345");
    }

    #[test]
    fn api_key_from_string() {
        let key: ApiKey = "my-key".into();
        assert_eq!(key.expose_secret(), "my-key");

        let key: ApiKey = String::from("my-key").into();
        assert_eq!(key.expose_secret(), "my-key");
    }
}
