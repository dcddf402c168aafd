//! Model-list fetching collaborator.
//!
//! Returns the provider's models as one comma-joined string of
//! `modelId@providerTag` tokens; the tag is optional and defaults to the
//! model id. The registry owns splitting and merging.

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::ApiKey;
use crate::error::{Error, Result};

/// Fetches the list of models a provider currently offers.
#[async_trait]
pub trait ModelListClient: Send + Sync {
    async fn fetch_available_models(&self, base_url: &str, api_key: &ApiKey) -> Result<String>;
}

/// OpenAI-compatible list endpoint (`GET /v1/models`).
pub struct HttpModelListClient {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    data: Vec<ModelListItem>,
}

#[derive(Debug, Deserialize)]
struct ModelListItem {
    id: String,
}

impl HttpModelListClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpModelListClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelListClient for HttpModelListClient {
    async fn fetch_available_models(&self, base_url: &str, api_key: &ApiKey) -> Result<String> {
        let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
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
        let list: ModelListResponse = serde_json::from_str(&body)?;
        Ok(list
            .data
            .into_iter()
            .map(|m| m.id)
            .collect::<Vec<_>>()
            .join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_joins_model_ids_with_commas() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [
                    { "id": "gpt-4o", "object": "model" },
                    { "id": "gpt-4o-mini", "object": "model" }
                ]
            })))
            .mount(&server)
            .await;

        let client = HttpModelListClient::new();
        let raw = client
            .fetch_available_models(&server.uri(), &ApiKey::new("sk-test"))
            .await
            .unwrap();

        assert_eq!(raw, "gpt-4o,gpt-4o-mini");
    }

    #[tokio::test]
    async fn empty_list_yields_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "object": "list", "data": [] })),
            )
            .mount(&server)
            .await;

        let client = HttpModelListClient::new();
        let raw = client
            .fetch_available_models(&server.uri(), &ApiKey::new("sk-test"))
            .await
            .unwrap();

        assert_eq!(raw, "");
    }

    #[tokio::test]
    async fn non_2xx_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "code": "invalid_api_key", "message": "bad key" }
            })))
            .mount(&server)
            .await;

        let client = HttpModelListClient::new();
        let err = client
            .fetch_available_models(&server.uri(), &ApiKey::new("sk-test"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status: 401, .. }));
    }
}
