//! Provider registry.
//!
//! Owns the provider list and every mutation of it:
//! - Two-step creation (basic info first, model selection second)
//! - Update/delete/toggle by id
//! - Name uniqueness among the active set via `-1`, `-2`, ... suffixes
//! - Model-list refresh that preserves per-name metadata
//!
//! Persistence goes through an injected [`ProviderStore`]; the registry is
//! testable without a real storage backend. Callers serialize writes to the
//! same provider - there is no internal locking.

mod list_client;
mod store;

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

pub use list_client::{HttpModelListClient, ModelListClient};
pub use store::{JsonFileStore, MemoryStore, ProviderStore};

use crate::auth::ApiKey;
use crate::catalog::split_model_token;
use crate::error::{Error, Result};
use crate::types::{ModelEntry, Provider, ProviderKind, ProviderStatus};

/// Basic info captured by the first step of the provider wizard.
#[derive(Debug, Clone)]
pub struct ProviderDraft {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub credential_pool: String,
}

/// The registry of configured providers.
pub struct ProviderRegistry {
    providers: Vec<Provider>,
    store: Box<dyn ProviderStore>,
}

impl ProviderRegistry {
    /// Load the registry through the injected store.
    pub async fn load(store: Box<dyn ProviderStore>) -> Result<Self> {
        let providers = store.load().await?;
        debug!(count = providers.len(), "loaded provider registry");
        Ok(Self { providers, store })
    }

    /// Every configured provider, in insertion order.
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Active providers only.
    pub fn active(&self) -> Vec<&Provider> {
        self.providers.iter().filter(|p| p.is_active()).collect()
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// First wizard step: register a provider from its basic info.
    ///
    /// The provider starts active with an empty model list; a colliding
    /// name gets a `-N` suffix.
    pub async fn create(&mut self, draft: ProviderDraft) -> Result<Provider> {
        let provider = Provider {
            id: Uuid::new_v4().to_string(),
            name: self.unique_name(&draft.name, None),
            kind: draft.kind,
            base_url: draft.base_url,
            credential_pool: draft.credential_pool,
            models: Vec::new(),
            status: ProviderStatus::Active,
        };
        debug!(provider = %provider.name, "created provider");
        self.providers.push(provider.clone());
        self.persist().await?;
        Ok(provider)
    }

    /// Second wizard step: attach the selected models.
    pub async fn set_models(&mut self, id: &str, models: Vec<ModelEntry>) -> Result<()> {
        let provider = self.get_mut(id)?;
        provider.models = models;
        self.persist().await
    }

    /// Replace a provider in place, keyed by its id.
    pub async fn update(&mut self, updated: Provider) -> Result<()> {
        let unique = self.unique_name(&updated.name, Some(&updated.id));
        let provider = self.get_mut(&updated.id)?;
        *provider = Provider {
            name: unique,
            ..updated
        };
        self.persist().await
    }

    /// Remove a provider by id, returning it.
    ///
    /// Callers are expected to confirm with the user first; the registry
    /// deletes unconditionally.
    pub async fn delete(&mut self, id: &str) -> Result<Provider> {
        let position = self
            .providers
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::ProviderNotFound(id.to_string()))?;
        let removed = self.providers.remove(position);
        debug!(provider = %removed.name, "deleted provider");
        self.persist().await?;
        Ok(removed)
    }

    /// Flip a provider between active and inactive.
    pub async fn toggle_status(&mut self, id: &str) -> Result<ProviderStatus> {
        let provider = self.get_mut(id)?;
        provider.status = provider.status.toggled();
        let status = provider.status;
        self.persist().await?;
        Ok(status)
    }

    /// Replace a provider's raw credential pool, e.g. after pruning.
    pub async fn set_credential_pool(&mut self, id: &str, pool: &str) -> Result<()> {
        let provider = self.get_mut(id)?;
        provider.credential_pool = pool.to_string();
        self.persist().await
    }

    /// Re-fetch a provider's model list and merge it with the stored one.
    ///
    /// Surviving names keep their display name, description, vision and
    /// `available` flags; new names arrive unselected. Returns the new
    /// model count.
    pub async fn refresh_models(
        &mut self,
        id: &str,
        client: &dyn ModelListClient,
    ) -> Result<usize> {
        let (base_url, key) = {
            let provider = self
                .get(id)
                .ok_or_else(|| Error::ProviderNotFound(id.to_string()))?;
            let key = provider
                .credentials()
                .into_iter()
                .next()
                .map(ApiKey::new)
                .ok_or_else(|| Error::MissingConfig("api key".to_string()))?;
            (provider.effective_base_url().to_string(), key)
        };

        let raw = client.fetch_available_models(&base_url, &key).await?;
        let names = parse_model_list(&raw);
        let provider = self.get_mut(id)?;
        provider.models = merge_refreshed(&provider.models, &names);
        let count = provider.models.len();
        debug!(provider = %provider.name, count, "refreshed model list");
        self.persist().await?;
        Ok(count)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Provider> {
        self.providers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::ProviderNotFound(id.to_string()))
    }

    async fn persist(&self) -> Result<()> {
        self.store.save(&self.providers).await
    }

    /// Resolve a wanted name against the active set, suffixing `-1`, `-2`,
    /// ... until unique. `exclude_id` skips the provider being renamed.
    fn unique_name(&self, wanted: &str, exclude_id: Option<&str>) -> String {
        let taken: HashSet<&str> = self
            .providers
            .iter()
            .filter(|p| p.is_active())
            .filter(|p| exclude_id != Some(p.id.as_str()))
            .map(|p| p.name.as_str())
            .collect();

        if !taken.contains(wanted) {
            return wanted.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{wanted}-{n}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Split a comma-joined model-list string into model names.
///
/// Each token may carry a `@providerTag` suffix; only the part before the
/// last `@` names the model. Duplicates keep their first occurrence.
fn parse_model_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| split_model_token(token).0)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Build the refreshed model list, preserving metadata by name.
fn merge_refreshed(existing: &[ModelEntry], fetched: &[String]) -> Vec<ModelEntry> {
    let by_name: HashMap<&str, &ModelEntry> =
        existing.iter().map(|m| (m.name.as_str(), m)).collect();
    fetched
        .iter()
        .map(|name| match by_name.get(name.as_str()) {
            Some(prev) => (*prev).clone(),
            None => ModelEntry::new(name.clone()),
        })
        .collect()
}
