//! Provider persistence collaborators.
//!
//! The registry never touches storage directly; it drives one of these
//! injected stores. The on-disk format is one opaque JSON blob holding the
//! whole provider list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::Provider;

/// Providers file name under the config directory.
const PROVIDERS_FILE: &str = "providers.json";

/// Load/save collaborator for the provider list.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Provider>>;
    async fn save(&self, providers: &[Provider]) -> Result<()>;
}

/// File-backed store keeping the list as pretty-printed JSON.
pub struct JsonFileStore {
    file_path: PathBuf,
}

impl JsonFileStore {
    /// Store under the given config directory.
    pub fn new(config_dir: &Path) -> Self {
        Self {
            file_path: config_dir.join(PROVIDERS_FILE),
        }
    }

    /// Store under the patchbay config directory.
    pub fn default_location() -> Self {
        Self::new(&patchbay_paths::config_dir())
    }
}

#[async_trait]
impl ProviderStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Provider>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.file_path)
            .await
            .map_err(|e| Error::Storage(format!("failed to read providers: {e}")))?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, providers: &[Provider]) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("failed to create config dir: {e}")))?;
        }

        let content = serde_json::to_string_pretty(providers)?;
        fs::write(&self.file_path, content)
            .await
            .map_err(|e| Error::Storage(format!("failed to write providers: {e}")))?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral registries.
#[derive(Default)]
pub struct MemoryStore {
    providers: RwLock<Vec<Provider>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Provider>> {
        Ok(self.providers.read().await.clone())
    }

    async fn save(&self, providers: &[Provider]) -> Result<()> {
        *self.providers.write().await = providers.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelEntry, ProviderKind, ProviderStatus};
    use tempfile::tempdir;

    fn sample_provider(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            name: format!("Provider {id}"),
            kind: ProviderKind::SiliconFlow,
            base_url: "https://api.siliconflow.cn".to_string(),
            credential_pool: "sk-a,sk-b".to_string(),
            models: vec![ModelEntry::new("deepseek-ai/DeepSeek-V3").available()],
            status: ProviderStatus::Active,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty_list() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let providers = vec![sample_provider("p1"), sample_provider("p2")];

        store.save(&providers).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, providers);
    }

    #[tokio::test]
    async fn save_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deeper/still");
        let store = JsonFileStore::new(&nested);

        store.save(&[sample_provider("p1")]).await.unwrap();

        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupted_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(PROVIDERS_FILE), "not json").unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(matches!(
            store.load().await.unwrap_err(),
            Error::Serialization(_)
        ));
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryStore::new();
        let providers = vec![sample_provider("p1")];

        store.save(&providers).await.unwrap();

        assert_eq!(store.load().await.unwrap(), providers);
    }
}
