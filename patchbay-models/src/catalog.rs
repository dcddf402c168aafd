//! Catalog merging.
//!
//! Combines the built-in model list, the user's custom-models string, and
//! the selected models of active providers into one deduplicated, ordered
//! model table. Pure data transformation; no network or storage access.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{ModelEntry, Provider};

/// One row of the merged model table.
///
/// `provider` is the owning provider's id, or a pseudo-provider tag for
/// built-in and custom entries. The dedup key is `name@provider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl TableEntry {
    /// Create a bare entry for a model under a provider tag.
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            display_name: None,
            description: None,
            vision: false,
            is_default: false,
        }
    }

    /// The canonical dedup key, `name@provider`.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.provider)
    }

    /// Whether `candidate` names this entry, by name or display name.
    pub fn matches(&self, candidate: &str) -> bool {
        self.name == candidate || self.display_name.as_deref() == Some(candidate)
    }

    fn from_model(entry: &ModelEntry, provider_id: &str) -> Self {
        Self {
            name: entry.name.clone(),
            provider: provider_id.to_string(),
            display_name: entry.display_name.clone(),
            description: entry.description.clone(),
            vision: entry.vision,
            is_default: entry.is_default,
        }
    }
}

/// The deduplicated, ordered union of all models visible to the application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelTable {
    entries: Vec<TableEntry>,
}

impl ModelTable {
    /// The ordered entries.
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Group entries by provider tag, preserving table order both for the
    /// groups and within each group.
    ///
    /// The resolver scans this map in iteration order, so order matters.
    pub fn group_by_provider(&self) -> IndexMap<String, Vec<TableEntry>> {
        let mut grouped: IndexMap<String, Vec<TableEntry>> = IndexMap::new();
        for entry in &self.entries {
            grouped
                .entry(entry.provider.clone())
                .or_default()
                .push(entry.clone());
        }
        grouped
    }
}

/// Split a `name@providerTag` token on the **last** `@`.
///
/// Model ids may themselves contain `@` (version pins), so only the final
/// one separates the tag. A missing or empty tag defaults the provider tag
/// to the model name itself.
pub fn split_model_token(token: &str) -> (String, String) {
    match token.rsplit_once('@') {
        Some((name, tag)) if !name.is_empty() && !tag.is_empty() => {
            (name.to_string(), tag.to_string())
        }
        // Trailing '@': keep the name, default the tag to it.
        Some((name, _)) if !name.is_empty() => (name.to_string(), name.to_string()),
        _ => (token.to_string(), token.to_string()),
    }
}

/// Merge the built-in list, the custom-models CSV, and active providers'
/// selected models into one table.
///
/// Collisions on `name@provider` keep the first non-empty display name and
/// description; `is_default` and `vision` combine monotonically. If any
/// surviving entry is default-flagged, the first such entry moves to the
/// front; the relative order of the rest is preserved.
pub fn merge(builtin: &[TableEntry], custom_csv: &str, active: &[Provider]) -> ModelTable {
    let mut merged: IndexMap<String, TableEntry> = IndexMap::new();

    for entry in builtin {
        insert(&mut merged, entry.clone());
    }

    for token in custom_csv.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, tag) = split_model_token(token);
        insert(&mut merged, TableEntry::new(name, tag));
    }

    for provider in active {
        if !provider.is_active() {
            continue;
        }
        for model in provider.models.iter().filter(|m| m.available) {
            insert(&mut merged, TableEntry::from_model(model, &provider.id));
        }
    }

    let mut entries: Vec<TableEntry> = merged.into_values().collect();
    if let Some(default_at) = entries.iter().position(|e| e.is_default)
        && default_at > 0
    {
        let default = entries.remove(default_at);
        entries.insert(0, default);
    }

    ModelTable { entries }
}

fn insert(merged: &mut IndexMap<String, TableEntry>, entry: TableEntry) {
    match merged.entry(entry.key()) {
        indexmap::map::Entry::Occupied(mut occupied) => {
            let combined = combine(occupied.get(), &entry);
            occupied.insert(combined);
        }
        indexmap::map::Entry::Vacant(vacant) => {
            vacant.insert(entry);
        }
    }
}

/// Combine two entries sharing a dedup key into a new record.
///
/// Never overwrites a non-empty field with an empty one.
fn combine(first: &TableEntry, second: &TableEntry) -> TableEntry {
    TableEntry {
        name: first.name.clone(),
        provider: first.provider.clone(),
        display_name: pick_non_empty(&first.display_name, &second.display_name),
        description: pick_non_empty(&first.description, &second.description),
        vision: first.vision || second.vision,
        is_default: first.is_default || second.is_default,
    }
}

fn pick_non_empty(first: &Option<String>, second: &Option<String>) -> Option<String> {
    match first {
        Some(value) if !value.is_empty() => Some(value.clone()),
        _ => match second {
            Some(value) if !value.is_empty() => Some(value.clone()),
            _ => None,
        },
    }
}

/// The built-in static catalog merged beneath provider models.
pub fn builtin_models() -> Vec<TableEntry> {
    let mut gpt_4o_mini = TableEntry::new("gpt-4o-mini", "gpt-4o-mini");
    gpt_4o_mini.is_default = true;
    let mut gpt_4o = TableEntry::new("gpt-4o", "gpt-4o");
    gpt_4o.vision = true;
    vec![
        gpt_4o_mini,
        gpt_4o,
        TableEntry::new("deepseek-chat", "deepseek-chat"),
        TableEntry::new("deepseek-reasoner", "deepseek-reasoner"),
    ]
}
