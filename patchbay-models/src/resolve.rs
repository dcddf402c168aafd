//! Provider resolution.
//!
//! UI selections store a compound (model, provider) binding. When the
//! catalog changes underneath it, the stored provider may no longer carry
//! the model. [`resolve`] repairs the binding against the current grouped
//! catalog with a deterministic fallback chain; it is total and never
//! panics, so callers can run it on every catalog change.

use indexmap::IndexMap;

use crate::catalog::TableEntry;

/// Recover the provider binding for `model_name`.
///
/// Evaluated in order, first match wins:
///
/// 1. `stored_provider` still exists and its group carries the model (by
///    name or display name).
/// 2. `model_name` itself is a group key, covering single-model providers
///    named after their model.
/// 3. The first group in iteration order carrying the model.
/// 4. No match: return `stored_provider` unchanged.
pub fn resolve(
    model_name: &str,
    stored_provider: &str,
    grouped: &IndexMap<String, Vec<TableEntry>>,
) -> String {
    let carries_model = |entries: &[TableEntry]| entries.iter().any(|e| e.matches(model_name));

    if grouped
        .get(stored_provider)
        .is_some_and(|entries| carries_model(entries))
    {
        return stored_provider.to_string();
    }

    if grouped.contains_key(model_name) {
        return model_name.to_string();
    }

    for (provider, entries) in grouped {
        if carries_model(entries) {
            return provider.clone();
        }
    }

    stored_provider.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, provider: &str) -> TableEntry {
        TableEntry::new(name, provider)
    }

    fn grouped(groups: Vec<(&str, Vec<TableEntry>)>) -> IndexMap<String, Vec<TableEntry>> {
        groups
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn stored_provider_wins_when_it_carries_the_model() {
        let catalog = grouped(vec![
            ("other", vec![entry("gpt-4o", "other")]),
            ("myOpenAI", vec![entry("gpt-4o", "myOpenAI")]),
        ]);

        assert_eq!(resolve("gpt-4o", "myOpenAI", &catalog), "myOpenAI");
    }

    #[test]
    fn model_named_group_wins_when_stored_is_stale() {
        let catalog = grouped(vec![
            ("gpt-4o", vec![entry("gpt-4o", "gpt-4o")]),
            ("other", vec![entry("gpt-4o", "other")]),
        ]);

        assert_eq!(resolve("gpt-4o", "gone", &catalog), "gpt-4o");
    }

    #[test]
    fn first_carrying_group_wins_in_iteration_order() {
        let catalog = grouped(vec![
            ("alpha", vec![entry("unrelated", "alpha")]),
            ("beta", vec![entry("the-model", "beta")]),
            ("gamma", vec![entry("the-model", "gamma")]),
        ]);

        assert_eq!(resolve("the-model", "gone", &catalog), "beta");
    }

    #[test]
    fn display_name_matches_too() {
        let mut aliased = entry("internal-name", "aliasing");
        aliased.display_name = Some("Friendly Name".to_string());
        let catalog = grouped(vec![("aliasing", vec![aliased])]);

        assert_eq!(resolve("Friendly Name", "gone", &catalog), "aliasing");
    }

    #[test]
    fn unknown_model_returns_stored_provider_unchanged() {
        let catalog = grouped(vec![("ProviderA", vec![entry("other", "ProviderA")])]);

        assert_eq!(resolve("unknown-model", "stale", &catalog), "stale");
    }

    #[test]
    fn empty_catalog_never_panics() {
        let catalog = IndexMap::new();
        assert_eq!(resolve("anything", "stored", &catalog), "stored");
        assert_eq!(resolve("", "", &catalog), "");
    }

    #[test]
    fn resolve_is_deterministic() {
        let catalog = grouped(vec![
            ("alpha", vec![entry("m", "alpha")]),
            ("beta", vec![entry("m", "beta")]),
        ]);

        let first = resolve("m", "gone", &catalog);
        let second = resolve("m", "gone", &catalog);
        assert_eq!(first, second);
    }

    #[test]
    fn stored_provider_without_the_model_is_skipped() {
        let catalog = grouped(vec![
            ("stored", vec![entry("other-model", "stored")]),
            ("carrier", vec![entry("the-model", "carrier")]),
        ]);

        assert_eq!(resolve("the-model", "stored", &catalog), "carrier");
    }
}
