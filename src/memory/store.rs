//! Backing-store contract consumed by the retrieval service, plus an in-memory store.
//! The in-memory store loads a JSON corpus with the shape
//! `{"version": 1, "entries": [TmEntry, ...]}`.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::info;

use super::{labels_match, TmEntry};
use crate::error::StoreError;

/// Query contract for whatever owns the translation memory.
#[async_trait]
pub trait TmStore: Send + Sync {
    /// All entries targeting `language_code`, optionally narrowed to a context. Unordered.
    async fn entries_for_language(
        &self,
        language_code: &str,
        context: Option<&str>,
    ) -> Result<Vec<TmEntry>, StoreError>;

    async fn entry_by_id(&self, id: i64) -> Result<Option<TmEntry>, StoreError>;

    /// Reports that an entry was applied. Stores that do not track usage ignore it.
    async fn record_usage(&self, _id: i64, _used_at: i64) -> Result<(), StoreError> {
        Ok(())
    }
}

/// On-disk corpus format.
#[derive(Debug, Deserialize)]
struct CorpusFile {
    version: u32,
    entries: Vec<TmEntry>,
}

pub struct InMemoryStore {
    version: u32,
    entries: RwLock<Vec<TmEntry>>,
}

impl InMemoryStore {
    pub fn new(entries: Vec<TmEntry>) -> Self {
        Self {
            version: 0,
            entries: RwLock::new(entries),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load a corpus from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let file: CorpusFile = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            version = file.version,
            entries = file.entries.len(),
            "translation memory corpus loaded"
        );
        Ok(Self {
            version: file.version,
            entries: RwLock::new(file.entries),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an entry, replacing any entry with the same id.
    pub fn upsert(&self, entry: TmEntry) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    pub fn remove(&self, id: i64) -> Option<TmEntry> {
        let mut entries = self.entries.write();
        let pos = entries.iter().position(|e| e.id == id)?;
        Some(entries.remove(pos))
    }
}

#[async_trait]
impl TmStore for InMemoryStore {
    async fn entries_for_language(
        &self,
        language_code: &str,
        context: Option<&str>,
    ) -> Result<Vec<TmEntry>, StoreError> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|e| e.target_language == language_code)
            .filter(|e| context.is_none() || labels_match(context, e.game_context.as_deref()))
            .cloned()
            .collect())
    }

    async fn entry_by_id(&self, id: i64) -> Result<Option<TmEntry>, StoreError> {
        Ok(self.entries.read().iter().find(|e| e.id == id).cloned())
    }

    async fn record_usage(&self, id: i64, used_at: i64) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.usage_count = entry.usage_count.saturating_add(1);
            entry.last_used_at = Some(used_at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> InMemoryStore {
        let mut combat = TmEntry::new(1, "Attack", "Attaquer", "en", "fr");
        combat.game_context = Some("Combat".into());
        InMemoryStore::new(vec![
            combat,
            TmEntry::new(2, "Defend", "Défendre", "en", "fr"),
            TmEntry::new(3, "Attack", "Angreifen", "en", "de"),
        ])
    }

    #[tokio::test]
    async fn test_entries_filtered_by_language_and_context() {
        let store = corpus();
        let fr = store.entries_for_language("fr", None).await.unwrap();
        assert_eq!(fr.len(), 2);

        let combat = store.entries_for_language("fr", Some("combat")).await.unwrap();
        assert_eq!(combat.len(), 1);
        assert_eq!(combat[0].id, 1);

        // Same label comparison as the context boost.
        let padded = store.entries_for_language("fr", Some("  COMBAT ")).await.unwrap();
        assert_eq!(padded.len(), 1);

        assert!(store.entries_for_language("ja", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_usage_updates_entry() {
        let store = corpus();
        store.record_usage(2, 1_700_000_000).await.unwrap();
        let entry = store.entry_by_id(2).await.unwrap().unwrap();
        assert_eq!(entry.usage_count, 1);
        assert_eq!(entry.last_used_at, Some(1_700_000_000));
        // Unknown ids are ignored.
        store.record_usage(99, 1).await.unwrap();
    }

    #[test]
    fn test_upsert_and_remove() {
        let store = corpus();
        store.upsert(TmEntry::new(2, "Defend!", "Défendez !", "en", "fr"));
        assert_eq!(store.len(), 3);
        store.upsert(TmEntry::new(4, "Flee", "Fuir", "en", "fr"));
        assert_eq!(store.len(), 4);
        assert_eq!(store.remove(1).map(|e| e.id), Some(1));
        assert!(store.remove(1).is_none());
    }

    #[test]
    fn test_corpus_file_parses_with_optional_fields() {
        let json = r#"{
            "version": 3,
            "entries": [
                {"id": 1, "source_text": "Attack the enemy", "target_text": "Attaquer l'ennemi",
                 "source_language": "en", "target_language": "fr", "category": "ui"}
            ]
        }"#;
        let file: CorpusFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.version, 3);
        assert_eq!(file.entries[0].category.as_deref(), Some("ui"));
        assert_eq!(file.entries[0].usage_count, 0);
    }
}
