//! Outputs the user chose to keep, independent of the live session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::templates::StyleKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedThread {
    pub id: Uuid,
    pub content: String,
    pub style: StyleKey,
    pub timestamp: DateTime<Utc>,
}

/// Saved threads, most recent first.
#[derive(Debug, Clone, Default)]
pub struct SavedStore {
    threads: Vec<SavedThread>,
}

impl SavedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, content: impl Into<String>, style: StyleKey) -> &SavedThread {
        let thread = SavedThread {
            id: Uuid::new_v4(),
            content: content.into(),
            style,
            timestamp: Utc::now(),
        };
        tracing::debug!(id = %thread.id, style = %thread.style, "saved thread");
        self.threads.insert(0, thread);
        &self.threads[0]
    }

    /// Removes the thread with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.threads.len();
        self.threads.retain(|thread| thread.id != id);
        self.threads.len() != before
    }

    pub fn get(&self, index: usize) -> Option<&SavedThread> {
        self.threads.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SavedThread> {
        self.threads.iter()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_prepends() {
        let mut store = SavedStore::new();
        store.save("A", StyleKey::new("NATURAL"));
        store.save("B", StyleKey::new("PROFESSIONAL"));

        let contents: Vec<&str> = store.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["B", "A"]);
        assert_eq!(store.get(1).unwrap().style.as_str(), "NATURAL");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = SavedStore::new();
        let id = store.save("A", StyleKey::new("NATURAL")).id;
        store.save("B", StyleKey::new("NATURAL"));

        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().content, "B");
    }

    #[test]
    fn test_remove_unknown_id() {
        let mut store = SavedStore::new();
        assert!(!store.remove(Uuid::new_v4()));
        assert!(store.is_empty());
    }
}
