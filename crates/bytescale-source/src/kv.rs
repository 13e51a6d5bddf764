//! Key-value read capability.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::SourceResult;

/// Read-only access to a string key-value store.
#[async_trait]
pub trait KeyValueSource: Send + Sync {
    /// Fetch `key`. `Ok(None)` means the key is absent or empty.
    async fn get(&self, key: &str) -> SourceResult<Option<String>>;
}

/// In-memory key-value source.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }

    /// Remove a key. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }
}

#[async_trait]
impl KeyValueSource for MemorySource {
    async fn get(&self, key: &str) -> SourceResult<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).filter(|v| !v.is_empty()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_round_trip() {
        let source = MemorySource::new();
        assert_eq!(source.get("a").await.unwrap(), None);

        source.set("a", "1");
        assert_eq!(source.get("a").await.unwrap().as_deref(), Some("1"));

        assert!(source.remove("a"));
        assert!(!source.remove("a"));
        assert_eq!(source.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_value_reads_as_absent() {
        let source = MemorySource::new();
        source.set("a", "");
        assert_eq!(source.get("a").await.unwrap(), None);
    }
}
