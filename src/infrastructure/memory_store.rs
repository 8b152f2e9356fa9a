// In-process stores backing the session-scoped tiers
use crate::application::state_store::{GlobalStateStore, LocalCache};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Global keyed state shared by every widget of the dashboard session.
#[derive(Debug, Default)]
pub struct InMemoryGlobalState {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryGlobalState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GlobalStateStore for InMemoryGlobalState {
    fn get_global_state(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.read().get(key).cloned()
    }

    fn set_global_state(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Volatile local cache, for tests and for running without a cache file.
#[derive(Debug, Default)]
pub struct InMemoryLocalCache {
    items: RwLock<HashMap<String, String>>,
}

impl InMemoryLocalCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for InMemoryLocalCache {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_global_state_is_keyed() {
        let store = InMemoryGlobalState::new();
        assert!(store.get_global_state("dtrp").is_none());

        store.set_global_state("dtrp", json!({"tr": "lasthour"})).unwrap();
        store.set_global_state("latency", json!({"api": "pizza"})).unwrap();
        assert_eq!(store.get_global_state("dtrp").unwrap()["tr"], "lasthour");

        store.set_global_state("dtrp", json!({"tr": "lastday"})).unwrap();
        assert_eq!(store.get_global_state("dtrp").unwrap()["tr"], "lastday");
        assert_eq!(store.get_global_state("latency").unwrap()["api"], "pizza");
    }

    #[test]
    fn test_local_cache_overwrites() {
        let cache = InMemoryLocalCache::new();
        cache.set_item("k", "one").unwrap();
        cache.set_item("k", "two").unwrap();
        assert_eq!(cache.get_item("k").as_deref(), Some("two"));
        assert!(cache.get_item("missing").is_none());
    }
}
