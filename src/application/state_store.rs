// Persistence collaborator traits and their keys
use anyhow::Result;

/// Global state key owned by the range picker
pub const GLOBAL_STATE_KEY: &str = "dtrp";

/// Local cache key holding the serialized selection
pub const LOCAL_CACHE_KEY: &str = "dashboard.dtrp.values";

/// Local cache key holding the preferred timezone ("utc" / "local")
pub const TIMEZONE_PREFERENCE_KEY: &str = "dashboard.dtrp.tz";

/// Shared key-value space scoped to the dashboard session; survives navigation.
pub trait GlobalStateStore: Send + Sync {
    fn get_global_state(&self, key: &str) -> Option<serde_json::Value>;

    fn set_global_state(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// String cache that survives a full reload.
pub trait LocalCache: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Push pending writes to durable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
