// Publisher - fan-out to subscribing widgets plus the two-tier persistence mirror
use crate::application::state_store::{
    GLOBAL_STATE_KEY, GlobalStateStore, LOCAL_CACHE_KEY, LocalCache, TIMEZONE_PREFERENCE_KEY,
};
use crate::domain::selection::{PersistedSelection, WindowPayload};
use crate::domain::window::Timezone;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct Publisher {
    tx: broadcast::Sender<WindowPayload>,
    global: Arc<dyn GlobalStateStore>,
    local: Arc<dyn LocalCache>,
}

impl Publisher {
    pub fn new(
        capacity: usize,
        global: Arc<dyn GlobalStateStore>,
        local: Arc<dyn LocalCache>,
    ) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, global, local }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowPayload> {
        self.tx.subscribe()
    }

    /// Notify every current subscriber. Returns how many received it.
    pub fn publish(&self, payload: WindowPayload) -> usize {
        tracing::debug!(
            "Publishing window {} -> {} at {}",
            payload.from,
            payload.to,
            payload.granularity
        );
        // No receivers is fine
        self.tx.send(payload).unwrap_or(0)
    }

    /// Mirror the selection into both tiers. Failures only cost future restores.
    pub fn persist(&self, selection: &PersistedSelection) {
        match serde_json::to_value(selection) {
            Ok(value) => {
                if let Err(e) = self.global.set_global_state(GLOBAL_STATE_KEY, value) {
                    tracing::warn!("Failed to write global range state: {:#}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize range selection: {}", e),
        }

        match serde_json::to_string(selection) {
            Ok(raw) => {
                if let Err(e) = self.local.set_item(LOCAL_CACHE_KEY, &raw) {
                    tracing::warn!("Failed to write local range cache: {:#}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize range selection: {}", e),
        }
    }

    pub fn persist_timezone_preference(&self, timezone: Timezone) {
        if let Err(e) = self.local.set_item(TIMEZONE_PREFERENCE_KEY, timezone.as_str()) {
            tracing::warn!("Failed to write timezone preference: {:#}", e);
        }
    }

    /// Corrupt records read as absent
    pub fn load_global(&self) -> Option<PersistedSelection> {
        let value = self.global.get_global_state(GLOBAL_STATE_KEY)?;
        serde_json::from_value(value)
            .map_err(|e| tracing::warn!("Ignoring corrupt global range state: {}", e))
            .ok()
    }

    pub fn load_local(&self) -> Option<PersistedSelection> {
        let raw = self.local.get_item(LOCAL_CACHE_KEY)?;
        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!("Ignoring corrupt local range cache: {}", e))
            .ok()
    }

    pub fn load_timezone_preference(&self) -> Option<Timezone> {
        self.local
            .get_item(TIMEZONE_PREFERENCE_KEY)
            .and_then(|raw| Timezone::parse(&raw))
    }
}
