use crate::domain::granularity::GranularityFloor;
use crate::domain::range::QuickRange;
use anyhow::{Context, ensure};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub picker: PickerConfig,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Options of the date/time range picker widget
#[derive(Debug, Deserialize, Clone)]
pub struct PickerConfig {
    /// Quick range selected when nothing is persisted
    #[serde(default = "default_range")]
    pub default_value: QuickRange,
    /// Finest granularity offered, e.g. "From Minute"
    #[serde(default)]
    pub available_granularities: GranularityFloor,
    /// Seconds between auto-sync refreshes
    #[serde(default = "default_auto_sync_interval")]
    pub auto_sync_interval: u64,
    /// Offer the back-looking ranges ("1 Min Back" ...)
    #[serde(default)]
    pub past_ranges: bool,
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            default_value: default_range(),
            available_granularities: GranularityFloor::default(),
            auto_sync_interval: default_auto_sync_interval(),
            past_ranges: false,
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

impl PickerConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.auto_sync_interval)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.auto_sync_interval > 0,
            "picker.auto_sync_interval must be at least 1 second"
        );
        ensure!(
            self.subscriber_capacity > 0,
            "picker.subscriber_capacity must be positive"
        );
        ensure!(
            self.past_ranges || !self.default_value.is_back_looking(),
            "picker.default_value '{}' needs picker.past_ranges",
            self.default_value
        );
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// JSON file backing the reload-surviving local cache
    #[serde(default = "default_local_cache_path")]
    pub local_cache_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            local_cache_path: default_local_cache_path(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_range() -> QuickRange {
    QuickRange::LastHour
}

const fn default_auto_sync_interval() -> u64 {
    10
}

const fn default_subscriber_capacity() -> usize {
    64
}

fn default_local_cache_path() -> PathBuf {
    PathBuf::from("data/local-cache.json")
}

/// `config/coordinator.toml` (optional) overlaid with `DTRP__SECTION__KEY` variables
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/coordinator").required(false))
        .add_source(config::Environment::with_prefix("DTRP").separator("__"))
        .build()
        .context("Failed to load configuration")?;

    let app_config: AppConfig = settings
        .try_deserialize()
        .context("Invalid configuration")?;
    app_config.picker.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::granularity::Granularity;

    #[test]
    fn test_defaults_apply_to_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.picker.default_value, QuickRange::LastHour);
        assert_eq!(config.picker.available_granularities.minimum(), Granularity::Second);
        assert_eq!(config.picker.sync_interval(), Duration::from_secs(10));
        assert!(!config.picker.past_ranges);
        assert!(config.picker.validate().is_ok());
    }

    #[test]
    fn test_picker_options_parse_from_labels() {
        let config: AppConfig = toml::from_str(
            r#"
            [picker]
            default_value = "Last 7 Days"
            available_granularities = "From Hour"
            auto_sync_interval = 30

            [storage]
            local_cache_path = "/tmp/dtrp.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.picker.default_value, QuickRange::Last7Days);
        assert_eq!(config.picker.available_granularities.minimum(), Granularity::Hour);
        assert_eq!(config.picker.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.storage.local_cache_path, PathBuf::from("/tmp/dtrp.json"));
    }

    #[test]
    fn test_unknown_labels_are_rejected() {
        assert!(toml::from_str::<AppConfig>("[picker]\ndefault_value = \"Last Decade\"").is_err());
        assert!(
            toml::from_str::<AppConfig>("[picker]\navailable_granularities = \"From Week\"")
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = PickerConfig {
            auto_sync_interval: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let back_looking = PickerConfig {
            default_value: QuickRange::OneDayBack,
            ..Default::default()
        };
        assert!(back_looking.validate().is_err());
        assert!(
            PickerConfig {
                past_ranges: true,
                ..back_looking
            }
            .validate()
            .is_ok()
        );
    }
}
