// Wire forms of a selection: the persisted record and the published payload
use super::range::RangeMode;
use super::window::TimeWindow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Selection as written to the global and local persistence tiers.
///
/// Every field is optional on read so partial or hand-edited records still hydrate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
}

impl PersistedSelection {
    pub fn from_state(mode: &RangeMode, window: &TimeWindow, sync: bool) -> Self {
        Self {
            tr: Some(mode.code()),
            sd: Some(format_instant(window.start())),
            ed: Some(format_instant(window.end())),
            g: Some(window.granularity().as_str().to_string()),
            sync: Some(sync),
            tz: Some(window.timezone().as_str().to_string()),
        }
    }

    /// A record without a range tag carries no selection
    pub fn is_empty(&self) -> bool {
        self.tr.as_deref().map(str::trim).unwrap_or_default().is_empty()
    }

    /// Encode as URL query parameters, e.g. `tr=lasthour&g=minute&sync=false&tz=utc`
    pub fn to_query_string(&self) -> String {
        let sync = self.sync.map(|s| s.to_string());
        [
            ("tr", self.tr.as_deref()),
            ("sd", self.sd.as_deref()),
            ("ed", self.ed.as_deref()),
            ("g", self.g.as_deref()),
            ("sync", sync.as_deref()),
            ("tz", self.tz.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, urlencoding::encode(v))))
        .collect::<Vec<_>>()
        .join("&")
    }

    /// Decode URL query parameters; unknown keys and undecodable values are ignored
    pub fn from_query_string(query: &str) -> Self {
        let mut selection = Self::default();
        let query = query.trim_start_matches('?');

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let raw = raw.replace('+', " ");
            let Ok(value) = urlencoding::decode(&raw) else {
                continue;
            };
            let value = value.into_owned();
            match key {
                "tr" => selection.tr = Some(value),
                "sd" => selection.sd = Some(value),
                "ed" => selection.ed = Some(value),
                "g" => selection.g = Some(value),
                "sync" => selection.sync = value.parse().ok(),
                "tz" => selection.tz = Some(value),
                _ => {}
            }
        }

        selection
    }
}

/// RFC 3339 in UTC with millisecond precision
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts RFC 3339 or epoch milliseconds
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Notification pushed to subscribing widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPayload {
    /// Epoch milliseconds
    pub from: i64,
    /// Epoch milliseconds
    pub to: i64,
    pub granularity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<bool>,
}

impl WindowPayload {
    pub fn new(window: &TimeWindow, sync: bool) -> Self {
        Self {
            from: window.start().timestamp_millis(),
            to: window.end().timestamp_millis(),
            granularity: window.granularity().as_str().to_string(),
            sync: Some(sync),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::granularity::Granularity;
    use crate::domain::range::QuickRange;
    use crate::domain::window::Timezone;

    fn sample_window() -> TimeWindow {
        TimeWindow::new(
            parse_instant("2024-05-10T11:34:00Z").unwrap(),
            parse_instant("2024-05-10T12:34:56.789Z").unwrap(),
            Granularity::Minute,
            Timezone::Utc,
        )
        .unwrap()
    }

    #[test]
    fn test_from_state_uses_wire_names() {
        let mode = RangeMode::Quick(QuickRange::LastHour);
        let selection = PersistedSelection::from_state(&mode, &sample_window(), true);
        assert_eq!(selection.tr.as_deref(), Some("lasthour"));
        assert_eq!(selection.sd.as_deref(), Some("2024-05-10T11:34:00.000Z"));
        assert_eq!(selection.ed.as_deref(), Some("2024-05-10T12:34:56.789Z"));
        assert_eq!(selection.g.as_deref(), Some("minute"));
        assert_eq!(selection.sync, Some(true));
        assert_eq!(selection.tz.as_deref(), Some("utc"));
    }

    #[test]
    fn test_json_shape() {
        let mode = RangeMode::Quick(QuickRange::Last7Days);
        let selection = PersistedSelection::from_state(&mode, &sample_window(), false);
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["tr"], "last7days");
        assert_eq!(json["sync"], false);

        let partial: PersistedSelection = serde_json::from_str(r#"{"tr":"custom"}"#).unwrap();
        assert_eq!(partial.tr.as_deref(), Some("custom"));
        assert!(partial.sd.is_none());
    }

    #[test]
    fn test_query_string_encodes_and_decodes() {
        let selection = PersistedSelection::from_state(
            &RangeMode::Custom {
                start: sample_window().start(),
                end: sample_window().end(),
            },
            &sample_window(),
            false,
        );
        let query = selection.to_query_string();
        assert!(query.starts_with("tr=custom&sd=2024-05-10T11%3A34%3A00.000Z"));
        assert_eq!(PersistedSelection::from_query_string(&query), selection);
        assert_eq!(PersistedSelection::from_query_string(&format!("?{query}")), selection);
    }

    #[test]
    fn test_query_string_ignores_noise() {
        let selection =
            PersistedSelection::from_query_string("tr=Last+Hour&sync=maybe&foo=bar&&g&tz=%55tc");
        assert_eq!(selection.tr.as_deref(), Some("Last Hour"));
        assert_eq!(selection.tz.as_deref(), Some("Utc"));
        assert_eq!(selection.sync, None);
        assert_eq!(selection.g.as_deref(), Some(""));
        assert!(PersistedSelection::from_query_string("").is_empty());
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = parse_instant("2024-05-10T12:00:00Z").unwrap();
        assert_eq!(parse_instant("1715342400000"), Some(expected));
        assert_eq!(parse_instant("2024-05-10T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_instant("yesterday"), None);
    }

    #[test]
    fn test_payload_carries_epoch_millis() {
        let payload = WindowPayload::new(&sample_window(), false);
        assert_eq!(payload.to - payload.from, 3_656_789);
        assert_eq!(payload.granularity, "minute");
        assert_eq!(payload.sync, Some(false));
    }
}
