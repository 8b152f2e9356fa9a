// Range domain model - named quick ranges and the selection mode
use super::error::RangeError;
use super::granularity::Granularity;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use Granularity::{Day, Hour, Minute, Month, Second, Year};

/// How far a quick range reaches back from `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Minutes(i64),
    Hours(i64),
    Days(u64),
    Months(u32),
}

/// How the computed bounds are aligned to calendar units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `start = now - span`, `end = now`
    Exact,
    /// Start floored to the unit, end left at `now`
    FloorStart(Granularity),
    /// Both ends floored to the unit
    FloorBoth(Granularity),
}

/// Named relative time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum QuickRange {
    LastHour,
    LastDay,
    Last7Days,
    LastMonth,
    Last3Months,
    Last6Months,
    LastYear,
    OneMinBack,
    FifteenMinBack,
    OneHourBack,
    OneDayBack,
    SevenDaysBack,
    OneMonthBack,
}

struct RangeDefinition {
    label: &'static str,
    span: Span,
    anchor: Anchor,
    default_granularity: Granularity,
    supported: &'static [Granularity],
}

const fn entry(
    label: &'static str,
    span: Span,
    anchor: Anchor,
    default_granularity: Granularity,
    supported: &'static [Granularity],
) -> RangeDefinition {
    RangeDefinition {
        label,
        span,
        anchor,
        default_granularity,
        supported,
    }
}

impl QuickRange {
    pub const STANDARD: [QuickRange; 7] = [
        QuickRange::LastHour,
        QuickRange::LastDay,
        QuickRange::Last7Days,
        QuickRange::LastMonth,
        QuickRange::Last3Months,
        QuickRange::Last6Months,
        QuickRange::LastYear,
    ];

    pub const BACK_LOOKING: [QuickRange; 6] = [
        QuickRange::OneMinBack,
        QuickRange::FifteenMinBack,
        QuickRange::OneHourBack,
        QuickRange::OneDayBack,
        QuickRange::SevenDaysBack,
        QuickRange::OneMonthBack,
    ];

    #[rustfmt::skip]
    fn definition(&self) -> RangeDefinition {
        use Anchor::*;
        use Span::*;
        match self {
            QuickRange::LastHour => entry("Last Hour", Hours(1), FloorStart(Minute), Minute, &[Second, Minute, Hour]),
            QuickRange::LastDay => entry("Last Day", Days(1), FloorStart(Hour), Hour, &[Minute, Hour, Day]),
            QuickRange::Last7Days => entry("Last 7 Days", Days(7), FloorStart(Day), Day, &[Hour, Day]),
            QuickRange::LastMonth => entry("Last Month", Months(1), FloorStart(Month), Day, &[Hour, Day, Month]),
            QuickRange::Last3Months => entry("Last 3 Months", Months(3), FloorBoth(Month), Month, &[Day, Month]),
            QuickRange::Last6Months => entry("Last 6 Months", Months(6), FloorBoth(Month), Month, &[Day, Month]),
            QuickRange::LastYear => entry("Last Year", Months(12), FloorStart(Month), Month, &[Day, Month, Year]),
            QuickRange::OneMinBack => entry("1 Min Back", Minutes(1), Exact, Second, &[Second, Minute]),
            QuickRange::FifteenMinBack => entry("15 Min Back", Minutes(15), Exact, Minute, &[Second, Minute]),
            QuickRange::OneHourBack => entry("1 Hour Back", Hours(1), Exact, Minute, &[Second, Minute, Hour]),
            QuickRange::OneDayBack => entry("1 Day Back", Days(1), Exact, Hour, &[Minute, Hour, Day]),
            QuickRange::SevenDaysBack => entry("7 Days Back", Days(7), Exact, Day, &[Hour, Day]),
            QuickRange::OneMonthBack => entry("1 Month Back", Months(1), Exact, Day, &[Hour, Day, Month]),
        }
    }

    /// Human-readable name, e.g. "Last 7 Days"
    pub fn label(&self) -> &'static str {
        self.definition().label
    }

    /// Serialized tag: label lowercased with spaces stripped, e.g. "last7days"
    pub fn code(&self) -> String {
        normalize(self.label())
    }

    pub fn span(&self) -> Span {
        self.definition().span
    }

    pub fn anchor(&self) -> Anchor {
        self.definition().anchor
    }

    pub fn default_granularity(&self) -> Granularity {
        self.definition().default_granularity
    }

    pub fn supported_granularities(&self) -> &'static [Granularity] {
        self.definition().supported
    }

    pub fn is_back_looking(&self) -> bool {
        Self::BACK_LOOKING.contains(self)
    }

    /// Accepts either the label or the serialized tag, ignoring case and spaces
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = normalize(value);
        Self::STANDARD
            .into_iter()
            .chain(Self::BACK_LOOKING)
            .find(|range| range.code() == wanted)
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for QuickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QuickRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RangeError::UnknownRange(s.to_string()))
    }
}

impl TryFrom<String> for QuickRange {
    type Error = RangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

pub const CUSTOM_CODE: &str = "custom";

/// What the user picked: a relative quick range or an absolute pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    Quick(QuickRange),
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl RangeMode {
    pub fn code(&self) -> String {
        match self {
            RangeMode::Quick(range) => range.code(),
            RangeMode::Custom { .. } => CUSTOM_CODE.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RangeMode::Quick(range) => range.label(),
            RangeMode::Custom { .. } => "Custom",
        }
    }

    pub fn is_quick(&self) -> bool {
        matches!(self, RangeMode::Quick(_))
    }
}
