// Granularity domain model - bucketing resolution and the configured floor
use super::error::RangeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time-bucketing resolution, ordered from finest to coarsest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 6] = [
        Granularity::Second,
        Granularity::Minute,
        Granularity::Hour,
        Granularity::Day,
        Granularity::Month,
        Granularity::Year,
    ];

    /// Lowercase wire name, e.g. "minute"
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    /// Display label, e.g. "Minute"
    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Second => "Second",
            Granularity::Minute => "Minute",
            Granularity::Hour => "Hour",
            Granularity::Day => "Day",
            Granularity::Month => "Month",
            Granularity::Year => "Year",
        }
    }

    /// Case-insensitive lookup by name
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|g| g.as_str() == normalized)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RangeError::UnknownGranularity(s.to_string()))
    }
}

/// The `availableGranularities` option: nothing finer than `minimum` is allowed.
///
/// The allowed set is always a suffix of [`Granularity::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub struct GranularityFloor {
    minimum: Granularity,
}

impl GranularityFloor {
    pub fn new(minimum: Granularity) -> Self {
        Self { minimum }
    }

    pub fn minimum(&self) -> Granularity {
        self.minimum
    }

    pub fn allows(&self, granularity: Granularity) -> bool {
        granularity >= self.minimum
    }

    pub fn allowed(&self) -> Vec<Granularity> {
        Granularity::ALL
            .into_iter()
            .filter(|g| self.allows(*g))
            .collect()
    }

    /// Option label, e.g. "From Minute"
    pub fn label(&self) -> String {
        format!("From {}", self.minimum.label())
    }

    /// Accepts "From Day", "from day" or a bare "day"
    pub fn parse(option: &str) -> Result<Self, RangeError> {
        let trimmed = option.trim();
        let unit = match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("from ") => &trimmed[5..],
            _ => trimmed,
        };
        Granularity::parse(unit)
            .map(Self::new)
            .ok_or_else(|| RangeError::UnknownFloor(option.to_string()))
    }
}

impl TryFrom<String> for GranularityFloor {
    type Error = RangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Intersect a mode's supported set with the floor.
///
/// Never empty: when nothing survives the floor, the floor minimum stands in.
pub fn restrict(supported: &[Granularity], floor: GranularityFloor) -> Vec<Granularity> {
    let mut allowed: Vec<Granularity> = supported
        .iter()
        .copied()
        .filter(|g| floor.allows(*g))
        .collect();
    allowed.sort();
    allowed.dedup();

    if allowed.is_empty() {
        vec![floor.minimum()]
    } else {
        allowed
    }
}

/// Keep `candidate` if it is legal, otherwise fall back to the finest legal granularity.
pub fn validate(
    candidate: Option<Granularity>,
    supported: &[Granularity],
    floor: GranularityFloor,
) -> Granularity {
    let allowed = restrict(supported, floor);
    match candidate {
        Some(g) if allowed.contains(&g) => g,
        _ => allowed[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Granularity::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Granularity::parse("Minute"), Some(Minute));
        assert_eq!(Granularity::parse(" HOUR "), Some(Hour));
        assert_eq!(Granularity::parse("fortnight"), None);
        assert!("weeks".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_floor_parse_and_allowed_suffix() {
        let floor = GranularityFloor::parse("From Day").unwrap();
        assert_eq!(floor.minimum(), Day);
        assert_eq!(floor.allowed(), vec![Day, Month, Year]);
        assert_eq!(floor.label(), "From Day");

        assert_eq!(GranularityFloor::parse("from minute").unwrap().minimum(), Minute);
        assert_eq!(GranularityFloor::parse("hour").unwrap().minimum(), Hour);
        assert!(GranularityFloor::parse("From Week").is_err());
        assert_eq!(GranularityFloor::default().allowed(), Granularity::ALL.to_vec());
    }

    #[test]
    fn test_validate_keeps_legal_candidate() {
        let floor = GranularityFloor::new(Second);
        assert_eq!(validate(Some(Hour), &[Second, Minute, Hour], floor), Hour);
    }

    #[test]
    fn test_validate_downgrades_to_finest_allowed() {
        let floor = GranularityFloor::new(Minute);
        assert_eq!(validate(Some(Second), &[Second, Minute, Hour], floor), Minute);
        assert_eq!(validate(None, &[Hour, Day], floor), Hour);
        assert_eq!(validate(Some(Year), &[Hour, Day], floor), Hour);
    }

    #[test]
    fn test_empty_intersection_falls_back_to_floor() {
        let floor = GranularityFloor::new(Day);
        assert_eq!(restrict(&[Second, Minute, Hour], floor), vec![Day]);
        assert_eq!(validate(Some(Minute), &[Second, Minute, Hour], floor), Day);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let supported = [Minute, Hour, Day];
        for floor_min in Granularity::ALL {
            let floor = GranularityFloor::new(floor_min);
            for candidate in Granularity::ALL {
                let once = validate(Some(candidate), &supported, floor);
                let twice = validate(Some(once), &supported, floor);
                assert_eq!(once, twice, "candidate {candidate} floor {floor_min}");
            }
        }
    }
}
