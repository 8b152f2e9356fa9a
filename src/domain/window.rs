// Time window domain model and calculator
use super::error::RangeError;
use super::granularity::{self, Granularity, GranularityFloor};
use super::range::{Anchor, QuickRange, RangeMode, Span};
use chrono::{
    DateTime, Datelike, Days, Local, Months, NaiveDate, TimeDelta, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Zone used for calendar flooring and display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    #[default]
    Local,
    Utc,
}

impl Timezone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timezone::Local => "local",
            Timezone::Utc => "utc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Timezone::Local),
            "utc" => Some(Timezone::Utc),
            _ => None,
        }
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timezone {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RangeError::UnknownTimezone(s.to_string()))
    }
}

/// Resolved, immutable window. `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    timezone: Timezone,
}

impl TimeWindow {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        timezone: Timezone,
    ) -> Result<Self, RangeError> {
        if start >= end {
            return Err(RangeError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            granularity,
            timezone,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn timezone(&self) -> Timezone {
        self.timezone
    }
}

/// Turns a range mode into a concrete window under the configured floor.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowCalculator {
    floor: GranularityFloor,
}

impl WindowCalculator {
    pub fn new(floor: GranularityFloor) -> Self {
        Self { floor }
    }

    pub fn floor(&self) -> GranularityFloor {
        self.floor
    }

    /// Quick window with the range's intrinsic granularity (downgraded if the floor forbids it)
    pub fn compute_quick_window(
        &self,
        range: QuickRange,
        now: DateTime<Utc>,
        timezone: Timezone,
    ) -> Result<TimeWindow, RangeError> {
        self.quick_window_with(range, now, timezone, None)
    }

    pub fn quick_window_with(
        &self,
        range: QuickRange,
        now: DateTime<Utc>,
        timezone: Timezone,
        requested: Option<Granularity>,
    ) -> Result<TimeWindow, RangeError> {
        let bounds = match timezone {
            Timezone::Utc => quick_bounds(range, now),
            Timezone::Local => quick_bounds(range, now.with_timezone(&Local)),
        };
        let (start, end) = bounds.ok_or(RangeError::OutOfRange(range.label()))?;

        let candidate = requested.unwrap_or(range.default_granularity());
        let granularity = granularity::validate(
            Some(candidate),
            range.supported_granularities(),
            self.floor,
        );

        TimeWindow::new(start, end, granularity, timezone)
    }

    /// Absolute window; rejects `start >= end` instead of swapping the bounds
    pub fn compute_custom_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        requested: Option<Granularity>,
        timezone: Timezone,
    ) -> Result<TimeWindow, RangeError> {
        if start >= end {
            return Err(RangeError::InvalidRange { start, end });
        }
        let supported = supported_for_custom(start, end);
        let granularity = granularity::validate(requested, &supported, self.floor);
        TimeWindow::new(start, end, granularity, timezone)
    }

    /// Recompute any mode; quick modes are re-anchored at `now`
    pub fn compute(
        &self,
        mode: &RangeMode,
        now: DateTime<Utc>,
        timezone: Timezone,
        requested: Option<Granularity>,
    ) -> Result<TimeWindow, RangeError> {
        match *mode {
            RangeMode::Quick(range) => self.quick_window_with(range, now, timezone, requested),
            RangeMode::Custom { start, end } => {
                self.compute_custom_window(start, end, requested, timezone)
            }
        }
    }

    /// Legal granularities for `mode` after applying the floor
    pub fn supported_granularities(&self, mode: &RangeMode) -> Vec<Granularity> {
        match *mode {
            RangeMode::Quick(range) => {
                granularity::restrict(range.supported_granularities(), self.floor)
            }
            RangeMode::Custom { start, end } => {
                granularity::restrict(&supported_for_custom(start, end), self.floor)
            }
        }
    }
}

/// Units at which `start` and `end` differ by at least one whole unit.
///
/// Month and year counts are calendar aware, so Jan 15 -> Feb 14 is zero months.
pub fn supported_for_custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Granularity> {
    Granularity::ALL
        .into_iter()
        .filter(|unit| whole_units_between(start, end, *unit) != 0)
        .collect()
}

fn whole_units_between(start: DateTime<Utc>, end: DateTime<Utc>, unit: Granularity) -> i64 {
    let delta = end - start;
    match unit {
        Granularity::Second => delta.num_seconds(),
        Granularity::Minute => delta.num_minutes(),
        Granularity::Hour => delta.num_hours(),
        Granularity::Day => delta.num_days(),
        Granularity::Month => months_between(start, end),
        Granularity::Year => months_between(start, end) / 12,
    }
}

fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    if start >= end {
        return 0;
    }
    let mut months = i64::from(end.year() - start.year()) * 12 + i64::from(end.month())
        - i64::from(start.month());
    while months > 0 {
        let shifted = u32::try_from(months)
            .ok()
            .and_then(|m| start.checked_add_months(Months::new(m)));
        match shifted {
            Some(shifted) if shifted <= end => break,
            _ => months -= 1,
        }
    }
    months
}

fn quick_bounds<Tz: TimeZone>(
    range: QuickRange,
    now: DateTime<Tz>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let back = step_back(&now, range.span())?;
    let (start, end) = match range.anchor() {
        Anchor::Exact => (back, now),
        Anchor::FloorStart(unit) => (floor_to(&back, unit), now),
        Anchor::FloorBoth(unit) => (floor_to(&back, unit), floor_to(&now, unit)),
    };
    Some((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

fn step_back<Tz: TimeZone>(now: &DateTime<Tz>, span: Span) -> Option<DateTime<Tz>> {
    let now = now.clone();
    match span {
        Span::Minutes(n) => now.checked_sub_signed(TimeDelta::try_minutes(n)?),
        Span::Hours(n) => now.checked_sub_signed(TimeDelta::try_hours(n)?),
        Span::Days(n) => now.checked_sub_days(Days::new(n)),
        Span::Months(n) => now.checked_sub_months(Months::new(n)),
    }
}

/// Truncate to the start of `unit` in the datetime's own zone.
///
/// Local times that do not exist (DST gaps) leave the instant untouched.
pub fn floor_to<Tz: TimeZone>(dt: &DateTime<Tz>, unit: Granularity) -> DateTime<Tz> {
    let local = dt.naive_local();
    let date = local.date();
    let floored = match unit {
        Granularity::Second => local.with_nanosecond(0),
        Granularity::Minute => date.and_hms_opt(local.hour(), local.minute(), 0),
        Granularity::Hour => date.and_hms_opt(local.hour(), 0, 0),
        Granularity::Day => date.and_hms_opt(0, 0, 0),
        Granularity::Month => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        Granularity::Year => {
            NaiveDate::from_ymd_opt(date.year(), 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    };

    floored
        .and_then(|naive| dt.timezone().from_local_datetime(&naive).earliest())
        .unwrap_or_else(|| dt.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use Granularity::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn calculator(floor: &str) -> WindowCalculator {
        WindowCalculator::new(GranularityFloor::parse(floor).unwrap())
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let t = at("2024-05-10T12:00:00Z");
        assert!(TimeWindow::new(t, t, Minute, Timezone::Utc).is_err());
        assert!(TimeWindow::new(t, t - TimeDelta::seconds(1), Minute, Timezone::Utc).is_err());
    }

    #[test]
    fn test_every_quick_range_has_start_before_end() {
        let calc = WindowCalculator::default();
        let instants = [
            "2024-05-10T12:34:56Z",
            "2024-03-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            "2023-03-31T23:59:59Z",
        ];
        for now in instants.map(at) {
            for range in QuickRange::STANDARD.into_iter().chain(QuickRange::BACK_LOOKING) {
                for tz in [Timezone::Utc, Timezone::Local] {
                    let window = calc.compute_quick_window(range, now, tz).unwrap();
                    assert!(window.start() < window.end(), "{range} at {now}");
                }
            }
        }
    }

    #[test]
    fn test_last_hour_floors_start_to_minute() {
        let now = at("2024-05-10T12:34:56Z");
        let window = WindowCalculator::default()
            .compute_quick_window(QuickRange::LastHour, now, Timezone::Utc)
            .unwrap();
        assert_eq!(window.start(), at("2024-05-10T11:34:00Z"));
        assert_eq!(window.end(), now);
        assert_eq!(window.granularity(), Minute);
    }

    #[test]
    fn test_last_month_floors_start_to_month() {
        let now = at("2024-05-10T12:34:56Z");
        let window = WindowCalculator::default()
            .compute_quick_window(QuickRange::LastMonth, now, Timezone::Utc)
            .unwrap();
        assert_eq!(window.start(), at("2024-04-01T00:00:00Z"));
        assert_eq!(window.end(), now);
        assert_eq!(window.granularity(), Day);
    }

    #[test]
    fn test_last_three_months_floors_both_ends() {
        let now = at("2024-05-10T12:34:56Z");
        let window = calculator("From Month")
            .compute_quick_window(QuickRange::Last3Months, now, Timezone::Utc)
            .unwrap();
        assert_eq!(window.start(), at("2024-02-01T00:00:00Z"));
        assert_eq!(window.end(), at("2024-05-01T00:00:00Z"));
        assert_eq!(window.granularity(), Month);
    }

    #[test]
    fn test_back_looking_range_is_exact() {
        let now = at("2024-05-10T12:34:56.789Z");
        let window = WindowCalculator::default()
            .compute_quick_window(QuickRange::FifteenMinBack, now, Timezone::Utc)
            .unwrap();
        assert_eq!(window.start(), at("2024-05-10T12:19:56.789Z"));
        assert_eq!(window.end(), now);
    }

    #[test]
    fn test_last_hour_below_day_floor_downgrades_to_day() {
        let now = at("2024-05-10T12:34:56Z");
        let window = calculator("From Day")
            .compute_quick_window(QuickRange::LastHour, now, Timezone::Utc)
            .unwrap();
        assert_eq!(window.granularity(), Day);
    }

    #[test]
    fn test_quick_granularity_is_always_legal() {
        let now = at("2024-05-10T12:34:56Z");
        for floor in Granularity::ALL.map(GranularityFloor::new) {
            let calc = WindowCalculator::new(floor);
            for range in QuickRange::STANDARD.into_iter().chain(QuickRange::BACK_LOOKING) {
                let window = calc.compute_quick_window(range, now, Timezone::Utc).unwrap();
                let legal = calc.supported_granularities(&RangeMode::Quick(range));
                assert!(legal.contains(&window.granularity()), "{range} {floor:?}");
            }
        }
    }

    #[test]
    fn test_requested_quick_granularity_is_honoured_when_legal() {
        let now = at("2024-05-10T12:34:56Z");
        let calc = WindowCalculator::default();
        let window = calc
            .quick_window_with(QuickRange::LastDay, now, Timezone::Utc, Some(Day))
            .unwrap();
        assert_eq!(window.granularity(), Day);

        let window = calc
            .quick_window_with(QuickRange::LastDay, now, Timezone::Utc, Some(Year))
            .unwrap();
        assert_eq!(window.granularity(), Minute);
    }

    #[test]
    fn test_custom_two_days_with_day_floor_supports_only_day() {
        let start = at("2024-05-10T08:15:30Z");
        let end = at("2024-05-12T08:15:30Z");
        let calc = calculator("From Day");
        let mode = RangeMode::Custom { start, end };
        assert_eq!(calc.supported_granularities(&mode), vec![Day]);

        let window = calc.compute_custom_window(start, end, Some(Hour), Timezone::Utc).unwrap();
        assert_eq!(window.granularity(), Day);
    }

    #[test]
    fn test_custom_supported_set_uses_whole_unit_diffs() {
        let start = at("2024-01-15T00:00:00Z");
        let end = at("2024-02-14T12:00:00Z");
        assert_eq!(supported_for_custom(start, end), vec![Second, Minute, Hour, Day]);

        let end = at("2024-03-01T00:00:00Z");
        assert_eq!(supported_for_custom(start, end), vec![Second, Minute, Hour, Day, Month]);

        let end = at("2025-02-01T00:00:00Z");
        assert_eq!(supported_for_custom(start, end), Granularity::ALL.to_vec());

        let end = at("2024-01-15T00:00:30Z");
        assert_eq!(supported_for_custom(start, end), vec![Second]);
    }

    #[test]
    fn test_custom_falls_back_to_finest_configured() {
        let start = at("2024-05-10T00:00:00Z");
        let end = at("2024-05-10T06:00:00Z");
        let window = WindowCalculator::default()
            .compute_custom_window(start, end, None, Timezone::Utc)
            .unwrap();
        assert_eq!(window.granularity(), Second);

        let window = calculator("From Minute")
            .compute_custom_window(start, end, Some(Month), Timezone::Utc)
            .unwrap();
        assert_eq!(window.granularity(), Minute);
    }

    #[test]
    fn test_custom_rejects_inverted_range() {
        let start = at("2024-05-10T00:00:00Z");
        let calc = WindowCalculator::default();
        let err = calc
            .compute_custom_window(start, start, None, Timezone::Utc)
            .unwrap_err();
        assert!(matches!(err, RangeError::InvalidRange { .. }));
        assert!(calc
            .compute_custom_window(start, start - TimeDelta::hours(1), None, Timezone::Utc)
            .is_err());
    }

    #[test]
    fn test_floor_to_units() {
        let dt = at("2024-05-10T12:34:56.789Z");
        assert_eq!(floor_to(&dt, Second), at("2024-05-10T12:34:56Z"));
        assert_eq!(floor_to(&dt, Hour), at("2024-05-10T12:00:00Z"));
        assert_eq!(floor_to(&dt, Day), at("2024-05-10T00:00:00Z"));
        assert_eq!(floor_to(&dt, Year), at("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_timezone_parse() {
        assert_eq!(Timezone::parse("UTC"), Some(Timezone::Utc));
        assert_eq!(Timezone::parse("local"), Some(Timezone::Local));
        assert!("gmt".parse::<Timezone>().is_err());
    }
}
