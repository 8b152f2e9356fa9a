// Range selection errors
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid range: start {start} must be before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("unknown time range '{0}'")]
    UnknownRange(String),

    #[error("unknown granularity '{0}'")]
    UnknownGranularity(String),

    #[error("unknown granularity option '{0}', expected e.g. \"From Minute\"")]
    UnknownFloor(String),

    #[error("unknown timezone '{0}', expected \"utc\" or \"local\"")]
    UnknownTimezone(String),

    #[error("unparseable timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("time range '{0}' falls outside the representable calendar")]
    OutOfRange(&'static str),

    #[error("past ranges are disabled, cannot select '{0}'")]
    PastRangesDisabled(&'static str),

    #[error("auto sync is only available for quick ranges")]
    SyncRequiresQuickRange,

    #[error("auto sync needs a running async runtime")]
    SchedulerUnavailable,
}
