// State reconciler - merges persisted tiers and configured defaults into one selection
use crate::domain::granularity::{self, Granularity};
use crate::domain::range::{CUSTOM_CODE, QuickRange, RangeMode};
use crate::domain::selection::{PersistedSelection, parse_instant};
use crate::domain::window::{Timezone, WindowCalculator};

/// Which tier the resolved selection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    Global,
    Local,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedState {
    pub mode: RangeMode,
    pub granularity: Granularity,
    pub sync: bool,
    pub timezone: Timezone,
    pub source: StateSource,
}

#[derive(Debug, Clone, Copy)]
pub struct StateReconciler {
    calculator: WindowCalculator,
    default_range: QuickRange,
    past_ranges: bool,
}

impl StateReconciler {
    pub fn new(calculator: WindowCalculator, default_range: QuickRange, past_ranges: bool) -> Self {
        Self {
            calculator,
            default_range,
            past_ranges,
        }
    }

    /// Global beats local beats the configured default. Never fails: anything
    /// unusable degrades to the default range and a validated granularity.
    pub fn resolve_initial_state(
        &self,
        global: Option<&PersistedSelection>,
        local: Option<&PersistedSelection>,
        timezone_preference: Option<Timezone>,
    ) -> ResolvedState {
        let chosen = [
            (global, StateSource::Global),
            (local, StateSource::Local),
        ]
        .into_iter()
        .find_map(|(selection, source)| {
            selection
                .filter(|s| !s.is_empty())
                .map(|s| (s, source))
        });

        let Some((selection, source)) = chosen else {
            tracing::debug!("No persisted range selection, using {}", self.default_range);
            return self.defaults(timezone_preference.unwrap_or_default());
        };

        let timezone = selection
            .tz
            .as_deref()
            .and_then(Timezone::parse)
            .or(timezone_preference)
            .unwrap_or_default();

        let Some(mode) = self.persisted_mode(selection) else {
            tracing::warn!(
                "Persisted range {:?} from {:?} is unusable, falling back to {}",
                selection.tr,
                source,
                self.default_range
            );
            return ResolvedState {
                source,
                ..self.defaults(timezone)
            };
        };

        let requested = selection.g.as_deref().and_then(Granularity::parse);
        let supported = self.calculator.supported_granularities(&mode);
        let granularity = match mode {
            RangeMode::Quick(range) => {
                let legal = requested.filter(|g| supported.contains(g));
                granularity::validate(
                    legal.or(Some(range.default_granularity())),
                    &supported,
                    self.calculator.floor(),
                )
            }
            RangeMode::Custom { .. } => {
                granularity::validate(requested, &supported, self.calculator.floor())
            }
        };

        ResolvedState {
            mode,
            granularity,
            sync: mode.is_quick() && selection.sync.unwrap_or(false),
            timezone,
            source,
        }
    }

    fn persisted_mode(&self, selection: &PersistedSelection) -> Option<RangeMode> {
        let tag = selection.tr.as_deref()?.trim();

        if tag.eq_ignore_ascii_case(CUSTOM_CODE) {
            let start = selection.sd.as_deref().and_then(parse_instant)?;
            let end = selection.ed.as_deref().and_then(parse_instant)?;
            return (start < end).then_some(RangeMode::Custom { start, end });
        }

        let range = QuickRange::parse(tag)?;
        if range.is_back_looking() && !self.past_ranges {
            return None;
        }
        Some(RangeMode::Quick(range))
    }

    fn defaults(&self, timezone: Timezone) -> ResolvedState {
        let mode = RangeMode::Quick(self.default_range);
        let granularity = granularity::validate(
            Some(self.default_range.default_granularity()),
            &self.calculator.supported_granularities(&mode),
            self.calculator.floor(),
        );
        ResolvedState {
            mode,
            granularity,
            sync: false,
            timezone,
            source: StateSource::Default,
        }
    }
}
