// Range coordinator - the picker state machine shared by every dashboard widget
use crate::application::auto_sync::AutoSyncScheduler;
use crate::application::clock::Clock;
use crate::application::publisher::Publisher;
use crate::application::reconciler::StateReconciler;
use crate::domain::error::RangeError;
use crate::domain::granularity::{Granularity, GranularityFloor};
use crate::domain::range::{QuickRange, RangeMode};
use crate::domain::selection::{PersistedSelection, WindowPayload};
use crate::domain::window::{TimeWindow, Timezone, WindowCalculator};
use crate::infrastructure::config::PickerConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Snapshot of the active selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub mode: RangeMode,
    pub window: TimeWindow,
    pub sync: bool,
}

struct State {
    mode: RangeMode,
    window: TimeWindow,
    sync: bool,
    scheduler: AutoSyncScheduler,
}

impl State {
    fn snapshot(&self) -> Selection {
        Selection {
            mode: self.mode,
            window: self.window,
            sync: self.sync,
        }
    }
}

struct Shared {
    calculator: WindowCalculator,
    reconciler: StateReconciler,
    publisher: Arc<Publisher>,
    clock: Arc<dyn Clock>,
    sync_interval: Duration,
    past_ranges: bool,
    state: Mutex<State>,
}

/// Owns the active selection, republishes it on every change and keeps the
/// optional auto-sync timer. Dropping the coordinator cancels the timer.
pub struct RangeCoordinator {
    shared: Arc<Shared>,
}

impl RangeCoordinator {
    /// Hydrate from the persisted tiers (or config defaults) and publish the first window.
    pub fn load(
        picker: &PickerConfig,
        publisher: Arc<Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RangeError> {
        let calculator = WindowCalculator::new(picker.available_granularities);
        let reconciler =
            StateReconciler::new(calculator, picker.default_value, picker.past_ranges);

        let global = publisher.load_global();
        let local = publisher.load_local();
        let resolved = reconciler.resolve_initial_state(
            global.as_ref(),
            local.as_ref(),
            publisher.load_timezone_preference(),
        );
        let window = calculator.compute(
            &resolved.mode,
            clock.now(),
            resolved.timezone,
            Some(resolved.granularity),
        )?;

        tracing::info!(
            "Range picker restored {} at {} ({:?} state, sync {})",
            resolved.mode.label(),
            window.granularity(),
            resolved.source,
            resolved.sync
        );

        let shared = Arc::new(Shared {
            calculator,
            reconciler,
            publisher,
            clock,
            sync_interval: picker.sync_interval(),
            past_ranges: picker.past_ranges,
            state: Mutex::new(State {
                mode: resolved.mode,
                window,
                sync: false,
                scheduler: AutoSyncScheduler::new(),
            }),
        });

        {
            let mut state = shared.state.lock();
            Shared::commit(&shared, &mut state, resolved.mode, window, resolved.sync);
        }

        Ok(Self { shared })
    }

    pub fn current(&self) -> Selection {
        self.shared.state.lock().snapshot()
    }

    pub fn supported_granularities(&self) -> Vec<Granularity> {
        let state = self.shared.state.lock();
        self.shared.calculator.supported_granularities(&state.mode)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowPayload> {
        self.shared.publisher.subscribe()
    }

    pub fn past_ranges_enabled(&self) -> bool {
        self.shared.past_ranges
    }

    /// Quick ranges a user may pick under the current options
    pub fn available_ranges(&self) -> Vec<QuickRange> {
        let back_looking: &[QuickRange] = if self.shared.past_ranges {
            &QuickRange::BACK_LOOKING
        } else {
            &[]
        };
        QuickRange::STANDARD
            .iter()
            .chain(back_looking)
            .copied()
            .collect()
    }

    pub fn granularity_floor(&self) -> GranularityFloor {
        self.shared.calculator.floor()
    }

    /// Switch to a quick range at its intrinsic granularity. Stops auto sync.
    pub fn select_quick(&self, range: QuickRange) -> Result<Selection, RangeError> {
        if range.is_back_looking() && !self.shared.past_ranges {
            return Err(RangeError::PastRangesDisabled(range.label()));
        }

        let mut state = self.shared.state.lock();
        let window = self.shared.calculator.compute_quick_window(
            range,
            self.shared.clock.now(),
            state.window.timezone(),
        )?;
        Ok(Shared::commit(&self.shared, &mut state, RangeMode::Quick(range), window, false))
    }

    /// Switch to an absolute range. An inverted range leaves the current window in place.
    pub fn select_custom(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Option<Granularity>,
    ) -> Result<Selection, RangeError> {
        let mut state = self.shared.state.lock();
        let window = self.shared.calculator.compute_custom_window(
            start,
            end,
            granularity,
            state.window.timezone(),
        )?;
        Ok(Shared::commit(
            &self.shared,
            &mut state,
            RangeMode::Custom { start, end },
            window,
            false,
        ))
    }

    /// Recompute the current mode at `granularity`, downgraded if it is not legal.
    /// Stops auto sync.
    pub fn set_granularity(&self, granularity: Granularity) -> Result<Selection, RangeError> {
        let mut state = self.shared.state.lock();
        let window = self.shared.calculator.compute(
            &state.mode,
            self.shared.clock.now(),
            state.window.timezone(),
            Some(granularity),
        )?;
        let mode = state.mode;
        Ok(Shared::commit(&self.shared, &mut state, mode, window, false))
    }

    pub fn set_timezone(&self, timezone: Timezone) -> Result<Selection, RangeError> {
        let mut state = self.shared.state.lock();
        let window = self.shared.calculator.compute(
            &state.mode,
            self.shared.clock.now(),
            timezone,
            Some(state.window.granularity()),
        )?;
        let (mode, sync) = (state.mode, state.sync);
        let selection = Shared::commit(&self.shared, &mut state, mode, window, sync);
        self.shared.publisher.persist_timezone_preference(timezone);
        Ok(selection)
    }

    /// Enabling restarts the timer, so repeated enables never stack timers.
    /// Disabling is idempotent and only announces an actual change.
    pub fn set_sync(&self, enabled: bool) -> Result<Selection, RangeError> {
        let mut state = self.shared.state.lock();
        if enabled {
            if !state.mode.is_quick() {
                return Err(RangeError::SyncRequiresQuickRange);
            }
            Shared::start_timer(&self.shared, &mut state)?;
        } else {
            let was_running = state.scheduler.stop();
            if !was_running && !state.sync {
                return Ok(state.snapshot());
            }
            state.sync = false;
        }
        self.shared.announce(&state);
        Ok(state.snapshot())
    }

    /// Slide the current mode to `now` and republish; what a sync tick does
    pub fn refresh(&self) -> Result<Selection, RangeError> {
        let mut state = self.shared.state.lock();
        self.shared.recompute(&mut state)?;
        self.shared.announce(&state);
        Ok(state.snapshot())
    }

    /// Adopt a shared selection (e.g. from a link) as the highest-precedence tier
    pub fn apply_persisted(&self, selection: &PersistedSelection) -> Result<Selection, RangeError> {
        let resolved = self.shared.reconciler.resolve_initial_state(
            Some(selection),
            None,
            self.shared.publisher.load_timezone_preference(),
        );
        let mut state = self.shared.state.lock();
        let window = self.shared.calculator.compute(
            &resolved.mode,
            self.shared.clock.now(),
            resolved.timezone,
            Some(resolved.granularity),
        )?;
        Ok(Shared::commit(
            &self.shared,
            &mut state,
            resolved.mode,
            window,
            resolved.sync,
        ))
    }

    /// Cancel the sync timer; no tick fires afterwards
    pub fn shutdown(&self) {
        if self.shared.state.lock().scheduler.stop() {
            tracing::info!("Range picker auto sync cancelled");
        }
    }
}

impl Drop for RangeCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    /// Install a new window and announce it. The timer keeps running only when
    /// `sync` is requested for a quick range, and is restarted from this point.
    fn commit(
        shared: &Arc<Shared>,
        state: &mut State,
        mode: RangeMode,
        window: TimeWindow,
        sync: bool,
    ) -> Selection {
        state.mode = mode;
        state.window = window;

        if sync && mode.is_quick() {
            if let Err(e) = Self::start_timer(shared, state) {
                tracing::warn!("Auto sync disabled: {}", e);
                state.sync = false;
            }
        } else {
            state.scheduler.stop();
            state.sync = false;
        }

        shared.announce(state);
        state.snapshot()
    }

    fn start_timer(shared: &Arc<Shared>, state: &mut State) -> Result<(), RangeError> {
        let weak = Arc::downgrade(shared);
        state
            .scheduler
            .start(shared.sync_interval, move |generation| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_tick(generation);
                }
            })?;
        state.sync = true;
        Ok(())
    }

    fn on_tick(&self, generation: u64) {
        let mut state = self.state.lock();
        // A stop that raced this tick wins
        if !state.scheduler.is_current(generation) {
            return;
        }
        match self.recompute(&mut state) {
            Ok(()) => self.announce(&state),
            Err(e) => tracing::warn!("Auto sync recompute failed: {}", e),
        }
    }

    fn recompute(&self, state: &mut State) -> Result<(), RangeError> {
        state.window = self.calculator.compute(
            &state.mode,
            self.clock.now(),
            state.window.timezone(),
            Some(state.window.granularity()),
        )?;
        Ok(())
    }

    fn announce(&self, state: &State) {
        self.publisher
            .publish(WindowPayload::new(&state.window, state.sync));
        self.persist(state);
    }

    fn persist(&self, state: &State) {
        self.publisher.persist(&PersistedSelection::from_state(
            &state.mode,
            &state.window,
            state.sync,
        ));
    }
}
