// Auto-sync scheduler - owns the single recurring refresh timer
use crate::domain::error::RangeError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Owned timer handle.
///
/// At most one timer task exists per scheduler: `start` cancels the previous
/// one first, and dropping the scheduler cancels it too. Every timer gets a
/// fresh generation number which the tick callback receives, so callers that
/// serialize ticks behind a lock can discard a tick that raced with `stop`.
#[derive(Debug, Default)]
pub struct AutoSyncScheduler {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl AutoSyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// True while `generation` identifies the live timer
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.generation == generation
    }

    /// Start ticking every `interval`; the first tick fires one interval from now.
    pub fn start<F>(&mut self, interval: Duration, mut tick: F) -> Result<u64, RangeError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| RangeError::SchedulerUnavailable)?;

        self.stop();
        debug_assert!(self.handle.is_none(), "previous sync timer still alive");

        self.generation += 1;
        let generation = self.generation;
        let period = interval.max(MIN_PERIOD);

        let handle = runtime.spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                tick(generation);
            }
        });
        self.handle = Some(handle);

        tracing::debug!("Auto sync timer {} started, period {:?}", generation, period);
        Ok(generation)
    }

    /// Cancel the timer. Returns whether one was running; safe to call repeatedly.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::debug!("Auto sync timer {} stopped", self.generation);
                true
            }
            None => false,
        }
    }
}

impl Drop for AutoSyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
