//! # Consistency Scheduler
//!
//! Owns the timer lifecycle around a [`ConsistencyChecker`]: one run shortly
//! after start, then one per interval until shut down.
//!
//! A tick that arrives while a run is still in flight (for example one
//! triggered through the API) is skipped by the checker's overlap guard.
//! Missed ticks are not replayed.

use crate::consistency::ConsistencyChecker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use truthgraph_core::TruthGraphError;
use truthgraph_core::primitives::DEFAULT_CHECK_INTERVAL_SECS;

/// Smallest interval the scheduler will run at.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Default delay before the first run.
pub const DEFAULT_STARTUP_DELAY_SECS: u64 = 5;

/// Timer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub startup_delay: Duration,
    pub interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(DEFAULT_STARTUP_DELAY_SECS),
            interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
        }
    }
}

/// Handle to a running schedule. Dropping it stops the schedule.
#[derive(Debug)]
pub struct ScheduleHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Stop scheduling and wait for the timer task to exit.
    ///
    /// A run already in progress is allowed to finish.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Consistency schedule task ended abnormally: {}", e);
        }
    }
}

/// Start the startup run and the fixed-interval schedule.
pub fn spawn_consistency_schedule(
    checker: Arc<ConsistencyChecker>,
    config: ScheduleConfig,
) -> ScheduleHandle {
    let (shutdown, mut stop) = watch::channel(false);
    let interval = config.interval.max(MIN_INTERVAL);

    tracing::info!(
        startup_delay_ms = config.startup_delay.as_millis() as u64,
        interval_secs = interval.as_secs(),
        "Consistency schedule started"
    );

    let task = tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(config.startup_delay) => {}
            _ = stop.changed() => return,
        }
        run_once(&checker).await;

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => run_once(&checker).await,
                _ = stop.changed() => break,
            }
        }
        tracing::info!("Consistency schedule stopped");
    });

    ScheduleHandle { shutdown, task }
}

async fn run_once(checker: &ConsistencyChecker) {
    match checker.run_all_checks().await {
        Ok(report) => tracing::debug!(
            total = report.summary().total_issues,
            "Scheduled consistency run complete"
        ),
        Err(TruthGraphError::CheckInProgress) => {
            tracing::info!("Scheduled consistency run skipped: previous run still in progress");
        }
        Err(e) => tracing::error!("Scheduled consistency run failed: {}", e),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::CheckerConfig;
    use crate::store::{GraphExecutor, Params, RelationalExecutor, Row, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts relational calls: exactly one per run.
    #[derive(Default)]
    struct CountingStore {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl GraphExecutor for CountingStore {
        async fn execute(&self, _query: &str, _params: &Params) -> Result<Vec<Row>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl RelationalExecutor for CountingStore {
        async fn execute(&self, _query: &str, _params: &Params) -> Result<Vec<Row>, StoreError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn setup() -> (Arc<CountingStore>, Arc<ConsistencyChecker>) {
        let store = Arc::new(CountingStore::default());
        let checker = Arc::new(ConsistencyChecker::new(
            store.clone(),
            store.clone(),
            CheckerConfig::default(),
        ));
        (store, checker)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_after_startup_delay_then_on_interval() {
        let (store, checker) = setup();
        let handle = spawn_consistency_schedule(
            Arc::clone(&checker),
            ScheduleConfig {
                startup_delay: Duration::from_secs(5),
                interval: Duration::from_secs(600),
            },
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 1);
        assert!(checker.latest_report().is_some());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(1200)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_startup_run() {
        let (store, checker) = setup();
        let handle = spawn_consistency_schedule(checker, ScheduleConfig::default());
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 0);
    }
}
