// src/pipeline/scheduler.rs

//! Fixed-delay poll loop.
//!
//! ```text
//! Idle ──interval elapsed──▶ Running ──cycle done / failed──▶ Idle
//! ```
//!
//! The interval is measured from the end of a cycle, so a slow cycle pushes
//! the next one back instead of overlapping it. A failing cycle is logged and
//! the loop carries on.

use std::future::Future;
use std::time::Duration;

use crate::pipeline::cycle::{CycleReport, Monitor};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Drives a [`Monitor`] on a fixed delay.
pub struct Scheduler {
    monitor: Monitor,
    interval: Duration,
    state: SchedulerState,
    cycles: u64,
}

impl Scheduler {
    pub fn new(monitor: Monitor, interval: Duration) -> Self {
        Self {
            monitor,
            interval,
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Run one cycle, containing any failure.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        self.state = SchedulerState::Running;
        self.cycles += 1;

        let result = self.monitor.run_cycle().await;
        self.state = SchedulerState::Idle;

        match result {
            Ok(report) => {
                let elapsed = report.finished_at - report.started_at;
                log::info!(
                    "Cycle {} done in {} ms: {} listed, {} new, {} sent, {} skipped, {} delivery failure(s)",
                    self.cycles,
                    elapsed.num_milliseconds(),
                    report.listed,
                    report.new_offers,
                    report.deliveries,
                    report.skipped,
                    report.delivery_failures
                );
                Some(report)
            }
            Err(e) => {
                log::error!("Monitoring error in cycle {}: {}", self.cycles, e);
                None
            }
        }
    }

    /// Loop until `shutdown` resolves; returns the monitor.
    ///
    /// Shutdown may interrupt a cycle midway; the known set is only flushed at
    /// the end of a cycle, so an interrupted cycle is repeated after restart.
    pub async fn run_until<F>(mut self, shutdown: F) -> Monitor
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        log::info!("Polling every {} s", self.interval.as_secs());

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.tick() => {}
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state = SchedulerState::Idle;
        log::info!("Scheduler stopped after {} cycle(s)", self.cycles);
        self.monitor
    }

    /// Loop until the process is interrupted.
    pub async fn run_forever(self) -> Monitor {
        self.run_until(std::future::pending()).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, Result};
    use crate::models::Config;
    use crate::pipeline::cycle::Recipients;
    use crate::services::Messenger;
    use crate::storage::StateStore;
    use crate::utils::http::PageFetcher;

    /// Fails the first fetch, then serves an empty listing.
    #[derive(Default)]
    struct FlakyListing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for FlakyListing {
        async fn fetch(&self, _url: &str) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AppError::config("simulated outage"));
            }
            Ok("<html><body><p>Keine Angebote</p></body></html>".into())
        }
    }

    struct Silent;

    #[async_trait]
    impl Messenger for Silent {
        async fn send(&self, _recipient: &str, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    struct NullStore;

    #[async_trait]
    impl StateStore for NullStore {
        async fn load_known(&self) -> Result<BTreeSet<String>> {
            Ok(BTreeSet::new())
        }
        async fn save_known(&self, _known: &BTreeSet<String>) -> Result<()> {
            Ok(())
        }
        async fn expire_known(&self, _ttl: Duration, _now: SystemTime) -> Result<bool> {
            Ok(false)
        }
        async fn load_subscribers(&self) -> Result<BTreeSet<String>> {
            Ok(BTreeSet::new())
        }
        async fn append_subscriber(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn scheduler(pages: Arc<FlakyListing>, interval: Duration) -> Scheduler {
        let monitor = Monitor::new(
            &Config::default(),
            pages,
            Arc::new(Silent),
            Arc::new(NullStore),
            Recipients::Fixed("1".into()),
            BTreeSet::new(),
        )
        .unwrap();
        Scheduler::new(monitor, interval)
    }

    #[tokio::test]
    async fn test_failed_cycle_returns_to_idle() {
        let pages = Arc::new(FlakyListing::default());
        let mut scheduler = scheduler(pages.clone(), Duration::from_secs(60));

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.tick().await.is_none());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.listed, 0);
        assert_eq!(scheduler.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_errors_with_fixed_delay() {
        let pages = Arc::new(FlakyListing::default());
        let scheduler = scheduler(pages.clone(), Duration::from_secs(60));

        // Cycles start at t=0, 60 and 120; shutdown at 130.
        scheduler
            .run_until(tokio::time::sleep(Duration::from_secs(130)))
            .await;

        assert_eq!(pages.calls.load(Ordering::SeqCst), 3);
    }
}
