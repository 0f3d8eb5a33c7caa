//! Fixed-interval driver for the ingestion cycle.
//!
//! Firings sit on a grid of `interval` starting at the moment [`Scheduler::run`]
//! is called. A firing that could only start more than `misfire_grace` after
//! its grid instant is dropped, and at most one cycle executes at a time.

use hl_core::metrics::{record_cycle, CycleOutcome};
use hl_core::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed: usize,
    pub failed: usize,
    pub misfired: usize,
    pub coalesced: usize,
}

/// What a single call to [`Scheduler::fire`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firing {
    Completed,
    Failed,
    /// Another cycle was still running.
    Coalesced,
}

/// Clears the running flag however the cycle future ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    interval: Duration,
    misfire_grace: Duration,
    running: AtomicBool,
    completed: AtomicUsize,
    failed: AtomicUsize,
    misfired: AtomicUsize,
    coalesced: AtomicUsize,
}

impl Scheduler {
    pub fn new(interval: Duration, misfire_grace: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Config("scheduler interval must be greater than zero".to_string()));
        }
        Ok(Self {
            interval,
            misfire_grace,
            running: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            misfired: AtomicUsize::new(0),
            coalesced: AtomicUsize::new(0),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            misfired: self.misfired.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Run `cycle` unless one is already in progress. Errors are logged,
    /// never propagated.
    pub async fn fire<F, Fut, T>(&self, cycle: &F) -> Firing
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("⏭️ Previous cycle still running, skipping this firing");
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            record_cycle(CycleOutcome::Coalesced);
            return Firing::Coalesced;
        }
        let _guard = RunningGuard(&self.running);

        match cycle().await {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                record_cycle(CycleOutcome::Completed);
                Firing::Completed
            }
            Err(e) => {
                error!("❌ Cycle failed: {}", e);
                self.failed.fetch_add(1, Ordering::Relaxed);
                record_cycle(CycleOutcome::Failed);
                Firing::Failed
            }
        }
    }

    /// Fire immediately, then on every interval until `shutdown` is
    /// cancelled. Cancellation is only observed between firings, so a cycle
    /// in progress always runs to completion.
    pub async fn run<F, Fut, T>(&self, cycle: F, shutdown: CancellationToken) -> SchedulerStats
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        info!(
            "⏱️ Scheduler started: every {:?}, misfire grace {:?}",
            self.interval, self.misfire_grace
        );
        let mut ticker = interval_at(Instant::now(), self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let scheduled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                scheduled = ticker.tick() => scheduled,
            };

            let lateness = Instant::now().saturating_duration_since(scheduled);
            if lateness > self.misfire_grace {
                warn!("⏰ Firing missed by {:?}, skipping until next interval", lateness);
                self.misfired.fetch_add(1, Ordering::Relaxed);
                record_cycle(CycleOutcome::Misfired);
                continue;
            }

            self.fire(&cycle).await;
        }

        let stats = self.stats();
        info!(
            "🛑 Scheduler stopped: {} completed, {} failed, {} misfired, {} coalesced",
            stats.completed, stats.failed, stats.misfired, stats.coalesced
        );
        stats
    }
}
