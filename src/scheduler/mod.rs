// pgs3/src/scheduler/mod.rs
pub mod cron;

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backup::BackupOrchestrator;
use crate::restore::RestoreOrchestrator;
use cron::CronSchedule;

/// Drives backup cycles on a cron cadence until cancelled.
///
/// At most one cycle runs at a time. A tick that fires while a cycle is
/// still running is dropped, not queued.
pub struct Scheduler {
    backup: Arc<BackupOrchestrator>,
    startup_restore: Option<Arc<RestoreOrchestrator>>,
    schedule: CronSchedule,
    in_flight: Arc<Mutex<()>>,
    clock: fn() -> DateTime<Local>,
}

impl Scheduler {
    pub fn new(backup: Arc<BackupOrchestrator>, schedule: CronSchedule) -> Self {
        Self {
            backup,
            startup_restore: None,
            schedule,
            in_flight: Arc::new(Mutex::new(())),
            clock: Local::now,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    /// Restore the latest backup once before the schedule is armed.
    pub fn with_startup_restore(mut self, restore: Arc<RestoreOrchestrator>) -> Self {
        self.startup_restore = Some(restore);
        self
    }

    /// Run until `cancel` fires. Returns only after any in-flight cycle has
    /// finished.
    pub async fn run(&self, cancel: CancellationToken) {
        self.restore_on_startup().await;

        info!(schedule = %self.schedule, "backup schedule armed");
        let mut last_tick: Option<DateTime<Local>> = None;
        loop {
            let now = (self.clock)();
            let from = last_tick.map_or(now, |tick| tick.max(now));
            let Some(next) = self.schedule.next_after(&from) else {
                error!(schedule = %self.schedule, "schedule has no further run times");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(next = %next, "waiting for next tick");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("shutdown requested; waiting for running backup to finish");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    last_tick = Some(next);
                    self.on_tick();
                }
            }
        }

        let _idle = self.in_flight.lock().await;
        info!("scheduler stopped");
    }

    /// Runs the configured startup restore. Failures are logged and the
    /// schedule is armed anyway.
    async fn restore_on_startup(&self) {
        let Some(restore) = &self.startup_restore else {
            return;
        };
        match restore.run_restore().await {
            Ok(key) => info!(key = %key, "restore on startup completed"),
            Err(err) => error!(error = %err, "restore on startup failed; continuing with the schedule"),
        }
    }

    /// Start a backup cycle unless one is already running.
    pub fn on_tick(&self) -> Option<JoinHandle<()>> {
        let Ok(guard) = self.in_flight.clone().try_lock_owned() else {
            warn!("previous backup cycle still running; skipping this tick");
            return None;
        };
        let backup = Arc::clone(&self.backup);
        Some(tokio::spawn(async move {
            let _guard = guard;
            match backup.run_cycle().await {
                Ok(report) => info!(
                    key = %report.key,
                    pruned = report.pruned.len(),
                    retention_failed = report.retention_error.is_some(),
                    cleanup_failed = report.cleanup_error.is_some(),
                    "scheduled backup completed"
                ),
                Err(err) => error!(error = %err, "scheduled backup failed"),
            }
        }))
    }
}
