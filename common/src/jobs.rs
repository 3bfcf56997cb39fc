// Cron-triggered jobs running the scheduling use-cases under their named locks

use crate::config::{LockDurations, Settings};
use crate::errors::{ConfigurationError, SchedulerError};
use crate::lock::{LockConfiguration, LockingTaskExecutor};
use crate::schedule::{next_fire_time, parse_cron_expression};
use crate::scheduler::MissionScheduler;
use crate::telemetry;
use chrono::Local;
use cron::Schedule;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    ScheduleMissions,
    NotifyUpcomingMissions,
}

impl JobKind {
    /// Job name, also used as the lock name
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::ScheduleMissions => "scheduleMissions",
            JobKind::NotifyUpcomingMissions => "notifyUpcomingMissions",
        }
    }
}

/// Result of one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRun {
    Completed(usize),
    /// Another instance held the lock
    Skipped,
    Failed,
}

/// Trigger and lock of one job
#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub kind: JobKind,
    pub cron_expression: String,
    pub schedule: Schedule,
    pub lock: LockConfiguration,
}

impl JobDefinition {
    pub fn new(
        kind: JobKind,
        cron_expression: &str,
        durations: &LockDurations,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            kind,
            cron_expression: cron_expression.to_string(),
            schedule: parse_cron_expression(cron_expression)?,
            lock: LockConfiguration::new(
                kind.name(),
                durations.lock_at_most_for(),
                durations.lock_at_least_for(),
            ),
        })
    }
}

/// Owns the two scheduled jobs and their trigger loops
pub struct MissionSchedulerJobs {
    scheduler: Arc<dyn MissionScheduler>,
    executor: LockingTaskExecutor,
    schedule_missions: JobDefinition,
    notify_upcoming_missions: JobDefinition,
    shutdown_tx: broadcast::Sender<()>,
}

impl MissionSchedulerJobs {
    pub fn new(
        scheduler: Arc<dyn MissionScheduler>,
        executor: LockingTaskExecutor,
        settings: &Settings,
    ) -> Result<Self, ConfigurationError> {
        let schedule_missions = JobDefinition::new(
            JobKind::ScheduleMissions,
            &settings.scheduler.mission_execution_cron,
            &settings.lock.schedule_missions,
        )?;
        let notify_upcoming_missions = JobDefinition::new(
            JobKind::NotifyUpcomingMissions,
            &settings.scheduler.preparation_notification_cron,
            &settings.lock.notify_upcoming_missions,
        )?;
        Ok(Self::with_jobs(
            scheduler,
            executor,
            schedule_missions,
            notify_upcoming_missions,
        ))
    }

    pub fn with_jobs(
        scheduler: Arc<dyn MissionScheduler>,
        executor: LockingTaskExecutor,
        schedule_missions: JobDefinition,
        notify_upcoming_missions: JobDefinition,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            scheduler,
            executor,
            schedule_missions,
            notify_upcoming_missions,
            shutdown_tx,
        }
    }

    pub fn job(&self, kind: JobKind) -> &JobDefinition {
        match kind {
            JobKind::ScheduleMissions => &self.schedule_missions,
            JobKind::NotifyUpcomingMissions => &self.notify_upcoming_missions,
        }
    }

    /// Ask the trigger loops to stop; in-flight runs complete first
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Run both trigger loops until shutdown
    #[instrument(skip(self))]
    pub async fn start(&self) {
        info!(
            schedule_missions_cron = %self.schedule_missions.cron_expression,
            notify_upcoming_missions_cron = %self.notify_upcoming_missions.cron_expression,
            "Starting mission scheduler jobs"
        );

        tokio::join!(
            self.run_loop(&self.schedule_missions),
            self.run_loop(&self.notify_upcoming_missions)
        );

        info!("Mission scheduler jobs stopped");
    }

    async fn run_loop(&self, job: &JobDefinition) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            let now = Local::now();
            let Some(next) = next_fire_time(&job.schedule, &now) else {
                warn!(job = job.kind.name(), "Cron schedule has no further fire times");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(job = job.kind.name(), next_fire = %next, "Waiting for next trigger");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.trigger(job.kind).await;
                }
                _ = shutdown_rx.recv() => {
                    info!(job = job.kind.name(), "Shutdown signal received, stopping job");
                    break;
                }
            }
        }
    }

    /// Run one trigger of `kind` under its lock
    #[instrument(skip(self), fields(job = kind.name()))]
    pub async fn trigger(&self, kind: JobKind) -> JobRun {
        let job = self.job(kind);
        let started = Instant::now();
        let result = self
            .executor
            .run_locked(&job.lock, || self.invoke(kind))
            .await;
        telemetry::record_job_duration(kind.name(), started.elapsed());

        match result {
            Ok(Some(Ok(count))) => {
                if count > 0 {
                    info!(count, "Job completed");
                } else {
                    debug!("Job completed with nothing to publish");
                }
                JobRun::Completed(count)
            }
            Ok(Some(Err(e))) => {
                error!(error = %e, "Job failed");
                JobRun::Failed
            }
            Ok(None) => {
                debug!("Job skipped, lock held by another instance");
                JobRun::Skipped
            }
            Err(e) => {
                error!(error = %e, "Lock acquisition failed, skipping trigger");
                JobRun::Failed
            }
        }
    }

    async fn invoke(&self, kind: JobKind) -> Result<usize, SchedulerError> {
        match kind {
            JobKind::ScheduleMissions => self.scheduler.schedule_ready_missions().await,
            JobKind::NotifyUpcomingMissions => self.scheduler.notify_upcoming_missions().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DatabaseError, StorageError};
    use crate::lock::{DistributedLock, InMemoryLock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScheduler {
        ready_runs: AtomicUsize,
        upcoming_runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl MissionScheduler for CountingScheduler {
        async fn schedule_ready_missions(&self) -> Result<usize, SchedulerError> {
            self.ready_runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SchedulerError::QueryFailed(DatabaseError::QueryFailed(
                    "timeout".to_string(),
                )));
            }
            Ok(2)
        }

        async fn notify_upcoming_missions(&self) -> Result<usize, SchedulerError> {
            self.upcoming_runs.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    struct BrokenLock;

    #[async_trait]
    impl DistributedLock for BrokenLock {
        async fn try_acquire(&self, _config: &LockConfiguration) -> Result<bool, StorageError> {
            Err(StorageError::ConnectionFailed("refused".to_string()))
        }

        async fn release(&self, _config: &LockConfiguration) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn durations() -> LockDurations {
        LockDurations {
            lock_at_most_for_seconds: 60,
            lock_at_least_for_seconds: 0,
        }
    }

    fn jobs(
        scheduler: Arc<CountingScheduler>,
        lock: Arc<dyn DistributedLock>,
        cron: &str,
    ) -> MissionSchedulerJobs {
        MissionSchedulerJobs::with_jobs(
            scheduler,
            LockingTaskExecutor::new(lock),
            JobDefinition::new(JobKind::ScheduleMissions, cron, &durations()).unwrap(),
            JobDefinition::new(JobKind::NotifyUpcomingMissions, cron, &durations()).unwrap(),
        )
    }

    #[test]
    fn test_job_names() {
        assert_eq!(JobKind::ScheduleMissions.name(), "scheduleMissions");
        assert_eq!(JobKind::NotifyUpcomingMissions.name(), "notifyUpcomingMissions");
    }

    #[test]
    fn test_jobs_from_default_settings() {
        let settings = Settings::default();
        let jobs = MissionSchedulerJobs::new(
            Arc::new(CountingScheduler::default()),
            LockingTaskExecutor::new(Arc::new(InMemoryLock::new("node-a"))),
            &settings,
        )
        .unwrap();

        let ready = jobs.job(JobKind::ScheduleMissions);
        assert_eq!(ready.lock.name, "scheduleMissions");
        assert_eq!(ready.lock.lock_at_most_for, Duration::from_secs(120));
        let upcoming = jobs.job(JobKind::NotifyUpcomingMissions);
        assert_eq!(upcoming.lock.name, "notifyUpcomingMissions");
        assert!(upcoming.lock.lock_at_least_for < Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        let mut settings = Settings::default();
        settings.scheduler.preparation_notification_cron = "sometimes".to_string();
        let result = MissionSchedulerJobs::new(
            Arc::new(CountingScheduler::default()),
            LockingTaskExecutor::new(Arc::new(InMemoryLock::new("node-a"))),
            &settings,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_trigger_runs_use_case() {
        let scheduler = Arc::new(CountingScheduler::default());
        let jobs = jobs(scheduler.clone(), Arc::new(InMemoryLock::new("node-a")), "0 * * * * *");

        assert_eq!(jobs.trigger(JobKind::ScheduleMissions).await, JobRun::Completed(2));
        assert_eq!(jobs.trigger(JobKind::NotifyUpcomingMissions).await, JobRun::Completed(0));
        assert_eq!(scheduler.ready_runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.upcoming_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_skips_when_lock_held() {
        let lock = Arc::new(InMemoryLock::new("node-a"));
        let held = LockConfiguration::new("scheduleMissions", Duration::from_secs(60), Duration::ZERO);
        assert!(lock.try_acquire(&held).await.unwrap());

        let scheduler = Arc::new(CountingScheduler::default());
        let jobs = jobs(scheduler.clone(), lock, "0 * * * * *");

        assert_eq!(jobs.trigger(JobKind::ScheduleMissions).await, JobRun::Skipped);
        assert_eq!(scheduler.ready_runs.load(Ordering::SeqCst), 0);
        // The other job has its own lock
        assert_eq!(jobs.trigger(JobKind::NotifyUpcomingMissions).await, JobRun::Completed(0));
    }

    #[tokio::test]
    async fn test_trigger_reports_use_case_failure() {
        let scheduler = Arc::new(CountingScheduler {
            fail: true,
            ..CountingScheduler::default()
        });
        let jobs = jobs(scheduler, Arc::new(InMemoryLock::new("node-a")), "0 * * * * *");

        assert_eq!(jobs.trigger(JobKind::ScheduleMissions).await, JobRun::Failed);
    }

    #[tokio::test]
    async fn test_lock_error_skips_trigger() {
        let scheduler = Arc::new(CountingScheduler::default());
        let jobs = jobs(scheduler.clone(), Arc::new(BrokenLock), "0 * * * * *");

        assert_eq!(jobs.trigger(JobKind::ScheduleMissions).await, JobRun::Failed);
        assert_eq!(scheduler.ready_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_loop_fires_and_stops_on_shutdown() {
        let scheduler = Arc::new(CountingScheduler::default());
        let jobs = Arc::new(jobs(
            scheduler.clone(),
            Arc::new(InMemoryLock::new("node-a")),
            "* * * * * *",
        ));

        let runner = {
            let jobs = jobs.clone();
            tokio::spawn(async move { jobs.start().await })
        };

        tokio::time::sleep(Duration::from_millis(2_200)).await;
        jobs.shutdown();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("job loops did not stop")
            .unwrap();

        assert!(scheduler.ready_runs.load(Ordering::SeqCst) >= 1);
        assert!(scheduler.upcoming_runs.load(Ordering::SeqCst) >= 1);
    }
}
