// Mission scheduling use-cases: read a window, fan out per-mission publishes, join

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::db::repositories::MissionRepository;
use crate::enricher::NotificationEnricher;
use crate::errors::{MissionFailure, SchedulerError};
use crate::models::{Mission, MissionExecutionEvent, MissionState};
use crate::queue::EventPublisher;
use crate::telemetry;
use crate::window::{ready_window, upcoming_window};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// The two scheduled use-cases
#[async_trait]
pub trait MissionScheduler: Send + Sync {
    /// Publish an execution event for every approved automatic mission whose time has come.
    /// Returns the number of acknowledged events.
    async fn schedule_ready_missions(&self) -> Result<usize, SchedulerError>;

    /// Publish a preparation notification for every mission entering the lead-time window.
    /// Returns the number of acknowledged notifications.
    async fn notify_upcoming_missions(&self) -> Result<usize, SchedulerError>;
}

/// Outcome of one fan-out batch, in input order
struct BatchOutcome {
    total: usize,
    failures: Vec<(String, MissionFailure)>,
}

impl BatchOutcome {
    fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }

    /// Success count, or `BatchFailed` when any mission failed
    fn into_result(self) -> Result<usize, SchedulerError> {
        let succeeded = self.succeeded();
        let failed = self.failures.len();
        match self.failures.into_iter().next() {
            None => Ok(succeeded),
            Some((first_mission_id, first_error)) => Err(SchedulerError::BatchFailed {
                total: self.total,
                succeeded,
                failed,
                first_mission_id,
                first_error: first_error.to_string(),
            }),
        }
    }
}

/// Orchestrates window evaluation, querying, enrichment and publishing
pub struct MissionSchedulerService {
    missions: Arc<dyn MissionRepository>,
    enricher: Arc<NotificationEnricher>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    minutes_before_execution: i64,
    max_concurrent_publishes: usize,
}

impl MissionSchedulerService {
    pub fn new(
        missions: Arc<dyn MissionRepository>,
        enricher: Arc<NotificationEnricher>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            missions,
            enricher,
            publisher,
            clock,
            minutes_before_execution: config.preparation_notification_minutes,
            max_concurrent_publishes: config.max_concurrent_publishes.max(1),
        }
    }

    pub fn minutes_before_execution(&self) -> i64 {
        self.minutes_before_execution
    }

    /// Run `task` for every mission with at most `max_concurrent_publishes` in flight.
    /// Every task runs to completion; failures are collected, not short-circuited.
    async fn fan_out<'a, F, Fut>(&'a self, missions: &'a [Mission], task: F) -> BatchOutcome
    where
        F: Fn(&'a Mission) -> Fut,
        Fut: Future<Output = Result<(), MissionFailure>> + 'a,
    {
        let tasks: Vec<_> = missions
            .iter()
            .enumerate()
            .map(|(index, mission)| {
                let fut = task(mission);
                async move { (index, fut.await) }
            })
            .collect();

        let mut results: Vec<(usize, Result<(), MissionFailure>)> = stream::iter(tasks)
            .buffer_unordered(self.max_concurrent_publishes)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let failures = results
            .into_iter()
            .filter_map(|(index, result)| result.err().map(|e| (missions[index].id.clone(), e)))
            .collect();

        BatchOutcome {
            total: missions.len(),
            failures,
        }
    }

    async fn publish_execution(
        &self,
        mission: &Mission,
        now: NaiveDateTime,
    ) -> Result<(), MissionFailure> {
        let result = async {
            let event = MissionExecutionEvent::for_mission(mission, now)?;
            self.publisher.publish_execution(&event).await?;
            Ok::<_, MissionFailure>(())
        }
        .await;

        if let Err(e) = &result {
            error!(
                mission_id = %mission.id,
                kind = e.kind(),
                error = %e,
                "Failed to publish mission execution event"
            );
            telemetry::record_publish_failure(e.kind());
        }
        result
    }

    async fn publish_notification(
        &self,
        mission: &Mission,
        now: NaiveDateTime,
    ) -> Result<(), MissionFailure> {
        let result = async {
            let notification = self
                .enricher
                .enrich(mission, self.minutes_before_execution, now)
                .await?;
            self.publisher.publish_notification(&notification).await?;
            Ok::<_, MissionFailure>(())
        }
        .await;

        if let Err(e) = &result {
            error!(
                mission_id = %mission.id,
                kind = e.kind(),
                error = %e,
                "Failed to publish drone preparation notification"
            );
            if matches!(e, MissionFailure::Enrichment(_)) {
                telemetry::record_enrichment_failure();
            }
            telemetry::record_publish_failure(e.kind());
        }
        result
    }
}

#[async_trait]
impl MissionScheduler for MissionSchedulerService {
    #[instrument(skip(self))]
    async fn schedule_ready_missions(&self) -> Result<usize, SchedulerError> {
        let now = self.clock.now();
        let window = ready_window(now);

        let missions = self
            .missions
            .find_ready(MissionState::Approved, true, window.until)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to query ready missions");
                SchedulerError::QueryFailed(e)
            })?;

        if missions.is_empty() {
            debug!(until = %window.until, "No missions ready for execution");
            return Ok(0);
        }
        info!(count = missions.len(), "Scheduling ready missions");

        let outcome = self
            .fan_out(&missions, |mission| self.publish_execution(mission, now))
            .await;
        telemetry::record_missions_scheduled(outcome.succeeded());

        let result = outcome.into_result();
        match &result {
            Ok(count) => info!(count, "Mission execution events published"),
            Err(e) => error!(error = %e, "Ready mission batch failed"),
        }
        result
    }

    #[instrument(skip(self))]
    async fn notify_upcoming_missions(&self) -> Result<usize, SchedulerError> {
        let now = self.clock.now();
        let window = upcoming_window(now, self.minutes_before_execution).ok_or_else(|| {
            error!(
                minutes_before_execution = self.minutes_before_execution,
                "Upcoming window out of range"
            );
            SchedulerError::WindowOutOfRange {
                now,
                minutes_before_execution: self.minutes_before_execution,
            }
        })?;

        let missions = self
            .missions
            .find_upcoming(MissionState::Approved, true, window.after, window.until)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to query upcoming missions");
                SchedulerError::QueryFailed(e)
            })?;

        if missions.is_empty() {
            debug!(after = %window.after, until = %window.until, "No upcoming missions to notify");
            return Ok(0);
        }
        info!(
            count = missions.len(),
            minutes_before_execution = self.minutes_before_execution,
            "Notifying upcoming missions"
        );

        let outcome = self
            .fan_out(&missions, |mission| self.publish_notification(mission, now))
            .await;
        telemetry::record_notifications_published(outcome.succeeded());

        let result = outcome.into_result();
        match &result {
            Ok(count) => info!(count, "Drone preparation notifications published"),
            Err(e) => error!(error = %e, "Upcoming mission batch failed"),
        }
        result
    }
}
