// Shared in-memory test doubles for the scheduler tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use common::clock::ManualClock;
use common::config::SchedulerConfig;
use common::db::repositories::{AssetLookup, MissionRepository};
use common::enricher::NotificationEnricher;
use common::errors::{DatabaseError, QueueError};
use common::models::{
    Drone, DroneMissionAssignment, DronePreparationNotification, Mission, MissionExecutionEvent,
    MissionOrigin, MissionState, Operator,
};
use common::queue::EventPublisher;
use common::scheduler::MissionSchedulerService;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const FALLBACK_EMAIL: &str = "no-reply@umas.co";

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 7, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Approved automatic mission
pub fn approved_mission(id: &str, estimated: NaiveDateTime) -> Mission {
    Mission {
        id: id.to_string(),
        name: Some(format!("Mission {}", id)),
        operator_id: format!("operator-{}", id),
        origin: MissionOrigin::Automatic,
        state: MissionState::Approved,
        estimated_execution_time: estimated,
        started_at: None,
        ended_at: None,
        is_automatic: true,
        created_at: estimated - chrono::Duration::days(1),
        updated_at: estimated - chrono::Duration::days(1),
    }
}

/// Mission store evaluating the query predicates in memory
#[derive(Default)]
pub struct InMemoryMissions {
    missions: Mutex<Vec<Mission>>,
}

impl InMemoryMissions {
    pub fn new(missions: Vec<Mission>) -> Self {
        Self {
            missions: Mutex::new(missions),
        }
    }

    fn select(&self, predicate: impl Fn(&Mission) -> bool) -> Vec<Mission> {
        let mut selected: Vec<Mission> = self
            .missions
            .lock()
            .unwrap()
            .iter()
            .filter(|m| predicate(m))
            .cloned()
            .collect();
        selected.sort_by_key(|m| m.estimated_execution_time);
        selected
    }
}

#[async_trait]
impl MissionRepository for InMemoryMissions {
    async fn find_ready(
        &self,
        state: MissionState,
        is_automatic: bool,
        before: NaiveDateTime,
    ) -> Result<Vec<Mission>, DatabaseError> {
        Ok(self.select(|m| {
            m.state == state && m.is_automatic == is_automatic && m.estimated_execution_time <= before
        }))
    }

    async fn find_upcoming(
        &self,
        state: MissionState,
        is_automatic: bool,
        after: NaiveDateTime,
        before: NaiveDateTime,
    ) -> Result<Vec<Mission>, DatabaseError> {
        Ok(self.select(|m| {
            m.state == state
                && m.is_automatic == is_automatic
                && after < m.estimated_execution_time
                && m.estimated_execution_time <= before
        }))
    }
}

/// Drone/operator lookups backed by maps
#[derive(Default)]
pub struct InMemoryAssets {
    pub assignments: HashMap<String, DroneMissionAssignment>,
    pub drones: HashMap<String, Drone>,
    pub operators: HashMap<String, Operator>,
    /// Missions whose assignment lookup fails with an infrastructure error
    pub broken_missions: HashSet<String>,
}

impl InMemoryAssets {
    pub fn with_drone(mut self, mission_id: &str, drone_id: &str, vehicle_id: &str, name: &str) -> Self {
        self.assignments.insert(
            mission_id.to_string(),
            DroneMissionAssignment {
                id: format!("assignment-{}", mission_id),
                drone_id: drone_id.to_string(),
                mission_id: mission_id.to_string(),
                assigned_at: at(0, 0),
            },
        );
        self.drones.insert(
            drone_id.to_string(),
            Drone {
                id: drone_id.to_string(),
                name: name.to_string(),
                vehicle_id: vehicle_id.to_string(),
                model: "X8".to_string(),
                status: None,
            },
        );
        self
    }

    pub fn with_operator(mut self, operator_id: &str, email: &str) -> Self {
        self.operators.insert(
            operator_id.to_string(),
            Operator {
                id: operator_id.to_string(),
                username: operator_id.to_string(),
                full_name: "Test Operator".to_string(),
                email: email.to_string(),
                status: None,
                is_available: true,
            },
        );
        self
    }
}

#[async_trait]
impl AssetLookup for InMemoryAssets {
    async fn find_assignment_by_mission(
        &self,
        mission_id: &str,
    ) -> Result<Option<DroneMissionAssignment>, DatabaseError> {
        if self.broken_missions.contains(mission_id) {
            return Err(DatabaseError::ConnectionFailed("connection reset".to_string()));
        }
        Ok(self.assignments.get(mission_id).cloned())
    }

    async fn find_drone(&self, drone_id: &str) -> Result<Option<Drone>, DatabaseError> {
        Ok(self.drones.get(drone_id).cloned())
    }

    async fn find_operator(&self, operator_id: &str) -> Result<Option<Operator>, DatabaseError> {
        Ok(self.operators.get(operator_id).cloned())
    }
}

/// Broker double: records acknowledged events, rejects publishes for failing mission ids
#[derive(Default)]
pub struct RecordingPublisher {
    failing: Mutex<HashSet<String>>,
    pub executions: Mutex<Vec<MissionExecutionEvent>>,
    pub notifications: Mutex<Vec<DronePreparationNotification>>,
}

impl RecordingPublisher {
    pub fn fail_for(&self, mission_id: &str) {
        self.failing.lock().unwrap().insert(mission_id.to_string());
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn executed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.mission_id().to_string())
            .collect();
        ids.sort();
        ids
    }

    pub fn notified_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.mission_id().to_string())
            .collect();
        ids.sort();
        ids
    }

    fn check(&self, mission_id: &str) -> Result<(), QueueError> {
        if self.failing.lock().unwrap().contains(mission_id) {
            return Err(QueueError::PublishFailed("broker unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_execution(&self, event: &MissionExecutionEvent) -> Result<(), QueueError> {
        self.check(event.mission_id())?;
        self.executions.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn publish_notification(
        &self,
        notification: &DronePreparationNotification,
    ) -> Result<(), QueueError> {
        self.check(notification.mission_id())?;
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn scheduler_config(minutes: i64) -> SchedulerConfig {
    SchedulerConfig {
        preparation_notification_minutes: minutes,
        mission_execution_cron: "0 * * * * *".to_string(),
        preparation_notification_cron: "0 * * * * *".to_string(),
        max_concurrent_publishes: 3,
    }
}

/// Service wired to in-memory doubles
pub struct Harness {
    pub service: MissionSchedulerService,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn harness(missions: Vec<Mission>, assets: InMemoryAssets, now: NaiveDateTime, minutes: i64) -> Harness {
    let clock = Arc::new(ManualClock::new(now));
    let publisher = Arc::new(RecordingPublisher::default());
    let service = MissionSchedulerService::new(
        Arc::new(InMemoryMissions::new(missions)),
        Arc::new(NotificationEnricher::new(Arc::new(assets), FALLBACK_EMAIL)),
        publisher.clone(),
        clock.clone(),
        &scheduler_config(minutes),
    );
    Harness {
        service,
        clock,
        publisher,
    }
}
