use crate::errors::ValidationError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Name used in events when a mission has no name of its own
pub const DEFAULT_MISSION_NAME: &str = "Scheduled Mission";

/// Vehicle id used when a mission has no drone assignment
pub const UNKNOWN_VEHICLE_ID: &str = "UNKNOWN";

/// Vehicle name used when a mission has no drone assignment
pub const UNASSIGNED_VEHICLE_NAME: &str = "Not Assigned";

// ============================================================================
// Mission Models
// ============================================================================

/// MissionOrigin describes how a mission was created
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionOrigin {
    Manual,
    Automatic,
}

impl MissionOrigin {
    /// Label stored in the `mission_type` database enum
    pub fn as_db_label(&self) -> &'static str {
        match self {
            MissionOrigin::Manual => "MANUAL",
            MissionOrigin::Automatic => "AUTOMATICA",
        }
    }
}

impl FromStr for MissionOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(MissionOrigin::Manual),
            "AUTOMATICA" | "AUTOMATIC" => Ok(MissionOrigin::Automatic),
            _ => Err(format!("Invalid mission origin: {}", s)),
        }
    }
}

impl TryFrom<String> for MissionOrigin {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// MissionState is the lifecycle state of a mission
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionState {
    PendingApproval,
    Approved,
    InProgress,
    Paused,
    Completed,
    Aborted,
    Failed,
    Archived,
}

impl MissionState {
    /// Label stored in the `mission_state` database enum
    pub fn as_db_label(&self) -> &'static str {
        match self {
            MissionState::PendingApproval => "PENDIENTE_APROBACION",
            MissionState::Approved => "APROBADA",
            MissionState::InProgress => "EN_EJECUCION",
            MissionState::Paused => "PAUSADA",
            MissionState::Completed => "FINALIZADA",
            MissionState::Aborted => "ABORTADA",
            MissionState::Failed => "FALLIDA",
            MissionState::Archived => "ARCHIVADA",
        }
    }

    /// Terminal states: the mission will never run again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MissionState::Completed
                | MissionState::Aborted
                | MissionState::Failed
                | MissionState::Archived
        )
    }
}

impl std::fmt::Display for MissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MissionState::PendingApproval => "PENDING_APPROVAL",
            MissionState::Approved => "APPROVED",
            MissionState::InProgress => "IN_PROGRESS",
            MissionState::Paused => "PAUSED",
            MissionState::Completed => "COMPLETED",
            MissionState::Aborted => "ABORTED",
            MissionState::Failed => "FAILED",
            MissionState::Archived => "ARCHIVED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for MissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDIENTE_APROBACION" | "PENDING_APPROVAL" => Ok(MissionState::PendingApproval),
            "APROBADA" | "APPROVED" => Ok(MissionState::Approved),
            "EN_EJECUCION" | "IN_PROGRESS" => Ok(MissionState::InProgress),
            "PAUSADA" | "PAUSED" => Ok(MissionState::Paused),
            "FINALIZADA" | "COMPLETED" => Ok(MissionState::Completed),
            "ABORTADA" | "ABORTED" => Ok(MissionState::Aborted),
            "FALLIDA" | "FAILED" => Ok(MissionState::Failed),
            "ARCHIVADA" | "ARCHIVED" => Ok(MissionState::Archived),
            _ => Err(format!("Invalid mission state: {}", s)),
        }
    }
}

impl TryFrom<String> for MissionState {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// Mission is a read-only view of a mission owned by the mission-management system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Mission {
    pub id: String,
    pub name: Option<String>,
    pub operator_id: String,
    #[sqlx(try_from = "String")]
    pub origin: MissionOrigin,
    #[sqlx(try_from = "String")]
    pub state: MissionState,
    pub estimated_execution_time: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub is_automatic: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Mission {
    /// Check the mission invariants
    ///
    /// Ids must be non-blank, a mission cannot start before its estimated time
    /// and cannot end before it started.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }
        if self.operator_id.trim().is_empty() {
            return Err(ValidationError::MissingField("operator_id".to_string()));
        }
        if let Some(started_at) = self.started_at {
            if started_at < self.estimated_execution_time {
                return Err(ValidationError::InvalidFieldValue {
                    field: "started_at".to_string(),
                    reason: "cannot be before the estimated execution time".to_string(),
                });
            }
            if let Some(ended_at) = self.ended_at {
                if ended_at < started_at {
                    return Err(ValidationError::InvalidFieldValue {
                        field: "ended_at".to_string(),
                        reason: "cannot be before started_at".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Name to put on outgoing events, defaulted when absent or blank
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => DEFAULT_MISSION_NAME.to_string(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.state == MissionState::Approved
    }

    pub fn is_manual(&self) -> bool {
        self.origin == MissionOrigin::Manual
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the scheduler may ever act on this mission
    pub fn is_schedulable(&self) -> bool {
        self.is_automatic && self.is_approved()
    }

    pub fn should_have_started(&self, now: NaiveDateTime) -> bool {
        self.estimated_execution_time <= now
    }

    pub fn is_scheduled_for_future(&self, now: NaiveDateTime) -> bool {
        self.estimated_execution_time > now
    }
}

// ============================================================================
// Drone / Operator lookup records
// ============================================================================

/// DroneStatus is informational, the scheduler never filters on it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneStatus {
    Active,
    InMaintenance,
    Repairing,
    OutOfService,
    Decommissioned,
}

impl FromStr for DroneStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(DroneStatus::Active),
            "IN_MAINTENANCE" => Ok(DroneStatus::InMaintenance),
            "REPAIRING" => Ok(DroneStatus::Repairing),
            "OUT_OF_SERVICE" => Ok(DroneStatus::OutOfService),
            "DECOMMISSIONED" => Ok(DroneStatus::Decommissioned),
            _ => Err(format!("Invalid drone status: {}", s)),
        }
    }
}

/// DroneMissionAssignment links a drone to a mission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DroneMissionAssignment {
    pub id: String,
    pub drone_id: String,
    pub mission_id: String,
    pub assigned_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drone {
    pub id: String,
    pub name: String,
    pub vehicle_id: String,
    pub model: String,
    pub status: Option<DroneStatus>,
}

/// OperatorStatus is informational, like DroneStatus
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorStatus {
    Active,
    Inactive,
    Suspended,
}

impl FromStr for OperatorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(OperatorStatus::Active),
            "INACTIVE" => Ok(OperatorStatus::Inactive),
            "SUSPENDED" => Ok(OperatorStatus::Suspended),
            _ => Err(format!("Invalid operator status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operator {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub status: Option<OperatorStatus>,
    pub is_available: bool,
}

// ============================================================================
// Domain events
// ============================================================================

/// MissionExecutionEvent announces that an automatic mission must run now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionExecutionEvent {
    mission_id: String,
    mission_name: String,
    scheduled_at: NaiveDateTime,
    published_at: NaiveDateTime,
}

impl MissionExecutionEvent {
    pub fn new(
        mission_id: impl Into<String>,
        mission_name: Option<String>,
        scheduled_at: NaiveDateTime,
        published_at: NaiveDateTime,
    ) -> Result<Self, ValidationError> {
        let mission_id = mission_id.into();
        if mission_id.trim().is_empty() {
            return Err(ValidationError::MissingField("mission_id".to_string()));
        }
        Ok(Self {
            mission_id,
            mission_name: non_blank_or_default(mission_name),
            scheduled_at,
            published_at,
        })
    }

    /// Build the execution event for a mission whose time has come
    pub fn for_mission(mission: &Mission, now: NaiveDateTime) -> Result<Self, ValidationError> {
        Self::new(
            mission.id.clone(),
            mission.name.clone(),
            mission.estimated_execution_time,
            now,
        )
    }

    pub fn mission_id(&self) -> &str {
        &self.mission_id
    }

    pub fn mission_name(&self) -> &str {
        &self.mission_name
    }

    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.scheduled_at
    }

    pub fn published_at(&self) -> NaiveDateTime {
        self.published_at
    }
}

/// DronePreparationNotification asks the operator to prepare the drone ahead of execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DronePreparationNotification {
    mission_id: String,
    mission_name: String,
    vehicle_id: String,
    vehicle_name: String,
    scheduled_execution_time: NaiveDateTime,
    minutes_before_execution: i64,
    published_at: NaiveDateTime,
    recipient_email: String,
}

/// Fields of a preparation notification before validation
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub mission_id: String,
    pub mission_name: Option<String>,
    pub vehicle_id: String,
    pub vehicle_name: String,
    pub scheduled_execution_time: NaiveDateTime,
    pub minutes_before_execution: i64,
    pub published_at: NaiveDateTime,
    pub recipient_email: String,
}

impl DronePreparationNotification {
    pub fn new(draft: NotificationDraft) -> Result<Self, ValidationError> {
        if draft.mission_id.trim().is_empty() {
            return Err(ValidationError::MissingField("mission_id".to_string()));
        }
        if draft.minutes_before_execution <= 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "minutes_before_execution".to_string(),
                reason: format!("must be positive, got {}", draft.minutes_before_execution),
            });
        }
        if draft.recipient_email.trim().is_empty() {
            return Err(ValidationError::MissingField("recipient_email".to_string()));
        }
        Ok(Self {
            mission_id: draft.mission_id,
            mission_name: non_blank_or_default(draft.mission_name),
            vehicle_id: draft.vehicle_id,
            vehicle_name: draft.vehicle_name,
            scheduled_execution_time: draft.scheduled_execution_time,
            minutes_before_execution: draft.minutes_before_execution,
            published_at: draft.published_at,
            recipient_email: draft.recipient_email,
        })
    }

    pub fn mission_id(&self) -> &str {
        &self.mission_id
    }

    pub fn mission_name(&self) -> &str {
        &self.mission_name
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn vehicle_name(&self) -> &str {
        &self.vehicle_name
    }

    pub fn scheduled_execution_time(&self) -> NaiveDateTime {
        self.scheduled_execution_time
    }

    pub fn minutes_before_execution(&self) -> i64 {
        self.minutes_before_execution
    }

    pub fn published_at(&self) -> NaiveDateTime {
        self.published_at
    }

    pub fn recipient_email(&self) -> &str {
        &self.recipient_email
    }
}

fn non_blank_or_default(name: Option<String>) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name,
        _ => DEFAULT_MISSION_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn mission() -> Mission {
        Mission {
            id: "8c0e4f5e-8a3b-4c59-9c59-0d1f7a2b6c11".to_string(),
            name: Some("Perimeter sweep".to_string()),
            operator_id: "op-1".to_string(),
            origin: MissionOrigin::Manual,
            state: MissionState::Approved,
            estimated_execution_time: at(10, 30),
            started_at: None,
            ended_at: None,
            is_automatic: true,
            created_at: at(8, 0),
            updated_at: at(8, 0),
        }
    }

    #[test]
    fn test_mission_state_db_labels_parse_back() {
        for state in [
            MissionState::PendingApproval,
            MissionState::Approved,
            MissionState::InProgress,
            MissionState::Paused,
            MissionState::Completed,
            MissionState::Aborted,
            MissionState::Failed,
            MissionState::Archived,
        ] {
            assert_eq!(MissionState::from_str(state.as_db_label()), Ok(state));
            assert_eq!(MissionState::from_str(&state.to_string()), Ok(state));
        }
        assert!(MissionState::from_str("UNKNOWN").is_err());
    }

    #[test]
    fn test_lookup_status_labels() {
        assert_eq!(DroneStatus::from_str("IN_MAINTENANCE"), Ok(DroneStatus::InMaintenance));
        assert_eq!(OperatorStatus::from_str("SUSPENDED"), Ok(OperatorStatus::Suspended));
        assert!(OperatorStatus::from_str("Activo").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(MissionState::Completed.is_terminal());
        assert!(MissionState::Aborted.is_terminal());
        assert!(MissionState::Failed.is_terminal());
        assert!(MissionState::Archived.is_terminal());
        assert!(!MissionState::Approved.is_terminal());
        assert!(!MissionState::Paused.is_terminal());
    }

    #[test]
    fn test_mission_validation() {
        assert!(mission().validate().is_ok());

        let mut blank_id = mission();
        blank_id.id = "  ".to_string();
        assert_eq!(
            blank_id.validate(),
            Err(ValidationError::MissingField("id".to_string()))
        );

        let mut early_start = mission();
        early_start.started_at = Some(at(10, 0));
        assert!(early_start.validate().is_err());

        let mut ended_before_start = mission();
        ended_before_start.started_at = Some(at(10, 45));
        ended_before_start.ended_at = Some(at(10, 40));
        assert!(ended_before_start.validate().is_err());
    }

    #[test]
    fn test_display_name_defaults() {
        let mut m = mission();
        assert_eq!(m.display_name(), "Perimeter sweep");
        m.name = Some("   ".to_string());
        assert!(!m.has_name());
        assert_eq!(m.display_name(), DEFAULT_MISSION_NAME);
        m.name = None;
        assert_eq!(m.display_name(), DEFAULT_MISSION_NAME);
    }

    #[test]
    fn test_schedulable_requires_approved_and_automatic() {
        let mut m = mission();
        assert!(m.is_schedulable());
        m.is_automatic = false;
        assert!(!m.is_schedulable());
        m.is_automatic = true;
        m.state = MissionState::PendingApproval;
        assert!(!m.is_schedulable());
    }

    #[test]
    fn test_should_have_started_includes_estimated_instant() {
        let m = mission();
        assert!(!m.should_have_started(at(10, 29)));
        assert!(m.should_have_started(at(10, 30)));
        assert!(m.should_have_started(at(11, 0)));
    }

    #[test]
    fn test_is_scheduled_for_future_excludes_estimated_instant() {
        let m = mission();
        assert!(m.is_scheduled_for_future(at(10, 29)));
        assert!(!m.is_scheduled_for_future(at(10, 30)));
        assert!(!m.is_scheduled_for_future(at(11, 0)));
    }

    #[test]
    fn test_execution_event_rejects_blank_mission_id() {
        let result = MissionExecutionEvent::new("", None, at(10, 0), at(10, 0));
        assert_eq!(
            result,
            Err(ValidationError::MissingField("mission_id".to_string()))
        );
    }

    #[test]
    fn test_execution_event_for_mission() {
        let event = MissionExecutionEvent::for_mission(&mission(), at(10, 31)).unwrap();
        assert_eq!(event.scheduled_at(), at(10, 30));
        assert_eq!(event.published_at(), at(10, 31));
        assert_eq!(event.mission_name(), "Perimeter sweep");
    }

    #[test]
    fn test_notification_rejects_non_positive_minutes() {
        let draft = NotificationDraft {
            mission_id: "m-1".to_string(),
            mission_name: None,
            vehicle_id: UNKNOWN_VEHICLE_ID.to_string(),
            vehicle_name: UNASSIGNED_VEHICLE_NAME.to_string(),
            scheduled_execution_time: at(10, 30),
            minutes_before_execution: 0,
            published_at: at(10, 0),
            recipient_email: "ops@example.com".to_string(),
        };
        assert!(DronePreparationNotification::new(draft.clone()).is_err());

        let blank_email = NotificationDraft {
            minutes_before_execution: 30,
            recipient_email: " ".to_string(),
            ..draft.clone()
        };
        assert!(DronePreparationNotification::new(blank_email).is_err());

        let valid = NotificationDraft {
            minutes_before_execution: 30,
            ..draft
        };
        let notification = DronePreparationNotification::new(valid).unwrap();
        assert_eq!(notification.mission_name(), DEFAULT_MISSION_NAME);
    }
}
