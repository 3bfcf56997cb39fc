// Enrichment of preparation notifications with drone and operator data
//
// Each lookup degrades to a default value when its record is missing. Only an
// infrastructure error from the lookup layer fails the enrichment.

use crate::db::repositories::AssetLookup;
use crate::errors::{DatabaseError, EnrichmentError};
use crate::models::{
    Drone, DroneMissionAssignment, DronePreparationNotification, Mission, NotificationDraft,
    Operator, UNASSIGNED_VEHICLE_NAME, UNKNOWN_VEHICLE_ID,
};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Vehicle identification carried by a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleInfo {
    pub vehicle_id: String,
    pub vehicle_name: String,
}

impl VehicleInfo {
    pub fn unassigned() -> Self {
        Self {
            vehicle_id: UNKNOWN_VEHICLE_ID.to_string(),
            vehicle_name: UNASSIGNED_VEHICLE_NAME.to_string(),
        }
    }
}

/// Vehicle for a mission given what the lookups returned
///
/// A drone is only used when it belongs to the assignment that was found.
pub fn resolve_vehicle(
    assignment: Option<&DroneMissionAssignment>,
    drone: Option<&Drone>,
) -> VehicleInfo {
    match (assignment, drone) {
        (Some(assignment), Some(drone)) if assignment.drone_id == drone.id => VehicleInfo {
            vehicle_id: drone.vehicle_id.clone(),
            vehicle_name: drone.name.clone(),
        },
        _ => VehicleInfo::unassigned(),
    }
}

/// Recipient email for a mission, falling back when the operator is missing or has no email
pub fn resolve_recipient(operator: Option<&Operator>, fallback: &str) -> String {
    operator
        .map(|op| op.email.trim())
        .filter(|email| !email.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Builds fully populated preparation notifications
pub struct NotificationEnricher {
    lookup: Arc<dyn AssetLookup>,
    fallback_recipient_email: String,
}

impl NotificationEnricher {
    pub fn new(lookup: Arc<dyn AssetLookup>, fallback_recipient_email: impl Into<String>) -> Self {
        Self {
            lookup,
            fallback_recipient_email: fallback_recipient_email.into(),
        }
    }

    pub fn fallback_recipient_email(&self) -> &str {
        &self.fallback_recipient_email
    }

    /// Produce the notification for one mission
    #[instrument(skip(self, mission), fields(mission_id = %mission.id))]
    pub async fn enrich(
        &self,
        mission: &Mission,
        minutes_before_execution: i64,
        published_at: NaiveDateTime,
    ) -> Result<DronePreparationNotification, EnrichmentError> {
        debug!("Enriching preparation notification");

        let lookup_failed = |source: DatabaseError| {
            error!(mission_id = %mission.id, error = %source, "Lookup failed during enrichment");
            EnrichmentError::Lookup {
                mission_id: mission.id.clone(),
                source,
            }
        };

        let (vehicle, operator) = tokio::try_join!(
            self.vehicle_for(mission),
            self.lookup.find_operator(&mission.operator_id)
        )
        .map_err(lookup_failed)?;

        if operator.is_none() {
            warn!(
                mission_id = %mission.id,
                operator_id = %mission.operator_id,
                "Operator not found, using fallback recipient"
            );
        }
        let recipient_email = resolve_recipient(operator.as_ref(), &self.fallback_recipient_email);

        debug!(
            vehicle_id = %vehicle.vehicle_id,
            vehicle_name = %vehicle.vehicle_name,
            recipient_email = %recipient_email,
            "Notification enriched"
        );

        DronePreparationNotification::new(NotificationDraft {
            mission_id: mission.id.clone(),
            mission_name: mission.name.clone(),
            vehicle_id: vehicle.vehicle_id,
            vehicle_name: vehicle.vehicle_name,
            scheduled_execution_time: mission.estimated_execution_time,
            minutes_before_execution,
            published_at,
            recipient_email,
        })
        .map_err(|source| EnrichmentError::Invalid {
            mission_id: mission.id.clone(),
            source,
        })
    }

    async fn vehicle_for(&self, mission: &Mission) -> Result<VehicleInfo, DatabaseError> {
        let Some(assignment) = self.lookup.find_assignment_by_mission(&mission.id).await? else {
            warn!(mission_id = %mission.id, "No drone assignment found for mission");
            return Ok(VehicleInfo::unassigned());
        };

        let drone = self.lookup.find_drone(&assignment.drone_id).await?;
        if drone.is_none() {
            warn!(
                mission_id = %mission.id,
                drone_id = %assignment.drone_id,
                "Assigned drone not found"
            );
        }

        Ok(resolve_vehicle(Some(&assignment), drone.as_ref()))
    }
}
