// Drone / operator lookup port and its PostgreSQL implementation

use super::queries::{assignment_queries, drone_queries, operator_queries};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Drone, DroneMissionAssignment, DroneStatus, Operator, OperatorStatus};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::instrument;

/// Lookups used to enrich preparation notifications
///
/// `Ok(None)` means the record does not exist; `Err` is an infrastructure failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetLookup: Send + Sync {
    /// Earliest assignment of a drone to the mission (smallest `assigned_at`)
    async fn find_assignment_by_mission(
        &self,
        mission_id: &str,
    ) -> Result<Option<DroneMissionAssignment>, DatabaseError>;

    async fn find_drone(&self, drone_id: &str) -> Result<Option<Drone>, DatabaseError>;

    async fn find_operator(&self, operator_id: &str) -> Result<Option<Operator>, DatabaseError>;
}

/// Lookup backed by the `drone_mission_assignment`, `drone` and `operator` tables
pub struct PgAssetRepository {
    pool: DbPool,
}

impl PgAssetRepository {
    /// Create a new PgAssetRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn assignment_from_row(row: &PgRow) -> Result<DroneMissionAssignment, DatabaseError> {
    Ok(DroneMissionAssignment {
        id: row.try_get("id")?,
        drone_id: row.try_get("drone_id")?,
        mission_id: row.try_get("mission_id")?,
        assigned_at: row.try_get("assigned_at")?,
    })
}

fn drone_from_row(row: &PgRow) -> Result<Drone, DatabaseError> {
    let status: Option<String> = row.try_get("status")?;
    Ok(Drone {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        vehicle_id: row.try_get("vehicle_id")?,
        model: row.try_get("model")?,
        // Unknown labels are informational only, never a lookup failure
        status: status.and_then(|s| DroneStatus::from_str(&s).ok()),
    })
}

fn operator_from_row(row: &PgRow) -> Result<Operator, DatabaseError> {
    let status: Option<String> = row.try_get("status")?;
    Ok(Operator {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        status: status.and_then(|s| OperatorStatus::from_str(&s).ok()),
        is_available: row.try_get("is_available")?,
    })
}

#[async_trait]
impl AssetLookup for PgAssetRepository {
    #[instrument(skip(self))]
    async fn find_assignment_by_mission(
        &self,
        mission_id: &str,
    ) -> Result<Option<DroneMissionAssignment>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM drone_mission_assignment
            WHERE mission_id::text = $1
            ORDER BY assigned_at ASC
            LIMIT 1
            "#,
            assignment_queries::SELECT_ALL_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(mission_id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.as_ref().map(assignment_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_drone(&self, drone_id: &str) -> Result<Option<Drone>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM drone WHERE id::text = $1",
            drone_queries::SELECT_ALL_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(drone_id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.as_ref().map(drone_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_operator(&self, operator_id: &str) -> Result<Option<Operator>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM operator WHERE id::text = $1",
            operator_queries::SELECT_ALL_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(operator_id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.as_ref().map(operator_from_row).transpose()
    }
}
