// Mission query port and its PostgreSQL implementation

use super::queries::mission_queries;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Mission, MissionState};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::instrument;

/// Read-only access to missions
///
/// Both queries return missions ordered by ascending estimated execution time.
/// Errors are returned as-is; no retry happens at this layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MissionRepository: Send + Sync {
    /// Missions in `state` with `estimated_execution_time <= before`
    async fn find_ready(
        &self,
        state: MissionState,
        is_automatic: bool,
        before: NaiveDateTime,
    ) -> Result<Vec<Mission>, DatabaseError>;

    /// Missions in `state` with `after < estimated_execution_time <= before`
    async fn find_upcoming(
        &self,
        state: MissionState,
        is_automatic: bool,
        after: NaiveDateTime,
        before: NaiveDateTime,
    ) -> Result<Vec<Mission>, DatabaseError>;
}

/// Repository backed by the `mission` table
pub struct PgMissionRepository {
    pool: DbPool,
}

impl PgMissionRepository {
    /// Create a new PgMissionRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Reject rows that break the mission invariants instead of scheduling them
fn checked(missions: Vec<Mission>) -> Result<Vec<Mission>, DatabaseError> {
    for mission in &missions {
        mission.validate().map_err(|e| DatabaseError::InvalidRow {
            table: "mission".to_string(),
            reason: format!("mission {}: {}", mission.id, e),
        })?;
    }
    Ok(missions)
}

#[async_trait]
impl MissionRepository for PgMissionRepository {
    #[instrument(skip(self))]
    async fn find_ready(
        &self,
        state: MissionState,
        is_automatic: bool,
        before: NaiveDateTime,
    ) -> Result<Vec<Mission>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM mission
            WHERE state::text = $1
              AND is_automatic = $2
              AND estimated_date <= $3
            ORDER BY estimated_date ASC
            "#,
            mission_queries::SELECT_ALL_COLUMNS
        );

        let missions = sqlx::query_as::<_, Mission>(&query)
            .bind(state.as_db_label())
            .bind(is_automatic)
            .bind(before)
            .fetch_all(self.pool.pool())
            .await?;

        tracing::debug!(count = missions.len(), "Found missions ready for execution");
        checked(missions)
    }

    #[instrument(skip(self))]
    async fn find_upcoming(
        &self,
        state: MissionState,
        is_automatic: bool,
        after: NaiveDateTime,
        before: NaiveDateTime,
    ) -> Result<Vec<Mission>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM mission
            WHERE state::text = $1
              AND is_automatic = $2
              AND estimated_date > $3
              AND estimated_date <= $4
            ORDER BY estimated_date ASC
            "#,
            mission_queries::SELECT_ALL_COLUMNS
        );

        let missions = sqlx::query_as::<_, Mission>(&query)
            .bind(state.as_db_label())
            .bind(is_automatic)
            .bind(after)
            .bind(before)
            .fetch_all(self.pool.pool())
            .await?;

        tracing::debug!(count = missions.len(), "Found upcoming missions");
        checked(missions)
    }
}
