// SQL query constants for repositories
// Centralizes the SELECT column lists and their casts

/// SQL query fragments for the mission table
pub mod mission_queries {
    /// Columns of `mission` aliased onto the `Mission` model
    ///
    /// UUID and enum columns are cast to text; enum labels are parsed by the model.
    pub const SELECT_ALL_COLUMNS: &str = r#"id::text AS id, name, operator_id::text AS operator_id,
        mission_type::text AS origin, state::text AS state,
        estimated_date AS estimated_execution_time,
        start_date AS started_at, end_date AS ended_at,
        is_automatic, created_at, updated_at"#;
}

/// SQL query fragments for the drone_mission_assignment table
pub mod assignment_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id::text AS id, drone_id::text AS drone_id,
        mission_id::text AS mission_id, assigned_at"#;
}

/// SQL query fragments for the drone table
pub mod drone_queries {
    pub const SELECT_ALL_COLUMNS: &str =
        r#"id::text AS id, name, vehicle_id, model, status::text AS status"#;
}

/// SQL query fragments for the operator table
pub mod operator_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id::text AS id, username, full_name, email,
        status::text AS status, COALESCE(is_available, true) AS is_available"#;
}
