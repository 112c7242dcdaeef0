//! Diesel row models for compute-engine queue persistence.

use super::schema::{ce_activity, ce_queue};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for queue records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = ce_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QueueRow {
    /// Task identifier.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub uuid: String,
    /// Task type.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub task_type: String,
    /// Owning organization.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub organization_uuid: String,
    /// Target component.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub component_uuid: Option<String>,
    /// Cached component key.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub component_key: Option<String>,
    /// Cached component name.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub component_name: Option<String>,
    /// Main component.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub main_component_uuid: Option<String>,
    /// Cached main component key.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub main_component_key: Option<String>,
    /// Cached main component name.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub main_component_name: Option<String>,
    /// Submitting user.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub submitter_uuid: Option<String>,
    /// Task characteristics.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub characteristics: Value,
    /// Queue status.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub status: String,
    /// Lease holder.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub worker_uuid: Option<String>,
    /// Submission timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
    /// Latest lease timestamp.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub started_at: Option<DateTime<Utc>>,
}

/// Insert model for queue records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ce_queue)]
pub struct NewQueueRow {
    /// Task identifier.
    pub uuid: String,
    /// Task type.
    pub task_type: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Target component.
    pub component_uuid: Option<String>,
    /// Cached component key.
    pub component_key: Option<String>,
    /// Cached component name.
    pub component_name: Option<String>,
    /// Main component.
    pub main_component_uuid: Option<String>,
    /// Cached main component key.
    pub main_component_key: Option<String>,
    /// Cached main component name.
    pub main_component_name: Option<String>,
    /// Submitting user.
    pub submitter_uuid: Option<String>,
    /// Task characteristics.
    pub characteristics: Value,
    /// Queue status.
    pub status: String,
    /// Lease holder.
    pub worker_uuid: Option<String>,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
    /// Latest lease timestamp.
    pub started_at: Option<DateTime<Utc>>,
}

/// Activity record, used both for reads and inserts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = ce_activity)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActivityRow {
    /// Task identifier.
    pub uuid: String,
    /// Task type.
    pub task_type: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Target component.
    pub component_uuid: Option<String>,
    /// Main component.
    pub main_component_uuid: Option<String>,
    /// Submitting user.
    pub submitter_uuid: Option<String>,
    /// Terminal status.
    pub status: String,
    /// Produced analysis.
    pub analysis_uuid: Option<String>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Failure stacktrace.
    pub error_stacktrace: Option<String>,
    /// Failure discriminator.
    pub error_type: Option<String>,
    /// Last lease holder.
    pub worker_uuid: Option<String>,
    /// Archiving node.
    pub node_name: Option<String>,
    /// Latest entry of its series.
    pub is_last: bool,
    /// Series key.
    pub is_last_key: String,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
    /// Latest lease timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Archiving timestamp.
    pub executed_at: DateTime<Utc>,
    /// Time between lease and archiving.
    pub execution_time_ms: Option<i64>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Row update timestamp.
    pub updated_at: DateTime<Utc>,
}
