//! Diesel schema for compute-engine queue persistence.

diesel::table! {
    /// Open tasks, pending or held by a worker.
    ce_queue (uuid) {
        /// Task identifier.
        #[max_length = 40]
        uuid -> Varchar,
        /// Task type, e.g. `REPORT`.
        #[max_length = 40]
        task_type -> Varchar,
        /// Owning organization.
        #[max_length = 40]
        organization_uuid -> Varchar,
        /// Target component.
        #[max_length = 40]
        component_uuid -> Nullable<Varchar>,
        /// Cached component key.
        component_key -> Nullable<Text>,
        /// Cached component name.
        component_name -> Nullable<Text>,
        /// Main component when the target is a branch.
        #[max_length = 40]
        main_component_uuid -> Nullable<Varchar>,
        /// Cached main component key.
        main_component_key -> Nullable<Text>,
        /// Cached main component name.
        main_component_name -> Nullable<Text>,
        /// Submitting user.
        #[max_length = 255]
        submitter_uuid -> Nullable<Varchar>,
        /// Task characteristics as a JSON object.
        characteristics -> Jsonb,
        /// `PENDING` or `IN_PROGRESS`.
        #[max_length = 15]
        status -> Varchar,
        /// Lease holder, set iff in progress.
        #[max_length = 40]
        worker_uuid -> Nullable<Varchar>,
        /// Submission timestamp.
        created_at -> Timestamptz,
        /// Last transition timestamp.
        updated_at -> Timestamptz,
        /// Latest lease timestamp.
        started_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// History of finished tasks.
    ce_activity (uuid) {
        /// Task identifier.
        #[max_length = 40]
        uuid -> Varchar,
        /// Task type.
        #[max_length = 40]
        task_type -> Varchar,
        /// Owning organization.
        #[max_length = 40]
        organization_uuid -> Varchar,
        /// Target component.
        #[max_length = 40]
        component_uuid -> Nullable<Varchar>,
        /// Main component.
        #[max_length = 40]
        main_component_uuid -> Nullable<Varchar>,
        /// Submitting user.
        #[max_length = 255]
        submitter_uuid -> Nullable<Varchar>,
        /// `SUCCESS`, `FAILED` or `CANCELED`.
        #[max_length = 15]
        status -> Varchar,
        /// Produced analysis.
        #[max_length = 50]
        analysis_uuid -> Nullable<Varchar>,
        /// Failure message.
        error_message -> Nullable<Text>,
        /// Failure stacktrace.
        error_stacktrace -> Nullable<Text>,
        /// Failure discriminator.
        #[max_length = 20]
        error_type -> Nullable<Varchar>,
        /// Last lease holder.
        #[max_length = 40]
        worker_uuid -> Nullable<Varchar>,
        /// Archiving node.
        #[max_length = 100]
        node_name -> Nullable<Varchar>,
        /// Latest entry of its series.
        is_last -> Bool,
        /// Series key.
        #[max_length = 55]
        is_last_key -> Varchar,
        /// Submission timestamp.
        submitted_at -> Timestamptz,
        /// Latest lease timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Archiving timestamp.
        executed_at -> Timestamptz,
        /// Time between lease and archiving.
        execution_time_ms -> Nullable<Int8>,
        /// Row creation timestamp.
        created_at -> Timestamptz,
        /// Row update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Input payloads of submitted tasks.
    ce_task_input (task_uuid) {
        /// Task identifier.
        #[max_length = 40]
        task_uuid -> Varchar,
        /// Raw payload.
        input_data -> Bytea,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Scanner context blobs of processed tasks.
    ce_scanner_context (task_uuid) {
        /// Task identifier.
        #[max_length = 40]
        task_uuid -> Varchar,
        /// Raw context.
        context_data -> Bytea,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(ce_queue, ce_activity, ce_task_input, ce_scanner_context);
