//! Task view handed to workers and the submission request that creates it.

use super::{CeQueueDomainError, MAX_UUID_LENGTH, TaskUuid, ensure_max_length};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Organization used when a submission names none and has no component.
pub const DEFAULT_ORGANIZATION_UUID: &str = "default-organization";

/// Task type of analysis-report processing requests.
pub const REPORT_TASK_TYPE: &str = "REPORT";

/// Width of the `task_type` column.
const MAX_TASK_TYPE_LENGTH: usize = 40;

/// Width of the `submitter_uuid` column.
const MAX_SUBMITTER_UUID_LENGTH: usize = 255;

/// Component reference carried by a task.
///
/// `key` and `name` are absent when the component is unknown to the
/// component directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskComponent {
    uuid: String,
    key: Option<String>,
    name: Option<String>,
}

impl TaskComponent {
    /// Creates a component reference.
    #[must_use]
    pub fn new(uuid: impl Into<String>, key: Option<String>, name: Option<String>) -> Self {
        Self {
            uuid: uuid.into(),
            key,
            name,
        }
    }

    /// Creates a reference that only knows the component uuid.
    #[must_use]
    pub fn unresolved(uuid: impl Into<String>) -> Self {
        Self::new(uuid, None, None)
    }

    /// Returns the component uuid.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns the component key, if resolved.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the component name, if resolved.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns `true` when both key and name are known.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.key.is_some() && self.name.is_some()
    }
}

/// User who submitted a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSubmitter {
    uuid: String,
    login: Option<String>,
}

impl TaskSubmitter {
    /// Creates a submitter reference.
    #[must_use]
    pub fn new(uuid: impl Into<String>, login: Option<String>) -> Self {
        Self {
            uuid: uuid.into(),
            login,
        }
    }

    /// Returns the submitter uuid.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns the submitter login, when a user directory provided it.
    #[must_use]
    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }
}

/// Immutable task view returned by `submit` and `peek`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    uuid: TaskUuid,
    task_type: String,
    organization_uuid: String,
    component: Option<TaskComponent>,
    main_component: Option<TaskComponent>,
    submitter: Option<TaskSubmitter>,
    characteristics: BTreeMap<String, String>,
}

/// Parameter object for constructing a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskData {
    /// Task identifier.
    pub uuid: TaskUuid,
    /// Task type discriminator.
    pub task_type: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Target component.
    pub component: Option<TaskComponent>,
    /// Main component when the target is a branch, else the component itself.
    pub main_component: Option<TaskComponent>,
    /// Submitting user.
    pub submitter: Option<TaskSubmitter>,
    /// Free-form task characteristics.
    pub characteristics: BTreeMap<String, String>,
}

impl Task {
    /// Creates a task from its parts.
    #[must_use]
    pub fn from_data(data: TaskData) -> Self {
        Self {
            uuid: data.uuid,
            task_type: data.task_type,
            organization_uuid: data.organization_uuid,
            component: data.component,
            main_component: data.main_component,
            submitter: data.submitter,
            characteristics: data.characteristics,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn uuid(&self) -> &TaskUuid {
        &self.uuid
    }

    /// Returns the task type.
    #[must_use]
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Returns the owning organization.
    #[must_use]
    pub fn organization_uuid(&self) -> &str {
        &self.organization_uuid
    }

    /// Returns the target component, if any.
    #[must_use]
    pub const fn component(&self) -> Option<&TaskComponent> {
        self.component.as_ref()
    }

    /// Returns the main component, if any.
    #[must_use]
    pub const fn main_component(&self) -> Option<&TaskComponent> {
        self.main_component.as_ref()
    }

    /// Returns the submitter, if any.
    #[must_use]
    pub const fn submitter(&self) -> Option<&TaskSubmitter> {
        self.submitter.as_ref()
    }

    /// Returns the task characteristics.
    #[must_use]
    pub const fn characteristics(&self) -> &BTreeMap<String, String> {
        &self.characteristics
    }
}

/// Component targeted by a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmitComponent {
    uuid: String,
    main_component_uuid: String,
}

impl SubmitComponent {
    /// Targets a main component directly.
    #[must_use]
    pub fn new(uuid: impl Into<String>) -> Self {
        let uuid = uuid.into();
        Self {
            main_component_uuid: uuid.clone(),
            uuid,
        }
    }

    /// Targets a branch of `main_component_uuid`.
    #[must_use]
    pub fn branch(uuid: impl Into<String>, main_component_uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            main_component_uuid: main_component_uuid.into(),
        }
    }

    /// Returns the targeted component uuid.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns the main component uuid.
    #[must_use]
    pub fn main_component_uuid(&self) -> &str {
        &self.main_component_uuid
    }

    /// Returns `true` when the target is a branch of another component.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.uuid != self.main_component_uuid
    }
}

/// Validated request to enqueue a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeTaskSubmit {
    uuid: TaskUuid,
    task_type: String,
    organization_uuid: Option<String>,
    component: Option<SubmitComponent>,
    submitter_uuid: Option<String>,
    characteristics: BTreeMap<String, String>,
}

impl CeTaskSubmit {
    /// Starts a submission of the given task type with a fresh uuid.
    #[must_use]
    pub fn builder(task_type: impl Into<String>) -> CeTaskSubmitBuilder {
        CeTaskSubmitBuilder::new(task_type)
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn uuid(&self) -> &TaskUuid {
        &self.uuid
    }

    /// Returns the task type.
    #[must_use]
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Returns the explicitly requested organization, if any.
    #[must_use]
    pub fn organization_uuid(&self) -> Option<&str> {
        self.organization_uuid.as_deref()
    }

    /// Returns the targeted component, if any.
    #[must_use]
    pub const fn component(&self) -> Option<&SubmitComponent> {
        self.component.as_ref()
    }

    /// Returns the submitter uuid, if any.
    #[must_use]
    pub fn submitter_uuid(&self) -> Option<&str> {
        self.submitter_uuid.as_deref()
    }

    /// Returns the characteristics.
    #[must_use]
    pub const fn characteristics(&self) -> &BTreeMap<String, String> {
        &self.characteristics
    }
}

/// Builder for [`CeTaskSubmit`].
#[derive(Debug, Clone)]
pub struct CeTaskSubmitBuilder {
    uuid: Option<String>,
    task_type: String,
    organization_uuid: Option<String>,
    component: Option<SubmitComponent>,
    submitter_uuid: Option<String>,
    characteristics: BTreeMap<String, String>,
}

impl CeTaskSubmitBuilder {
    fn new(task_type: impl Into<String>) -> Self {
        Self {
            uuid: None,
            task_type: task_type.into(),
            organization_uuid: None,
            component: None,
            submitter_uuid: None,
            characteristics: BTreeMap::new(),
        }
    }

    /// Uses a caller-chosen uuid instead of a generated one.
    #[must_use]
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Sets the owning organization.
    #[must_use]
    pub fn with_organization_uuid(mut self, organization_uuid: impl Into<String>) -> Self {
        self.organization_uuid = Some(organization_uuid.into());
        self
    }

    /// Sets the targeted component.
    #[must_use]
    pub fn with_component(mut self, component: SubmitComponent) -> Self {
        self.component = Some(component);
        self
    }

    /// Sets the submitter uuid.
    #[must_use]
    pub fn with_submitter_uuid(mut self, submitter_uuid: impl Into<String>) -> Self {
        self.submitter_uuid = Some(submitter_uuid.into());
        self
    }

    /// Adds one characteristic, replacing any previous value for the key.
    #[must_use]
    pub fn with_characteristic(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.characteristics.insert(key.into(), value.into());
        self
    }

    /// Replaces all characteristics.
    #[must_use]
    pub fn with_characteristics(
        mut self,
        characteristics: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.characteristics = characteristics.into_iter().collect();
        self
    }

    /// Validates and builds the submission.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueDomainError`] when the task type is blank, when an
    /// explicit uuid is invalid, or when a value does not fit its persisted
    /// column.
    pub fn build(self) -> Result<CeTaskSubmit, CeQueueDomainError> {
        let task_type = self.task_type.trim().to_owned();
        if task_type.is_empty() {
            return Err(CeQueueDomainError::EmptyTaskType);
        }
        ensure_max_length("task type", &task_type, MAX_TASK_TYPE_LENGTH)?;
        if let Some(organization_uuid) = &self.organization_uuid {
            ensure_max_length("organization uuid", organization_uuid, MAX_UUID_LENGTH)?;
        }
        if let Some(component) = &self.component {
            ensure_max_length("component uuid", component.uuid(), MAX_UUID_LENGTH)?;
            ensure_max_length(
                "main component uuid",
                component.main_component_uuid(),
                MAX_UUID_LENGTH,
            )?;
        }
        if let Some(submitter_uuid) = &self.submitter_uuid {
            ensure_max_length("submitter uuid", submitter_uuid, MAX_SUBMITTER_UUID_LENGTH)?;
        }
        let uuid = match self.uuid {
            Some(explicit) => TaskUuid::new(explicit)?,
            None => TaskUuid::generate(),
        };

        Ok(CeTaskSubmit {
            uuid,
            task_type,
            organization_uuid: self.organization_uuid,
            component: self.component,
            submitter_uuid: self.submitter_uuid,
            characteristics: self.characteristics,
        })
    }
}
