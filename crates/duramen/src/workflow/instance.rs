//! Instance records and status machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Instance created but its runner has not started yet
    Queued,

    /// Runner is executing the workflow body
    Running,

    /// Execution suspended by an explicit pause
    Paused,

    /// Blocked on an external event
    Waiting,

    /// Pause requested while a step body was still executing
    WaitingForPause,

    /// Workflow returned normally; `output` is set
    Complete,

    /// An error escaped the workflow body; `error` is set
    Errored,

    /// Explicitly terminated by the caller
    Terminated,

    /// Status string not recognized by this engine version
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    /// Whether the instance still participates in recovery and event routing.
    ///
    /// Everything except `Complete` and `Terminated` counts as active,
    /// including `Errored`.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Complete | Self::Terminated)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Waiting => write!(f, "waiting"),
            Self::WaitingForPause => write!(f, "waiting_for_pause"),
            Self::Complete => write!(f, "complete"),
            Self::Errored => write!(f, "errored"),
            Self::Terminated => write!(f, "terminated"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The triggering event a workflow instance is created from
///
/// Every valid instance carries one; a persisted record without an event is
/// treated as nonexistent by the storage contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceEvent {
    /// Caller-provided parameters
    pub payload: serde_json::Value,

    /// When the instance was created
    pub timestamp: DateTime<Utc>,

    /// ID of the instance this event belongs to
    pub instance_id: String,
}

impl InstanceEvent {
    /// Build the triggering event for a new instance
    pub fn new(instance_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
            instance_id: instance_id.into(),
        }
    }
}

/// Persisted state of one workflow instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Current lifecycle status
    pub status: InstanceStatus,

    /// The triggering event; absent only in corrupt/deleted records
    pub event: Option<InstanceEvent>,

    /// Workflow return value, set on `Complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Normalized error message, set on `Errored`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstanceRecord {
    /// A freshly created record in `Queued` state
    pub fn queued(event: InstanceEvent) -> Self {
        Self {
            status: InstanceStatus::Queued,
            event: Some(event),
            output: None,
            error: None,
        }
    }
}

/// Merge-patch for [`InstanceRecord`]
///
/// Fields left as `None` are untouched by `update_instance`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstancePatch {
    pub status: Option<InstanceStatus>,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl InstancePatch {
    /// Patch that only changes the status
    pub fn status(status: InstanceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Set the workflow output
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Set the error message
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Apply this patch to a record in place
    pub fn merge_into(&self, record: &mut InstanceRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(output) = &self.output {
            record.output = Some(output.clone());
        }
        if let Some(error) = &self.error {
            record.error = Some(error.clone());
        }
    }
}

/// Compact listing entry returned by `list_instance_summaries`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: String,
    pub status: InstanceStatus,
}
