//! Domain events published by the task CRUD layer.
//!
//! An event names the subjects it targets plus a payload tagged by `kind`.
//! Each kind carries a concrete schema, validated when the event enters the
//! dispatcher (deserialization failure rejects the event at the boundary
//! instead of forwarding an opaque blob).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{TaskId, UserId};

/// Summary of a task document as carried in push notifications.
///
/// The durable task record lives in the CRUD layer; this is only what a
/// client needs to update its view without a refetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    /// Task document identifier.
    pub task_id: TaskId,
    /// Task title.
    pub title: String,
    /// Owning user.
    pub owner_id: UserId,
}

/// Task-state change payload, tagged by `kind` on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was created.
    TaskCreated {
        /// The new task.
        task: TaskSummary,
    },
    /// A task's fields changed.
    TaskUpdated {
        /// The task after the update.
        task: TaskSummary,
    },
    /// A task was shared with additional users.
    TaskShared {
        /// The shared task.
        task: TaskSummary,
        /// User who performed the share.
        #[serde(rename = "sharedBy")]
        shared_by: UserId,
    },
    /// A task was deleted.
    TaskDeleted {
        /// Identifier of the removed task.
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },
}

impl TaskEvent {
    /// Wire-level kind string for this event (`task_created`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskShared { .. } => "task_shared",
            Self::TaskDeleted { .. } => "task_deleted",
        }
    }
}

/// A domain event handed to the notification dispatcher.
///
/// Ephemeral: if no connection is registered for a target subject the event
/// is dropped. Targets are a set (owner plus current share list); a `BTreeSet`
/// keeps delivery order deterministic for tests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Subjects whose connections should receive this event.
    pub target_user_ids: BTreeSet<UserId>,
    /// The tagged payload.
    #[serde(flatten)]
    pub event: TaskEvent,
}

impl DomainEvent {
    /// Build an event for a single target subject.
    pub fn for_user(user: UserId, event: TaskEvent) -> Self {
        Self {
            target_user_ids: BTreeSet::from([user]),
            event,
        }
    }

    /// Build an event for a set of target subjects.
    pub fn for_users(users: impl IntoIterator<Item = UserId>, event: TaskEvent) -> Self {
        Self {
            target_user_ids: users.into_iter().collect(),
            event,
        }
    }
}
