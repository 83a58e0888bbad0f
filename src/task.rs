//! Task records and their derived index entries.
//!
//! A [`Task`] is the durable unit persisted by [`crate::storage::Storage`].
//! An [`IndexEntry`] is the same record minus its description, which is all
//! the index cache keeps in memory and on disk.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Numeric task identity, assigned by the store and never reused.
pub type TaskId = u64;

/// Relation type whose targets must be done before the source can start.
pub const BLOCKED_BY: &str = "blocked_by";

/// Relation type mirrored in both directions by default.
pub const RELATES_TO: &str = "relates_to";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Todo,
    InProgress,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Todo, Status::InProgress, Status::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown status '{}' (expected todo|in_progress|done)",
                    value.trim()
                ))
            })
    }
}

/// Scheduling priority. Variant order is scheduling order: critical first.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Rank used by the selector: critical=0 .. low=3.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown priority '{}' (expected critical|high|medium|low)",
                    value.trim()
                ))
            })
    }
}

/// An outgoing relation stored on its source task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Relation {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: TaskId,
}

impl Relation {
    pub fn new(kind: impl Into<String>, target: TaskId) -> Self {
        Self {
            kind: kind.into(),
            target,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
}

impl Task {
    pub fn has_relation(&self, kind: &str, target: TaskId) -> bool {
        self.relations
            .iter()
            .any(|relation| relation.kind == kind && relation.target == target)
    }

    /// Drop every stored relation pointing at `target`. Returns true if any were removed.
    pub fn purge_relations_to(&mut self, target: TaskId) -> bool {
        let before = self.relations.len();
        self.relations.retain(|relation| relation.target != target);
        before != self.relations.len()
    }

    pub fn entry(&self) -> IndexEntry {
        IndexEntry::from(self)
    }
}

/// Task metadata without the description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for IndexEntry {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            parent_id: task.parent_id,
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            kind: task.kind.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}
