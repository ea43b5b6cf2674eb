use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a mission. Ranks only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    /// The executor's credential did not authorize the mission.
    Rejected,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Queued => "QUEUED",
            MissionStatus::InProgress => "IN_PROGRESS",
            MissionStatus::Completed => "COMPLETED",
            MissionStatus::Failed => "FAILED",
            MissionStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Some(MissionStatus::Queued),
            "IN_PROGRESS" => Some(MissionStatus::InProgress),
            "COMPLETED" => Some(MissionStatus::Completed),
            "FAILED" => Some(MissionStatus::Failed),
            "REJECTED" => Some(MissionStatus::Rejected),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            MissionStatus::Queued => 0,
            MissionStatus::InProgress => 1,
            MissionStatus::Completed | MissionStatus::Failed | MissionStatus::Rejected => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Whether moving from `self` to `next` is forward progress.
    pub fn can_advance_to(&self, next: MissionStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work as it travels on the `orders` channel and sits in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    #[serde(rename = "mission_id")]
    pub id: String,
    #[serde(default)]
    pub order: String,
    pub status: MissionStatus,
}

impl Mission {
    pub fn queued(id: impl Into<String>, order: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order: order.into(),
            status: MissionStatus::Queued,
        }
    }
}

/// Status transition published on the `status` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub mission_id: String,
    pub status: MissionStatus,
}

impl StatusUpdate {
    pub fn new(mission_id: impl Into<String>, status: MissionStatus) -> Self {
        Self {
            mission_id: mission_id.into(),
            status,
        }
    }
}
