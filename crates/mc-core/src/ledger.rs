use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::mission::{Mission, MissionStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("mission {0} already exists")]
    Duplicate(String),
    #[error("mission id must not be empty")]
    EmptyId,
}

/// What [`MissionLedger::apply_status`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Existing entry moved forward.
    Advanced,
    /// No entry existed; a minimal one was created.
    Inserted,
    /// Event repeated the current status.
    Unchanged,
    /// Event would move the entry backwards; ignored.
    Stale,
}

/// Authoritative in-memory map of mission id to current state.
#[derive(Debug, Default)]
pub struct MissionLedger {
    entries: RwLock<HashMap<String, Mission>>,
}

impl MissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new mission. The stored status is always `QUEUED`.
    pub async fn create(&self, mission: Mission) -> Result<Mission, LedgerError> {
        if mission.id.is_empty() {
            return Err(LedgerError::EmptyId);
        }
        let mut entries = self.entries.write().await;
        if entries.contains_key(&mission.id) {
            return Err(LedgerError::Duplicate(mission.id));
        }
        let stored = Mission {
            status: MissionStatus::Queued,
            ..mission
        };
        entries.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    /// Upsert a status event, never moving an entry backwards.
    pub async fn apply_status(&self, id: &str, status: MissionStatus) -> ApplyOutcome {
        let mut entries = self.entries.write().await;
        let outcome = match entries.get_mut(id) {
            Some(existing) if existing.status == status => ApplyOutcome::Unchanged,
            Some(existing) if existing.status.can_advance_to(status) => {
                existing.status = status;
                ApplyOutcome::Advanced
            }
            Some(_) => ApplyOutcome::Stale,
            None => {
                entries.insert(
                    id.to_string(),
                    Mission {
                        id: id.to_string(),
                        order: String::new(),
                        status,
                    },
                );
                ApplyOutcome::Inserted
            }
        };
        match outcome {
            ApplyOutcome::Inserted => {
                tracing::warn!(target: "mc::ledger", mission_id = %id, %status, "status for unknown mission; inserted")
            }
            ApplyOutcome::Stale => {
                tracing::debug!(target: "mc::ledger", mission_id = %id, %status, "ignored regressive status")
            }
            _ => tracing::debug!(target: "mc::ledger", mission_id = %id, %status, ?outcome, "status applied"),
        }
        outcome
    }

    pub async fn get(&self, id: &str) -> Option<Mission> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Copy of every entry, in no particular order.
    pub async fn snapshot(&self) -> Vec<Mission> {
        self.entries.read().await.values().cloned().collect()
    }
}
