//! Storage seam for participants, problems, phase outputs and phase status
//! (spec §6 external interfaces).
//!
//! Only point lookup and full scan are required, so the trait stays narrow:
//! no queries, no schema. `InMemoryRepository` is the in-process test double;
//! a real deployment backs this with whatever the surrounding platform
//! already uses for document storage.

use super::{PhaseKind, PhaseOutputKind, PhaseStatus};
use crate::model::{Participant, Problem};
use crate::types::RunId;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage seam the orchestrator reads snapshots from and writes phase
/// outputs and status to. Outputs are replaced atomically per phase; status
/// is appended to, never retroactively edited except by an explicit rerun
/// (spec §6).
pub trait Repository: Send + Sync {
    /// Full scan of all participants in this run's snapshot.
    fn list_participants(&self) -> Result<Vec<Participant>>;
    /// Full scan of all problems in this run's snapshot.
    fn list_problems(&self) -> Result<Vec<Problem>>;
    /// Replace a phase's output for `run_id`.
    fn save_output(&self, run_id: &RunId, kind: PhaseOutputKind, data: serde_json::Value) -> Result<()>;
    /// Load a phase's output for `run_id`, if it was ever saved.
    fn load_output(&self, run_id: &RunId, kind: PhaseOutputKind) -> Result<Option<serde_json::Value>>;
    /// Remove a phase's output for `run_id`, used when a rerun invalidates it.
    fn clear_output(&self, run_id: &RunId, kind: PhaseOutputKind) -> Result<()>;
    /// Record a phase's current status for `run_id`.
    fn save_status(&self, run_id: &RunId, phase: PhaseKind, status: PhaseStatus) -> Result<()>;
    /// Load a phase's current status for `run_id`, defaulting to idle.
    fn load_status(&self, run_id: &RunId, phase: PhaseKind) -> Result<Option<PhaseStatus>>;
}

/// In-memory `Repository` backing local runs and tests.
#[derive(Default)]
pub struct InMemoryRepository {
    participants: Mutex<Vec<Participant>>,
    problems: Mutex<Vec<Problem>>,
    outputs: Mutex<HashMap<(RunId, String), serde_json::Value>>,
    statuses: Mutex<HashMap<(RunId, PhaseKind), PhaseStatus>>,
}

impl InMemoryRepository {
    /// Seed the repository with a run's participant and problem snapshot.
    pub fn seeded(participants: Vec<Participant>, problems: Vec<Problem>) -> Self {
        Self {
            participants: Mutex::new(participants),
            problems: Mutex::new(problems),
            outputs: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    fn poisoned() -> Error {
        Error::storage_unavailable("in-memory repository lock poisoned")
    }
}

impl Repository for InMemoryRepository {
    fn list_participants(&self) -> Result<Vec<Participant>> {
        Ok(self.participants.lock().map_err(|_| Self::poisoned())?.clone())
    }

    fn list_problems(&self) -> Result<Vec<Problem>> {
        Ok(self.problems.lock().map_err(|_| Self::poisoned())?.clone())
    }

    fn save_output(&self, run_id: &RunId, kind: PhaseOutputKind, data: serde_json::Value) -> Result<()> {
        self.outputs
            .lock()
            .map_err(|_| Self::poisoned())?
            .insert((run_id.clone(), kind.path()), data);
        Ok(())
    }

    fn load_output(&self, run_id: &RunId, kind: PhaseOutputKind) -> Result<Option<serde_json::Value>> {
        Ok(self
            .outputs
            .lock()
            .map_err(|_| Self::poisoned())?
            .get(&(run_id.clone(), kind.path()))
            .cloned())
    }

    fn clear_output(&self, run_id: &RunId, kind: PhaseOutputKind) -> Result<()> {
        self.outputs
            .lock()
            .map_err(|_| Self::poisoned())?
            .remove(&(run_id.clone(), kind.path()));
        Ok(())
    }

    fn save_status(&self, run_id: &RunId, phase: PhaseKind, status: PhaseStatus) -> Result<()> {
        self.statuses
            .lock()
            .map_err(|_| Self::poisoned())?
            .insert((run_id.clone(), phase), status);
        Ok(())
    }

    fn load_status(&self, run_id: &RunId, phase: PhaseKind) -> Result<Option<PhaseStatus>> {
        Ok(self
            .statuses
            .lock()
            .map_err(|_| Self::poisoned())?
            .get(&(run_id.clone(), phase))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_output_roundtrips() {
        let repo = InMemoryRepository::default();
        let run_id = RunId::new("r1");
        repo.save_output(&run_id, PhaseOutputKind::Phase1Bucket, serde_json::json!({"x": 1}))
            .unwrap();
        let loaded = repo.load_output(&run_id, PhaseOutputKind::Phase1Bucket).unwrap();
        assert_eq!(loaded, Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn clear_output_removes_it() {
        let repo = InMemoryRepository::default();
        let run_id = RunId::new("r1");
        repo.save_output(&run_id, PhaseOutputKind::Phase2Teams, serde_json::json!([]))
            .unwrap();
        repo.clear_output(&run_id, PhaseOutputKind::Phase2Teams).unwrap();
        assert!(repo.load_output(&run_id, PhaseOutputKind::Phase2Teams).unwrap().is_none());
    }

    #[test]
    fn missing_status_is_none() {
        let repo = InMemoryRepository::default();
        let run_id = RunId::new("r1");
        assert!(repo.load_status(&run_id, PhaseKind::Phase1).unwrap().is_none());
    }
}
