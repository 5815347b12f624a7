//! `PhaseOrchestrator`: the explicit state machine that drives Phase 1 ->
//! Phase 2 -> Phase 3 for a single run (spec §4.7).
//!
//! Grounded on the teacher's `gate` architecture for the *shape* of
//! determinism and stop-reason reporting (`gate::determinism::DeterminismSpec`,
//! `gate::report::StopReason`), but none of `gate`'s concrete domain types are
//! reused: this module owns its own `PhaseStatus`/`PhaseKind`/`RunOverrides`
//! types built directly against this pipeline's phases, threaded through by
//! an explicit `RunId` rather than any global or ambient run state (spec §9).

pub mod dispatcher;
pub mod repository;

pub use dispatcher::{InProcessDispatcher, TaskDispatcher};
pub use repository::{InMemoryRepository, Repository};

use crate::cost::CostWeights;
use crate::budget::{CancellationToken, SolveBudget};
use crate::model::{Bucket, Team};
use crate::phases::{phase1_matcher, phase2_team_former, phase3_assigner};
use crate::types::{ParticipantId, ProblemId, RunId};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, instrument, warn};

/// One of the three ordered pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Participant -> problem bucket
    Phase1,
    /// Bucket -> teams
    Phase2,
    /// Teams -> problem assignment
    Phase3,
}

impl PhaseKind {
    /// All phases in pipeline order.
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Phase1, PhaseKind::Phase2, PhaseKind::Phase3];

    fn index(self) -> u8 {
        match self {
            PhaseKind::Phase1 => 1,
            PhaseKind::Phase2 => 2,
            PhaseKind::Phase3 => 3,
        }
    }

    /// The phase whose completed output this phase consumes, if any
    /// (spec invariant 5: Phase N only consumes Phase N-1 of the same run).
    pub fn upstream(self) -> Option<PhaseKind> {
        match self {
            PhaseKind::Phase1 => None,
            PhaseKind::Phase2 => Some(PhaseKind::Phase1),
            PhaseKind::Phase3 => Some(PhaseKind::Phase2),
        }
    }

    /// This phase and every phase downstream of it, in pipeline order.
    pub fn at_or_after(self) -> Vec<PhaseKind> {
        PhaseKind::ALL.iter().copied().filter(|p| p.index() >= self.index()).collect()
    }

    fn output_kinds(self) -> Vec<PhaseOutputKind> {
        match self {
            PhaseKind::Phase1 => vec![
                PhaseOutputKind::Phase1Assignments,
                PhaseOutputKind::Phase1Bucket,
                PhaseOutputKind::Stats(self),
            ],
            PhaseKind::Phase2 => vec![PhaseOutputKind::Phase2Teams, PhaseOutputKind::Stats(self)],
            PhaseKind::Phase3 => vec![PhaseOutputKind::Phase3Assignments, PhaseOutputKind::Stats(self)],
        }
    }
}

/// Persisted state layout keys (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseOutputKind {
    /// Flattened per-participant Phase 1 assignments
    Phase1Assignments,
    /// The structured Phase 1 bucket consumed by Phase 2
    Phase1Bucket,
    /// Phase 2's formed teams
    Phase2Teams,
    /// Phase 3's final team-problem assignment
    Phase3Assignments,
    /// A phase's summary statistics
    Stats(PhaseKind),
}

impl PhaseOutputKind {
    /// The storage key this output is written under.
    pub fn path(&self) -> String {
        match self {
            PhaseOutputKind::Phase1Assignments => "phase1/assignments".to_string(),
            PhaseOutputKind::Phase1Bucket => "phase1/bucket".to_string(),
            PhaseOutputKind::Phase2Teams => "phase2/teams".to_string(),
            PhaseOutputKind::Phase3Assignments => "phase3/assignments".to_string(),
            PhaseOutputKind::Stats(phase) => format!("phase{}/stats", phase.index()),
        }
    }
}

/// Lifecycle state of a single phase within a run (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Never started
    Idle,
    /// Accepted, not yet running
    Queued,
    /// Executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// Structured error surfaced on a failed phase status (spec §7: `status`
/// always well-typed with kind + message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseErrorInfo {
    /// Error taxonomy kind, e.g. "insufficient_data"
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl From<&Error> for PhaseErrorInfo {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::InvalidInput(_) => "invalid_input",
            Error::InsufficientData(_) => "insufficient_data",
            Error::InvalidCost(_) => "invalid_cost",
            Error::PhaseBusy(_) => "phase_busy",
            Error::PhasePreconditionUnmet(_) => "phase_precondition_unmet",
            Error::Canceled => "canceled",
            Error::Timeout { .. } => "timeout",
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::Internal(_) => "internal",
        };
        Self {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

/// Observable status of a single phase (spec §4.7 `status` operation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseStatus {
    /// Current lifecycle state
    pub state: PhaseState,
    /// Monotonic progress in `[0, 1]`
    pub progress: f64,
    /// Unix epoch seconds when the phase entered `running`
    pub started_at: Option<f64>,
    /// Unix epoch seconds when the phase reached a terminal state
    pub completed_at: Option<f64>,
    /// Present iff `state == failed`
    pub error: Option<PhaseErrorInfo>,
    /// Optional diagnostic counts for a completed phase, e.g. unassigned
    /// participants (spec §4.7 `components?`, §7 "optional diagnostic
    /// counts"). The shape is phase-specific; see `run_phase_logic`.
    pub components: Option<serde_json::Value>,
}

impl Default for PhaseStatus {
    fn default() -> Self {
        Self {
            state: PhaseState::Idle,
            progress: 0.0,
            started_at: None,
            completed_at: None,
            error: None,
            components: None,
        }
    }
}

/// Recognized per-rerun overrides (spec §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunOverrides {
    /// Cost weight overrides; must still sum to `1 +/- 1e-6` once applied
    pub weights: Option<IndexMap<String, f64>>,
    /// Target team size in `[2, 10]`, default 5
    pub team_size: Option<u8>,
    /// Multiplier applied to each problem's default team-count capacity
    pub per_problem_capacity: Option<usize>,
    /// Seed for k-medoids initialization and tie-breaks. Accepted for
    /// interface completeness (spec §6); Phase 2's PAM build and the
    /// Hungarian solver's lexicographic tie-break are already fully
    /// deterministic without consuming randomness, so this is currently
    /// inert. See `DESIGN.md`.
    pub random_seed: Option<u64>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Drives a single run's phases through their lifecycle, enforcing the
/// precondition and exclusivity invariants of spec §4.7.
pub struct PhaseOrchestrator {
    repository: Arc<dyn Repository>,
    dispatcher: Arc<dyn TaskDispatcher>,
    running_tokens: Mutex<HashMap<(RunId, PhaseKind), CancellationToken>>,
}

impl PhaseOrchestrator {
    /// Build an orchestrator over the given storage and dispatch seams.
    pub fn new(repository: Arc<dyn Repository>, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        Self {
            repository,
            dispatcher,
            running_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Current status of `phase` within `run_id`, `idle` if never started.
    pub fn status(&self, run_id: &RunId, phase: PhaseKind) -> Result<PhaseStatus> {
        Ok(self.repository.load_status(run_id, phase)?.unwrap_or_default())
    }

    /// Start `phase` for `run_id`, returning a dispatcher task id.
    ///
    /// Rejects `PhaseBusy` if the phase is already running, and
    /// `PhasePreconditionUnmet` if its upstream phase has not completed.
    #[instrument(skip(self, overrides))]
    pub fn start(&self, run_id: &RunId, phase: PhaseKind, overrides: RunOverrides) -> Result<String> {
        let current = self.status(run_id, phase)?;
        if current.state == PhaseState::Running {
            return Err(Error::phase_busy(format!(
                "{phase:?} is already running for run {run_id}"
            )));
        }
        if let Some(upstream) = phase.upstream() {
            let upstream_status = self.status(run_id, upstream)?;
            if upstream_status.state != PhaseState::Completed {
                return Err(Error::phase_precondition_unmet(format!(
                    "{phase:?} requires {upstream:?} to be completed first, it is {:?}",
                    upstream_status.state
                )));
            }
        }

        let weights = match &overrides.weights {
            Some(map) => CostWeights::with_overrides(map)?,
            None => CostWeights::default(),
        };
        let team_size = overrides.team_size.unwrap_or(5);
        if !(2..=10).contains(&team_size) {
            return Err(Error::invalid_input(format!("team_size {team_size} out of [2,10]")));
        }
        let capacity_multiplier = overrides.per_problem_capacity.unwrap_or(1).max(1);

        let token = CancellationToken::new();
        self.running_tokens
            .lock()
            .map_err(|_| Error::internal("running-token lock poisoned"))?
            .insert((run_id.clone(), phase), token.clone());

        self.repository.save_status(run_id, phase, PhaseStatus {
            state: PhaseState::Queued,
            ..PhaseStatus::default()
        })?;

        let repository = Arc::clone(&self.repository);
        let run_id_owned = run_id.clone();
        let budget = SolveBudget::default();

        let task_name = format!("run-{run_id}-{phase:?}");
        let task_id = self.dispatcher.enqueue(
            task_name,
            Box::new(move || {
                execute_phase(repository, run_id_owned, phase, weights, team_size, capacity_multiplier, budget, token);
            }),
        )?;
        Ok(task_id)
    }

    /// Rerun `phase`, clearing its output and every downstream phase's
    /// output and status before starting it again (spec §4.7).
    pub fn rerun(&self, run_id: &RunId, phase: PhaseKind, overrides: RunOverrides) -> Result<String> {
        if let Some(upstream) = phase.upstream() {
            let upstream_status = self.status(run_id, upstream)?;
            if upstream_status.state != PhaseState::Completed {
                return Err(Error::phase_precondition_unmet(format!(
                    "rerunning {phase:?} requires {upstream:?} to be completed first"
                )));
            }
        }
        for downstream in phase.at_or_after() {
            self.clear_phase(run_id, downstream)?;
        }
        self.start(run_id, phase, overrides)
    }

    /// Request cooperative cancellation of a running phase.
    pub fn cancel(&self, run_id: &RunId, phase: PhaseKind) -> Result<()> {
        let tokens = self
            .running_tokens
            .lock()
            .map_err(|_| Error::internal("running-token lock poisoned"))?;
        match tokens.get(&(run_id.clone(), phase)) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(Error::invalid_input(format!("{phase:?} is not running for run {run_id}"))),
        }
    }

    fn clear_phase(&self, run_id: &RunId, phase: PhaseKind) -> Result<()> {
        for kind in phase.output_kinds() {
            self.repository.clear_output(run_id, kind)?;
        }
        self.repository.save_status(run_id, phase, PhaseStatus::default())
    }
}

fn execute_phase(
    repository: Arc<dyn Repository>,
    run_id: RunId,
    phase: PhaseKind,
    weights: CostWeights,
    team_size: u8,
    capacity_multiplier: usize,
    budget: SolveBudget,
    token: CancellationToken,
) {
    let started_at = now_secs();
    if let Err(err) = with_storage_retry(|| {
        repository.save_status(&run_id, phase, PhaseStatus {
            state: PhaseState::Running,
            progress: 0.0,
            started_at: Some(started_at),
            completed_at: None,
            error: None,
            components: None,
        })
    }) {
        warn!(%err, "failed to record running status, aborting phase execution");
        return;
    }

    let result = run_phase_logic(&repository, &run_id, phase, &weights, team_size, capacity_multiplier, budget, token);

    let final_status = match result {
        Ok(components) => {
            info!(run_id = %run_id, phase = ?phase, "phase completed");
            PhaseStatus {
                state: PhaseState::Completed,
                progress: 1.0,
                started_at: Some(started_at),
                completed_at: Some(now_secs()),
                error: None,
                components: Some(components),
            }
        }
        Err(err) => {
            warn!(run_id = %run_id, phase = ?phase, %err, "phase failed");
            PhaseStatus {
                state: PhaseState::Failed,
                progress: 0.0,
                started_at: Some(started_at),
                completed_at: Some(now_secs()),
                error: Some(PhaseErrorInfo::from(&err)),
                components: None,
            }
        }
    };
    if let Err(err) = with_storage_retry(|| repository.save_status(&run_id, phase, final_status.clone())) {
        warn!(%err, "failed to record terminal phase status");
    }
}

/// Bounded retry attempts for transient `StorageUnavailable` repository
/// errors, doubling the delay each time (spec §7).
const STORAGE_RETRY_ATTEMPTS: u32 = 4;
const STORAGE_RETRY_BASE_DELAY: Duration = Duration::from_millis(20);

/// Retry `op` on `StorageUnavailable`, backing off exponentially, up to
/// `STORAGE_RETRY_ATTEMPTS` attempts total. Any other error, or the last
/// attempt's `StorageUnavailable`, is returned immediately.
fn with_storage_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut delay = STORAGE_RETRY_BASE_DELAY;
    for attempt in 1..=STORAGE_RETRY_ATTEMPTS {
        match op() {
            Ok(value) => return Ok(value),
            Err(Error::StorageUnavailable(msg)) if attempt < STORAGE_RETRY_ATTEMPTS => {
                warn!(attempt, %msg, "transient storage error, retrying after backoff");
                std::thread::sleep(delay);
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("loop always returns by the last attempt")
}

fn run_phase_logic(
    repository: &Arc<dyn Repository>,
    run_id: &RunId,
    phase: PhaseKind,
    weights: &CostWeights,
    team_size: u8,
    capacity_multiplier: usize,
    budget: SolveBudget,
    token: CancellationToken,
) -> Result<serde_json::Value> {
    let participants = with_storage_retry(|| repository.list_participants())?;
    let problems = with_storage_retry(|| repository.list_problems())?;
    for p in &participants {
        p.validate()?;
    }
    for q in &problems {
        q.validate()?;
    }
    let registry = crate::model::SkillRegistry::from_population(&participants, &problems);

    match phase {
        PhaseKind::Phase1 => {
            let mut team_counts = phase1_matcher::default_team_counts(participants.len(), team_size, &problems);
            for count in team_counts.values_mut() {
                *count *= capacity_multiplier;
            }
            let output = phase1_matcher::run_phase1(
                &participants,
                &problems,
                weights,
                &registry,
                team_size,
                &team_counts,
                budget,
                token,
            )?;
            let bucket_json = serde_json::to_value(&output.bucket).map_err(|e| Error::internal(e.to_string()))?;
            with_storage_retry(|| repository.save_output(run_id, PhaseOutputKind::Phase1Bucket, bucket_json.clone()))?;
            with_storage_retry(|| repository.save_output(run_id, PhaseOutputKind::Phase1Assignments, bucket_json.clone()))?;
            let stats_json = serde_json::json!({ "under_filled": output.under_filled });
            with_storage_retry(|| {
                repository.save_output(run_id, PhaseOutputKind::Stats(PhaseKind::Phase1), stats_json.clone())
            })?;
            Ok(stats_json)
        }
        PhaseKind::Phase2 => {
            let bucket_json = with_storage_retry(|| repository.load_output(run_id, PhaseOutputKind::Phase1Bucket))?
                .ok_or_else(|| Error::phase_precondition_unmet("phase 1 bucket not found"))?;
            let bucket: Bucket = serde_json::from_value(bucket_json).map_err(|e| Error::internal(e.to_string()))?;

            let participants_by_id: HashMap<ParticipantId, &crate::model::Participant> =
                participants.iter().map(|p| (p.id.clone(), p)).collect();
            let problems_by_id: IndexMap<ProblemId, &crate::model::Problem> =
                problems.iter().map(|p| (p.id.clone(), p)).collect();

            let outcomes = phase2_team_former::run_phase2(
                &bucket.assignments,
                &problems_by_id,
                &participants_by_id,
                team_size,
                &registry,
                budget,
                token,
            )?;

            let mut all_teams: Vec<Team> = Vec::new();
            let mut leadership_missing_count = 0usize;
            let mut surplus_unassigned_count = 0usize;
            for outcome in &outcomes {
                leadership_missing_count += outcome.teams.iter().filter(|t| t.leadership_missing).count();
                surplus_unassigned_count += outcome.surplus_unassigned.len();
                all_teams.extend(outcome.teams.iter().cloned());
            }

            // spec §8 boundary: |P| < S across the whole population forms no
            // team anywhere; that is a phase failure, not a zero-team success.
            let total_bucket_entries: usize = bucket.assignments.values().map(Vec::len).sum();
            if all_teams.is_empty() && total_bucket_entries > 0 {
                return Err(Error::insufficient_data(format!(
                    "{total_bucket_entries} bucketed participant(s) but team_size {team_size} leaves no bucket large enough to form a team"
                )));
            }

            let teams_json = serde_json::to_value(&all_teams).map_err(|e| Error::internal(e.to_string()))?;
            with_storage_retry(|| repository.save_output(run_id, PhaseOutputKind::Phase2Teams, teams_json.clone()))?;
            let stats_json = serde_json::json!({
                "teams_formed": all_teams.len(),
                "leadership_missing_count": leadership_missing_count,
                "surplus_unassigned_count": surplus_unassigned_count,
            });
            with_storage_retry(|| {
                repository.save_output(run_id, PhaseOutputKind::Stats(PhaseKind::Phase2), stats_json.clone())
            })?;
            Ok(stats_json)
        }
        PhaseKind::Phase3 => {
            let teams_json = with_storage_retry(|| repository.load_output(run_id, PhaseOutputKind::Phase2Teams))?
                .ok_or_else(|| Error::phase_precondition_unmet("phase 2 teams not found"))?;
            let teams: Vec<Team> = serde_json::from_value(teams_json).map_err(|e| Error::internal(e.to_string()))?;

            let final_assignment = phase3_assigner::run_phase3(&teams, &problems, weights, &registry, budget, token)?;

            let assignment_json = serde_json::to_value(&final_assignment).map_err(|e| Error::internal(e.to_string()))?;
            with_storage_retry(|| {
                repository.save_output(run_id, PhaseOutputKind::Phase3Assignments, assignment_json.clone())
            })?;
            let stats_json = serde_json::to_value(final_assignment.stats).map_err(|e| Error::internal(e.to_string()))?;
            with_storage_retry(|| {
                repository.save_output(run_id, PhaseOutputKind::Stats(PhaseKind::Phase3), stats_json.clone())
            })?;
            Ok(stats_json)
        }
    }
}
