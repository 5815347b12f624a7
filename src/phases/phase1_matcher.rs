//! Phase 1: assign each participant to a problem bucket using the
//! Hungarian solver over a replicated cost matrix (spec §4.4).

use crate::assignment::hungarian::HungarianSolver;
use crate::assignment::{AssignmentProblem, AssignmentSolver};
use crate::budget::{CancellationToken, SolveBudget};
use crate::cost::{cost_individual, CostWeights};
use crate::model::{Bucket, BucketEntry, Participant, Problem, SkillRegistry};
use crate::types::ProblemId;
use crate::{Error, Result};
use bitvec::vec::BitVec;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use tracing::instrument;

/// Per-problem desired team count `k_q`. Default `⌈|P| / (S·|Q|)⌉` per
/// problem, adjustable per rerun (spec §4.4 rerun semantics).
pub fn default_team_counts(num_participants: usize, team_size: u8, problems: &[Problem]) -> IndexMap<ProblemId, usize> {
    let num_problems = problems.len().max(1);
    let denom = (team_size as usize) * num_problems;
    let k = if denom == 0 {
        1
    } else {
        num_participants.div_ceil(denom).max(1)
    };
    problems.iter().map(|p| (p.id.clone(), k)).collect()
}

/// Output of Phase 1.
pub struct Phase1Output {
    /// The resulting bucket
    pub bucket: Bucket,
    /// Per-problem shortfall: capacity minus participants actually placed
    pub under_filled: IndexMap<ProblemId, usize>,
}

/// Run Phase 1 over the full population.
#[instrument(skip_all, fields(participants = participants.len(), problems = problems.len()))]
pub fn run_phase1(
    participants: &[Participant],
    problems: &[Problem],
    weights: &CostWeights,
    registry: &SkillRegistry,
    team_size: u8,
    team_counts: &IndexMap<ProblemId, usize>,
    budget: SolveBudget,
    token: CancellationToken,
) -> Result<Phase1Output> {
    if participants.is_empty() || problems.is_empty() {
        return Err(Error::insufficient_data(
            "phase 1 requires at least one participant and one problem",
        ));
    }

    // Column layout: each problem contributes k_q * team_size identical
    // columns, in problem order.
    let mut column_problem = Vec::new();
    let mut problem_cost_cache: IndexMap<ProblemId, Vec<f64>> = IndexMap::new();
    for problem in problems {
        let k = *team_counts.get(&problem.id).unwrap_or(&1);
        let capacity = k * team_size as usize;
        let costs: Vec<f64> = participants
            .iter()
            .map(|p| cost_individual(p, problem, weights, registry).0)
            .collect();
        problem_cost_cache.insert(problem.id.clone(), costs);
        for _ in 0..capacity {
            column_problem.push(problem.id.clone());
        }
    }

    let matrix: Vec<Vec<f64>> = participants
        .iter()
        .enumerate()
        .map(|(i, _)| {
            column_problem
                .iter()
                .map(|pid| problem_cost_cache[pid][i])
                .collect()
        })
        .collect();

    let assignment_problem = AssignmentProblem::from_costs(matrix);
    assignment_problem.validate()?;
    let solution = HungarianSolver.solve(&assignment_problem, budget, token)?;

    let mut per_problem: IndexMap<ProblemId, Vec<BucketEntry>> = problems
        .iter()
        .map(|p| (p.id.clone(), Vec::new()))
        .collect();
    // One bit per participant: tracks placement without a full byte per slot
    // (spec §4.4 capacity bookkeeping).
    let mut assigned: BitVec = BitVec::repeat(false, participants.len());

    for (agent, col) in solution.pairs {
        let problem_id = column_problem[col].clone();
        let participant = &participants[agent];
        let problem = problems.iter().find(|p| p.id == problem_id).expect("problem exists");
        let (cost, components) = cost_individual(participant, problem, weights, registry);
        per_problem.get_mut(&problem_id).unwrap().push(BucketEntry {
            participant_id: participant.id.clone(),
            cost,
            components,
            rank: 0, // filled in below after sorting
        });
        assigned.set(agent, true);
    }

    let mut under_filled = IndexMap::new();
    for problem in problems {
        let entries = per_problem.get_mut(&problem.id).unwrap();
        entries.sort_by_key(|e| OrderedFloat(e.cost));
        for (rank, entry) in entries.iter_mut().enumerate() {
            entry.rank = rank;
        }
        let k = *team_counts.get(&problem.id).unwrap_or(&1);
        let capacity = k * team_size as usize;
        if entries.len() < capacity {
            under_filled.insert(problem.id.clone(), capacity - entries.len());
        }
    }

    let unassigned = participants
        .iter()
        .enumerate()
        .filter(|(i, _)| !assigned[*i])
        .map(|(_, p)| p.id.clone())
        .collect();

    Ok(Phase1Output {
        bucket: Bucket {
            assignments: per_problem,
            unassigned,
        },
        under_filled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParticipantId, Role};

    fn participant(id: &str) -> Participant {
        Participant {
            id: ParticipantId::new(id),
            full_name: id.to_string(),
            email: format!("{id}@example.com"),
            roles: vec![Role::Engineer],
            skills: IndexMap::new(),
            availability_hours: 20,
            motivation_embedding: vec![],
            leadership_preference: false,
            ambiguity_comfort: 5,
        }
    }

    fn problem(id: &str) -> Problem {
        Problem {
            id: ProblemId::new(id),
            title: id.to_string(),
            prompt: String::new(),
            estimated_team_size: 5,
            role_preferences: IndexMap::new(),
            skill_requirements: IndexMap::new(),
            ambiguity_level: 5,
            estimated_workload_hours: 10,
            motivation_embedding: vec![],
        }
    }

    #[test]
    fn assigns_every_participant_when_capacity_exact() {
        let participants: Vec<_> = (0..5).map(|i| participant(&format!("p{i}"))).collect();
        let problems = vec![problem("q1")];
        let registry = SkillRegistry::default();
        let counts = IndexMap::from([(ProblemId::new("q1"), 1usize)]);
        let output = run_phase1(
            &participants,
            &problems,
            &CostWeights::default(),
            &registry,
            5,
            &counts,
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(output.bucket.total_assigned(), 5);
        assert!(output.bucket.unassigned.is_empty());
        assert!(output.under_filled.is_empty());
    }

    #[test]
    fn reports_overflow_as_unassigned() {
        let participants: Vec<_> = (0..12).map(|i| participant(&format!("p{i}"))).collect();
        let problems: Vec<_> = (0..2).map(|i| problem(&format!("q{i}"))).collect();
        let registry = SkillRegistry::default();
        let counts: IndexMap<_, _> = problems.iter().map(|p| (p.id.clone(), 1usize)).collect();
        let output = run_phase1(
            &participants,
            &problems,
            &CostWeights::default(),
            &registry,
            5,
            &counts,
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(output.bucket.total_assigned(), 10);
        assert_eq!(output.bucket.unassigned.len(), 2);
    }

    #[test]
    fn empty_population_is_insufficient_data() {
        let problems = vec![problem("q1")];
        let registry = SkillRegistry::default();
        let counts = IndexMap::from([(ProblemId::new("q1"), 1usize)]);
        let result = run_phase1(
            &[],
            &problems,
            &CostWeights::default(),
            &registry,
            5,
            &counts,
            SolveBudget::unlimited(),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }
}
