//! Phase 2: partition each problem's bucket into fixed-size teams honoring
//! role and leadership constraints (spec §4.5).
//!
//! Buckets are independent of one another (spec §5) and are processed with
//! `rayon`'s worker pool, merged back in problem-id order for a
//! deterministic result regardless of completion order.

use crate::affinity::pairwise_affinity_cost;
use crate::aggregate::aggregate;
use crate::assignment::hungarian::HungarianSolver;
use crate::assignment::{AssignmentProblem, AssignmentSolver};
use crate::budget::{CancellationToken, SolveBudget};
use crate::model::{BucketEntry, Participant, Problem, SkillRegistry, Team};
use crate::types::{ParticipantId, ProblemId, Role, TeamId};
use crate::Result;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{instrument, warn};

/// Weight applied to the role-coverage pressure term in the slot-filling
/// cost matrix, relative to the raw pairwise affinity cost (spec §4.5 step
/// 2 calls this "a weighted sum"; the weight itself is an implementation
/// decision recorded in `DESIGN.md`).
const ROLE_PRESSURE_WEIGHT: f64 = 0.5;

/// Result of forming teams for a single problem's bucket.
#[derive(Debug, Clone)]
pub struct Phase2Outcome {
    /// The problem this bucket belongs to
    pub problem_id: ProblemId,
    /// Emitted teams
    pub teams: Vec<Team>,
    /// Participants dropped because the bucket size was not a multiple of
    /// the team size, and not later swapped in for leadership enforcement
    pub surplus_unassigned: Vec<ParticipantId>,
}

/// Run Phase 2 across all buckets, in parallel, merging deterministically
/// by problem id.
#[instrument(skip_all, fields(problems = buckets.len()))]
pub fn run_phase2(
    buckets: &IndexMap<ProblemId, Vec<BucketEntry>>,
    problems_by_id: &IndexMap<ProblemId, &Problem>,
    participants_by_id: &HashMap<ParticipantId, &Participant>,
    team_size: u8,
    registry: &SkillRegistry,
    budget: SolveBudget,
    token: CancellationToken,
) -> Result<Vec<Phase2Outcome>> {
    let mut ordered: Vec<(&ProblemId, &Vec<BucketEntry>)> = buckets.iter().collect();
    ordered.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

    let results: Vec<Result<Phase2Outcome>> = ordered
        .par_iter()
        .map(|(problem_id, entries)| {
            let problem = problems_by_id[*problem_id];
            run_phase2_for_bucket(
                problem,
                entries,
                participants_by_id,
                team_size,
                registry,
                budget,
                token.clone(),
            )
        })
        .collect();

    // Merge in the same stable problem-id order regardless of which
    // bucket's worker finished first (spec §5 ordering guarantee).
    let mut outcomes = Vec::with_capacity(results.len());
    for (idx, result) in results.into_iter().enumerate() {
        let outcome = result?;
        debug_assert_eq!(&outcome.problem_id, ordered[idx].0);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn run_phase2_for_bucket(
    problem: &Problem,
    entries: &[BucketEntry],
    participants_by_id: &HashMap<ParticipantId, &Participant>,
    team_size: u8,
    registry: &SkillRegistry,
    budget: SolveBudget,
    token: CancellationToken,
) -> Result<Phase2Outcome> {
    let s = team_size as usize;
    let members: Vec<&Participant> = entries
        .iter()
        .map(|e| participants_by_id[&e.participant_id])
        .collect();
    let k = members.len() / s;

    // A single bucket too small to form a team is not itself a failure:
    // other buckets may still succeed. The orchestrator fails the phase
    // if *no* bucket forms any team at all (spec §8 boundary: |P| < S).
    if k == 0 {
        return Ok(Phase2Outcome {
            problem_id: problem.id.clone(),
            teams: Vec::new(),
            surplus_unassigned: members.iter().map(|p| p.id.clone()).collect(),
        });
    }

    // Strict enforcement: drop the lowest-rank (worst-fit) surplus back to
    // an unassigned pool (spec §4.5 goal).
    let kept_count = k * s;
    let (kept, surplus) = members.split_at(kept_count);
    let mut surplus_pool: Vec<&Participant> = surplus.to_vec();

    let d = pairwise_distance_matrix(kept);
    let medoids = pam_build_medoids(&d, k);
    let provisional_team_of = nearest_medoid_assignment(&d, &medoids);
    let role_counts = provisional_role_counts(kept, &provisional_team_of, k);

    let slot_costs = slot_filling_cost_matrix(kept, &d, &medoids, &role_counts, s);
    let assignment_problem = AssignmentProblem::from_costs(slot_costs);
    assignment_problem.validate()?;
    let solution = HungarianSolver.solve(&assignment_problem, budget, token)?;

    let mut team_members: Vec<Vec<&Participant>> = vec![Vec::with_capacity(s); k];
    for (agent, col) in solution.pairs {
        team_members[col / s].push(kept[agent]);
    }

    let mut leadership_missing = vec![false; k];
    for (team_idx, team) in team_members.iter_mut().enumerate() {
        if team.iter().any(|p| p.leadership_preference) {
            continue;
        }
        match find_leadership_swap(team, &mut surplus_pool) {
            Some((out_idx, candidate)) => {
                team[out_idx] = candidate;
            }
            None => {
                leadership_missing[team_idx] = true;
                warn!(problem = %problem.id, team = team_idx, "no leadership-preferring participant available to swap in");
            }
        }
    }

    let teams = team_members
        .into_iter()
        .enumerate()
        .map(|(idx, members)| {
            aggregate(
                TeamId::new(format!("{}-team-{idx}", problem.id)),
                &members,
                registry,
                "strict_enforcement",
                leadership_missing[idx],
            )
        })
        .collect();

    Ok(Phase2Outcome {
        problem_id: problem.id.clone(),
        teams,
        surplus_unassigned: surplus_pool.iter().map(|p| p.id.clone()).collect(),
    })
}

fn pairwise_distance_matrix(members: &[&Participant]) -> Vec<Vec<f64>> {
    let n = members.len();
    let mut d = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let cost = pairwise_affinity_cost(members[i], members[j]);
            d[i][j] = cost;
            d[j][i] = cost;
        }
    }
    d
}

/// PAM BUILD step: greedily choose `k` medoids minimizing total distance
/// (spec §4.5 step 1 calls for "k-medoids PAM initialization", i.e. the
/// build phase rather than a full build+swap convergence loop).
fn pam_build_medoids(d: &[Vec<f64>], k: usize) -> Vec<usize> {
    let n = d.len();
    if k == 0 || n == 0 {
        return Vec::new();
    }
    let mut medoids = Vec::with_capacity(k);

    let first = (0..n)
        .min_by(|&a, &b| {
            let sa: f64 = d[a].iter().sum();
            let sb: f64 = d[b].iter().sum();
            sa.partial_cmp(&sb).unwrap()
        })
        .unwrap();
    medoids.push(first);

    while medoids.len() < k {
        let mut best_candidate = None;
        let mut best_gain = f64::NEG_INFINITY;
        for cand in 0..n {
            if medoids.contains(&cand) {
                continue;
            }
            let mut gain = 0.0;
            for j in 0..n {
                if medoids.contains(&j) {
                    continue;
                }
                let current_min = medoids.iter().map(|&m| d[j][m]).fold(f64::INFINITY, f64::min);
                gain += (current_min - d[j][cand]).max(0.0);
            }
            if gain > best_gain {
                best_gain = gain;
                best_candidate = Some(cand);
            }
        }
        medoids.push(best_candidate.expect("a candidate remains while medoids.len() < k <= n"));
    }
    medoids
}

fn nearest_medoid_assignment(d: &[Vec<f64>], medoids: &[usize]) -> Vec<usize> {
    (0..d.len())
        .map(|i| {
            medoids
                .iter()
                .enumerate()
                .min_by(|(_, &a), (_, &b)| d[i][a].partial_cmp(&d[i][b]).unwrap())
                .map(|(team, _)| team)
                .unwrap_or(0)
        })
        .collect()
}

fn provisional_role_counts(
    members: &[&Participant],
    provisional_team_of: &[usize],
    k: usize,
) -> Vec<IndexMap<Role, usize>> {
    let mut counts = vec![IndexMap::new(); k];
    for (i, member) in members.iter().enumerate() {
        if let Some(primary) = member.roles.first() {
            *counts[provisional_team_of[i]].entry(*primary).or_insert(0) += 1;
        }
    }
    counts
}

/// Build the `|kept| x (k*S)` slot-filling cost matrix: columns grouped by
/// team, each column within a team carrying the same cost for a given
/// participant (spec §4.5 step 2).
fn slot_filling_cost_matrix(
    members: &[&Participant],
    d: &[Vec<f64>],
    medoids: &[usize],
    role_counts: &[IndexMap<Role, usize>],
    team_size: usize,
) -> Vec<Vec<f64>> {
    let k = medoids.len();
    members
        .iter()
        .enumerate()
        .map(|(i, member)| {
            let mut row = Vec::with_capacity(k * team_size);
            for (team_idx, &medoid) in medoids.iter().enumerate() {
                let base = d[i][medoid];
                let pressure = member
                    .roles
                    .first()
                    .map(|r| {
                        role_counts[team_idx].get(r).copied().unwrap_or(0) as f64 / team_size as f64
                    })
                    .unwrap_or(0.0);
                let cost = (base + ROLE_PRESSURE_WEIGHT * pressure).max(0.0);
                row.extend(std::iter::repeat(cost).take(team_size));
            }
            row
        })
        .collect()
}

/// Swap the team's worst-fit member for the lowest-incremental-cost
/// leadership-preferring candidate in the surplus pool (spec §4.5 step 3).
/// Returns the swapped-out member's index within `team` and the candidate
/// that replaced them; the caller is responsible for updating `team`.
fn find_leadership_swap<'a>(
    team: &[&'a Participant],
    surplus_pool: &mut Vec<&'a Participant>,
) -> Option<(usize, &'a Participant)> {
    let candidate_idx = surplus_pool
        .iter()
        .enumerate()
        .filter(|(_, p)| p.leadership_preference)
        .min_by(|(_, a), (_, b)| {
            let cost_a = incremental_cost(team, a);
            let cost_b = incremental_cost(team, b);
            cost_a.partial_cmp(&cost_b).unwrap()
        })
        .map(|(idx, _)| idx)?;

    let worst_fit_idx = (0..team.len())
        .max_by(|&a, &b| {
            let cost_a = member_team_affinity(team, a);
            let cost_b = member_team_affinity(team, b);
            cost_a.partial_cmp(&cost_b).unwrap()
        })
        .unwrap();

    let candidate = surplus_pool.remove(candidate_idx);
    let outgoing = team[worst_fit_idx];
    surplus_pool.push(outgoing);
    Some((worst_fit_idx, candidate))
}

fn incremental_cost(team: &[&Participant], candidate: &Participant) -> f64 {
    team.iter().map(|m| pairwise_affinity_cost(m, candidate)).sum()
}

fn member_team_affinity(team: &[&Participant], member_idx: usize) -> f64 {
    team.iter()
        .enumerate()
        .filter(|(j, _)| *j != member_idx)
        .map(|(_, m)| pairwise_affinity_cost(team[member_idx], m))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostComponents;
    use crate::model::Problem;

    fn participant(id: &str, roles: Vec<Role>, leadership: bool) -> Participant {
        Participant {
            id: ParticipantId::new(id),
            full_name: id.to_string(),
            email: format!("{id}@example.com"),
            roles,
            skills: IndexMap::new(),
            availability_hours: 20,
            motivation_embedding: vec![],
            leadership_preference: leadership,
            ambiguity_comfort: 5,
        }
    }

    fn problem() -> Problem {
        Problem {
            id: ProblemId::new("q1"),
            title: "t".into(),
            prompt: String::new(),
            estimated_team_size: 5,
            role_preferences: IndexMap::new(),
            skill_requirements: IndexMap::new(),
            ambiguity_level: 5,
            estimated_workload_hours: 10,
            motivation_embedding: vec![],
        }
    }

    fn entries(ids: &[&str]) -> Vec<BucketEntry> {
        ids.iter()
            .enumerate()
            .map(|(rank, id)| BucketEntry {
                participant_id: ParticipantId::new(*id),
                cost: rank as f64,
                components: CostComponents::default(),
                rank,
            })
            .collect()
    }

    #[test]
    fn every_team_has_exact_size_and_no_duplicate_members() {
        let participants: Vec<Participant> = (0..10)
            .map(|i| participant(&format!("p{i}"), vec![Role::Engineer], i == 0))
            .collect();
        let by_id: HashMap<ParticipantId, &Participant> =
            participants.iter().map(|p| (p.id.clone(), p)).collect();
        let ids: Vec<&str> = participants.iter().map(|p| p.id.as_str()).collect();
        let problem = problem();

        let outcome = run_phase2_for_bucket(
            &problem,
            &entries(&ids),
            &by_id,
            5,
            &SkillRegistry::default(),
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(outcome.teams.len(), 2);
        for team in &outcome.teams {
            assert_eq!(team.size(), 5);
        }
        let mut seen = std::collections::HashSet::new();
        for team in &outcome.teams {
            for id in &team.member_ids {
                assert!(seen.insert(id.clone()), "participant placed in >1 team");
            }
        }
    }

    #[test]
    fn leadership_scarcity_marks_one_team() {
        let mut participants: Vec<Participant> = (0..10)
            .map(|i| participant(&format!("p{i}"), vec![Role::Engineer], false))
            .collect();
        participants[0].leadership_preference = true;
        let by_id: HashMap<ParticipantId, &Participant> =
            participants.iter().map(|p| (p.id.clone(), p)).collect();
        let ids: Vec<&str> = participants.iter().map(|p| p.id.as_str()).collect();
        let problem = problem();

        let outcome = run_phase2_for_bucket(
            &problem,
            &entries(&ids),
            &by_id,
            5,
            &SkillRegistry::default(),
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();

        let missing_count = outcome.teams.iter().filter(|t| t.leadership_missing).count();
        let has_leader_count = outcome
            .teams
            .iter()
            .filter(|t| {
                t.member_ids
                    .iter()
                    .any(|id| by_id[id].leadership_preference)
            })
            .count();
        assert_eq!(has_leader_count, 1);
        assert_eq!(missing_count, 1);
        for team in &outcome.teams {
            assert_eq!(team.size(), 5);
        }
    }

    #[test]
    fn surplus_not_multiple_of_team_size_is_dropped() {
        let participants: Vec<Participant> = (0..12)
            .map(|i| participant(&format!("p{i}"), vec![Role::Engineer], i == 0))
            .collect();
        let by_id: HashMap<ParticipantId, &Participant> =
            participants.iter().map(|p| (p.id.clone(), p)).collect();
        let ids: Vec<&str> = participants.iter().map(|p| p.id.as_str()).collect();
        let problem = problem();

        let outcome = run_phase2_for_bucket(
            &problem,
            &entries(&ids),
            &by_id,
            5,
            &SkillRegistry::default(),
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(outcome.teams.len(), 2);
        assert_eq!(outcome.surplus_unassigned.len(), 2);
    }
}
