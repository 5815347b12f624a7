//! Phase 3: match formed teams to problems via a team-level cost matrix
//! and the Hungarian solver (spec §4.6).

use crate::assignment::hungarian::HungarianSolver;
use crate::assignment::{AssignmentProblem, AssignmentSolver};
use crate::budget::{CancellationToken, SolveBudget};
use crate::cost::{cost_team, CostWeights};
use crate::model::{AssignmentPair, AssignmentStats, FinalAssignment, Problem, SkillRegistry, Team};
use crate::vectorops::clamp;
use crate::Result;
use ordered_float::OrderedFloat;
use tracing::instrument;

/// Run Phase 3 over all formed teams and all problems.
#[instrument(skip_all, fields(teams = teams.len(), problems = problems.len()))]
pub fn run_phase3(
    teams: &[Team],
    problems: &[Problem],
    weights: &CostWeights,
    registry: &SkillRegistry,
    budget: SolveBudget,
    token: CancellationToken,
) -> Result<FinalAssignment> {
    if teams.is_empty() || problems.is_empty() {
        return Ok(FinalAssignment {
            pairs: Vec::new(),
            unassigned_teams: teams.iter().map(|t| t.id.clone()).collect(),
            unassigned_problems: problems.iter().map(|p| p.id.clone()).collect(),
            stats: AssignmentStats {
                total_cost: 0.0,
                mean_cost: 0.0,
                min_cost: 0.0,
                max_cost: 0.0,
                assignment_efficiency: 0.0,
            },
        });
    }

    let matrix: Vec<Vec<f64>> = teams
        .iter()
        .map(|team| {
            problems
                .iter()
                .map(|problem| cost_team(&team.vector, problem, weights, registry).0)
                .collect()
        })
        .collect();

    let assignment_problem = AssignmentProblem::from_costs(matrix);
    assignment_problem.validate()?;
    let solution = HungarianSolver.solve(&assignment_problem, budget, token)?;

    let mut matched_teams = vec![false; teams.len()];
    let mut matched_problems = vec![false; problems.len()];
    let mut pairs = Vec::with_capacity(solution.pairs.len());
    for (team_idx, problem_idx) in &solution.pairs {
        let team = &teams[*team_idx];
        let problem = &problems[*problem_idx];
        let (cost, components) = cost_team(&team.vector, problem, weights, registry);
        pairs.push(AssignmentPair {
            team_id: team.id.clone(),
            problem_id: problem.id.clone(),
            cost,
            components,
        });
        matched_teams[*team_idx] = true;
        matched_problems[*problem_idx] = true;
    }

    let unassigned_teams = teams
        .iter()
        .zip(matched_teams.iter())
        .filter(|(_, &m)| !m)
        .map(|(t, _)| t.id.clone())
        .collect();
    let unassigned_problems = problems
        .iter()
        .zip(matched_problems.iter())
        .filter(|(_, &m)| !m)
        .map(|(p, _)| p.id.clone())
        .collect();

    let costs: Vec<f64> = pairs.iter().map(|p| p.cost).collect();
    let stats = compute_stats(&costs);

    Ok(FinalAssignment {
        pairs,
        unassigned_teams,
        unassigned_problems,
        stats,
    })
}

fn compute_stats(costs: &[f64]) -> AssignmentStats {
    if costs.is_empty() {
        return AssignmentStats {
            total_cost: 0.0,
            mean_cost: 0.0,
            min_cost: 0.0,
            max_cost: 0.0,
            assignment_efficiency: 0.0,
        };
    }
    let total_cost: f64 = costs.iter().sum();
    let mean_cost = total_cost / costs.len() as f64;
    let min_cost = costs.iter().copied().map(OrderedFloat).min().unwrap().into_inner();
    let max_cost = costs.iter().copied().map(OrderedFloat).max().unwrap().into_inner();
    AssignmentStats {
        total_cost,
        mean_cost,
        min_cost,
        max_cost,
        assignment_efficiency: clamp(1.0 - mean_cost, 0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::model::Participant;
    use crate::types::{ParticipantId, ProblemId, Role, TeamId};
    use indexmap::IndexMap;

    fn participant(id: &str, roles: Vec<Role>, skill: u8) -> Participant {
        Participant {
            id: ParticipantId::new(id),
            full_name: id.to_string(),
            email: format!("{id}@example.com"),
            roles,
            skills: IndexMap::from([("rust".to_string(), skill)]),
            availability_hours: 20,
            motivation_embedding: vec![1.0, 0.0],
            leadership_preference: false,
            ambiguity_comfort: 5,
        }
    }

    fn problem(id: &str, required_skill: u8) -> Problem {
        Problem {
            id: ProblemId::new(id),
            title: id.to_string(),
            prompt: String::new(),
            estimated_team_size: 2,
            role_preferences: IndexMap::from([(Role::Engineer, 1.0)]),
            skill_requirements: IndexMap::from([("rust".to_string(), required_skill)]),
            ambiguity_level: 5,
            estimated_workload_hours: 10,
            motivation_embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn perfect_diagonal_has_zero_total_cost() {
        let registry = SkillRegistry::default();
        let a = participant("a", vec![Role::Engineer], 5);
        let b = participant("b", vec![Role::Engineer], 0);
        let team_strong = aggregate(TeamId::new("t1"), &[&a, &a], &registry, "test", false);
        let team_weak = aggregate(TeamId::new("t2"), &[&b, &b], &registry, "test", false);
        let problems = vec![problem("q1", 5), problem("q2", 0)];

        let result = run_phase3(
            &[team_strong, team_weak],
            &problems,
            &CostWeights::default(),
            &registry,
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();

        assert!(result.stats.total_cost.abs() < 1e-9);
        assert!(result.unassigned_teams.is_empty());
        assert!(result.unassigned_problems.is_empty());
    }

    #[test]
    fn more_teams_than_problems_reports_unassigned_teams() {
        let registry = SkillRegistry::default();
        let a = participant("a", vec![Role::Engineer], 3);
        let team1 = aggregate(TeamId::new("t1"), &[&a, &a], &registry, "test", false);
        let team2 = aggregate(TeamId::new("t2"), &[&a, &a], &registry, "test", false);
        let problems = vec![problem("q1", 3)];

        let result = run_phase3(
            &[team1, team2],
            &problems,
            &CostWeights::default(),
            &registry,
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.unassigned_teams.len(), 1);
        assert!(result.unassigned_problems.is_empty());
    }

    #[test]
    fn empty_teams_reports_all_problems_unassigned() {
        let registry = SkillRegistry::default();
        let problems = vec![problem("q1", 3)];
        let result = run_phase3(
            &[],
            &problems,
            &CostWeights::default(),
            &registry,
            SolveBudget::unlimited(),
            CancellationToken::new(),
        )
        .unwrap();
        assert!(result.pairs.is_empty());
        assert_eq!(result.unassigned_problems.len(), 1);
    }
}
