//! Weighted five-term cost model shared by Phase 1 (participant, problem)
//! costs and Phase 3 (team, problem) costs.
//!
//! Grounded on the teacher's `gate` config-struct idiom (a validated,
//! overridable weight struct passed by value) rather than hidden globals.

use crate::model::{Problem, SkillRegistry, TeamVector};
use crate::types::Role;
use crate::vectorops::{clamp, cosine_similarity};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Weights for the five cost terms. Must sum to 1.0 within 1e-6 (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// Weight of the skill_gap term
    pub skill_gap: f64,
    /// Weight of the role_alignment term
    pub role_alignment: f64,
    /// Weight of the motivation_similarity term
    pub motivation_similarity: f64,
    /// Weight of the ambiguity_fit term
    pub ambiguity_fit: f64,
    /// Weight of the workload_fit term
    pub workload_fit: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            skill_gap: 0.35,
            role_alignment: 0.20,
            motivation_similarity: 0.15,
            ambiguity_fit: 0.20,
            workload_fit: 0.10,
        }
    }
}

impl CostWeights {
    /// Build a weight set, overriding only the named fields, starting from
    /// defaults; used for per-rerun overrides (spec §6).
    pub fn with_overrides(overrides: &IndexMap<String, f64>) -> Result<Self> {
        let mut w = Self::default();
        for (name, value) in overrides {
            match name.as_str() {
                "skill_gap" => w.skill_gap = *value,
                "role_alignment" => w.role_alignment = *value,
                "motivation_similarity" => w.motivation_similarity = *value,
                "ambiguity_fit" => w.ambiguity_fit = *value,
                "workload_fit" => w.workload_fit = *value,
                other => {
                    return Err(Error::invalid_input(format!(
                        "unknown cost weight override '{other}'"
                    )))
                }
            }
        }
        w.validate()?;
        Ok(w)
    }

    /// Validate that weights sum to 1.0 within 1e-6 and are non-negative.
    pub fn validate(&self) -> Result<()> {
        let sum = self.skill_gap
            + self.role_alignment
            + self.motivation_similarity
            + self.ambiguity_fit
            + self.workload_fit;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::invalid_input(format!(
                "cost weights must sum to 1.0, got {sum}"
            )));
        }
        if [
            self.skill_gap,
            self.role_alignment,
            self.motivation_similarity,
            self.ambiguity_fit,
            self.workload_fit,
        ]
        .iter()
        .any(|w| *w < 0.0)
        {
            return Err(Error::invalid_input("cost weights must be non-negative"));
        }
        Ok(())
    }
}

/// Per-component cost breakdown, each normalized into `[0, 1]` before
/// weighting. Kept alongside the scalar total to bound explainability to
/// per-component decomposition (spec §1 Non-goals).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostComponents {
    /// Mean shortfall of provided skill levels below required minimums
    pub skill_gap: f64,
    /// 1 - alignment between role support and problem role preferences
    pub role_alignment: f64,
    /// 1 - motivation cosine similarity (clamped non-negative)
    pub motivation_similarity: f64,
    /// Normalized gap between ambiguity comfort and problem ambiguity
    pub ambiguity_fit: f64,
    /// Normalized workload shortfall relative to availability
    pub workload_fit: f64,
}

impl CostComponents {
    /// Weighted sum in the fixed order the components are declared, for
    /// reproducible floating point summation (spec §4.1 determinism).
    pub fn weighted_total(&self, weights: &CostWeights) -> f64 {
        let mut total = 0.0;
        total += weights.skill_gap * self.skill_gap;
        total += weights.role_alignment * self.role_alignment;
        total += weights.motivation_similarity * self.motivation_similarity;
        total += weights.ambiguity_fit * self.ambiguity_fit;
        total += weights.workload_fit * self.workload_fit;
        total
    }
}

/// Distribution of role support over the closed vocabulary for a list of
/// role tags, each tag contributing equal weight, summing to 1 (or empty).
pub fn role_support(roles: &[Role]) -> IndexMap<Role, f64> {
    let mut support = IndexMap::new();
    if roles.is_empty() {
        return support;
    }
    let w = 1.0 / roles.len() as f64;
    for r in roles {
        *support.entry(*r).or_insert(0.0) += w;
    }
    support
}

fn normalized_dot(support: &IndexMap<Role, f64>, preferences: &IndexMap<Role, f64>) -> f64 {
    let sum: f64 = support.values().sum();
    if sum == 0.0 || preferences.is_empty() {
        return 0.0;
    }
    support
        .iter()
        .map(|(role, w)| (w / sum) * preferences.get(role).copied().unwrap_or(0.0))
        .sum()
}

struct ComponentInputs<'a> {
    provided_skills: &'a dyn Fn(&str) -> u8,
    role_support: IndexMap<Role, f64>,
    motivation_embedding: &'a [f64],
    ambiguity: u8,
    availability_hours: u32,
}

fn compute_components(inputs: ComponentInputs<'_>, problem: &Problem, registry: &SkillRegistry) -> CostComponents {
    let skill_gap = if problem.skill_requirements.is_empty() {
        0.0
    } else {
        let sum: f64 = problem
            .skill_requirements
            .iter()
            .map(|(skill, required)| {
                let provided = (inputs.provided_skills)(skill);
                let gap = (*required as f64 - provided as f64).max(0.0) / 5.0;
                // `registry` importance is reserved for skills_covered (TeamAggregator);
                // skill_gap itself is an unweighted mean per spec §4.1.
                let _ = registry;
                gap
            })
            .sum();
        sum / problem.skill_requirements.len() as f64
    };

    let role_alignment = 1.0 - normalized_dot(&inputs.role_support, &problem.role_preferences);

    let motivation_similarity = match cosine_similarity(inputs.motivation_embedding, &problem.motivation_embedding) {
        Some(cos) => 1.0 - cos.max(0.0),
        None => 1.0,
    };

    let ambiguity_fit =
        (inputs.ambiguity as f64 - problem.ambiguity_level as f64).abs() / 9.0;

    let workload_fit = clamp(
        (problem.estimated_workload_hours as f64 - inputs.availability_hours as f64).max(0.0) / 40.0,
        0.0,
        1.0,
    );

    CostComponents {
        skill_gap: clamp(skill_gap, 0.0, 1.0),
        role_alignment: clamp(role_alignment, 0.0, 1.0),
        motivation_similarity: clamp(motivation_similarity, 0.0, 1.0),
        ambiguity_fit: clamp(ambiguity_fit, 0.0, 1.0),
        workload_fit,
    }
}

/// Cost of assigning a single participant to a problem.
pub fn cost_individual(
    participant: &crate::model::Participant,
    problem: &Problem,
    weights: &CostWeights,
    registry: &SkillRegistry,
) -> (f64, CostComponents) {
    let skills = &participant.skills;
    let provided = |skill: &str| skills.get(skill).copied().unwrap_or(0);
    let components = compute_components(
        ComponentInputs {
            provided_skills: &provided,
            role_support: role_support(&participant.roles),
            motivation_embedding: &participant.motivation_embedding,
            ambiguity: participant.ambiguity_comfort,
            availability_hours: participant.availability_hours,
        },
        problem,
        registry,
    );
    (components.weighted_total(weights), components)
}

/// Cost of assigning an aggregated team to a problem.
pub fn cost_team(
    team_vector: &TeamVector,
    problem: &Problem,
    weights: &CostWeights,
    registry: &SkillRegistry,
) -> (f64, CostComponents) {
    let provided = |skill: &str| {
        team_vector
            .avg_skill_levels
            .get(skill)
            .copied()
            .unwrap_or(0.0)
            .round() as u8
    };
    let role_support: IndexMap<Role, f64> = team_vector.role_weights.clone();
    let ambiguity = team_vector.avg_ambiguity_tolerance.round() as u8;
    let components = compute_components(
        ComponentInputs {
            provided_skills: &provided,
            role_support,
            motivation_embedding: &team_vector.avg_motivation_embedding,
            ambiguity,
            availability_hours: team_vector.min_availability_hours,
        },
        problem,
        registry,
    );
    (components.weighted_total(weights), components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Participant, Problem};
    use crate::types::ParticipantId;
    use crate::types::ProblemId;
    use approx::assert_abs_diff_eq;

    fn problem_with(role_preferences: IndexMap<Role, f64>) -> Problem {
        Problem {
            id: ProblemId::new("q1"),
            title: "t".into(),
            prompt: "p".into(),
            estimated_team_size: 5,
            role_preferences,
            skill_requirements: IndexMap::from([("rust".to_string(), 5)]),
            ambiguity_level: 5,
            estimated_workload_hours: 20,
            motivation_embedding: vec![1.0, 0.0],
        }
    }

    fn participant() -> Participant {
        Participant {
            id: ParticipantId::new("p1"),
            full_name: "A".into(),
            email: "a@example.com".into(),
            roles: vec![Role::Engineer],
            skills: IndexMap::from([("rust".to_string(), 5)]),
            availability_hours: 20,
            motivation_embedding: vec![1.0, 0.0],
            leadership_preference: false,
            ambiguity_comfort: 5,
        }
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut w = CostWeights::default();
        w.skill_gap = 1.0;
        assert!(w.validate().is_err());
    }

    #[test]
    fn empty_role_preferences_contribute_one() {
        let problem = problem_with(IndexMap::new());
        let registry = SkillRegistry::default();
        let (_, components) = cost_individual(&participant(), &problem, &CostWeights::default(), &registry);
        assert_abs_diff_eq!(components.role_alignment, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn perfect_match_has_zero_cost() {
        let problem = problem_with(IndexMap::from([(Role::Engineer, 1.0)]));
        let registry = SkillRegistry::default();
        let (total, components) =
            cost_individual(&participant(), &problem, &CostWeights::default(), &registry);
        assert_abs_diff_eq!(components.skill_gap, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(components.role_alignment, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(components.motivation_similarity, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(components.ambiguity_fit, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(total, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_motivation_vector_contributes_one() {
        let mut problem = problem_with(IndexMap::from([(Role::Engineer, 1.0)]));
        problem.motivation_embedding = vec![0.0, 0.0];
        let registry = SkillRegistry::default();
        let (_, components) =
            cost_individual(&participant(), &problem, &CostWeights::default(), &registry);
        assert_abs_diff_eq!(components.motivation_similarity, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn weighted_total_matches_manual_sum() {
        let problem = problem_with(IndexMap::from([(Role::Engineer, 0.5)]));
        let registry = SkillRegistry::default();
        let weights = CostWeights::default();
        let (total, components) = cost_individual(&participant(), &problem, &weights, &registry);
        let manual = weights.skill_gap * components.skill_gap
            + weights.role_alignment * components.role_alignment
            + weights.motivation_similarity * components.motivation_similarity
            + weights.ambiguity_fit * components.ambiguity_fit
            + weights.workload_fit * components.workload_fit;
        assert_abs_diff_eq!(total, manual, epsilon = 1e-9);
    }
}
