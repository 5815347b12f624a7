//! Team aggregation and metrics engine (spec §4.3).
//!
//! Reduces a set of participants to a single `TeamVector` plus derived
//! coverage/diversity/balance metrics, all deterministic pure functions of
//! team contents.

use crate::affinity::mean_pairwise_cost;
use crate::model::{Participant, SkillRegistry, Team, TeamMetrics, TeamVector};
use crate::types::{Role, TeamId};
use crate::vectorops::{clamp, l2_norm, mean_pool, normalize};
use indexmap::IndexMap;
use smallvec::SmallVec;

/// Produce a team's `TeamVector` and metrics from its members.
pub fn aggregate(
    id: TeamId,
    members: &[&Participant],
    registry: &SkillRegistry,
    formation_method: impl Into<String>,
    leadership_missing: bool,
) -> Team {
    let vector = aggregate_vector(members);
    let metrics = compute_metrics(members, &vector, registry);

    Team {
        id,
        member_ids: members.iter().map(|p| p.id.clone()).collect::<SmallVec<_>>(),
        formation_method: formation_method.into(),
        assigned_problem_id: None,
        vector,
        metrics,
        leadership_missing,
        ai_review: None,
    }
}

fn aggregate_vector(members: &[&Participant]) -> TeamVector {
    let mut skill_sums: IndexMap<String, f64> = IndexMap::new();
    let mut skill_counts: IndexMap<String, usize> = IndexMap::new();
    for p in members {
        for (skill, level) in &p.skills {
            *skill_sums.entry(skill.clone()).or_insert(0.0) += *level as f64;
            *skill_counts.entry(skill.clone()).or_insert(0) += 1;
        }
    }
    // Members without a skill contribute 0 to its mean (spec §4.3): divide
    // by team size, not by the count of members who listed the skill.
    let team_size = members.len().max(1) as f64;
    let avg_skill_levels: IndexMap<String, f64> = skill_sums
        .into_iter()
        .map(|(skill, sum)| (skill, sum / team_size))
        .collect();

    let mut role_counts: IndexMap<Role, usize> = IndexMap::new();
    let mut total_listings = 0usize;
    for p in members {
        for role in &p.roles {
            *role_counts.entry(*role).or_insert(0) += 1;
            total_listings += 1;
        }
    }
    let role_weights: IndexMap<Role, f64> = if total_listings == 0 {
        IndexMap::new()
    } else {
        role_counts
            .into_iter()
            .map(|(role, count)| (role, count as f64 / total_listings as f64))
            .collect()
    };

    let min_availability_hours = members
        .iter()
        .map(|p| p.availability_hours)
        .min()
        .unwrap_or(0);

    let dim = members
        .iter()
        .map(|p| p.motivation_embedding.len())
        .max()
        .unwrap_or(0);
    let embeddings: Vec<&[f64]> = members.iter().map(|p| p.motivation_embedding.as_slice()).collect();
    let mean_embedding = mean_pool(&embeddings, dim);
    let avg_motivation_embedding = if l2_norm(&mean_embedding) > 0.0 {
        normalize(&mean_embedding)
    } else {
        mean_embedding
    };

    let avg_ambiguity_tolerance = if members.is_empty() {
        0.0
    } else {
        members.iter().map(|p| p.ambiguity_comfort as f64).sum::<f64>() / team_size
    };

    let avg_confidence_score = if members.is_empty() {
        0.0
    } else {
        members.iter().map(|p| p.mean_skill_level() / 5.0).sum::<f64>() / team_size
    };

    TeamVector {
        avg_skill_levels,
        role_weights,
        min_availability_hours,
        avg_motivation_embedding,
        avg_ambiguity_tolerance,
        avg_confidence_score: clamp(avg_confidence_score, 0.0, 1.0),
    }
}

fn compute_metrics(members: &[&Participant], vector: &TeamVector, registry: &SkillRegistry) -> TeamMetrics {
    let distinct_roles: std::collections::HashSet<Role> =
        members.iter().flat_map(|p| p.roles.iter().copied()).collect();
    let role_coverage = distinct_roles.len() as f64 / Role::count() as f64;

    let (weighted_sum, weight_total) = registry.iter().fold((0.0, 0.0), |(ws, wt), (skill, importance)| {
        let max_level = members
            .iter()
            .map(|p| p.skill_level(skill))
            .max()
            .unwrap_or(0) as f64;
        (ws + importance * (max_level / 5.0), wt + importance)
    });
    let skills_covered = if weight_total > 0.0 { weighted_sum / weight_total } else { 0.0 };

    let team_size = members.len();
    let distinct_skills: std::collections::HashSet<&str> = members
        .iter()
        .flat_map(|p| p.skills.keys().map(String::as_str))
        .collect();
    let role_bonus = (0.1 * distinct_roles.len() as f64).min(0.3);
    let skill_bonus = if team_size > 0 {
        (0.1 * (distinct_skills.len() as f64 / team_size as f64)).min(0.2)
    } else {
        0.0
    };
    let diversity_score = (0.6 * role_coverage + 0.4 * skills_covered + role_bonus + skill_bonus).min(1.0);

    let tau = if team_size <= 2 {
        1.0
    } else if team_size <= 4 {
        0.75
    } else {
        0.60
    };
    let threshold = (team_size as f64 * tau).ceil() as usize;
    let max_role_count = members
        .iter()
        .flat_map(|p| p.roles.iter().copied())
        .fold(IndexMap::<Role, usize>::new(), |mut acc, r| {
            *acc.entry(r).or_insert(0) += 1;
            acc
        })
        .values()
        .copied()
        .max()
        .unwrap_or(0);
    let role_balance_flag = max_role_count <= threshold;

    let synergy_score = clamp(1.0 - mean_pairwise_cost(members), 0.0, 1.0);

    TeamMetrics {
        role_coverage: clamp(role_coverage, 0.0, 1.0),
        skills_covered: clamp(skills_covered, 0.0, 1.0),
        diversity_score: clamp(diversity_score, 0.0, 1.0),
        role_balance_flag,
        confidence_score: vector.avg_confidence_score,
        synergy_score,
    }
}
