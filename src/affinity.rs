//! Pairwise participant affinity cost `D`, used both by Phase 2's k-medoids
//! seeding/slot-filling (spec §4.5) and by [`crate::aggregate`]'s
//! `synergy_score` (spec §4.3, open question resolved in `DESIGN.md`: reuse
//! this pairwise cost rather than define a sixth formula).
//!
//! The spec names four weighted sub-terms and normalizes each into `[0,1]`
//! but only fully specifies one of them (`comm_style_clash`, resolved in
//! spec §9 as `|avail_i - avail_j| / 40` clamped). The remaining three are
//! decided here and recorded in `DESIGN.md`.

use crate::model::Participant;
use crate::vectorops::{clamp, cosine_similarity};
use std::collections::HashSet;

/// Pairwise affinity cost between two participants. Lower is a better pair
/// to place together (spec §4.5).
pub fn pairwise_affinity_cost(a: &Participant, b: &Participant) -> f64 {
    0.4 * role_diversity_penalty(a, b)
        + 0.3 * skill_overlap_penalty(a, b)
        + 0.3 * comm_style_clash(a, b)
        - 0.2 * motivation_similarity(a, b)
}

/// Jaccard overlap of primary role sets: high overlap means pairing the two
/// participants buys the team little new role coverage.
fn role_diversity_penalty(a: &Participant, b: &Participant) -> f64 {
    let ra: HashSet<_> = a.roles.iter().collect();
    let rb: HashSet<_> = b.roles.iter().collect();
    jaccard(&ra, &rb)
}

/// Jaccard overlap of possessed-skill sets (skills with level > 0): high
/// overlap means redundant skill coverage.
fn skill_overlap_penalty(a: &Participant, b: &Participant) -> f64 {
    let sa: HashSet<_> = a.skills.iter().filter(|(_, &l)| l > 0).map(|(k, _)| k).collect();
    let sb: HashSet<_> = b.skills.iter().filter(|(_, &l)| l > 0).map(|(k, _)| k).collect();
    jaccard(&sa, &sb)
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Resolved per spec §9 open question: clash in availability, as a proxy
/// for working-style/communication-cadence mismatch.
fn comm_style_clash(a: &Participant, b: &Participant) -> f64 {
    let diff = (a.availability_hours as f64 - b.availability_hours as f64).abs();
    clamp(diff / 40.0, 0.0, 1.0)
}

/// Pairwise motivation similarity, clamped non-negative; missing motivation
/// contributes no similarity bonus (symmetric with the cost model treating
/// a zero vector as "missing").
fn motivation_similarity(a: &Participant, b: &Participant) -> f64 {
    cosine_similarity(&a.motivation_embedding, &b.motivation_embedding)
        .map(|cos| cos.max(0.0))
        .unwrap_or(0.0)
}

/// Mean pairwise affinity cost across all distinct member pairs of a team,
/// or `0.0` for a team with fewer than 2 members.
pub fn mean_pairwise_cost(members: &[&Participant]) -> f64 {
    if members.len() < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            sum += pairwise_affinity_cost(members[i], members[j]);
            count += 1;
        }
    }
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParticipantId, Role};
    use indexmap::IndexMap;

    fn participant(id: &str, roles: Vec<Role>, skills: &[(&str, u8)], availability: u32, m: Vec<f64>) -> Participant {
        Participant {
            id: ParticipantId::new(id),
            full_name: id.to_string(),
            email: format!("{id}@example.com"),
            roles,
            skills: skills.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            availability_hours: availability,
            motivation_embedding: m,
            leadership_preference: false,
            ambiguity_comfort: 5,
        }
    }

    #[test]
    fn identical_participants_have_maximal_role_and_skill_overlap() {
        let a = participant("a", vec![Role::Engineer], &[("rust", 4)], 20, vec![1.0, 0.0]);
        let b = participant("b", vec![Role::Engineer], &[("rust", 3)], 20, vec![1.0, 0.0]);
        assert_eq!(role_diversity_penalty(&a, &b), 1.0);
        assert_eq!(skill_overlap_penalty(&a, &b), 1.0);
    }

    #[test]
    fn disjoint_roles_and_skills_have_zero_overlap() {
        let a = participant("a", vec![Role::Engineer], &[("rust", 4)], 20, vec![1.0, 0.0]);
        let b = participant("b", vec![Role::Designer], &[("figma", 4)], 20, vec![1.0, 0.0]);
        assert_eq!(role_diversity_penalty(&a, &b), 0.0);
        assert_eq!(skill_overlap_penalty(&a, &b), 0.0);
    }

    #[test]
    fn comm_style_clash_matches_spec_resolution() {
        let a = participant("a", vec![Role::Engineer], &[], 10, vec![]);
        let b = participant("b", vec![Role::Engineer], &[], 50, vec![]);
        assert_eq!(comm_style_clash(&a, &b), 1.0);
    }

    #[test]
    fn mean_pairwise_cost_of_singleton_team_is_zero() {
        let a = participant("a", vec![Role::Engineer], &[], 10, vec![]);
        assert_eq!(mean_pairwise_cost(&[&a]), 0.0);
    }
}
