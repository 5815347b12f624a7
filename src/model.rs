//! Data model: Participant, Problem, Bucket, Team, TeamVector, Assignment.
//!
//! Teams and participants reference each other by id only (spec §9: no
//! ownership cycles); a `Team` owns its `TeamVector`, participants are
//! owned by the run-wide snapshot the repository hands back.

use crate::cost::CostComponents;
use crate::types::{ParticipantId, ProblemId, Role, TeamId};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A participant ingested into a pipeline run. Immutable within the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier
    pub id: ParticipantId,
    /// Full name
    pub full_name: String,
    /// Email
    pub email: String,
    /// Ordered list of 1-3 primary role tags
    pub roles: Vec<Role>,
    /// Skill name to proficiency in [0,5]
    pub skills: IndexMap<String, u8>,
    /// Availability in hours, >= 0
    pub availability_hours: u32,
    /// Fixed-dimension motivation embedding, unit-norm or zero
    pub motivation_embedding: Vec<f64>,
    /// Whether the participant prefers a leadership role
    pub leadership_preference: bool,
    /// Ambiguity comfort in [1,10]
    pub ambiguity_comfort: u8,
}

impl Participant {
    /// Validate the numeric invariants this type owns. Form-schema
    /// validation (required fields present, types correct) is assumed
    /// upstream per spec §1.
    pub fn validate(&self) -> Result<()> {
        if self.roles.is_empty() || self.roles.len() > 3 {
            return Err(Error::invalid_input(format!(
                "participant {} must have 1-3 roles, has {}",
                self.id,
                self.roles.len()
            )));
        }
        if !(1..=10).contains(&self.ambiguity_comfort) {
            return Err(Error::invalid_input(format!(
                "participant {} ambiguity_comfort {} out of [1,10]",
                self.id, self.ambiguity_comfort
            )));
        }
        for (skill, level) in &self.skills {
            if *level > 5 {
                return Err(Error::invalid_input(format!(
                    "participant {} skill {skill} level {level} out of [0,5]",
                    self.id
                )));
            }
        }
        if self
            .motivation_embedding
            .iter()
            .any(|x| !x.is_finite())
        {
            return Err(Error::invalid_input(format!(
                "participant {} motivation embedding has non-finite entries",
                self.id
            )));
        }
        Ok(())
    }

    /// Proficiency for a named skill; missing skills count as 0 (spec §4.1).
    pub fn skill_level(&self, name: &str) -> u8 {
        self.skills.get(name).copied().unwrap_or(0)
    }

    /// Mean proficiency across all listed skills, used for confidence score.
    pub fn mean_skill_level(&self) -> f64 {
        if self.skills.is_empty() {
            return 0.0;
        }
        self.skills.values().map(|&l| l as f64).sum::<f64>() / self.skills.len() as f64
    }
}

/// A problem to be staffed. Immutable within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// Stable identifier
    pub id: ProblemId,
    /// Title
    pub title: String,
    /// Full prompt text
    pub prompt: String,
    /// Estimated team size in [2,10]
    pub estimated_team_size: u8,
    /// Role name to non-negative weight, summing to <= 1
    pub role_preferences: IndexMap<Role, f64>,
    /// Skill name to required minimum level in [0,5]
    pub skill_requirements: IndexMap<String, u8>,
    /// Ambiguity level in [1,10]
    pub ambiguity_level: u8,
    /// Estimated workload in hours
    pub estimated_workload_hours: u32,
    /// Motivation embedding
    pub motivation_embedding: Vec<f64>,
}

impl Problem {
    /// Validate the numeric invariants this type owns.
    pub fn validate(&self) -> Result<()> {
        if !(2..=10).contains(&self.estimated_team_size) {
            return Err(Error::invalid_input(format!(
                "problem {} estimated_team_size {} out of [2,10]",
                self.id, self.estimated_team_size
            )));
        }
        if !(1..=10).contains(&self.ambiguity_level) {
            return Err(Error::invalid_input(format!(
                "problem {} ambiguity_level {} out of [1,10]",
                self.id, self.ambiguity_level
            )));
        }
        let weight_sum: f64 = self.role_preferences.values().sum();
        if weight_sum < 0.0 || weight_sum > 1.0 + 1e-6 {
            return Err(Error::invalid_input(format!(
                "problem {} role_preferences sum to {weight_sum}, must be in [0,1]",
                self.id
            )));
        }
        if self.role_preferences.values().any(|w| *w < 0.0) {
            return Err(Error::invalid_input(format!(
                "problem {} has a negative role weight",
                self.id
            )));
        }
        for (skill, level) in &self.skill_requirements {
            if *level > 5 {
                return Err(Error::invalid_input(format!(
                    "problem {} required skill {skill} level {level} out of [0,5]",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// One entry in a Phase 1 bucket: a participant assigned to a problem,
/// with its individual cost and within-problem rank (ascending by cost).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketEntry {
    /// The assigned participant
    pub participant_id: ParticipantId,
    /// Individual assignment cost
    pub cost: f64,
    /// Per-component cost breakdown
    pub components: CostComponents,
    /// Rank within this problem's bucket, 0 = lowest cost
    pub rank: usize,
}

/// Output of Phase 1: mapping from problem id to its ordered bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bucket {
    /// Problem id -> ordered participant entries
    pub assignments: IndexMap<ProblemId, Vec<BucketEntry>>,
    /// Participants that could not be placed (capacity exceeded |P|, or
    /// overall capacity fell short of the population)
    pub unassigned: Vec<ParticipantId>,
}

impl Bucket {
    /// Total number of participants assigned across all problems.
    pub fn total_assigned(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }
}

/// Single-vector reduction of a team, used for team-level cost computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamVector {
    /// Mean skill level per skill name across members
    pub avg_skill_levels: IndexMap<String, f64>,
    /// Role distribution over the closed vocabulary, summing to 1 (or 0)
    pub role_weights: IndexMap<Role, f64>,
    /// Minimum member availability
    pub min_availability_hours: u32,
    /// Mean motivation embedding, re-normalized to unit length if nonzero
    pub avg_motivation_embedding: Vec<f64>,
    /// Mean ambiguity tolerance across members
    pub avg_ambiguity_tolerance: f64,
    /// Mean normalized skill confidence in [0,1]
    pub avg_confidence_score: f64,
}

/// Computed metrics for a formed team, all deterministic pure functions of
/// team contents (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Fraction of the closed role vocabulary represented by >=1 member
    pub role_coverage: f64,
    /// Weighted coverage over the skill importance vocabulary
    pub skills_covered: f64,
    /// Overall diversity score in [0,1]
    pub diversity_score: f64,
    /// True iff no role's member count exceeds the size-scaled threshold
    pub role_balance_flag: bool,
    /// Mean normalized skill confidence, duplicated from the TeamVector for
    /// convenience at the metrics call site
    pub confidence_score: f64,
    /// 1 - mean pairwise affinity cost among members, clamped to [0,1]
    pub synergy_score: f64,
}

/// A formed team of exactly `S` participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Stable identifier
    pub id: TeamId,
    /// Exactly `S` member ids; `SmallVec` avoids a heap allocation for the
    /// common team sizes (spec bounds team size to [2,10]).
    pub member_ids: SmallVec<[ParticipantId; 10]>,
    /// How this team was formed, e.g. "strict_enforcement"
    pub formation_method: String,
    /// Problem this team was assigned to by Phase 3, if any
    pub assigned_problem_id: Option<ProblemId>,
    /// Aggregated vector representation
    pub vector: TeamVector,
    /// Computed metrics
    pub metrics: TeamMetrics,
    /// True if no member had a leadership preference and none could be
    /// swapped in (spec §4.5 step 3); the team is still emitted.
    pub leadership_missing: bool,
    /// Advisory AI-generated review text. Never consumed by the cost model
    /// (spec §9): falls back to computed metrics when absent.
    pub ai_review: Option<String>,
}

impl Team {
    /// Number of members, expected to equal the pipeline's target team size.
    pub fn size(&self) -> usize {
        self.member_ids.len()
    }
}

/// Per-pair result of Phase 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentPair {
    /// The team
    pub team_id: TeamId,
    /// The problem it was matched to
    pub problem_id: ProblemId,
    /// Total cost of the pair
    pub cost: f64,
    /// Per-component cost breakdown
    pub components: CostComponents,
}

/// Aggregate statistics over a final assignment (spec §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssignmentStats {
    /// Sum of all pair costs
    pub total_cost: f64,
    /// Mean pair cost
    pub mean_cost: f64,
    /// Minimum pair cost
    pub min_cost: f64,
    /// Maximum pair cost (worst_case_cost)
    pub max_cost: f64,
    /// 1 - mean_cost, clamped to [0,1]
    pub assignment_efficiency: f64,
}

/// Result of Phase 3: a bijection between a subset of problems and teams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAssignment {
    /// Matched (team, problem) pairs
    pub pairs: Vec<AssignmentPair>,
    /// Teams left unmatched because `|T| > |Q|`
    pub unassigned_teams: Vec<TeamId>,
    /// Problems left unmatched because `|T| < |Q|`
    pub unassigned_problems: Vec<ProblemId>,
    /// Aggregate statistics over `pairs`
    pub stats: AssignmentStats,
}

/// Per-skill importance vocabulary `V_imp`, populated at run start from the
/// union of skills referenced by participants and problems (spec §9: no
/// runtime reflection into the cost model, everything goes through this
/// registry).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillRegistry {
    /// skill name -> importance weight `w_s` in (0,1]
    importances: IndexMap<String, f64>,
}

impl SkillRegistry {
    /// Build a registry from participants and problems, assigning every
    /// referenced skill a default importance of 1.0 unless overridden.
    pub fn from_population(participants: &[Participant], problems: &[Problem]) -> Self {
        let mut importances = IndexMap::new();
        for p in participants {
            for skill in p.skills.keys() {
                importances.entry(skill.clone()).or_insert(1.0);
            }
        }
        for q in problems {
            for skill in q.skill_requirements.keys() {
                importances.entry(skill.clone()).or_insert(1.0);
            }
        }
        Self { importances }
    }

    /// Override or insert the importance of a named skill; clamped to (0,1].
    pub fn set_importance(&mut self, skill: impl Into<String>, importance: f64) {
        self.importances
            .insert(skill.into(), importance.clamp(f64::EPSILON, 1.0));
    }

    /// Importance of a named skill, defaulting to 1.0 if unregistered.
    pub fn importance(&self, skill: &str) -> f64 {
        self.importances.get(skill).copied().unwrap_or(1.0)
    }

    /// Iterate registered (skill, importance) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.importances.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.importances.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.importances.is_empty()
    }
}
