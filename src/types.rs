//! Common types shared across the matchmaking pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

/// Stable identifier for a problem
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemId(pub String);

/// Stable identifier for a team
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub String);

/// Stable identifier for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

macro_rules! id_newtype {
    ($ty:ident) => {
        impl $ty {
            /// Wrap a string as an id
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrow the underlying string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_newtype!(ParticipantId);
id_newtype!(ProblemId);
id_newtype!(TeamId);
id_newtype!(RunId);

/// Closed role vocabulary `R`.
///
/// Re-architected from an open string-keyed mapping (see `DESIGN.md`) into a
/// tagged enum so role coverage, role distributions, and role-balance math
/// can all iterate a fixed, known vocabulary instead of reflecting over
/// whatever strings happened to appear in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Drives technical implementation
    Engineer,
    /// Owns product scope and user-facing tradeoffs
    ProductOwner,
    /// Owns visual and interaction design
    Designer,
    /// Analyzes data and validates hypotheses
    DataAnalyst,
    /// Presents and sells the team's outcome
    Presenter,
    /// Coordinates the team and keeps it unblocked
    Facilitator,
    /// Domain expert outside the above categories
    DomainExpert,
}

impl Role {
    /// The closed vocabulary, in a fixed canonical order.
    pub const ALL: [Role; 7] = [
        Role::Engineer,
        Role::ProductOwner,
        Role::Designer,
        Role::DataAnalyst,
        Role::Presenter,
        Role::Facilitator,
        Role::DomainExpert,
    ];

    /// Number of roles in the closed vocabulary, `|R|`.
    pub fn count() -> usize {
        Self::ALL.len()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Engineer => "engineer",
            Role::ProductOwner => "product_owner",
            Role::Designer => "designer",
            Role::DataAnalyst => "data_analyst",
            Role::Presenter => "presenter",
            Role::Facilitator => "facilitator",
            Role::DomainExpert => "domain_expert",
        };
        write!(f, "{s}")
    }
}

/// Skill proficiency level, clamped to `[0, 5]` per spec invariant 4.
pub type SkillLevel = u8;

/// Clamp a skill level into the valid `[0, 5]` range.
pub fn clamp_skill_level(level: u8) -> SkillLevel {
    level.min(5)
}
