//! # matchmaker-core
//!
//! Core assignment and team-formation engine for the automated matchmaker:
//! a weighted cost model, a Hungarian (Kuhn-Munkres) solver, a three-phase
//! matching pipeline, and the orchestrator that drives it.
//!
//! ## Modules
//!
//! - [`cost`] - Five-term weighted cost model shared by individual and team costs
//! - [`assignment`] - Linear assignment problem and the Hungarian solver
//! - [`affinity`] - Pairwise participant affinity cost used by Phase 2 and team synergy
//! - [`aggregate`] - Reduces a team's members into a `TeamVector` and metrics
//! - [`phases`] - Phase 1 (bucketing), Phase 2 (team formation), Phase 3 (assignment)
//! - [`orchestrator`] - The phase lifecycle state machine, storage and dispatch seams
//!
//! ## Quick Start
//!
//! ```rust
//! use matchmaker_core::assignment::{solve, AssignmentProblem};
//!
//! // Cost matrix: participant i to slot j
//! let costs = vec![
//!     vec![10.0, 5.0, 13.0],
//!     vec![3.0, 9.0, 18.0],
//!     vec![14.0, 8.0, 7.0],
//! ];
//!
//! let problem = AssignmentProblem::from_costs(costs);
//! let solution = solve(&problem).unwrap();
//! println!("Total cost: {}", solution.total_cost);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod affinity;
pub mod aggregate;
pub mod assignment;
pub mod budget;
pub mod cost;
pub mod model;
pub mod orchestrator;
pub mod phases;
pub mod vectorops;

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;

/// Prelude for common imports
pub mod prelude {
    pub use crate::aggregate::aggregate;
    pub use crate::assignment::{AssignmentProblem, AssignmentSolution, AssignmentSolver};
    pub use crate::budget::{CancellationToken, SolveBudget};
    pub use crate::cost::{cost_individual, cost_team, CostWeights};
    pub use crate::model::{Bucket, FinalAssignment, Participant, Problem, SkillRegistry, Team};
    pub use crate::orchestrator::{PhaseKind, PhaseOrchestrator, PhaseState, PhaseStatus, RunOverrides};
    pub use crate::Error;
    pub use crate::Result;
}
