//! Linear assignment problem: optimal minimum-cost bipartite matching.
//!
//! Used directly by Phase 1 (participant -> problem-bucket slot) and
//! Phase 3 (team -> problem), and indirectly by Phase 2's slot-filling step.
//!
//! ## Example
//!
//! ```rust
//! use matchmaker_core::assignment::{solve, AssignmentProblem};
//!
//! let problem = AssignmentProblem::from_costs(vec![
//!     vec![10.0, 5.0, 13.0],
//!     vec![3.0, 9.0, 18.0],
//!     vec![14.0, 8.0, 7.0],
//! ]);
//!
//! let solution = solve(&problem).unwrap();
//! println!("Total cost: {}", solution.total_cost);
//! ```

pub mod hungarian;

use crate::budget::{CancellationToken, SolveBudget};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// An assignment problem instance: a non-negative, finite real cost matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentProblem {
    /// Cost matrix: `costs[agent][task]`
    pub costs: Vec<Vec<f64>>,
    /// Number of agents (rows)
    pub num_agents: usize,
    /// Number of tasks (columns)
    pub num_tasks: usize,
}

impl AssignmentProblem {
    /// Create a problem from a cost matrix.
    pub fn from_costs(costs: Vec<Vec<f64>>) -> Self {
        let num_agents = costs.len();
        let num_tasks = costs.first().map_or(0, Vec::len);
        Self {
            costs,
            num_agents,
            num_tasks,
        }
    }

    /// Cost of assigning `agent` to `task`.
    pub fn cost(&self, agent: usize, task: usize) -> f64 {
        self.costs[agent][task]
    }

    /// Validate matrix shape and entry values (spec §4.2 failure modes).
    /// An empty dimension is not an error; it yields an empty solution.
    pub fn validate(&self) -> Result<()> {
        for row in &self.costs {
            if row.len() != self.num_tasks {
                return Err(Error::invalid_input(format!(
                    "ragged cost matrix: expected {} columns, got {}",
                    self.num_tasks,
                    row.len()
                )));
            }
            for &c in row {
                if !c.is_finite() || c < 0.0 {
                    return Err(Error::invalid_cost(format!(
                        "cost entry {c} is negative or non-finite"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Solution to an assignment problem: at most `min(n, m)` pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentSolution {
    /// Matched `(agent, task)` pairs, sorted by agent index.
    pub pairs: Vec<(usize, usize)>,
    /// Sum of costs of the matched pairs.
    pub total_cost: f64,
    /// Solver statistics.
    pub stats: SolveStats,
}

impl AssignmentSolution {
    /// Task assigned to `agent`, if any.
    pub fn task_for_agent(&self, agent: usize) -> Option<usize> {
        self.pairs
            .iter()
            .find(|(a, _)| *a == agent)
            .map(|(_, t)| t)
            .copied()
    }

    /// Agent assigned to `task`, if any.
    pub fn agent_for_task(&self, task: usize) -> Option<usize> {
        self.pairs
            .iter()
            .find(|(_, t)| *t == task)
            .map(|(a, _)| a)
            .copied()
    }
}

/// Statistics from a solver run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SolveStats {
    /// Wall-clock time spent solving.
    pub solve_time_seconds: f64,
    /// Outer-loop iterations performed (one per matched agent).
    pub iterations: usize,
}

/// Trait for assignment solvers; the crate ships exactly one implementation
/// ([`hungarian::HungarianSolver`]) but keeps the seam so a rerun can swap
/// solver behavior without touching callers.
pub trait AssignmentSolver {
    /// Solve the assignment problem, cooperatively respecting `budget` and
    /// `token`.
    fn solve(
        &self,
        problem: &AssignmentProblem,
        budget: SolveBudget,
        token: CancellationToken,
    ) -> Result<AssignmentSolution>;

    /// Solver name, for logging.
    fn name(&self) -> &'static str;
}

/// Solve an assignment problem with the default (Hungarian) solver and an
/// unlimited budget.
pub fn solve(problem: &AssignmentProblem) -> Result<AssignmentSolution> {
    problem.validate()?;
    hungarian::HungarianSolver.solve(problem, SolveBudget::unlimited(), CancellationToken::new())
}
