//! Hungarian algorithm (Kuhn-Munkres) for the linear assignment problem.
//!
//! Generalized from the teacher's `i64`-cost Kuhn-Munkres to real-valued
//! `f64` costs (spec §4.2: costs are non-negative reals), keeping the same
//! potentials/shortest-augmenting-path formulation.
//!
//! ## Algorithm overview
//!
//! 1. Pad the matrix to square with a cost strictly greater than any real
//!    entry, so a square potentials-based solve can run uniformly.
//! 2. For each row, grow a shortest-augmenting-path tree from the
//!    unassigned column frontier, maintaining dual potentials `u`, `v`.
//! 3. Reconstruct the augmenting path and flip it.
//!
//! Ties are broken lexicographically by `(i, j)`: the inner scan over
//! columns keeps the first (smallest `j`) column achieving the minimum
//! reduced cost, and rows are processed in increasing order, so the
//! resulting assignment is deterministic (spec §4.2, §9 redesign flag).

use super::{AssignmentProblem, AssignmentSolution, AssignmentSolver, SolveStats};
use crate::budget::{CancellationToken, RunGuard, SolveBudget};
use crate::Result;
use std::time::Instant;

/// Hungarian algorithm solver.
pub struct HungarianSolver;

impl AssignmentSolver for HungarianSolver {
    fn solve(
        &self,
        problem: &AssignmentProblem,
        budget: SolveBudget,
        token: CancellationToken,
    ) -> Result<AssignmentSolution> {
        solve_hungarian(problem, budget, token)
    }

    fn name(&self) -> &'static str {
        "hungarian"
    }
}

/// Solve using the Hungarian algorithm with an unlimited budget.
pub fn solve(problem: &AssignmentProblem) -> Result<AssignmentSolution> {
    solve_hungarian(problem, SolveBudget::unlimited(), CancellationToken::new())
}

fn solve_hungarian(
    problem: &AssignmentProblem,
    budget: SolveBudget,
    token: CancellationToken,
) -> Result<AssignmentSolution> {
    let start = Instant::now();
    let n = problem.num_agents;
    let m = problem.num_tasks;

    if n == 0 || m == 0 {
        return Ok(AssignmentSolution::default());
    }

    let guard = RunGuard::start(budget, token);
    let size = n.max(m);

    let pad = problem
        .costs
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(0.0f64, f64::max)
        + 1.0;

    let mut cost = vec![vec![0.0f64; size]; size];
    for (i, row) in cost.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = if i < n && j < m { problem.costs[i][j] } else { pad };
        }
    }

    // Dual potentials, 1-indexed as in the classical formulation.
    let mut u = vec![0.0f64; size + 1];
    let mut v = vec![0.0f64; size + 1];
    // p[j] = agent assigned to column j (0 = unassigned).
    let mut p = vec![0usize; size + 1];
    // way[j] = predecessor column on the augmenting path to j.
    let mut way = vec![0usize; size + 1];

    let mut iterations = 0usize;

    for i in 1..=size {
        guard.check()?;

        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; size + 1];
        let mut used = vec![false; size + 1];

        loop {
            iterations += 1;
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=size {
                if !used[j] {
                    let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }

            for j in 0..=size {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs = Vec::with_capacity(n.min(m));
    let mut total_cost = 0.0f64;
    for j in 1..=size {
        if p[j] != 0 && p[j] <= n && j <= m {
            let agent = p[j] - 1;
            let task = j - 1;
            pairs.push((agent, task));
            total_cost += problem.costs[agent][task];
        }
    }
    pairs.sort_unstable();

    Ok(AssignmentSolution {
        pairs,
        total_cost,
        stats: SolveStats {
            solve_time_seconds: start.elapsed().as_secs_f64(),
            iterations,
        },
    })
}
