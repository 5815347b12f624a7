//! Cooperative cancellation and wall-clock budgets shared by the Hungarian
//! solver and the phase orchestrator.
//!
//! Grounded on the teacher's `gate::budgets::SolveBudgets` (a validated
//! resource-budget struct with a `time_limit`), generalized with an
//! explicit cancellation token since the teacher's gate is single-shot and
//! does not model an in-flight cancel request.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cheap, clonable cooperative-cancellation flag. Solvers check it
/// between outer iterations, never inside inner scans (spec §5).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a fresh, unset token.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wall-clock budget for a single phase or solver invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveBudget {
    /// Maximum wall-clock time to spend, `None` = unlimited.
    #[serde(with = "duration_secs")]
    pub time_limit: Option<Duration>,
}

impl Default for SolveBudget {
    fn default() -> Self {
        Self {
            time_limit: Some(Duration::from_secs(30)),
        }
    }
}

impl SolveBudget {
    /// A budget with no time limit, for tests and small inputs.
    pub fn unlimited() -> Self {
        Self { time_limit: None }
    }

    /// A budget with the given time limit in seconds.
    pub fn with_time_limit_secs(seconds: f64) -> Self {
        Self {
            time_limit: Some(Duration::from_secs_f64(seconds)),
        }
    }

    /// Check `elapsed` against the budget, returning `Error::Timeout` if
    /// exceeded.
    pub fn check(&self, elapsed: Duration) -> Result<()> {
        if let Some(limit) = self.time_limit {
            if elapsed > limit {
                return Err(Error::timeout(elapsed.as_secs_f64()));
            }
        }
        Ok(())
    }
}

/// Tracks elapsed wall-clock time against a [`SolveBudget`] and a
/// [`CancellationToken`] for a single solve/phase run.
pub struct RunGuard {
    start: Instant,
    budget: SolveBudget,
    token: CancellationToken,
}

impl RunGuard {
    /// Start timing a run against the given budget and cancellation token.
    pub fn start(budget: SolveBudget, token: CancellationToken) -> Self {
        Self {
            start: Instant::now(),
            budget,
            token,
        }
    }

    /// Call between outer iterations: returns `Canceled` or `Timeout` if
    /// either condition has been hit, otherwise `Ok(())`.
    pub fn check(&self) -> Result<()> {
        if self.token.is_canceled() {
            return Err(Error::Canceled);
        }
        self.budget.check(self.start.elapsed())
    }

    /// Elapsed time since the guard started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<f64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_starts_unset() {
        let token = CancellationToken::new();
        assert!(!token.is_canceled());
        token.cancel();
        assert!(token.is_canceled());
    }

    #[test]
    fn cloned_token_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_canceled());
    }

    #[test]
    fn unlimited_budget_never_times_out() {
        let budget = SolveBudget::unlimited();
        assert!(budget.check(Duration::from_secs(1_000_000)).is_ok());
    }

    #[test]
    fn exceeded_budget_times_out() {
        let budget = SolveBudget::with_time_limit_secs(0.0);
        assert!(budget.check(Duration::from_millis(1)).is_err());
    }
}
