//! Minimal task dispatch seam (spec §6, §9): the core pipeline stays
//! synchronous; only the boundary that hands work to "one background task
//! per phase" (spec §5) is abstracted, so an external queue can be swapped
//! in without touching phase logic.

use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Dispatches a unit of phase work, returning an opaque task id. At-least-once
/// delivery is acceptable: phase execution is idempotent per run id and
/// phase (spec §6).
pub trait TaskDispatcher: Send + Sync {
    /// Enqueue `work` under `task_name`, returning a task id for logging.
    fn enqueue(&self, task_name: String, work: Box<dyn FnOnce() + Send + 'static>) -> Result<String>;
}

/// Runs enqueued work on a detached OS thread in the current process.
#[derive(Default)]
pub struct InProcessDispatcher {
    counter: AtomicU64,
}

impl TaskDispatcher for InProcessDispatcher {
    fn enqueue(&self, task_name: String, work: Box<dyn FnOnce() + Send + 'static>) -> Result<String> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let task_id = format!("{task_name}-{id}");
        std::thread::spawn(work);
        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn enqueued_work_runs() {
        let dispatcher = InProcessDispatcher::default();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let task_id = dispatcher
            .enqueue("test-task".to_string(), Box::new(move || flag.store(true, Ordering::SeqCst)))
            .unwrap();
        assert!(task_id.starts_with("test-task-"));
        for _ in 0..100 {
            if ran.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn task_ids_are_unique() {
        let dispatcher = InProcessDispatcher::default();
        let a = dispatcher.enqueue("t".to_string(), Box::new(|| {})).unwrap();
        let b = dispatcher.enqueue("t".to_string(), Box::new(|| {})).unwrap();
        assert_ne!(a, b);
    }
}
