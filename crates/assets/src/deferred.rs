//! After-commit execution.

use crate::metrics::DEFERRED_TASK_FAILURES;
use encore_metadata::{DeferredTask, UnitOfWork};

/// Runs side effects only once the database work they depend on is durable.
pub struct AfterCommit;

impl AfterCommit {
    /// With a unit of work, register `task` to run after it commits. Without
    /// one there is nothing to wait for and the task runs now.
    ///
    /// Task failures are logged and counted, never returned.
    pub async fn run(scope: Option<&mut UnitOfWork>, task: DeferredTask) {
        let task = counted(task);
        match scope {
            Some(uow) => uow.after_commit(task),
            None => {
                task.run_logged().await;
            }
        }
    }
}

fn counted(task: DeferredTask) -> DeferredTask {
    let label = task.label().to_string();
    DeferredTask::new(label, move || async move {
        let result = task.run().await;
        if result.is_err() {
            DEFERRED_TASK_FAILURES.inc();
        }
        result
    })
}
