//! Unit of work: one database transaction plus the side effects that must
//! only happen once it has committed.
//!
//! Object storage is not transactional. Anything that mutates storage on
//! behalf of a row written in this transaction is registered with
//! [`UnitOfWork::after_commit`] and runs only after [`UnitOfWork::commit`]
//! has succeeded. Rolling back (or dropping the unit of work) discards the
//! registered tasks without running them.

use crate::error::MetadataResult;
use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Error type returned by deferred tasks.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a deferred task.
pub type TaskResult = Result<(), TaskError>;

/// A side effect scheduled to run after a successful commit.
pub struct DeferredTask {
    label: String,
    run: Box<dyn FnOnce() -> BoxFuture<'static, TaskResult> + Send>,
}

impl DeferredTask {
    pub fn new<F, Fut>(label: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Box::new(move || task().boxed()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the task, converting a panic into an error.
    pub async fn run(self) -> TaskResult {
        match AssertUnwindSafe((self.run)()).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(format!("deferred task '{}' panicked", self.label).into()),
        }
    }

    /// Run the task and log a failure instead of returning it.
    pub async fn run_logged(self) -> bool {
        let label = self.label.clone();
        match self.run().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(task = %label, error = %e, "deferred task failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredTask")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Counts of deferred tasks run after a commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// A transaction with after-commit registration.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    deferred: Vec<DeferredTask>,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self {
            tx,
            deferred: Vec::new(),
        }
    }

    /// Connection bound to this transaction; every repository runs on it.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Register `task` to run once this unit of work commits.
    pub fn after_commit(&mut self, task: DeferredTask) {
        tracing::debug!(task = %task.label(), "deferred task registered");
        self.deferred.push(task);
    }

    /// Number of tasks waiting for the commit.
    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    /// Commit, then run every deferred task in registration order.
    ///
    /// A commit failure is returned and no task runs. Task failures are
    /// logged and counted, never returned.
    pub async fn commit(self) -> MetadataResult<CommitReport> {
        let Self { tx, deferred } = self;
        tx.commit().await?;

        let mut report = CommitReport::default();
        for task in deferred {
            if task.run_logged().await {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    /// Roll back and discard every deferred task.
    pub async fn rollback(self) -> MetadataResult<()> {
        let Self { tx, deferred } = self;
        if !deferred.is_empty() {
            tracing::debug!(discarded = deferred.len(), "discarding deferred tasks on rollback");
        }
        tx.rollback().await?;
        Ok(())
    }
}
