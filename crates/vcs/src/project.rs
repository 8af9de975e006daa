//! Fan-out of clone/update/log requests over every root of a project.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::command::{CommandListener, CommandObserver};
use crate::error::VcsError;
use crate::result::{Aggregate, CloneResult, LogResult, UpdateResult};
use crate::root::Root;
use crate::traits::VcsRoot;
use crate::types::{RootId, TimeRange};

/// How a project visits its roots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One root after another on the calling thread
    #[default]
    Sequential,
    /// All roots at once on the rayon thread pool
    Parallel,
}

/// A set of repository roots read as one history.
///
/// Failures of one root never stop the others: every operation returns a
/// result that aggregates what each root reported, including errors and
/// panics.
pub struct Project<R: VcsRoot = Root> {
    roots: Vec<R>,
    observer: CommandObserver,
    mode: ExecutionMode,
}

impl<R: VcsRoot> Project<R> {
    pub fn new(roots: Vec<R>) -> Self {
        Self::with_mode(roots, ExecutionMode::default())
    }

    pub fn with_mode(mut roots: Vec<R>, mode: ExecutionMode) -> Self {
        let observer = CommandObserver::new();
        for root in &mut roots {
            root.set_observer(observer.clone());
        }
        Self {
            roots,
            observer,
            mode,
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn roots(&self) -> &[R] {
        &self.roots
    }

    /// Look up the root a commit came from, see [`crate::Commit::root`]
    pub fn root(&self, id: RootId) -> Option<&R> {
        self.roots.get(id.0)
    }

    /// Notify `listener` around every command run by any root
    pub fn add_listener(&self, listener: Arc<dyn CommandListener>) {
        self.observer.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn CommandListener>) {
        self.observer.remove(listener);
    }

    pub fn clone_to_local(&self) -> CloneResult {
        self.for_each_root("clone", |_, root| root.clone_to_local())
    }

    pub fn update(&self) -> UpdateResult {
        self.for_each_root("update", |_, root| root.update())
    }

    /// Commits of every root within `range`, oldest first, each tagged with
    /// the root that produced it.
    pub fn log(&self, range: &TimeRange) -> LogResult {
        self.for_each_root("log", |id, root| {
            root.log(range).map(|result| result.with_root(id))
        })
    }

    /// Validate `[from, to)` and log it. An inverted range is rejected
    /// before any root is contacted.
    pub fn log_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<LogResult, VcsError> {
        let range = TimeRange::new(from, to)?;
        Ok(self.log(&range))
    }

    /// Terminate commands currently running in any root
    pub fn cancel(&self) -> bool {
        self.roots
            .iter()
            .fold(false, |cancelled, root| root.cancel() || cancelled)
    }

    fn for_each_root<T, F>(&self, operation: &str, f: F) -> T
    where
        T: Aggregate + Send,
        F: Fn(RootId, &R) -> Result<T, VcsError> + Sync,
    {
        tracing::info!(
            "Running {} on {} roots ({:?})",
            operation,
            self.roots.len(),
            self.mode
        );

        let run = |(index, root): (usize, &R)| -> T {
            let id = RootId(index);
            let outcome = catch_unwind(AssertUnwindSafe(|| f(id, root)))
                .unwrap_or_else(|payload| Err(VcsError::from_panic(payload)));
            match outcome {
                Ok(result) => result,
                Err(e) => {
                    tracing::debug!("{} failed for {}: {}", operation, root.description(), e);
                    T::from_exception(e)
                }
            }
        };

        // Results are collected in root order and folded here, so merging
        // never runs concurrently.
        let results: Vec<T> = match self.mode {
            ExecutionMode::Sequential => self.roots.iter().enumerate().map(&run).collect(),
            ExecutionMode::Parallel => self.roots.par_iter().enumerate().map(&run).collect(),
        };
        T::aggregate(results)
    }
}

impl<R: VcsRoot> std::fmt::Debug for Project<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field(
                "roots",
                &self.roots.iter().map(|r| r.description()).collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .finish()
    }
}
