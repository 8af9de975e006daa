//! Typed results of clone/update/log operations and their aggregation.
//!
//! Every result keeps two failure lists:
//! - `vcs_errors`: diagnostics the tool itself printed (it ran and complained)
//! - `exceptions`: [`VcsError`]s raised because the tool could not be run or
//!   its output could not be understood
//!
//! Results combine with [`Aggregate::merge`], which is associative and has the
//! empty (`Default`) result as identity. Failures keep call order.

use crate::error::VcsError;
use crate::types::{Commit, RootId};

/// Results that can be folded together across roots.
pub trait Aggregate: Default + Sized {
    /// Combine two results, keeping `self`'s failures first
    fn merge(self, other: Self) -> Self;

    /// Result carrying a single unexpected failure
    fn from_exception(error: VcsError) -> Self;

    /// Fold any number of results, starting from the empty result
    fn aggregate<I: IntoIterator<Item = Self>>(results: I) -> Self {
        results.into_iter().fold(Self::default(), Self::merge)
    }
}

/// Failures shared by every aggregatable result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failures {
    vcs_errors: Vec<String>,
    exceptions: Vec<VcsError>,
}

impl Failures {
    pub fn new(vcs_errors: Vec<String>, exceptions: Vec<VcsError>) -> Self {
        Self {
            vcs_errors,
            exceptions,
        }
    }

    pub fn vcs_error(message: impl Into<String>) -> Self {
        Self::new(vec![message.into()], Vec::new())
    }

    pub fn exception(error: VcsError) -> Self {
        Self::new(Vec::new(), vec![error])
    }

    pub fn vcs_errors(&self) -> &[String] {
        &self.vcs_errors
    }

    pub fn exceptions(&self) -> &[VcsError] {
        &self.exceptions
    }

    pub fn is_empty(&self) -> bool {
        self.vcs_errors.is_empty() && self.exceptions.is_empty()
    }

    fn merge(mut self, other: Self) -> Self {
        self.vcs_errors.extend(other.vcs_errors);
        self.exceptions.extend(other.exceptions);
        self
    }
}

macro_rules! failures_accessors {
    () => {
        pub fn vcs_errors(&self) -> &[String] {
            self.failures.vcs_errors()
        }

        pub fn exceptions(&self) -> &[VcsError] {
            self.failures.exceptions()
        }

        pub fn failures(&self) -> &Failures {
            &self.failures
        }

        pub fn is_successful(&self) -> bool {
            self.failures.is_empty()
        }
    };
}

/// Outcome of cloning roots to the local file system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneResult {
    failures: Failures,
}

impl CloneResult {
    pub fn new(failures: Failures) -> Self {
        Self { failures }
    }

    pub fn vcs_error(message: impl Into<String>) -> Self {
        Self::new(Failures::vcs_error(message))
    }

    failures_accessors!();
}

impl Aggregate for CloneResult {
    fn merge(self, other: Self) -> Self {
        Self::new(self.failures.merge(other.failures))
    }

    fn from_exception(error: VcsError) -> Self {
        Self::new(Failures::exception(error))
    }
}

/// Outcome of pulling upstream changes into local clones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    failures: Failures,
}

impl UpdateResult {
    pub fn new(failures: Failures) -> Self {
        Self { failures }
    }

    pub fn vcs_error(message: impl Into<String>) -> Self {
        Self::new(Failures::vcs_error(message))
    }

    failures_accessors!();
}

impl Aggregate for UpdateResult {
    fn merge(self, other: Self) -> Self {
        Self::new(self.failures.merge(other.failures))
    }

    fn from_exception(error: VcsError) -> Self {
        Self::new(Failures::exception(error))
    }
}

/// Commits read from one or more roots, ordered by timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogResult {
    commits: Vec<Commit>,
    failures: Failures,
}

impl LogResult {
    /// Commits are stably sorted by timestamp, oldest first.
    pub fn new(mut commits: Vec<Commit>, failures: Failures) -> Self {
        commits.sort_by_key(|commit| commit.timestamp);
        Self { commits, failures }
    }

    pub fn with_commits(commits: Vec<Commit>) -> Self {
        Self::new(commits, Failures::default())
    }

    pub fn vcs_error(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), Failures::vcs_error(message))
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn into_commits(self) -> Vec<Commit> {
        self.commits
    }

    /// Tag every commit with the root it came from
    pub fn with_root(mut self, root: RootId) -> Self {
        for commit in &mut self.commits {
            commit.set_root(root);
        }
        self
    }

    failures_accessors!();
}

impl Aggregate for LogResult {
    fn merge(self, other: Self) -> Self {
        let mut commits = self.commits;
        commits.extend(other.commits);
        Self::new(commits, self.failures.merge(other.failures))
    }

    fn from_exception(error: VcsError) -> Self {
        Self::new(Vec::new(), Failures::exception(error))
    }
}

/// Body of a file at a given revision, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileContentResult {
    text: String,
    stderr: String,
    exit_code: i32,
}

impl LogFileContentResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failure(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            text: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_successful(&self) -> bool {
        self.stderr.is_empty() && self.exit_code == 0
    }
}
