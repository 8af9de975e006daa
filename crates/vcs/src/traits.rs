use crate::command::CommandObserver;
use crate::error::VcsError;
use crate::result::{CloneResult, LogFileContentResult, LogResult, UpdateResult};
use crate::types::{Revision, TimeRange};

/// One repository: a backend bound to a location.
///
/// Distributed roots move from "not cloned" to "cloned" via
/// [`clone_to_local`](VcsRoot::clone_to_local) and are refreshed with
/// [`update`](VcsRoot::update). Centralized roots query the server on every
/// call, so both are no-ops for them.
///
/// `Err` is reserved for unexpected failures (the tool could not run, its
/// output could not be parsed). Diagnostics the tool printed are reported
/// inside the returned result.
pub trait VcsRoot: Send + Sync {
    /// Human-readable identification, used in logs
    fn description(&self) -> String;

    /// Clone into the local working copy, replacing any earlier clone
    fn clone_to_local(&self) -> Result<CloneResult, VcsError>;

    /// Pull new history into an existing local clone
    fn update(&self) -> Result<UpdateResult, VcsError>;

    /// Read commits within `range`. Never changes local state.
    fn log(&self, range: &TimeRange) -> Result<LogResult, VcsError>;

    /// Body of `file_path` at `revision`.
    ///
    /// Every failure, including not being able to start the tool, is
    /// reported as a non-successful result.
    fn log_file_content(&self, file_path: &str, revision: &Revision) -> LogFileContentResult;

    /// Terminate whatever this root is currently running
    fn cancel(&self) -> bool;

    /// Route this root's command notifications to `observer`
    fn set_observer(&mut self, observer: CommandObserver);
}
