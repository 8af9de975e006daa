//! Mercurial commands, run against a local clone.

mod parser;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use utils::text::TextEncoding;

pub use parser::{log_template, parse_commits};

use crate::backend::{
    clone_into, commits_within, contains_repo, content_failure, exit_failure, file_content_result,
    log_failures, missing_repo_message,
};
use crate::command::{Described, VcsCommand};
use crate::error::VcsError;
use crate::process::{CommandLine, ProcessHandle};
use crate::result::{CloneResult, LogFileContentResult, LogResult, UpdateResult};
use crate::types::{Revision, TimeRange};

const HG_METADATA_DIR: &str = ".hg";

/// Seconds value for an hg date predicate.
///
/// `hg log -r 'date("a to b")'` misses the first second of the range unless
/// the bound is moved back by one. The result is clamped to what hg accepts.
pub fn hg_epoch_seconds(instant: DateTime<Utc>) -> i64 {
    (instant.timestamp() - 1).clamp(0, i64::from(i32::MAX))
}

fn hg_date(instant: DateTime<Utc>) -> String {
    format!("{} 0", hg_epoch_seconds(instant))
}

/// `hg clone -v <url> <local>`
#[derive(Debug, PartialEq, Eq)]
pub struct HgClone {
    local_path: PathBuf,
    command_line: CommandLine,
}

impl HgClone {
    pub fn new(hg_path: &str, repository_url: &str, local_path: impl AsRef<Path>) -> Self {
        let local_path = local_path.as_ref().to_path_buf();
        let command_line = CommandLine::new(
            hg_path,
            [
                "clone".to_string(),
                "-v".to_string(),
                repository_url.to_string(),
                local_path.display().to_string(),
            ],
        );
        Self {
            local_path,
            command_line,
        }
    }
}

impl Described for HgClone {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for HgClone {
    type Output = CloneResult;

    fn execute(&self) -> Result<CloneResult, VcsError> {
        clone_into(&self.command_line, &self.local_path, HG_METADATA_DIR, "hg")
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

/// `hg pull` inside the clone
#[derive(Debug, PartialEq, Eq)]
pub struct HgUpdate {
    folder: PathBuf,
    command_line: CommandLine,
}

impl HgUpdate {
    pub fn new(hg_path: &str, folder: impl AsRef<Path>) -> Self {
        let folder = folder.as_ref().to_path_buf();
        let command_line = CommandLine::new(hg_path, ["pull"]).working_dir(&folder);
        Self {
            folder,
            command_line,
        }
    }
}

impl Described for HgUpdate {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for HgUpdate {
    type Output = UpdateResult;

    fn execute(&self) -> Result<UpdateResult, VcsError> {
        if !contains_repo(&self.folder, HG_METADATA_DIR) {
            return Ok(UpdateResult::vcs_error(missing_repo_message("hg", &self.folder)));
        }
        let output = self.command_line.execute_to_completion()?;
        Ok(match exit_failure(&output) {
            Some(message) => UpdateResult::vcs_error(message),
            None => UpdateResult::default(),
        })
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

/// `hg log` over a time range, rendered with [`log_template`]
#[derive(Debug, PartialEq, Eq)]
pub struct HgLog {
    folder: PathBuf,
    range: TimeRange,
    command_line: CommandLine,
}

impl HgLog {
    pub fn new(hg_path: &str, folder: impl AsRef<Path>, range: TimeRange) -> Self {
        let folder = folder.as_ref().to_path_buf();
        let revset = format!("date(\"{} to {}\")", hg_date(range.from()), hg_date(range.to()));
        let command_line = CommandLine::new(
            hg_path,
            [
                "log".to_string(),
                "--encoding".to_string(),
                "UTF-8".to_string(),
                "-r".to_string(),
                revset,
                "--template".to_string(),
                log_template(),
            ],
        )
        .working_dir(&folder)
        .encoding(TextEncoding::utf8());
        Self {
            folder,
            range,
            command_line,
        }
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }
}

impl Described for HgLog {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for HgLog {
    type Output = LogResult;

    fn execute(&self) -> Result<LogResult, VcsError> {
        if !contains_repo(&self.folder, HG_METADATA_DIR) {
            return Ok(LogResult::vcs_error(missing_repo_message("hg", &self.folder)));
        }
        let output = self.command_line.execute_to_completion()?;
        if let Some(message) = exit_failure(&output) {
            return Ok(LogResult::vcs_error(message));
        }
        // The date revset covers [from - 1s, to - 1s]
        let commits = commits_within(parse_commits(&output.stdout)?, &self.range);
        Ok(LogResult::new(commits, log_failures(&output)))
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

/// `hg cat -r <revision> <path>`
#[derive(Debug, PartialEq, Eq)]
pub struct HgLogFileContent {
    command_line: CommandLine,
}

impl HgLogFileContent {
    pub fn new(
        hg_path: &str,
        folder: impl AsRef<Path>,
        file_path: &str,
        revision: &Revision,
        encoding: TextEncoding,
    ) -> Self {
        let command_line = CommandLine::new(hg_path, ["cat", "-r", revision.as_str(), file_path])
            .working_dir(folder)
            .encoding(encoding.auto_detect());
        Self { command_line }
    }
}

impl Described for HgLogFileContent {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for HgLogFileContent {
    type Output = LogFileContentResult;

    fn execute(&self) -> Result<LogFileContentResult, VcsError> {
        Ok(match self.command_line.execute() {
            Ok(output) => file_content_result(output),
            Err(e) => content_failure(e),
        })
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}
