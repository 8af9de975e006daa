//! Git commands, run against a local clone through the `git` CLI.

mod parser;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use utils::text::TextEncoding;

pub use parser::{log_format, parse_commits};

use crate::backend::{
    clone_into, commits_within, contains_repo, content_failure, exit_failure, file_content_result,
    log_failures, missing_repo_message,
};
use crate::command::{Described, VcsCommand};
use crate::error::VcsError;
use crate::process::{CommandLine, ProcessHandle};
use crate::result::{CloneResult, LogFileContentResult, LogResult, UpdateResult};
use crate::types::{Revision, TimeRange};

const GIT_METADATA_DIR: &str = ".git";

fn git_date(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S +0000").to_string()
}

/// `git clone -v <url> <local>`
#[derive(Debug, PartialEq, Eq)]
pub struct GitClone {
    local_path: PathBuf,
    command_line: CommandLine,
}

impl GitClone {
    pub fn new(git_path: &str, repository_url: &str, local_path: impl AsRef<Path>) -> Self {
        let local_path = local_path.as_ref().to_path_buf();
        let command_line = CommandLine::new(
            git_path,
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

impl Described for GitClone {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for GitClone {
    type Output = CloneResult;

    fn execute(&self) -> Result<CloneResult, VcsError> {
        clone_into(&self.command_line, &self.local_path, GIT_METADATA_DIR, "git")
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

/// `git pull origin` inside the clone
#[derive(Debug, PartialEq, Eq)]
pub struct GitUpdate {
    folder: PathBuf,
    command_line: CommandLine,
}

impl GitUpdate {
    pub fn new(git_path: &str, folder: impl AsRef<Path>) -> Self {
        let folder = folder.as_ref().to_path_buf();
        let command_line = CommandLine::new(git_path, ["pull", "origin"]).working_dir(&folder);
        Self {
            folder,
            command_line,
        }
    }
}

impl Described for GitUpdate {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for GitUpdate {
    type Output = UpdateResult;

    fn execute(&self) -> Result<UpdateResult, VcsError> {
        if !contains_repo(&self.folder, GIT_METADATA_DIR) {
            return Ok(UpdateResult::vcs_error(missing_repo_message("git", &self.folder)));
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

/// `git log --name-status -M` over a time range
#[derive(Debug, PartialEq, Eq)]
pub struct GitLog {
    folder: PathBuf,
    range: TimeRange,
    command_line: CommandLine,
}

impl GitLog {
    pub fn new(git_path: &str, folder: impl AsRef<Path>, range: TimeRange) -> Self {
        let folder = folder.as_ref().to_path_buf();
        // --before is inclusive
        let before = range
            .to()
            .checked_sub_signed(Duration::seconds(1))
            .unwrap_or(range.to())
            .max(range.from());
        let command_line = CommandLine::new(
            git_path,
            [
                "-c".to_string(),
                "core.quotepath=false".to_string(),
                "log".to_string(),
                "--encoding=UTF-8".to_string(),
                format!("--format={}", log_format()),
                format!("--after={}", git_date(range.from())),
                format!("--before={}", git_date(before)),
                "--name-status".to_string(),
                "-M".to_string(),
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

impl Described for GitLog {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for GitLog {
    type Output = LogResult;

    fn execute(&self) -> Result<LogResult, VcsError> {
        if !contains_repo(&self.folder, GIT_METADATA_DIR) {
            return Ok(LogResult::vcs_error(missing_repo_message("git", &self.folder)));
        }
        let output = self.command_line.execute_to_completion()?;
        if let Some(message) = exit_failure(&output) {
            return Ok(LogResult::vcs_error(message));
        }
        let commits = commits_within(parse_commits(&output.stdout)?, &self.range);
        Ok(LogResult::new(commits, log_failures(&output)))
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

/// `git show <revision>:<path>`
#[derive(Debug, PartialEq, Eq)]
pub struct GitLogFileContent {
    command_line: CommandLine,
}

impl GitLogFileContent {
    pub fn new(
        git_path: &str,
        folder: impl AsRef<Path>,
        file_path: &str,
        revision: &Revision,
        encoding: TextEncoding,
    ) -> Self {
        let object = format!("{}:{}", revision, file_path);
        let command_line = CommandLine::new(git_path, ["show".to_string(), object])
            .working_dir(folder)
            .encoding(encoding.auto_detect());
        Self { command_line }
    }
}

impl Described for GitLogFileContent {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for GitLogFileContent {
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
