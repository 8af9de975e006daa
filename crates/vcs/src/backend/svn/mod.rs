//! Subversion commands. History is always read from the server; there is no
//! local working copy.

mod parser;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use utils::text::TextEncoding;

pub use parser::parse_commits;

use crate::backend::{commits_within, content_failure, exit_failure, file_content_result};
use crate::command::{Described, VcsCommand};
use crate::error::VcsError;
use crate::process::{CommandLine, ProcessHandle};
use crate::result::{Failures, LogFileContentResult, LogResult};
use crate::types::{Change, ChangeType, Commit, Revision, TimeRange};

const REPOSITORY_ROOT_PREFIX: &str = "Repository Root:";

/// Repository root URL reported by `svn info`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvnInfoResult {
    repository_root: Option<String>,
    failures: Failures,
}

impl SvnInfoResult {
    pub fn found(repository_root: impl Into<String>) -> Self {
        Self {
            repository_root: Some(repository_root.into()),
            failures: Failures::default(),
        }
    }

    pub fn vcs_error(message: impl Into<String>) -> Self {
        Self {
            repository_root: None,
            failures: Failures::vcs_error(message),
        }
    }

    pub fn repository_root(&self) -> Option<&str> {
        self.repository_root.as_deref()
    }

    pub fn vcs_errors(&self) -> &[String] {
        self.failures.vcs_errors()
    }

    pub fn is_successful(&self) -> bool {
        self.repository_root.is_some() && self.failures.is_empty()
    }
}

/// Pull the `Repository Root:` value out of `svn info` output
pub fn parse_repository_root(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix(REPOSITORY_ROOT_PREFIX))
        .map(|root| root.trim().to_string())
        .filter(|root| !root.is_empty())
}

/// `svn info <url>`
#[derive(Debug, PartialEq, Eq)]
pub struct SvnInfo {
    repository_url: String,
    command_line: CommandLine,
}

impl SvnInfo {
    pub fn new(svn_path: &str, repository_url: &str) -> Self {
        Self {
            repository_url: repository_url.to_string(),
            command_line: CommandLine::new(svn_path, ["info", repository_url]),
        }
    }
}

impl Described for SvnInfo {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for SvnInfo {
    type Output = SvnInfoResult;

    fn execute(&self) -> Result<SvnInfoResult, VcsError> {
        let output = self.command_line.execute_to_completion()?;
        if let Some(message) = exit_failure(&output) {
            return Ok(SvnInfoResult::vcs_error(message));
        }
        if !output.stderr.trim().is_empty() {
            return Ok(SvnInfoResult::vcs_error(output.stderr));
        }
        Ok(match parse_repository_root(&output.stdout) {
            Some(root) => SvnInfoResult::found(root),
            None => SvnInfoResult::vcs_error(format!(
                "Didn't find svn root in output for {}",
                self.repository_url
            )),
        })
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

fn svn_date(instant: DateTime<Utc>) -> String {
    instant.format("{%Y-%m-%dT%H:%M:%SZ}").to_string()
}

/// `svn log <url> -r {from}:{to} --verbose --xml`, scoped to the requested
/// sub-path of the repository.
#[derive(Debug, PartialEq, Eq)]
pub struct SvnLog {
    repository_url: String,
    repository_root: String,
    range: TimeRange,
    command_line: CommandLine,
}

impl SvnLog {
    pub fn new(
        svn_path: &str,
        repository_url: &str,
        repository_root: &str,
        range: TimeRange,
        use_merge_history: bool,
    ) -> Self {
        let mut args = vec![
            "log".to_string(),
            repository_url.to_string(),
            "-r".to_string(),
            format!("{}:{}", svn_date(range.from()), svn_date(range.to())),
        ];
        if use_merge_history {
            args.push("--use-merge-history".to_string());
        }
        args.push("--verbose".to_string());
        args.push("--xml".to_string());

        Self {
            repository_url: repository_url.to_string(),
            repository_root: repository_root.to_string(),
            range,
            command_line: CommandLine::new(svn_path, args).encoding(TextEncoding::utf8()),
        }
    }
}

impl Described for SvnLog {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for SvnLog {
    type Output = LogResult;

    fn execute(&self) -> Result<LogResult, VcsError> {
        let output = self.command_line.execute_to_completion()?;
        if let Some(message) = exit_failure(&output) {
            return Ok(LogResult::vcs_error(message));
        }
        if !output.stderr.trim().is_empty() {
            return Ok(LogResult::vcs_error(output.stderr));
        }

        let commits = parse_commits(&output.stdout)?;
        let sub_path = sub_path_of(&self.repository_url, &self.repository_root);
        Ok(LogResult::with_commits(scope_commits(
            commits,
            &self.range,
            &sub_path,
        )))
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

/// Part of `repository_url` below `repository_root`, as `dir/` or empty.
///
/// Both URLs are percent-decoded first, since log paths are plain text.
/// The root only matches at a `/` boundary.
pub fn sub_path_of(repository_url: &str, repository_root: &str) -> String {
    let url = percent_decode_str(repository_url).decode_utf8_lossy();
    let root = percent_decode_str(repository_root).decode_utf8_lossy();
    let sub_path = match url.strip_prefix(root.trim_end_matches('/')) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => "",
    };
    if sub_path.is_empty() || sub_path.ends_with('/') {
        sub_path.to_string()
    } else {
        format!("{sub_path}/")
    }
}

/// Drop commits outside `range` and changes outside `sub_path`, rewriting the
/// rest relative to `sub_path`.
///
/// A date-bounded `svn log` also returns the last revision before `from`, so
/// the range is applied again here.
pub fn scope_commits(commits: Vec<Commit>, range: &TimeRange, sub_path: &str) -> Vec<Commit> {
    commits_within(commits, range)
        .into_iter()
        .map(|mut commit| {
            commit.changes = std::mem::take(&mut commit.changes)
                .into_iter()
                .filter_map(|change| scope_change(change, sub_path))
                .collect();
            commit
        })
        .collect()
}

fn scope_change(change: Change, sub_path: &str) -> Option<Change> {
    let relative = |path: Option<&str>| {
        path.and_then(|p| p.strip_prefix(sub_path))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    };
    let path = relative(change.path.as_deref());
    let path_before = relative(change.path_before.as_deref());

    let change_type = match (change.change_type, &path, &path_before) {
        (_, None, None) => return None,
        (ChangeType::Moved, Some(_), None) => ChangeType::New,
        (ChangeType::Moved, None, Some(_)) => ChangeType::Deleted,
        (change_type, _, _) => change_type,
    };
    let revision_before = match change_type {
        ChangeType::New => None,
        _ => change.revision_before,
    };

    Some(Change {
        change_type,
        path,
        path_before,
        revision: change.revision,
        revision_before,
    })
}

/// `svn cat <root>/<path>@<revision>`
#[derive(Debug, PartialEq, Eq)]
pub struct SvnLogFileContent {
    command_line: CommandLine,
}

impl SvnLogFileContent {
    pub fn new(
        svn_path: &str,
        repository_root: &str,
        file_path: &str,
        revision: &Revision,
        encoding: TextEncoding,
    ) -> Self {
        let target = format!(
            "{}/{}@{}",
            repository_root.trim_end_matches('/'),
            file_path.trim_start_matches('/'),
            revision
        );
        let command_line =
            CommandLine::new(svn_path, ["cat".to_string(), target]).encoding(encoding.auto_detect());
        Self { command_line }
    }
}

impl Described for SvnLogFileContent {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for SvnLogFileContent {
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
