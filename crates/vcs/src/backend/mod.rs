//! Command sets for each supported backend.
//!
//! Each backend module exposes one struct per command (clone, update, log,
//! file content, ...) implementing [`crate::VcsCommand`], plus a parser that
//! turns the tool's raw output into [`crate::Commit`]s.

pub mod git;
pub mod hg;
pub mod svn;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use utils::text::trim_last_newline;

use crate::error::VcsError;
use crate::process::{CommandLine, ProcessOutput, EXIT_CODE_KILLED, EXIT_CODE_NOT_STARTED};
use crate::result::{CloneResult, Failures, LogFileContentResult};
use crate::types::{Commit, TimeRange};

/// Out-of-band separators for distributed-backend log templates.
///
/// Control characters cannot appear in author names, messages or paths, so
/// they safely delimit commits, fields and file lists.
pub(crate) mod separators {
    pub const COMMIT_START: &str = "\u{15}\u{16}\u{17}\u{18}\u{19}";
    pub const FIELD: &str = "\u{19}\u{18}\u{17}\u{16}\u{15}";
    pub const FILE: &str = "\u{17}\u{16}\u{15}\u{19}\u{18}";
    pub const COPY: &str = "\u{16}\u{15}\u{19}\u{18}\u{17}";
}

/// Whether `folder` holds a working copy, recognised by its metadata dir
pub(crate) fn contains_repo(folder: &Path, metadata_dir: &str) -> bool {
    folder.join(metadata_dir).is_dir()
}

pub(crate) fn missing_repo_message(backend: &str, folder: &Path) -> String {
    format!(
        "Folder doesn't contain {} repository: '{}'.",
        backend,
        folder.display()
    )
}

/// Why `local_path` cannot receive a clone, if anything.
///
/// Only a missing path, an empty directory or an earlier `metadata_dir`
/// working copy may be replaced.
pub(crate) fn clone_target_conflict(
    local_path: &Path,
    metadata_dir: &str,
    backend: &str,
) -> Option<String> {
    if !local_path.exists() || contains_repo(local_path, metadata_dir) || is_empty_dir(local_path) {
        return None;
    }
    Some(format!(
        "Refusing to clone into '{}': it exists and is not a {} repository.",
        local_path.display(),
        backend
    ))
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Clone destination; an earlier working copy is kept aside until the new
/// clone succeeds.
#[derive(Debug)]
pub(crate) struct CloneTarget {
    local_path: PathBuf,
    backup: Option<PathBuf>,
}

impl CloneTarget {
    /// Make room for a fresh clone at `local_path`.
    ///
    /// Tools refuse to clone into a non-empty directory, so an earlier clone
    /// is moved to a sibling backup and the parent directory is created if
    /// needed. Callers check [`clone_target_conflict`] first.
    pub(crate) fn prepare(local_path: &Path) -> std::io::Result<Self> {
        let mut backup = None;
        if is_empty_dir(local_path) {
            std::fs::remove_dir(local_path)?;
        } else if local_path.exists() {
            let aside = backup_path(local_path)?;
            if aside.exists() {
                std::fs::remove_dir_all(&aside)?;
            }
            tracing::debug!("Moving existing clone at {} aside", local_path.display());
            std::fs::rename(local_path, &aside)?;
            backup = Some(aside);
        }
        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            local_path: local_path.to_path_buf(),
            backup,
        })
    }

    /// Drop the backup after a successful clone, or put it back in place of
    /// whatever a failed clone left behind.
    pub(crate) fn finish(self, cloned: bool) -> std::io::Result<()> {
        let Some(backup) = self.backup else {
            return Ok(());
        };
        if cloned {
            return std::fs::remove_dir_all(backup);
        }
        if self.local_path.exists() {
            std::fs::remove_dir_all(&self.local_path)?;
        }
        tracing::debug!("Restoring previous clone at {}", self.local_path.display());
        std::fs::rename(backup, &self.local_path)
    }
}

fn backup_path(local_path: &Path) -> std::io::Result<PathBuf> {
    let name = local_path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Cannot clone into '{}'", local_path.display()),
        )
    })?;
    Ok(local_path.with_file_name(format!(".{}.previous", name.to_string_lossy())))
}

/// Run a clone `command_line` into `local_path`, replacing an earlier
/// `metadata_dir` working copy only once the new clone succeeded.
pub(crate) fn clone_into(
    command_line: &CommandLine,
    local_path: &Path,
    metadata_dir: &str,
    backend: &str,
) -> Result<CloneResult, VcsError> {
    if let Some(message) = clone_target_conflict(local_path, metadata_dir, backend) {
        return Ok(CloneResult::vcs_error(message));
    }
    let target = CloneTarget::prepare(local_path)?;
    let result = command_line
        .execute_to_completion()
        .map(|output| match exit_failure(&output) {
            Some(message) => CloneResult::vcs_error(message),
            None => CloneResult::default(),
        });
    let cloned = matches!(&result, Ok(clone) if clone.is_successful());
    if let Err(e) = target.finish(cloned) {
        tracing::warn!("Failed to clean up clone target {}: {}", local_path.display(), e);
    }
    result
}

/// Commits inside the half-open `range`
pub(crate) fn commits_within(commits: Vec<Commit>, range: &TimeRange) -> Vec<Commit> {
    commits
        .into_iter()
        .filter(|commit| range.contains(commit.timestamp))
        .collect()
}

/// Diagnostic for a process that exited with a non-zero code.
pub(crate) fn exit_failure(output: &ProcessOutput) -> Option<String> {
    if output.is_success() {
        None
    } else if output.stderr.trim().is_empty() {
        Some(format!("Command exited with code {}", output.exit_code))
    } else {
        Some(output.stderr.clone())
    }
}

/// Failures of a finished log command: a non-zero exit, or warnings the
/// tool printed next to otherwise usable output.
pub(crate) fn log_failures(output: &ProcessOutput) -> Failures {
    match exit_failure(output) {
        Some(message) => Failures::vcs_error(message),
        None if !output.stderr.trim().is_empty() => Failures::vcs_error(output.stderr.clone()),
        None => Failures::default(),
    }
}

pub(crate) fn file_content_result(output: ProcessOutput) -> LogFileContentResult {
    if output.killed {
        LogFileContentResult::failure(output.stderr, EXIT_CODE_KILLED)
    } else if output.is_success() && output.stderr.trim().is_empty() {
        LogFileContentResult::success(trim_last_newline(&output.stdout))
    } else {
        LogFileContentResult::failure(output.stderr, output.exit_code)
    }
}

/// Content result for a command that never produced output
pub(crate) fn content_failure(error: VcsError) -> LogFileContentResult {
    let exit_code = match error {
        VcsError::Cancelled { .. } => EXIT_CODE_KILLED,
        _ => EXIT_CODE_NOT_STARTED,
    };
    LogFileContentResult::failure(error.to_string(), exit_code)
}

/// Split `s` on `separator`, dropping empty entries
pub(crate) fn split_non_empty<'a>(s: &'a str, separator: &'a str) -> impl Iterator<Item = &'a str> {
    s.split(separator).filter(|entry| !entry.is_empty())
}

/// Parse epoch seconds such as `1404216000` or `1404216000.25`.
///
/// Only the first whitespace-separated token is used, so `hgdate` output
/// (`"<seconds> <offset>"`) parses as well.
pub(crate) fn parse_epoch_seconds(s: &str) -> Option<DateTime<Utc>> {
    let seconds: f64 = s.split_whitespace().next()?.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
