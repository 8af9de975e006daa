//! Parser for `git log --name-status` output produced with [`log_format`].

use crate::backend::{parse_epoch_seconds, separators, split_non_empty};
use crate::error::VcsError;
use crate::types::{Change, Commit, Revision};

const FIELD_COUNT: usize = 6;

/// Render a separator with git's `%xNN` placeholders
fn escaped(separator: &str) -> String {
    separator
        .chars()
        .map(|c| format!("%x{:02x}", c as u32))
        .collect()
}

/// Value for `git log --format`.
///
/// Fields: hash, parent hashes, committer timestamp, author name, raw body.
/// The trailing field separator leaves the `--name-status` block as the
/// last field of each record.
pub fn log_format() -> String {
    let commit = escaped(separators::COMMIT_START);
    let field = escaped(separators::FIELD);
    format!("{commit}%H{field}%P{field}%ct{field}%an{field}%B{field}")
}

pub fn parse_commits(stdout: &str) -> Result<Vec<Commit>, VcsError> {
    let commits = split_non_empty(stdout, separators::COMMIT_START)
        .filter(|record| !record.trim().is_empty())
        .map(parse_commit)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!("Parsed {} git commits", commits.len());
    Ok(commits)
}

fn parse_commit(record: &str) -> Result<Commit, VcsError> {
    let fields: Vec<&str> = record.split(separators::FIELD).collect();
    if fields.len() < FIELD_COUNT {
        return Err(VcsError::parse(
            "git",
            format!("expected {} fields but found {}", FIELD_COUNT, fields.len()),
        ));
    }

    let revision = Revision::new(fields[0].trim());
    let revision_before = fields[1].split_whitespace().next().map(Revision::new);
    let timestamp = parse_epoch_seconds(fields[2])
        .ok_or_else(|| VcsError::parse("git", format!("invalid date '{}'", fields[2])))?;
    let author = fields[3];
    let message = fields[4].trim_end_matches(['\n', '\r']);

    let changes = fields[5]
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_name_status(line, &revision, &revision_before))
        .collect();

    Ok(Commit::new(
        revision,
        revision_before,
        timestamp,
        author,
        message,
        changes,
    ))
}

/// One `--name-status` line, e.g. `M\tsrc/a.rs` or `R087\told.rs\tnew.rs`
fn parse_name_status(
    line: &str,
    revision: &Revision,
    revision_before: &Option<Revision>,
) -> Option<Change> {
    let parts: Vec<&str> = line.split('\t').collect();
    let status = parts.first()?.chars().next()?;

    let change = match (status, parts.as_slice()) {
        ('A', [_, path, ..]) => Change::added(*path, revision.clone()),
        ('D', [_, path, ..]) => Change::deleted(*path, revision.clone(), revision_before.clone()),
        ('M' | 'T', [_, path, ..]) => {
            Change::modified(*path, revision.clone(), revision_before.clone())
        }
        ('R', [_, old, new, ..]) => {
            Change::moved(*new, *old, revision.clone(), revision_before.clone())
        }
        ('C', [_, _, new, ..]) => Change::added(*new, revision.clone()),
        _ => {
            tracing::warn!("Skipping unrecognised git name-status line: {:?}", line);
            return None;
        }
    };
    Some(change)
}
