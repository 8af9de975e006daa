//! Parser for `hg log` output produced with [`log_template`].

use std::collections::HashSet;

use crate::backend::{parse_epoch_seconds, separators, split_non_empty};
use crate::error::VcsError;
use crate::types::{Change, Commit, Revision};

/// Parent id hg reports for the first commit
const HG_NO_REVISION: &str = "0000000000000000000000000000000000000000";

const FIELD_COUNT: usize = 9;

/// Render a separator in hg template escape syntax (`\x15\x16...`)
fn escaped(separator: &str) -> String {
    separator
        .chars()
        .map(|c| format!("\\x{:02x}", c as u32))
        .collect()
}

/// Template passed to `hg log --template`.
///
/// Fields: node, first parent, date, author, description, then added,
/// deleted, copied (`name<copy>source`) and modified files.
pub fn log_template() -> String {
    let commit = escaped(separators::COMMIT_START);
    let field = escaped(separators::FIELD);
    let file = escaped(separators::FILE);
    let copy = escaped(separators::COPY);

    format!(
        "{commit}{{node}}{field}{{p1node}}{field}{{date|hgdate}}{field}{{author}}{field}{{desc}}{field}\
         {{join(file_adds, '{file}')}}{field}\
         {{join(file_dels, '{file}')}}{field}\
         {{file_copies % '{{name}}{copy}{{source}}{file}'}}{field}\
         {{join(file_mods, '{file}')}}{field}"
    )
}

pub fn parse_commits(stdout: &str) -> Result<Vec<Commit>, VcsError> {
    let commits = split_non_empty(stdout, separators::COMMIT_START)
        .filter(|record| !record.trim().is_empty())
        .map(parse_commit)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!("Parsed {} hg commits", commits.len());
    Ok(commits)
}

fn parse_commit(record: &str) -> Result<Commit, VcsError> {
    let fields: Vec<&str> = record.split(separators::FIELD).collect();
    if fields.len() < FIELD_COUNT {
        return Err(VcsError::parse(
            "hg",
            format!("expected {} fields but found {}", FIELD_COUNT, fields.len()),
        ));
    }

    let revision = Revision::new(fields[0]);
    let revision_before = match fields[1] {
        "" | HG_NO_REVISION => None,
        parent => Some(Revision::new(parent)),
    };
    let timestamp = parse_epoch_seconds(fields[2])
        .ok_or_else(|| VcsError::parse("hg", format!("invalid date '{}'", fields[2])))?;
    let author = fields[3];
    let message = fields[4];

    let mut moved = Vec::new();
    for entry in split_non_empty(fields[7], separators::FILE) {
        match entry.split_once(separators::COPY) {
            Some((name, source)) if !name.is_empty() && !source.is_empty() => {
                moved.push((name, source))
            }
            _ => tracing::warn!("Skipping hg copy entry without source: {:?}", entry),
        }
    }
    let moved_to: HashSet<&str> = moved.iter().map(|(name, _)| *name).collect();
    let moved_from: HashSet<&str> = moved.iter().map(|(_, source)| *source).collect();

    let mut changes = Vec::new();
    changes.extend(
        split_non_empty(fields[5], separators::FILE)
            .filter(|path| !moved_to.contains(path))
            .map(|path| Change::added(path, revision.clone())),
    );
    changes.extend(
        split_non_empty(fields[6], separators::FILE)
            .filter(|path| !moved_from.contains(path))
            .map(|path| Change::deleted(path, revision.clone(), revision_before.clone())),
    );
    changes.extend(moved.iter().map(|(name, source)| {
        Change::moved(*name, *source, revision.clone(), revision_before.clone())
    }));
    changes.extend(
        split_non_empty(fields[8], separators::FILE)
            .map(|path| Change::modified(path, revision.clone(), revision_before.clone())),
    );

    Ok(Commit::new(
        revision,
        revision_before,
        timestamp,
        author,
        message,
        changes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeType;

    fn record(fields: &[&str]) -> String {
        let mut s = String::from(separators::COMMIT_START);
        for field in fields {
            s.push_str(field);
            s.push_str(separators::FIELD);
        }
        s
    }

    fn files(paths: &[&str]) -> String {
        paths.iter().map(|p| format!("{p}{}", separators::FILE)).collect()
    }

    #[test]
    fn test_template_uses_escaped_separators() {
        let template = log_template();
        assert!(template.starts_with("\\x15\\x16\\x17\\x18\\x19{node}"));
        assert!(template.contains("{date|hgdate}"));
        assert!(!template.contains('\u{15}'));
    }

    #[test]
    fn test_empty_output_has_no_commits() {
        assert!(parse_commits("").unwrap().is_empty());
        assert!(parse_commits("\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_all_change_types() {
        let copied = format!("moved.txt{}original.txt{}", separators::COPY, separators::FILE);
        let stdout = record(&[
            "b2c3",
            "a1b2",
            "1404216000.5 -3600",
            "Alice <alice@example.com>",
            "multi\nline message",
            &files(&["added.txt"]),
            &files(&["deleted.txt"]),
            &copied,
            &files(&["modified.txt"]),
        ]);

        let commits = parse_commits(&stdout).unwrap();
        assert_eq!(commits.len(), 1);
        let commit = &commits[0];
        assert_eq!(commit.revision.as_str(), "b2c3");
        assert_eq!(commit.revision_before, Some(Revision::new("a1b2")));
        assert_eq!(commit.timestamp.timestamp(), 1404216000);
        assert_eq!(commit.timestamp.timestamp_subsec_millis(), 500);
        assert_eq!(commit.author, "Alice <alice@example.com>");
        assert_eq!(commit.message, "multi\nline message");

        let types: Vec<_> = commit.changes.iter().map(|c| c.change_type).collect();
        assert_eq!(
            types,
            [
                ChangeType::New,
                ChangeType::Deleted,
                ChangeType::Moved,
                ChangeType::Modification
            ]
        );

        let [added, deleted, moved, modified] = commit.changes.as_slice() else {
            panic!("expected four changes");
        };
        assert_eq!(added.path.as_deref(), Some("added.txt"));
        assert_eq!(added.path_before, None);
        assert_eq!(added.revision_before, None);

        assert_eq!(deleted.path, None);
        assert_eq!(deleted.path_before.as_deref(), Some("deleted.txt"));

        assert_eq!(moved.path.as_deref(), Some("moved.txt"));
        assert_eq!(moved.path_before.as_deref(), Some("original.txt"));
        assert_eq!(moved.revision_before, Some(Revision::new("a1b2")));

        assert_eq!(modified.path.as_deref(), Some("modified.txt"));
        assert_eq!(modified.path_before.as_deref(), Some("modified.txt"));
    }

    #[test]
    fn test_first_commit_has_no_previous_revision() {
        let stdout = record(&["a1b2", HG_NO_REVISION, "0 0", "bob", "", "", "", "", ""]);
        let commits = parse_commits(&stdout).unwrap();
        assert_eq!(commits[0].revision_before, None);
        assert_eq!(commits[0].message, "");
        assert!(commits[0].changes.is_empty());
    }

    #[test]
    fn test_rename_is_reported_once() {
        let copied = format!("new.txt{}old.txt{}", separators::COPY, separators::FILE);
        let stdout = record(&[
            "c3",
            "b2",
            "10 0",
            "bob",
            "rename",
            &files(&["new.txt"]),
            &files(&["old.txt"]),
            &copied,
            "",
        ]);

        let changes = &parse_commits(&stdout).unwrap()[0].changes;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Moved);
    }

    #[test]
    fn test_multiple_commits() {
        let stdout = format!(
            "{}{}",
            record(&["2", "1", "20 0", "bob", "second", "", "", "", &files(&["a.txt"])]),
            record(&["1", HG_NO_REVISION, "10 0", "bob", "first", &files(&["a.txt"]), "", "", ""]),
        );
        let commits = parse_commits(&stdout).unwrap();
        let revisions: Vec<_> = commits.iter().map(|c| c.revision.as_str()).collect();
        assert_eq!(revisions, ["2", "1"]);
    }

    #[test]
    fn test_truncated_record_is_a_parse_error() {
        let stdout = record(&["2", "1", "20 0"]);
        assert!(matches!(
            parse_commits(&stdout),
            Err(VcsError::Parse { backend: "hg", .. })
        ));
    }

    #[test]
    fn test_invalid_date_is_a_parse_error() {
        let stdout = record(&["2", "1", "later", "bob", "", "", "", "", ""]);
        assert!(parse_commits(&stdout).is_err());
    }
}
