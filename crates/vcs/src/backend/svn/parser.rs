//! Parser for `svn log --verbose --xml` output.
//!
//! The document is walked as a flat sequence of start/end/text events. A
//! small state machine tracks which `logentry` is open and which of its
//! fields the next text event belongs to.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use xot::{NameId, Node, NodeEdge, Value, Xot};

use crate::error::VcsError;
use crate::types::{Change, Commit, Revision};

/// Element whose text is being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Nothing,
    Author,
    Date,
    Message,
    Path,
}

#[derive(Debug, Default)]
struct PathEntry {
    action: String,
    kind: Option<String>,
    copy_from_path: Option<String>,
    copy_from_revision: Option<String>,
    path: String,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    revision: String,
    author: String,
    date: String,
    message: String,
    paths: Vec<PathEntry>,
}

struct Names {
    logentry: NameId,
    author: NameId,
    date: NameId,
    msg: NameId,
    path: NameId,
    revision: NameId,
    action: NameId,
    kind: NameId,
    copyfrom_path: NameId,
    copyfrom_rev: NameId,
}

impl Names {
    fn new(xot: &mut Xot) -> Self {
        Self {
            logentry: xot.add_name("logentry"),
            author: xot.add_name("author"),
            date: xot.add_name("date"),
            msg: xot.add_name("msg"),
            path: xot.add_name("path"),
            revision: xot.add_name("revision"),
            action: xot.add_name("action"),
            kind: xot.add_name("kind"),
            copyfrom_path: xot.add_name("copyfrom-path"),
            copyfrom_rev: xot.add_name("copyfrom-rev"),
        }
    }
}

pub fn parse_commits(xml: &str) -> Result<Vec<Commit>, VcsError> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut xot = Xot::new();
    let names = Names::new(&mut xot);
    let document = xot
        .parse(xml)
        .map_err(|e| VcsError::parse("svn", e.to_string()))?;

    let mut commits = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut capture = Capture::Nothing;

    for edge in xot.traverse(document) {
        match edge {
            NodeEdge::Start(node) => match xot.value(node) {
                Value::Element(element) => {
                    let name = element.name();
                    if name == names.logentry {
                        entry = Some(EntryBuilder {
                            revision: attribute(&xot, node, names.revision).unwrap_or_default(),
                            ..EntryBuilder::default()
                        });
                    } else if let Some(current) = entry.as_mut() {
                        capture = if name == names.author {
                            Capture::Author
                        } else if name == names.date {
                            Capture::Date
                        } else if name == names.msg {
                            Capture::Message
                        } else if name == names.path {
                            current.paths.push(PathEntry {
                                action: attribute(&xot, node, names.action).unwrap_or_default(),
                                kind: attribute(&xot, node, names.kind),
                                copy_from_path: attribute(&xot, node, names.copyfrom_path),
                                copy_from_revision: attribute(&xot, node, names.copyfrom_rev),
                                path: String::new(),
                            });
                            Capture::Path
                        } else {
                            Capture::Nothing
                        };
                    }
                }
                Value::Text(text) => {
                    if let Some(current) = entry.as_mut() {
                        let target = match capture {
                            Capture::Author => Some(&mut current.author),
                            Capture::Date => Some(&mut current.date),
                            Capture::Message => Some(&mut current.message),
                            Capture::Path => current.paths.last_mut().map(|p| &mut p.path),
                            Capture::Nothing => None,
                        };
                        if let Some(target) = target {
                            target.push_str(text.get());
                        }
                    }
                }
                _ => {}
            },
            NodeEdge::End(node) => {
                let Value::Element(element) = xot.value(node) else {
                    continue;
                };
                if element.name() == names.logentry {
                    if let Some(finished) = entry.take() {
                        commits.push(build_commit(finished)?);
                    }
                }
                capture = Capture::Nothing;
            }
        }
    }

    tracing::debug!("Parsed {} svn commits", commits.len());
    Ok(commits)
}

fn attribute(xot: &Xot, node: Node, name: NameId) -> Option<String> {
    xot.get_attribute(node, name).map(str::to_string)
}

/// Strip leading separators; nothing left means no path
fn normalize_path(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_start_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_date(date: &str) -> Result<DateTime<Utc>, VcsError> {
    let trimmed = date.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| VcsError::parse("svn", format!("invalid date '{}': {}", date, e)))
}

fn build_commit(entry: EntryBuilder) -> Result<Commit, VcsError> {
    let number: u64 = entry.revision.trim().parse().map_err(|_| {
        VcsError::parse("svn", format!("invalid revision '{}'", entry.revision))
    })?;
    let revision = Revision::new(number.to_string());
    let revision_before = (number > 1).then(|| Revision::new((number - 1).to_string()));
    let timestamp = parse_date(&entry.date)?;

    let files: Vec<&PathEntry> = entry
        .paths
        .iter()
        .filter(|p| matches!(p.kind.as_deref(), None | Some("") | Some("file")))
        .collect();

    // Sources already explained by a move in this entry
    let moved_from: HashSet<String> = files
        .iter()
        .filter_map(|p| p.copy_from_path.as_deref().and_then(normalize_path))
        .collect();

    let mut changes = Vec::new();
    for file in files {
        let Some(path) = normalize_path(&file.path) else {
            tracing::warn!("Skipping svn path entry without a path in r{}", number);
            continue;
        };

        if let Some(source) = file.copy_from_path.as_deref().and_then(normalize_path) {
            let source_revision = file
                .copy_from_revision
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(Revision::new);
            changes.push(Change::moved(path, source, revision.clone(), source_revision));
            continue;
        }

        let change = match file.action.trim() {
            "A" => Change::added(path, revision.clone()),
            "D" if moved_from.contains(&path) => continue,
            "D" => Change::deleted(path, revision.clone(), revision_before.clone()),
            "M" | "R" => Change::modified(path, revision.clone(), revision_before.clone()),
            other => {
                tracing::warn!("Skipping svn path with unknown action {:?} in r{}", other, number);
                continue;
            }
        };
        changes.push(change);
    }

    Ok(Commit::new(
        revision,
        revision_before,
        timestamp,
        entry.author.trim(),
        entry.message,
        changes,
    ))
}
