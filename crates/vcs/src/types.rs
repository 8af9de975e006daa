use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VcsError;

/// Backend-specific revision identifier (a hash for git/hg, a number for svn)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Revision {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Index of a root in the project that produced a commit.
///
/// Only used to look the root up again; it never owns the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootId(pub usize);

/// Kind of change made to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    New,
    Deleted,
    Modification,
    Moved,
}

/// A change to one file within a commit.
///
/// `None` paths and revisions stand for "no path" / "no revision":
/// - `New` has no previous path
/// - `Deleted` has no current path
/// - `Moved` always has both paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub change_type: ChangeType,
    pub path: Option<String>,
    pub path_before: Option<String>,
    pub revision: Revision,
    pub revision_before: Option<Revision>,
}

impl Change {
    pub fn added(path: impl Into<String>, revision: Revision) -> Self {
        Self {
            change_type: ChangeType::New,
            path: Some(path.into()),
            path_before: None,
            revision,
            revision_before: None,
        }
    }

    pub fn deleted(
        path_before: impl Into<String>,
        revision: Revision,
        revision_before: Option<Revision>,
    ) -> Self {
        Self {
            change_type: ChangeType::Deleted,
            path: None,
            path_before: Some(path_before.into()),
            revision,
            revision_before,
        }
    }

    pub fn modified(
        path: impl Into<String>,
        revision: Revision,
        revision_before: Option<Revision>,
    ) -> Self {
        let path = path.into();
        Self {
            change_type: ChangeType::Modification,
            path_before: Some(path.clone()),
            path: Some(path),
            revision,
            revision_before,
        }
    }

    pub fn moved(
        path: impl Into<String>,
        path_before: impl Into<String>,
        revision: Revision,
        revision_before: Option<Revision>,
    ) -> Self {
        Self {
            change_type: ChangeType::Moved,
            path: Some(path.into()),
            path_before: Some(path_before.into()),
            revision,
            revision_before,
        }
    }

    /// Path after the change, or the path before it for deletions
    pub fn any_path(&self) -> Option<&str> {
        self.path.as_deref().or(self.path_before.as_deref())
    }
}

/// A parsed commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub revision: Revision,
    pub revision_before: Option<Revision>,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub message: String,
    pub changes: Vec<Change>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<RootId>,
}

impl Commit {
    pub fn new(
        revision: Revision,
        revision_before: Option<Revision>,
        timestamp: DateTime<Utc>,
        author: impl Into<String>,
        message: impl Into<String>,
        changes: Vec<Change>,
    ) -> Self {
        Self {
            revision,
            revision_before,
            timestamp,
            author: author.into(),
            message: message.into(),
            changes,
            root: None,
        }
    }

    /// Root this commit was read from, once the project has aggregated it
    pub fn root(&self) -> Option<RootId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: RootId) {
        self.root = Some(root);
    }
}

/// Half-open time range `[from, to)` with one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl TimeRange {
    /// Fails with [`VcsError::InvalidTimeRange`] when `from` is after `to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, VcsError> {
        if from > to {
            return Err(VcsError::InvalidTimeRange { from, to });
        }
        Ok(Self {
            from: truncate_to_second(from),
            to: truncate_to_second(to),
        })
    }

    /// Range from the Unix epoch until now
    pub fn all_until_now() -> Self {
        Self {
            from: DateTime::<Utc>::UNIX_EPOCH,
            to: truncate_to_second(Utc::now()) + Duration::seconds(1),
        }
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant < self.to
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.from.format("%Y-%m-%dT%H:%M:%SZ"),
            self.to.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

fn truncate_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
}
