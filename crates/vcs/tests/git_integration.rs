//! Round trip through the `git` CLI against a repository built with git2.
//! Skipped when no `git` executable is installed.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository, Signature, Time};
use tempfile::TempDir;
use utils::shell::is_executable_available;
use vcsreader::{ChangeType, Project, Revision, RootConfig, TimeRange, VcsFactory, VcsRoot};

const START: i64 = 1_400_000_000;

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

fn commit(
    repo: &Repository,
    seconds: i64,
    message: &str,
    write: &[(&str, &str)],
    remove: &[&str],
) -> anyhow::Result<Oid> {
    let workdir = repo.workdir().expect("non-bare repository");
    let mut index = repo.index()?;
    for (path, content) in write {
        std::fs::write(workdir.join(path), content)?;
        index.add_path(Path::new(path))?;
    }
    for path in remove {
        std::fs::remove_file(workdir.join(path))?;
        index.remove_path(Path::new(path))?;
    }
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = Signature::new("Alice", "alice@example.com", &Time::new(seconds, 0))?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents: Vec<_> = parent.iter().collect();
    Ok(repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?)
}

struct Fixture {
    _temp: TempDir,
    origin: String,
    clone_path: std::path::PathBuf,
    revisions: Vec<Oid>,
}

fn fixture() -> anyhow::Result<Fixture> {
    let temp = TempDir::new()?;
    let origin_path = temp.path().join("origin");
    let repo = Repository::init(&origin_path)?;

    let first = commit(
        &repo,
        START,
        "initial\n",
        &[("a.txt", "one\n"), ("b.txt", "bee\nbee\nbee\n")],
        &[],
    )?;
    let second = commit(
        &repo,
        START + 100,
        "modify and rename\n",
        &[("a.txt", "two\n"), ("c.txt", "bee\nbee\nbee\n")],
        &["b.txt"],
    )?;
    let third = commit(&repo, START + 200, "delete\n", &[], &["a.txt"])?;

    Ok(Fixture {
        origin: origin_path.display().to_string(),
        clone_path: temp.path().join("clone"),
        _temp: temp,
        revisions: vec![first, second, third],
    })
}

#[test]
fn test_git_round_trip() -> anyhow::Result<()> {
    if !is_executable_available("git") {
        eprintln!("git is not installed, skipping");
        return Ok(());
    }
    let fixture = fixture()?;
    let root = VcsFactory::create(&RootConfig::git(&fixture.origin, &fixture.clone_path))?;

    let before_clone = root.log(&TimeRange::all_until_now())?;
    assert_eq!(before_clone.vcs_errors().len(), 1);

    let clone = root.clone_to_local()?;
    assert!(clone.is_successful(), "{:?}", clone);
    // Cloning again replaces the earlier clone
    assert!(root.clone_to_local()?.is_successful());

    let log = root.log(&TimeRange::new(at(START), at(START + 201))?)?;
    assert!(log.is_successful(), "{:?}", log);
    let commits = log.commits();
    assert_eq!(commits.len(), 3);
    let revisions: Vec<_> = fixture.revisions.iter().map(|oid| oid.to_string()).collect();
    let found: Vec<_> = commits.iter().map(|c| c.revision.to_string()).collect();
    assert_eq!(found, revisions);

    assert_eq!(commits[0].revision_before, None);
    assert_eq!(commits[0].author, "Alice");
    assert_eq!(commits[0].message, "initial");
    assert_eq!(commits[0].timestamp, at(START));
    assert!(commits[0].changes.iter().all(|c| c.change_type == ChangeType::New));

    let second: HashSet<_> = commits[1]
        .changes
        .iter()
        .map(|c| (c.change_type, c.path.clone(), c.path_before.clone()))
        .collect();
    assert_eq!(
        second,
        HashSet::from([
            (ChangeType::Modification, Some("a.txt".into()), Some("a.txt".into())),
            (ChangeType::Moved, Some("c.txt".into()), Some("b.txt".into())),
        ])
    );
    assert_eq!(
        commits[1].revision_before,
        Some(Revision::new(revisions[0].clone()))
    );

    assert_eq!(commits[2].changes.len(), 1);
    assert_eq!(commits[2].changes[0].change_type, ChangeType::Deleted);
    assert_eq!(commits[2].changes[0].path_before.as_deref(), Some("a.txt"));

    // [from, to) excludes the commit at `to`
    let middle = root.log(&TimeRange::new(at(START + 1), at(START + 200))?)?;
    let middle: Vec<_> = middle.commits().iter().map(|c| c.revision.to_string()).collect();
    assert_eq!(middle, [revisions[1].clone()]);

    let content = root.log_file_content("a.txt", &Revision::new(revisions[0].clone()));
    assert!(content.is_successful(), "{:?}", content);
    assert_eq!(content.text(), "one");

    let missing = root.log_file_content("a.txt", &Revision::new(revisions[2].clone()));
    assert!(!missing.is_successful());
    assert_ne!(missing.exit_code(), 0);

    assert!(root.update()?.is_successful());
    Ok(())
}

#[test]
fn test_project_log_tags_commits_with_root() -> anyhow::Result<()> {
    if !is_executable_available("git") {
        eprintln!("git is not installed, skipping");
        return Ok(());
    }
    let fixture = fixture()?;
    let project = Project::new(vec![VcsFactory::create(&RootConfig::git(
        &fixture.origin,
        &fixture.clone_path,
    ))?]);

    assert!(project.clone_to_local().is_successful());
    let log = project.log_between(at(START), at(START + 201))?;

    assert_eq!(log.commits().len(), 3);
    assert!(log
        .commits()
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    for commit in log.commits() {
        let root = commit.root().and_then(|id| project.root(id));
        assert!(root.is_some());
    }
    Ok(())
}
