use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use vcsreader::{
    CloneResult, CommandLine, CommandListener, CommandObserver, CommandRunner, Commit, Described,
    ExecutionMode, Failures, GitRoot, LogFileContentResult, LogResult, ProcessHandle, Project,
    Revision, Root, RootId, TimeRange, UpdateResult, VcsCommand, VcsError, VcsRoot,
};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

#[derive(Clone)]
enum Behavior {
    Commits(Vec<(&'static str, i64)>),
    Reported(&'static str),
    Unexpected(VcsError),
    Panic,
}

/// Command that records a notification without starting a process
struct Marker {
    command_line: CommandLine,
}

impl Described for Marker {
    fn describe(&self) -> String {
        self.command_line.describe()
    }
}

impl VcsCommand for Marker {
    type Output = ();

    fn execute(&self) -> Result<(), VcsError> {
        Ok(())
    }

    fn process(&self) -> &ProcessHandle {
        self.command_line.process()
    }
}

struct FakeRoot {
    name: &'static str,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    runner: CommandRunner,
}

impl FakeRoot {
    fn new(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            runner: CommandRunner::default(),
        }
    }

    fn act<T>(
        &self,
        ok: impl FnOnce(&[(&'static str, i64)]) -> T,
        reported: impl FnOnce(&str) -> T,
    ) -> Result<T, VcsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.runner.run(&Marker {
            command_line: CommandLine::new("fake", [self.name]),
        })?;
        match &self.behavior {
            Behavior::Commits(commits) => Ok(ok(commits)),
            Behavior::Reported(message) => Ok(reported(message)),
            Behavior::Unexpected(error) => Err(error.clone()),
            Behavior::Panic => panic!("{} exploded", self.name),
        }
    }
}

impl VcsRoot for FakeRoot {
    fn description(&self) -> String {
        format!("fake {}", self.name)
    }

    fn clone_to_local(&self) -> Result<CloneResult, VcsError> {
        self.act(|_| CloneResult::default(), |m| CloneResult::vcs_error(m))
    }

    fn update(&self) -> Result<UpdateResult, VcsError> {
        self.act(|_| UpdateResult::default(), |m| UpdateResult::vcs_error(m))
    }

    fn log(&self, range: &TimeRange) -> Result<LogResult, VcsError> {
        self.act(
            |commits| {
                LogResult::with_commits(
                    commits
                        .iter()
                        .filter(|(_, seconds)| range.contains(at(*seconds)))
                        .map(|(revision, seconds)| {
                            Commit::new(
                                Revision::new(*revision),
                                None,
                                at(*seconds),
                                "author",
                                "message",
                                Vec::new(),
                            )
                        })
                        .collect(),
                )
            },
            |m| LogResult::vcs_error(m),
        )
    }

    fn log_file_content(&self, _file_path: &str, _revision: &Revision) -> LogFileContentResult {
        LogFileContentResult::success("content")
    }

    fn cancel(&self) -> bool {
        self.runner.cancel()
    }

    fn set_observer(&mut self, observer: CommandObserver) {
        self.runner.set_observer(observer);
    }
}

fn revisions(result: &LogResult) -> Vec<&str> {
    result.commits().iter().map(|c| c.revision.as_str()).collect()
}

#[test]
fn test_empty_project_returns_empty_results() {
    let project: Project<FakeRoot> = Project::new(Vec::new());
    assert_eq!(project.clone_to_local(), CloneResult::default());
    assert_eq!(project.update(), UpdateResult::default());
    let log = project.log(&TimeRange::all_until_now());
    assert!(log.is_successful());
    assert!(log.commits().is_empty());
}

#[test]
fn test_log_merges_roots_by_timestamp_with_provenance() {
    let project = Project::new(vec![
        FakeRoot::new("a", Behavior::Commits(vec![("a2", 30), ("a1", 10)])),
        FakeRoot::new("b", Behavior::Commits(vec![("b1", 20)])),
    ]);

    let log = project.log(&TimeRange::new(at(0), at(100)).unwrap());

    assert!(log.is_successful());
    assert_eq!(revisions(&log), ["a1", "b1", "a2"]);
    let roots: Vec<_> = log.commits().iter().map(|c| c.root()).collect();
    assert_eq!(roots, [Some(RootId(0)), Some(RootId(1)), Some(RootId(0))]);

    let origin = log.commits()[1].root().and_then(|id| project.root(id)).unwrap();
    assert_eq!(origin.description(), "fake b");
}

#[test]
fn test_equal_timestamps_keep_root_order() {
    let project = Project::new(vec![
        FakeRoot::new("a", Behavior::Commits(vec![("a1", 10)])),
        FakeRoot::new("b", Behavior::Commits(vec![("b1", 10)])),
    ]);
    let log = project.log(&TimeRange::new(at(0), at(100)).unwrap());
    assert_eq!(revisions(&log), ["a1", "b1"]);
}

#[test]
fn test_failures_of_one_root_do_not_stop_the_others() {
    let project = Project::new(vec![
        FakeRoot::new("ok", Behavior::Commits(vec![("c1", 10)])),
        FakeRoot::new("reported", Behavior::Reported("abort: repository not found")),
        FakeRoot::new("unexpected", Behavior::Unexpected(VcsError::NotAvailable("hg".into()))),
        FakeRoot::new("late", Behavior::Commits(vec![("c2", 20)])),
    ]);

    let log = project.log(&TimeRange::new(at(0), at(100)).unwrap());

    assert!(!log.is_successful());
    assert_eq!(revisions(&log), ["c1", "c2"]);
    assert_eq!(log.vcs_errors(), ["abort: repository not found".to_string()]);
    assert_eq!(log.exceptions(), [VcsError::NotAvailable("hg".into())]);

    let update = project.update();
    assert_eq!(
        update.failures(),
        &Failures::new(
            vec!["abort: repository not found".to_string()],
            vec![VcsError::NotAvailable("hg".into())]
        )
    );
}

#[test]
fn test_panicking_root_is_folded_into_result() {
    let project = Project::new(vec![
        FakeRoot::new("boom", Behavior::Panic),
        FakeRoot::new("ok", Behavior::Commits(vec![("c1", 10)])),
    ]);

    let clone = project.clone_to_local();
    assert_eq!(clone.exceptions(), [VcsError::Panicked("boom exploded".into())]);

    let log = project.log(&TimeRange::new(at(0), at(100)).unwrap());
    assert_eq!(revisions(&log), ["c1"]);
    assert_eq!(log.exceptions().len(), 1);
}

#[test]
fn test_inverted_range_is_rejected_before_any_root_runs() {
    let root = FakeRoot::new("a", Behavior::Commits(vec![("a1", 10)]));
    let calls = Arc::clone(&root.calls);
    let project = Project::new(vec![root]);

    let result = project.log_between(at(200), at(100));

    assert_eq!(
        result,
        Err(VcsError::InvalidTimeRange {
            from: at(200),
            to: at(100)
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let ok = project.log_between(at(0), at(100)).unwrap();
    assert_eq!(revisions(&ok), ["a1"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_parallel_mode_matches_sequential() {
    let roots = || {
        (0..8)
            .map(|i| {
                let behavior = match i % 4 {
                    0 => Behavior::Reported("warning"),
                    1 => Behavior::Unexpected(VcsError::Backend(format!("root {i}"))),
                    _ => Behavior::Commits(vec![("x", i), ("y", 10 - i)]),
                };
                FakeRoot::new("r", behavior)
            })
            .collect::<Vec<_>>()
    };
    let range = TimeRange::new(at(0), at(100)).unwrap();

    let sequential = Project::with_mode(roots(), ExecutionMode::Sequential).log(&range);
    let parallel = Project::with_mode(roots(), ExecutionMode::Parallel).log(&range);

    assert_eq!(sequential, parallel);
    assert_eq!(parallel.exceptions().len(), 2);
}

#[derive(Default)]
struct Recorder {
    before: AtomicUsize,
    after: AtomicUsize,
}

impl CommandListener for Recorder {
    fn before_command(&self, _: &dyn Described) {
        self.before.fetch_add(1, Ordering::SeqCst);
    }

    fn after_command(&self, _: &dyn Described) {
        self.after.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_listeners_see_commands_of_every_root() {
    let project = Project::new(vec![
        FakeRoot::new("a", Behavior::Commits(vec![])),
        FakeRoot::new("b", Behavior::Reported("nope")),
    ]);
    let recorder = Arc::new(Recorder::default());
    let listener: Arc<dyn CommandListener> = recorder.clone();
    project.add_listener(listener.clone());

    project.update();
    assert_eq!(recorder.before.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.after.load(Ordering::SeqCst), 2);

    project.remove_listener(&listener);
    project.update();
    assert_eq!(recorder.before.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cancel_when_nothing_runs() {
    let project = Project::new(vec![FakeRoot::new("a", Behavior::Commits(vec![]))]);
    assert!(!project.cancel());
}

#[cfg(unix)]
#[test]
fn test_cancel_stops_running_log_and_reports_it() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    let temp = tempfile::TempDir::new().unwrap();
    let tool = temp.path().join("hanging-git");
    std::fs::write(&tool, "#!/bin/sh\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    let clone = temp.path().join("clone");
    std::fs::create_dir_all(clone.join(".git")).unwrap();

    let project = Project::new(vec![Root::from(
        GitRoot::new("file:///nowhere", &clone).with_executable(tool.display().to_string()),
    )]);

    let log = std::thread::scope(|scope| {
        let log = scope.spawn(|| project.log(&TimeRange::all_until_now()));
        let started = Instant::now();
        while !project.cancel() {
            assert!(started.elapsed() < Duration::from_secs(10), "log never started");
            std::thread::sleep(Duration::from_millis(5));
        }
        log.join().unwrap()
    });

    assert!(!log.is_successful());
    assert!(log.commits().is_empty());
    assert!(log.vcs_errors().is_empty());
    assert!(matches!(log.exceptions(), [VcsError::Cancelled { .. }]));
    assert!(!project.cancel());
}
