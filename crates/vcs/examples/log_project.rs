//! Print the merged history of every root in a project file.
//!
//! ```text
//! RUST_LOG=vcsreader=debug cargo run -p vcsreader --example log_project -- project.json [days]
//! ```
//!
//! `project.json` holds a `ProjectConfig`, for example:
//!
//! ```json
//! {
//!   "roots": [
//!     {"backend_type": "git", "location": "https://github.com/example/app.git", "local_path": "/tmp/vcs/app"},
//!     {"backend_type": "svn", "location": "http://svn.example.com/repo/trunk"}
//!   ],
//!   "execution": "parallel"
//! }
//! ```

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;
use vcsreader::{CommandListener, Described, ProjectConfig, VcsFactory, VcsRoot};

struct PrintCommands;

impl CommandListener for PrintCommands {
    fn before_command(&self, command: &dyn Described) {
        tracing::info!("running {}", command.describe());
    }

    fn after_command(&self, command: &dyn Described) {
        tracing::debug!("finished {}", command.describe());
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().context("usage: log_project <project.json> [days]")?;
    let days: i64 = match args.next() {
        Some(days) => days.parse().context("days must be a number")?,
        None => 30,
    };

    let config: ProjectConfig = serde_json::from_str(
        &std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {config_path}"))?,
    )?;
    let project = VcsFactory::create_project(&config)?;
    project.add_listener(Arc::new(PrintCommands));

    let cloned = project.clone_to_local();
    if !cloned.is_successful() {
        tracing::warn!("Clone failures: {:?}", cloned.failures());
    }

    let now = Utc::now();
    let log = project.log_between(now - Duration::days(days), now)?;
    for commit in log.commits() {
        let origin = commit
            .root()
            .and_then(|id| project.root(id))
            .map(|root| root.description())
            .unwrap_or_default();
        println!(
            "{} {} {} ({} changes) [{}]",
            commit.timestamp.format("%Y-%m-%d %H:%M:%S"),
            commit.revision,
            commit.author,
            commit.changes.len(),
            origin
        );
        println!("    {}", commit.message.lines().next().unwrap_or_default());
    }

    for error in log.vcs_errors() {
        eprintln!("vcs error: {}", error.trim());
    }
    for error in log.exceptions() {
        eprintln!("failed: {}", error);
    }
    Ok(())
}
