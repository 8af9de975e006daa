//! Uniform read access to version-control history
//!
//! This crate runs the `git`, `hg` and `svn` command-line tools and turns
//! their output into one commit/change model, so callers can read the history
//! of several repositories as a single time-ordered log.
//!
//! # Layers
//!
//! - **Commands** ([`VcsCommand`]): one tool invocation each, comparable and
//!   describable without running it, cancellable while it runs
//! - **Roots** ([`VcsRoot`], [`Root`]): a backend bound to a repository
//! - **Project** ([`Project`]): fans clone/update/log out to every root and
//!   merges the results ([`Aggregate`])
//!
//! # Example
//!
//! ```no_run
//! use vcsreader::{ProjectConfig, RootConfig, TimeRange, VcsFactory};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProjectConfig {
//!     roots: vec![
//!         RootConfig::git("https://github.com/example/app.git", "/tmp/vcs/app"),
//!         RootConfig::svn("http://svn.example.com/repo/trunk"),
//!     ],
//!     ..Default::default()
//! };
//!
//! let project = VcsFactory::create_project(&config)?;
//! project.clone_to_local();
//! let log = project.log(&TimeRange::all_until_now());
//! for commit in log.commits() {
//!     println!("{} {} {}", commit.timestamp, commit.revision, commit.author);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod command;
mod error;
mod factory;
mod process;
mod project;
mod result;
mod root;
mod traits;
mod types;

pub use command::{CommandListener, CommandObserver, CommandRunner, Described, VcsCommand};
pub use error::VcsError;
pub use factory::{ProjectConfig, RootConfig, VcsBackendType, VcsFactory};
pub use process::{
    CommandLine, ProcessHandle, ProcessOutput, EXIT_CODE_KILLED, EXIT_CODE_NOT_STARTED,
};
pub use project::{ExecutionMode, Project};
pub use result::{
    Aggregate, CloneResult, Failures, LogFileContentResult, LogResult, UpdateResult,
};
pub use root::{GitRoot, HgRoot, Root, RootKind, SvnRoot};
pub use traits::VcsRoot;
pub use types::{Change, ChangeType, Commit, Revision, RootId, TimeRange};
pub use utils::text::TextEncoding;
