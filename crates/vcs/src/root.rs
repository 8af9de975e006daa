//! Concrete repository roots for each backend.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use utils::text::TextEncoding;

use crate::backend::git::{GitClone, GitLog, GitLogFileContent, GitUpdate};
use crate::backend::hg::{HgClone, HgLog, HgLogFileContent, HgUpdate};
use crate::backend::svn::{SvnInfo, SvnInfoResult, SvnLog, SvnLogFileContent};
use crate::backend::content_failure;
use crate::command::{CommandObserver, CommandRunner};
use crate::error::VcsError;
use crate::factory::VcsBackendType;
use crate::process::EXIT_CODE_NOT_STARTED;
use crate::result::{CloneResult, Failures, LogFileContentResult, LogResult, UpdateResult};
use crate::traits::VcsRoot;
use crate::types::{Revision, TimeRange};

/// Where a root's history lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    /// Full history in a local clone
    Distributed,
    /// History queried from the server on every call
    Centralized,
}

/// Git repository cloned to `local_path`
#[derive(Debug)]
pub struct GitRoot {
    repository_url: String,
    local_path: PathBuf,
    git_path: String,
    encoding: TextEncoding,
    runner: CommandRunner,
}

impl GitRoot {
    pub fn new(repository_url: impl Into<String>, local_path: impl AsRef<Path>) -> Self {
        Self {
            repository_url: repository_url.into(),
            local_path: local_path.as_ref().to_path_buf(),
            git_path: VcsBackendType::Git.default_executable().to_string(),
            encoding: TextEncoding::default(),
            runner: CommandRunner::default(),
        }
    }

    pub fn with_executable(mut self, git_path: impl Into<String>) -> Self {
        self.git_path = git_path.into();
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}

impl VcsRoot for GitRoot {
    fn description(&self) -> String {
        format!("git {} ({})", self.repository_url, self.local_path.display())
    }

    fn clone_to_local(&self) -> Result<CloneResult, VcsError> {
        self.runner
            .run(&GitClone::new(&self.git_path, &self.repository_url, &self.local_path))
    }

    fn update(&self) -> Result<UpdateResult, VcsError> {
        self.runner
            .run(&GitUpdate::new(&self.git_path, &self.local_path))
    }

    fn log(&self, range: &TimeRange) -> Result<LogResult, VcsError> {
        self.runner
            .run(&GitLog::new(&self.git_path, &self.local_path, *range))
    }

    fn log_file_content(&self, file_path: &str, revision: &Revision) -> LogFileContentResult {
        let command = GitLogFileContent::new(
            &self.git_path,
            &self.local_path,
            file_path,
            revision,
            self.encoding,
        );
        content_or_failure(self.runner.run(&command))
    }

    fn cancel(&self) -> bool {
        self.runner.cancel()
    }

    fn set_observer(&mut self, observer: CommandObserver) {
        self.runner.set_observer(observer);
    }
}

/// Mercurial repository cloned to `local_path`
#[derive(Debug)]
pub struct HgRoot {
    repository_url: String,
    local_path: PathBuf,
    hg_path: String,
    encoding: TextEncoding,
    runner: CommandRunner,
}

impl HgRoot {
    pub fn new(repository_url: impl Into<String>, local_path: impl AsRef<Path>) -> Self {
        Self {
            repository_url: repository_url.into(),
            local_path: local_path.as_ref().to_path_buf(),
            hg_path: VcsBackendType::Mercurial.default_executable().to_string(),
            encoding: TextEncoding::default(),
            runner: CommandRunner::default(),
        }
    }

    pub fn with_executable(mut self, hg_path: impl Into<String>) -> Self {
        self.hg_path = hg_path.into();
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}

impl VcsRoot for HgRoot {
    fn description(&self) -> String {
        format!("hg {} ({})", self.repository_url, self.local_path.display())
    }

    fn clone_to_local(&self) -> Result<CloneResult, VcsError> {
        self.runner
            .run(&HgClone::new(&self.hg_path, &self.repository_url, &self.local_path))
    }

    fn update(&self) -> Result<UpdateResult, VcsError> {
        self.runner.run(&HgUpdate::new(&self.hg_path, &self.local_path))
    }

    fn log(&self, range: &TimeRange) -> Result<LogResult, VcsError> {
        self.runner
            .run(&HgLog::new(&self.hg_path, &self.local_path, *range))
    }

    fn log_file_content(&self, file_path: &str, revision: &Revision) -> LogFileContentResult {
        let command = HgLogFileContent::new(
            &self.hg_path,
            &self.local_path,
            file_path,
            revision,
            self.encoding,
        );
        content_or_failure(self.runner.run(&command))
    }

    fn cancel(&self) -> bool {
        self.runner.cancel()
    }

    fn set_observer(&mut self, observer: CommandObserver) {
        self.runner.set_observer(observer);
    }
}

/// Subversion repository (or a sub-directory of one) read from the server
#[derive(Debug)]
pub struct SvnRoot {
    repository_url: String,
    svn_path: String,
    use_merge_history: bool,
    encoding: TextEncoding,
    repository_root: Mutex<Option<String>>,
    runner: CommandRunner,
}

impl SvnRoot {
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            svn_path: VcsBackendType::Subversion.default_executable().to_string(),
            use_merge_history: true,
            encoding: TextEncoding::default(),
            repository_root: Mutex::new(None),
            runner: CommandRunner::default(),
        }
    }

    pub fn with_executable(mut self, svn_path: impl Into<String>) -> Self {
        self.svn_path = svn_path.into();
        self
    }

    pub fn with_merge_history(mut self, use_merge_history: bool) -> Self {
        self.use_merge_history = use_merge_history;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    /// Repository root URL, asking the server once and caching the answer.
    ///
    /// The cache lock is not held while `svn info` runs.
    fn repository_root(&self) -> Result<SvnInfoResult, VcsError> {
        let cached = self
            .repository_root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(root) = cached {
            return Ok(SvnInfoResult::found(root));
        }

        let info = self
            .runner
            .run(&SvnInfo::new(&self.svn_path, &self.repository_url))?;
        if let Some(root) = info.repository_root() {
            tracing::debug!("Resolved svn repository root {} for {}", root, self.repository_url);
            *self
                .repository_root
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(root.to_string());
        }
        Ok(info)
    }
}

impl VcsRoot for SvnRoot {
    fn description(&self) -> String {
        format!("svn {}", self.repository_url)
    }

    fn clone_to_local(&self) -> Result<CloneResult, VcsError> {
        Ok(CloneResult::default())
    }

    fn update(&self) -> Result<UpdateResult, VcsError> {
        Ok(UpdateResult::default())
    }

    fn log(&self, range: &TimeRange) -> Result<LogResult, VcsError> {
        let info = self.repository_root()?;
        let Some(repository_root) = info.repository_root() else {
            return Ok(LogResult::new(
                Vec::new(),
                Failures::new(info.vcs_errors().to_vec(), Vec::new()),
            ));
        };
        self.runner.run(&SvnLog::new(
            &self.svn_path,
            &self.repository_url,
            repository_root,
            *range,
            self.use_merge_history,
        ))
    }

    fn log_file_content(&self, file_path: &str, revision: &Revision) -> LogFileContentResult {
        let info = match self.repository_root() {
            Ok(info) => info,
            Err(e) => return content_failure(e),
        };
        let Some(repository_root) = info.repository_root() else {
            return LogFileContentResult::failure(
                info.vcs_errors().join("\n"),
                EXIT_CODE_NOT_STARTED,
            );
        };
        let command = SvnLogFileContent::new(
            &self.svn_path,
            repository_root,
            file_path,
            revision,
            self.encoding,
        );
        content_or_failure(self.runner.run(&command))
    }

    fn cancel(&self) -> bool {
        self.runner.cancel()
    }

    fn set_observer(&mut self, observer: CommandObserver) {
        self.runner.set_observer(observer);
    }
}

fn content_or_failure(result: Result<LogFileContentResult, VcsError>) -> LogFileContentResult {
    result.unwrap_or_else(content_failure)
}

/// Any supported root, dispatched by variant
#[derive(Debug)]
pub enum Root {
    Git(GitRoot),
    Hg(HgRoot),
    Svn(SvnRoot),
}

impl Root {
    pub fn backend_type(&self) -> VcsBackendType {
        match self {
            Root::Git(_) => VcsBackendType::Git,
            Root::Hg(_) => VcsBackendType::Mercurial,
            Root::Svn(_) => VcsBackendType::Subversion,
        }
    }

    pub fn kind(&self) -> RootKind {
        self.backend_type().kind()
    }

    fn as_dyn(&self) -> &dyn VcsRoot {
        match self {
            Root::Git(root) => root,
            Root::Hg(root) => root,
            Root::Svn(root) => root,
        }
    }
}

impl VcsRoot for Root {
    fn description(&self) -> String {
        self.as_dyn().description()
    }

    fn clone_to_local(&self) -> Result<CloneResult, VcsError> {
        self.as_dyn().clone_to_local()
    }

    fn update(&self) -> Result<UpdateResult, VcsError> {
        self.as_dyn().update()
    }

    fn log(&self, range: &TimeRange) -> Result<LogResult, VcsError> {
        self.as_dyn().log(range)
    }

    fn log_file_content(&self, file_path: &str, revision: &Revision) -> LogFileContentResult {
        self.as_dyn().log_file_content(file_path, revision)
    }

    fn cancel(&self) -> bool {
        self.as_dyn().cancel()
    }

    fn set_observer(&mut self, observer: CommandObserver) {
        match self {
            Root::Git(root) => root.set_observer(observer),
            Root::Hg(root) => root.set_observer(observer),
            Root::Svn(root) => root.set_observer(observer),
        }
    }
}

impl From<GitRoot> for Root {
    fn from(root: GitRoot) -> Self {
        Root::Git(root)
    }
}

impl From<HgRoot> for Root {
    fn from(root: HgRoot) -> Self {
        Root::Hg(root)
    }
}

impl From<SvnRoot> for Root {
    fn from(root: SvnRoot) -> Self {
        Root::Svn(root)
    }
}
