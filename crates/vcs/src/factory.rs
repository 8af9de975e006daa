use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use utils::text::TextEncoding;

use crate::error::VcsError;
use crate::project::{ExecutionMode, Project};
use crate::root::{GitRoot, HgRoot, Root, RootKind, SvnRoot};
use crate::traits::VcsRoot;

/// Type of VCS backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsBackendType {
    Git,
    #[serde(alias = "hg")]
    Mercurial,
    #[serde(alias = "svn")]
    Subversion,
}

impl VcsBackendType {
    /// Executable looked up on `PATH` when none is configured
    pub fn default_executable(self) -> &'static str {
        match self {
            VcsBackendType::Git => "git",
            VcsBackendType::Mercurial => "hg",
            VcsBackendType::Subversion => "svn",
        }
    }

    pub fn kind(self) -> RootKind {
        match self {
            VcsBackendType::Git | VcsBackendType::Mercurial => RootKind::Distributed,
            VcsBackendType::Subversion => RootKind::Centralized,
        }
    }
}

/// Configuration for one repository root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    pub backend_type: VcsBackendType,
    /// Repository URL (or path) to read history from
    pub location: String,
    /// Working copy for distributed backends
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    /// Tool to run instead of the backend's default executable
    #[serde(default)]
    pub executable: Option<String>,
    /// Pass `--use-merge-history` to `svn log`
    #[serde(default = "default_use_merge_history")]
    pub use_merge_history: bool,
    /// Encoding label for file contents; UTF-8 when absent
    #[serde(default)]
    pub encoding: Option<String>,
}

fn default_use_merge_history() -> bool {
    true
}

impl RootConfig {
    pub fn new(backend_type: VcsBackendType, location: impl Into<String>) -> Self {
        Self {
            backend_type,
            location: location.into(),
            local_path: None,
            executable: None,
            use_merge_history: default_use_merge_history(),
            encoding: None,
        }
    }

    pub fn git(location: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self::new(VcsBackendType::Git, location).with_local_path(local_path)
    }

    pub fn hg(location: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self::new(VcsBackendType::Mercurial, location).with_local_path(local_path)
    }

    pub fn svn(location: impl Into<String>) -> Self {
        Self::new(VcsBackendType::Subversion, location)
    }

    pub fn with_local_path(mut self, local_path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(local_path.into());
        self
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    fn executable(&self) -> &str {
        self.executable
            .as_deref()
            .unwrap_or_else(|| self.backend_type.default_executable())
    }
}

/// Configuration for a whole project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub roots: Vec<RootConfig>,
    #[serde(default)]
    pub execution: ExecutionMode,
}

/// Factory for creating roots and projects from configuration
pub struct VcsFactory;

impl VcsFactory {
    /// Create a root based on configuration
    pub fn create(config: &RootConfig) -> Result<Root, VcsError> {
        if config.location.trim().is_empty() {
            return Err(VcsError::InvalidConfig(format!(
                "{:?} root needs a location",
                config.backend_type
            )));
        }
        let encoding = match &config.encoding {
            Some(label) => TextEncoding::from_label(label)?,
            None => TextEncoding::default(),
        };

        let root = match config.backend_type {
            VcsBackendType::Git => Root::Git(
                GitRoot::new(&config.location, Self::local_path(config)?)
                    .with_executable(config.executable())
                    .with_encoding(encoding),
            ),
            VcsBackendType::Mercurial => Root::Hg(
                HgRoot::new(&config.location, Self::local_path(config)?)
                    .with_executable(config.executable())
                    .with_encoding(encoding),
            ),
            VcsBackendType::Subversion => Root::Svn(
                SvnRoot::new(&config.location)
                    .with_executable(config.executable())
                    .with_merge_history(config.use_merge_history)
                    .with_encoding(encoding),
            ),
        };
        tracing::debug!("Created root {}", root.description());
        Ok(root)
    }

    /// Create every root of a project; the first invalid root fails the whole
    /// project.
    pub fn create_project(config: &ProjectConfig) -> Result<Project, VcsError> {
        let roots = config
            .roots
            .iter()
            .map(Self::create)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Project::with_mode(roots, config.execution))
    }

    /// Auto-detect the backend of an existing working copy
    pub fn detect(path: &Path) -> Result<VcsBackendType, VcsError> {
        if path.join(".git").exists() {
            Ok(VcsBackendType::Git)
        } else if path.join(".hg").exists() {
            Ok(VcsBackendType::Mercurial)
        } else {
            Err(VcsError::InvalidConfig(format!(
                "No git or hg working copy at {}",
                path.display()
            )))
        }
    }

    fn local_path(config: &RootConfig) -> Result<&Path, VcsError> {
        config.local_path.as_deref().ok_or_else(|| {
            VcsError::InvalidConfig(format!(
                "{:?} root {} needs a local_path",
                config.backend_type, config.location
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_deserialize_project_config() {
        let json = r#"{
            "roots": [
                {"backend_type": "git", "location": "https://example.com/a.git", "local_path": "/tmp/a"},
                {"backend_type": "hg", "location": "https://example.com/b", "local_path": "/tmp/b"},
                {"backend_type": "svn", "location": "http://x/repo/sub", "use_merge_history": false}
            ],
            "execution": "parallel"
        }"#;
        let config: ProjectConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.execution, ExecutionMode::Parallel);
        assert_eq!(config.roots[0], RootConfig::git("https://example.com/a.git", "/tmp/a"));
        assert_eq!(config.roots[1].backend_type, VcsBackendType::Mercurial);
        assert!(!config.roots[2].use_merge_history);
        assert_eq!(config.roots[2].local_path, None);
    }

    #[test]
    fn test_execution_defaults_to_sequential() {
        let config: ProjectConfig = serde_json::from_str(r#"{"roots": []}"#).unwrap();
        assert_eq!(config.execution, ExecutionMode::Sequential);
    }

    #[test]
    fn test_create_roots() {
        let git = VcsFactory::create(&RootConfig::git("https://example.com/a.git", "/tmp/a")).unwrap();
        assert_eq!(git.backend_type(), VcsBackendType::Git);
        assert_eq!(git.kind(), RootKind::Distributed);

        let svn = VcsFactory::create(&RootConfig::svn("http://x/repo")).unwrap();
        assert_eq!(svn.kind(), RootKind::Centralized);
    }

    #[test]
    fn test_distributed_root_needs_local_path() {
        let config = RootConfig::new(VcsBackendType::Mercurial, "https://example.com/b");
        assert!(matches!(
            VcsFactory::create(&config),
            Err(VcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let config = RootConfig::svn("http://x/repo").with_encoding("klingon-8");
        assert!(matches!(
            VcsFactory::create(&config),
            Err(VcsError::InvalidConfig(_))
        ));
        assert!(VcsFactory::create(&RootConfig::svn("http://x/repo").with_encoding("windows-1251")).is_ok());
    }

    #[test]
    fn test_create_project() {
        let config = ProjectConfig {
            roots: vec![RootConfig::svn("http://x/repo"), RootConfig::svn("http://x/other")],
            execution: ExecutionMode::Parallel,
        };
        let project = VcsFactory::create_project(&config).unwrap();
        assert_eq!(project.roots().len(), 2);
        assert_eq!(project.execution_mode(), ExecutionMode::Parallel);
    }

    #[test]
    fn test_detect() {
        let temp = TempDir::new().unwrap();
        assert!(VcsFactory::detect(temp.path()).is_err());

        std::fs::create_dir(temp.path().join(".hg")).unwrap();
        assert_eq!(VcsFactory::detect(temp.path()).unwrap(), VcsBackendType::Mercurial);

        std::fs::create_dir(temp.path().join(".git")).unwrap();
        assert_eq!(VcsFactory::detect(temp.path()).unwrap(), VcsBackendType::Git);
    }
}
