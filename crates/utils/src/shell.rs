//! Executable resolution for external version-control tools.

use std::path::{Path, PathBuf};

/// Resolve `executable` to a runnable path.
///
/// Absolute or relative paths are checked as-is; bare names are searched on
/// `PATH`. Returns `None` when nothing runnable was found.
pub fn resolve_executable_path_blocking(executable: &str) -> Option<PathBuf> {
    let candidate = Path::new(executable);
    if candidate.components().count() > 1 {
        return which::which(candidate).ok();
    }

    match which::which(executable) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::debug!("Could not resolve executable {}: {}", executable, e);
            None
        }
    }
}

/// Check whether `executable` can be resolved at all.
pub fn is_executable_available(executable: &str) -> bool {
    resolve_executable_path_blocking(executable).is_some()
}
