//! Process environment helpers: executable lookup and scoped `cd`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ZapError;
use crate::Result;

/// Find `name` on `PATH`. Returns `None` when there is no match.
///
/// No process is spawned.
pub fn which(name: impl AsRef<std::ffi::OsStr>) -> Option<PathBuf> {
    ::which::which(name).ok()
}

/// Change the process working directory until the returned guard drops.
///
/// The previous directory is restored on every exit path, including
/// unwinding. The working directory is process-wide: overlapping guards on
/// different threads will observe each other's changes.
///
/// # Example
///
/// ```no_run
/// use zap::{cd, run, RunOptions};
///
/// {
///     let _dir = cd("/tmp")?;
///     run("pwd", RunOptions::default())?;
/// }
/// # Ok::<(), zap::ZapError>(())
/// ```
pub fn cd(path: impl AsRef<Path>) -> Result<DirGuard> {
    let path = path.as_ref();
    let previous = std::env::current_dir()?;
    std::env::set_current_dir(path).map_err(|source| ZapError::ChangeDir {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("cd {} (from {})", path.display(), previous.display());
    Ok(DirGuard { previous })
}

/// Restores the saved working directory on drop.
#[derive(Debug)]
#[must_use = "the directory is restored as soon as the guard is dropped"]
pub struct DirGuard {
    previous: PathBuf,
}

impl DirGuard {
    /// Directory that will be restored.
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            warn!("failed to restore directory {}: {}", self.previous.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_which_missing() {
        assert!(which("a-certainly-nonexistent-binary-xyz").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_which_finds_sh() {
        let path = which("sh").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("sh"));
    }
}
