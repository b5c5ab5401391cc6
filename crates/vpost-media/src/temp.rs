//! Scoped temporary files.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file that is deleted when the guard is dropped.
///
/// Used for intermediate outputs such as the merged upload, so every exit
/// path of a job (success, error, early return, panic unwinding) removes it.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Take ownership of `path`. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now.
    pub fn remove(self) {
        // Drop does the work
    }
}

impl AsRef<Path> for TempArtifact {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed temp artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove temp artifact"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.mp4");
        std::fs::write(&path, b"data").unwrap();

        {
            let artifact = TempArtifact::new(&path);
            assert!(artifact.path().exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_explicit_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.mp4");
        std::fs::write(&path, b"data").unwrap();

        TempArtifact::new(&path).remove();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = TempDir::new().unwrap();
        drop(TempArtifact::new(dir.path().join("never-written.mp4")));
    }
}
