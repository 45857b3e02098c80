use crate::error::{Result, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A file a stage is expected to leave behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Result files may legitimately be empty (no match is the negative signal).
    pub allow_empty: bool,
}

impl Artifact {
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            allow_empty: false,
        }
    }

    pub fn maybe_empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            allow_empty: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) => meta.is_file() && (self.allow_empty || meta.len() > 0),
            Err(_) => false,
        }
    }
}

/// Waits until every artifact is present, giving the filesystem up to
/// `timeout` to catch up with a finished subprocess.
pub fn await_artifacts(artifacts: &[Artifact], timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    for artifact in artifacts {
        loop {
            if artifact.is_ready() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(ValidationError::MissingArtifact(artifact.path.clone()));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
    Ok(())
}

/// Fails with `MissingInput` unless `path` is an existing file.
pub fn require_input(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ValidationError::MissingInput(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_files_only_pass_when_allowed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();

        assert!(!Artifact::required(&path).is_ready());
        assert!(Artifact::maybe_empty(&path).is_ready());
        assert!(!Artifact::maybe_empty(dir.path().join("absent.txt")).is_ready());
    }

    #[test]
    fn test_await_times_out_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.bam");
        fs::write(&present, b"BAM\x01").unwrap();
        let absent = dir.path().join("absent.bam");

        await_artifacts(&[Artifact::required(&present)], Duration::from_millis(10)).unwrap();
        let err = await_artifacts(
            &[Artifact::required(&present), Artifact::required(&absent)],
            Duration::from_millis(50),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MissingArtifact(p) if p == absent));
    }
}
