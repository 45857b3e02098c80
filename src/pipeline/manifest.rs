//! Record of completed stages and the outputs they left behind.
//!
//! A stage is only skipped on a later run when its outputs are still on disk
//! and still match what was recorded when the stage finished. Outputs found
//! on disk for a stage that was never recorded are trusted only when the
//! manifest itself is new, i.e. they were supplied by hand before the first
//! run. Once a manifest exists, an unrecorded stage is one that never
//! finished and is run again.

use crate::error::{Result, ValidationError};
use crate::utils::artifacts::Artifact;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const MANIFEST_FILE: &str = ".acvalidator_manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub file: PathBuf,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// At least one output is missing.
    Pending,
    /// Outputs exist but differ from the recorded ones.
    Stale,
    Complete,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StageManifest {
    stages: BTreeMap<String, Vec<OutputRecord>>,
    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    checksums: bool,
    #[serde(skip)]
    trust_unrecorded: bool,
}

impl StageManifest {
    /// Opens the manifest in `dir`. A missing file starts an empty manifest,
    /// which is written out straight away; an unreadable one is discarded
    /// with a warning.
    pub fn open(dir: &Path, checksums: bool) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let (mut manifest, fresh) = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StageManifest>(&content) {
                Ok(manifest) => (manifest, false),
                Err(e) => {
                    log::warn!("Discarding unreadable stage manifest {}: {}", path.display(), e);
                    (StageManifest::default(), false)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => (StageManifest::default(), true),
            Err(e) => return Err(ValidationError::io(e, path)),
        };
        manifest.path = path;
        manifest.checksums = checksums;
        manifest.trust_unrecorded = fresh;
        if fresh {
            manifest.save()?;
        }
        Ok(manifest)
    }

    pub fn status(&self, stage: &str, outputs: &[Artifact]) -> StageStatus {
        if !outputs.iter().all(Artifact::is_ready) {
            return StageStatus::Pending;
        }
        let Some(recorded) = self.stages.get(stage) else {
            if self.trust_unrecorded {
                return StageStatus::Complete;
            }
            log::info!("{}: outputs present but the stage never finished", stage);
            return StageStatus::Pending;
        };
        if recorded.len() != outputs.len() {
            return StageStatus::Stale;
        }

        for (record, output) in recorded.iter().zip(outputs) {
            match self.describe(output) {
                Ok(current) if self.matches(record, &current) => {}
                Ok(_) => {
                    log::warn!(
                        "{} changed since stage '{}' completed",
                        output.path.display(),
                        stage
                    );
                    return StageStatus::Stale;
                }
                Err(e) => {
                    log::warn!("{}", e);
                    return StageStatus::Stale;
                }
            }
        }
        StageStatus::Complete
    }

    fn matches(&self, recorded: &OutputRecord, current: &OutputRecord) -> bool {
        if recorded.file != current.file || recorded.bytes != current.bytes {
            return false;
        }
        match (&recorded.sha256, &current.sha256) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Records `stage` as complete and persists the manifest.
    pub fn record(&mut self, stage: &str, outputs: &[Artifact]) -> Result<()> {
        let records = outputs
            .iter()
            .map(|output| self.describe(output))
            .collect::<Result<Vec<_>>>()?;
        self.stages.insert(stage.to_string(), records);
        self.save()
    }

    pub fn is_recorded(&self, stage: &str) -> bool {
        self.stages.contains_key(stage)
    }

    fn describe(&self, output: &Artifact) -> Result<OutputRecord> {
        let meta = fs::metadata(&output.path).map_err(|e| ValidationError::io(e, &output.path))?;
        let sha256 = if self.checksums {
            Some(sha256_file(&output.path)?)
        } else {
            None
        };
        let file = match self.path.parent() {
            Some(dir) => output
                .path
                .strip_prefix(dir)
                .unwrap_or(&output.path)
                .to_path_buf(),
            None => output.path.clone(),
        };
        Ok(OutputRecord {
            file,
            bytes: meta.len(),
            sha256,
        })
    }

    fn save(&self) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ValidationError::Manifest(e.to_string()))?;

        // Write-then-rename so an interrupted run never leaves half a manifest.
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ValidationError::io(e, dir))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| ValidationError::io(e, tmp.path()))?;
        tmp.persist(&self.path)
            .map_err(|e| ValidationError::io(e.error, &self.path))?;
        Ok(())
    }
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| ValidationError::io(e, path))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(|e| ValidationError::io(e, path))?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_lifecycle() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("Region_reads_chr1:1-100.bam");
        let outputs = [Artifact::required(&out)];

        let mut manifest = StageManifest::open(dir.path(), true).unwrap();
        assert_eq!(manifest.status("to_bam", &outputs), StageStatus::Pending);

        fs::write(&out, b"first").unwrap();
        manifest.record("to_bam", &outputs).unwrap();
        assert_eq!(manifest.status("to_bam", &outputs), StageStatus::Complete);

        // Reopened from disk, the record survives.
        let reopened = StageManifest::open(dir.path(), true).unwrap();
        assert!(reopened.is_recorded("to_bam"));
        assert_eq!(reopened.status("to_bam", &outputs), StageStatus::Complete);

        // Same size, different content: only the digest catches it.
        fs::write(&out, b"fir5t").unwrap();
        assert_eq!(reopened.status("to_bam", &outputs), StageStatus::Stale);
        let sizes_only = StageManifest::open(dir.path(), false).unwrap();
        assert_eq!(sizes_only.status("to_bam", &outputs), StageStatus::Complete);
    }

    #[test]
    fn test_unrecorded_outputs_trusted_only_before_first_run() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("sample.sorted.bam");
        fs::write(&out, b"data").unwrap();
        let outputs = [Artifact::required(&out)];

        let manifest = StageManifest::open(dir.path(), true).unwrap();
        assert!(dir.path().join(MANIFEST_FILE).is_file());
        assert_eq!(manifest.status("sort", &outputs), StageStatus::Complete);

        // Left behind by a stage that failed after the manifest was created.
        let partial = dir.path().join("Trinity_bwa_chr1:1-100.sam");
        fs::write(&partial, b"@SQ\tSN:chr1:1-100\tLN:202\n").unwrap();
        let reopened = StageManifest::open(dir.path(), true).unwrap();
        assert_eq!(
            reopened.status("bwa_mem", &[Artifact::required(&partial)]),
            StageStatus::Pending
        );
    }

    #[test]
    fn test_corrupt_manifest_is_discarded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{not json").unwrap();
        let manifest = StageManifest::open(dir.path(), true).unwrap();
        assert!(!manifest.is_recorded("anything"));
    }
}
