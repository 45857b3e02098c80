use crate::error::{Result, ValidationError};
use crate::pipeline::overlap::{OverlapCounts, OverlapScorer};
use crate::types::JunctionCoordinate;
use chrono::{DateTime, Utc};
use serde::de::{Deserializer, Error};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

///
/// Outcome of validating one junction, written next to the result files as
/// `Validation_summary_<coord>.json`.
///
/// # Fields
///
/// * `coordinate` - The junction as given on the command line.
/// * `window` - Flank window size used for the read query and pseudo-reference.
/// * `junction_length` - Length of the scrambled junction sequence.
/// * `contigs_scored` - Realigned contig records that carried a sequence.
/// * `contigs_without_sequence` - Records skipped because no sequence was
///   stored (hard-clipped secondary/supplementary alignments).
/// * `probes` - One entry per stringency level, high to very low.
/// * `validated` - True when at least one contig matched at any level.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub coordinate: String,
    pub window: u64,
    pub junction_length: usize,
    pub contigs_scored: u64,
    pub contigs_without_sequence: u64,
    pub probes: Vec<ProbeSummary>,
    pub validated: bool,
    pub tool_version: String,
    #[serde(serialize_with = "serialize_datetime", deserialize_with = "deserialize_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSummary {
    pub stringency: String,
    pub half_width: u64,
    pub probe: String,
    /// Probe was cut short because the window is smaller than the half-width.
    pub clamped: bool,
    pub matches: u64,
    pub result_file: String,
}

impl ValidationSummary {
    pub fn new(
        coordinate: &JunctionCoordinate,
        junction: &str,
        scorer: &OverlapScorer,
        counts: &OverlapCounts,
        result_files: &[PathBuf],
    ) -> Self {
        let probes: Vec<ProbeSummary> = scorer
            .probes()
            .iter()
            .zip(counts.matches.iter())
            .zip(result_files.iter())
            .map(|((probe, &matches), file)| ProbeSummary {
                stringency: probe.stringency.name().to_string(),
                half_width: probe.stringency.half_width(),
                probe: probe.bases.clone(),
                clamped: probe.clamped,
                matches,
                result_file: file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            coordinate: coordinate.label().to_string(),
            window: coordinate.window,
            junction_length: junction.len(),
            contigs_scored: counts.contigs,
            contigs_without_sequence: counts.without_sequence,
            validated: probes.iter().any(|p| p.matches > 0),
            probes,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir).map_err(|e| ValidationError::io(e, dir))?;
        serde_json::to_writer_pretty(tmp.as_file(), self)
            .map_err(|e| ValidationError::io(e.into(), path))?;
        tmp.persist(path)
            .map_err(|e| ValidationError::io(e.error, path))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ValidationError::io(e, path))?;
        serde_json::from_str(&content).map_err(|e| ValidationError::io(e.into(), path))
    }
}

fn serialize_datetime<S>(date: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.to_rfc3339())
}

fn deserialize_datetime<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(D::Error::custom)
}
