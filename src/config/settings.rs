use crate::error::ValidationError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Executables for the external tools. Bare names are looked up on `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default = "default_samtools")]
    pub samtools: PathBuf,
    #[serde(default = "default_bwa")]
    pub bwa: PathBuf,
    #[serde(default = "default_bam_to_fastq")]
    pub bam_to_fastq: PathBuf,
    #[serde(default = "default_trinity")]
    pub trinity: PathBuf,
}

fn default_samtools() -> PathBuf {
    PathBuf::from("samtools")
}

fn default_bwa() -> PathBuf {
    PathBuf::from("bwa")
}

fn default_bam_to_fastq() -> PathBuf {
    PathBuf::from("bamToFastq")
}

fn default_trinity() -> PathBuf {
    PathBuf::from("Trinity")
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            samtools: default_samtools(),
            bwa: default_bwa(),
            bam_to_fastq: default_bam_to_fastq(),
            trinity: default_trinity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolPaths,

    /// Directory holding one FASTA per chromosome, named `<chrom>.fa`.
    #[serde(default)]
    pub reference_dir: Option<PathBuf>,

    #[serde(default = "default_trinity_cpu")]
    pub trinity_cpu: u32,

    #[serde(default = "default_trinity_max_memory")]
    pub trinity_max_memory: String,

    /// `bwa mem -T`: minimum score to output an alignment.
    #[serde(default = "default_bwa_min_score")]
    pub bwa_min_score: u32,

    /// How long to wait for a tool's output to show up on disk.
    #[serde(default = "default_artifact_timeout_secs")]
    pub artifact_timeout_secs: u64,

    /// Record SHA-256 digests of stage outputs in the manifest, not only sizes.
    #[serde(default = "default_manifest_checksums")]
    pub manifest_checksums: bool,
}

fn default_trinity_cpu() -> u32 {
    20
}

fn default_trinity_max_memory() -> String {
    "100G".to_string()
}

fn default_bwa_min_score() -> u32 {
    19
}

fn default_artifact_timeout_secs() -> u64 {
    30
}

fn default_manifest_checksums() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            reference_dir: None,
            trinity_cpu: default_trinity_cpu(),
            trinity_max_memory: default_trinity_max_memory(),
            bwa_min_score: default_bwa_min_score(),
            artifact_timeout_secs: default_artifact_timeout_secs(),
            manifest_checksums: default_manifest_checksums(),
        }
    }
}

impl Config {
    /// Loads `config.toml` from the user's config directory, falling back to defaults.
    pub fn load() -> Self {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                match Self::from_file(&config_path) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
                }
            }
        }
        Config::default()
    }

    /// Loads an explicitly requested config file; unlike `load`, any problem is an error.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = fs::read_to_string(path).map_err(|e| ValidationError::io(e, path))?;
        toml::from_str(&content)
            .map_err(|e| ValidationError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "tgen", "acvalidator")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
    }

    pub fn reference_dir(&self) -> Result<&Path, ValidationError> {
        self.reference_dir.as_deref().ok_or_else(|| {
            ValidationError::Config(
                "no reference directory set; pass --reference-dir or set reference_dir in config.toml"
                    .to_string(),
            )
        })
    }

    /// Per-chromosome reference FASTA, `<reference_dir>/<chrom>.fa`.
    pub fn chromosome_fasta(&self, chromosome: &str) -> Result<PathBuf, ValidationError> {
        Ok(self.reference_dir()?.join(format!("{}.fa", chromosome)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "reference_dir = \"/data/splitFastas\"\ntrinity_cpu = 4\n\n[tools]\nbwa = \"/packages/bwa/0.7.12/bwa\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.trinity_cpu, 4);
        assert_eq!(config.trinity_max_memory, "100G");
        assert_eq!(config.bwa_min_score, 19);
        assert_eq!(config.tools.bwa, PathBuf::from("/packages/bwa/0.7.12/bwa"));
        assert_eq!(config.tools.samtools, PathBuf::from("samtools"));
        assert_eq!(
            config.chromosome_fasta("chr7").unwrap(),
            PathBuf::from("/data/splitFastas/chr7.fa")
        );
    }

    #[test]
    fn test_missing_reference_dir() {
        let config = Config::default();
        assert!(matches!(
            config.chromosome_fasta("chr1"),
            Err(ValidationError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trinity_cpu = \"many\"").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ValidationError::Config(_))
        ));
    }
}
