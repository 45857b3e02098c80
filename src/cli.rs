use crate::config::Config;
use crate::utils::logging::{LogSettings, DEFAULT_LOG_FORMAT};
use clap::Parser;
use std::path::PathBuf;

/// Assembly-based in silico validation of circular RNA back-splice junctions
#[derive(Parser, Debug)]
#[command(name = "acvalidator", author, version, about, long_about = None)]
pub struct Args {
    /// Input alignment base name, without the .sam extension
    #[arg(short = 'i', long = "infile", value_name = "PATH")]
    pub infile: PathBuf,

    /// Junction to validate, as chrom:start-end
    #[arg(short = 'c', long = "coordinate", value_name = "COORD")]
    pub coordinate: String,

    /// Flank window size in bases on each side of the junction
    #[arg(short = 'w', long = "window")]
    pub window: u64,

    /// Config file (default: config.toml in the user config directory)
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Directory of per-chromosome reference FASTA files (<chrom>.fa)
    #[arg(long = "reference-dir", value_name = "DIR")]
    pub reference_dir: Option<PathBuf>,

    /// CPUs handed to Trinity
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Memory limit handed to Trinity, e.g. 100G
    #[arg(long = "max-memory")]
    pub max_memory: Option<String>,

    /// File to save logs to (default: standard error)
    #[arg(long = "log-filename")]
    pub log_filename: Option<PathBuf>,

    /// File mode for the log file
    #[arg(long = "log-filemode", default_value = "a", value_parser = ["a", "w"])]
    pub log_filemode: String,

    /// Log line template ({timestamp}, {level}, {target}, {message})
    #[arg(long = "log-format", default_value = DEFAULT_LOG_FORMAT)]
    pub log_format: String,

    /// Minimum level for log emission
    #[arg(long = "log-level", default_value = "INFO")]
    pub log_level: String,
}

impl Args {
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            filename: self.log_filename.clone(),
            filemode: self.log_filemode.clone(),
            format: self.log_format.clone(),
            level: self.log_level.clone(),
        }
    }

    /// Command-line values take precedence over the config file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.reference_dir {
            config.reference_dir = Some(dir.clone());
        }
        if let Some(cpu) = self.cpu {
            config.trinity_cpu = cpu;
        }
        if let Some(memory) = &self.max_memory {
            config.trinity_max_memory = memory.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_and_defaults() {
        let args = Args::try_parse_from(["acvalidator", "-i", "SRR1", "-c", "chr1:1000-5000", "-w", "50"]).unwrap();
        assert_eq!(args.infile, PathBuf::from("SRR1"));
        assert_eq!(args.window, 50);
        assert_eq!(args.log_filemode, "a");
        assert_eq!(args.log_level, "INFO");
        assert_eq!(args.log_format, DEFAULT_LOG_FORMAT);

        assert!(Args::try_parse_from(["acvalidator", "-i", "SRR1", "-c", "chr1:1000-5000"]).is_err());
        assert!(Args::try_parse_from(["acvalidator", "-i", "SRR1", "-c", "chr1:1-2", "-w", "-3"]).is_err());
        assert!(Args::try_parse_from([
            "acvalidator", "-i", "SRR1", "-c", "chr1:1-2", "-w", "3", "--log-filemode", "x"
        ])
        .is_err());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "acvalidator", "--infile", "SRR1", "--coordinate", "chr1:1000-5000", "--window", "50",
            "--reference-dir", "/ref", "--cpu", "4",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.reference_dir, Some(PathBuf::from("/ref")));
        assert_eq!(config.trinity_cpu, 4);
        assert_eq!(config.trinity_max_memory, "100G");
    }
}
