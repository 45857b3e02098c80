use crate::config::Config;
use crate::types::{JunctionCoordinate, Stringency};
use std::path::{Path, PathBuf};

/// Everything one validation run needs to know, handed to every stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub coordinate: JunctionCoordinate,
    pub config: Config,
    /// Directory the input alignment was found in.
    pub input_dir: PathBuf,
    /// Input base name without extension.
    pub sample: String,
    /// `<sample>_validation_tests_<window>`, beside the input.
    pub work_dir: PathBuf,
    /// Per-coordinate subdirectory of `work_dir`.
    pub coord_dir: PathBuf,
}

impl RunContext {
    pub fn new(infile: &Path, coordinate: JunctionCoordinate, config: Config) -> Self {
        let input_dir = match infile.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let sample = infile
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let work_dir = input_dir.join(format!("{}_validation_tests_{}", sample, coordinate.window));
        let coord_dir = work_dir.join(coordinate.label());

        Self {
            coordinate,
            config,
            input_dir,
            sample,
            work_dir,
            coord_dir,
        }
    }

    /// `<work_dir>/<sample><suffix>`, e.g. `.sorted.bam`.
    pub fn sample_file(&self, suffix: &str) -> PathBuf {
        self.work_dir.join(format!("{}{}", self.sample, suffix))
    }

    /// `<coord_dir>/<stem>_<coord><suffix>`, e.g. `Region_reads`, `.fq`.
    pub fn coord_file(&self, stem: &str, suffix: &str) -> PathBuf {
        self.coord_dir.join(self.coord_file_name(stem, suffix))
    }

    pub fn coord_file_name(&self, stem: &str, suffix: &str) -> String {
        format!("{}_{}{}", stem, self.coordinate.label(), suffix)
    }

    pub fn overlap_output(&self, stringency: Stringency) -> PathBuf {
        self.coord_file(
            &format!("Check_overlap_out_{}Stringency", stringency.name()),
            ".txt",
        )
    }

    /// Manifest key for a per-coordinate stage.
    pub fn stage_key(&self, stage: &str) -> String {
        format!("{}/{}", self.coordinate.label(), stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let coord = JunctionCoordinate::parse("chr1:1000-5000", 50).unwrap();
        let ctx = RunContext::new(Path::new("data/SRR1"), coord, Config::default());

        assert_eq!(ctx.work_dir, PathBuf::from("data/SRR1_validation_tests_50"));
        assert_eq!(ctx.sample_file(".sorted.bam.bai"), PathBuf::from("data/SRR1_validation_tests_50/SRR1.sorted.bam.bai"));
        assert_eq!(
            ctx.coord_file("Region_reads", ".qsorted.bam"),
            PathBuf::from("data/SRR1_validation_tests_50/chr1:1000-5000/Region_reads_chr1:1000-5000.qsorted.bam")
        );
        assert_eq!(
            ctx.overlap_output(Stringency::VeryLow).file_name().unwrap(),
            "Check_overlap_out_vlowStringency_chr1:1000-5000.txt"
        );
    }

    #[test]
    fn test_bare_input_name() {
        let coord = JunctionCoordinate::parse("chrX:10-500", 20).unwrap();
        let ctx = RunContext::new(Path::new("sample"), coord, Config::default());
        assert_eq!(ctx.input_dir, PathBuf::from("."));
        assert_eq!(ctx.work_dir, PathBuf::from("./sample_validation_tests_20"));
    }
}
