use super::{conversion, Pipeline, RunContext};
use crate::error::Result;
use crate::utils::artifacts::Artifact;
use crate::utils::external_tools::ToolInvocation;
use std::path::{Path, PathBuf};

/// Trinity run on the single-end region reads. With `--full_cleanup` only
/// `<output>.Trinity.fasta` is left behind.
pub fn trinity(ctx: &RunContext, reads: &str) -> ToolInvocation {
    let config = &ctx.config;
    ToolInvocation::new("Trinity", &config.tools.trinity)
        .args(["--seqType", "fq", "--single", reads, "--output"])
        .arg(ctx.coord_file_name("Trinity", ""))
        .arg("--CPU")
        .arg(config.trinity_cpu.to_string())
        .arg("--max_memory")
        .arg(&config.trinity_max_memory)
        .arg("--full_cleanup")
        .in_dir(&ctx.coord_dir)
}

/// `bwa mem` of the assembled contigs against the pseudo-reference.
pub fn bwa_mem(ctx: &RunContext, contigs: &str) -> ToolInvocation {
    ToolInvocation::new("bwa mem", &ctx.config.tools.bwa)
        .args(["mem", "-T"])
        .arg(ctx.config.bwa_min_score.to_string())
        .arg(ctx.coord_file_name("Pseudoref", ".fa"))
        .arg(contigs)
        .in_dir(&ctx.coord_dir)
        .stdout_to(ctx.coord_file_name("Trinity_bwa", ".sam"))
}

/// Assembles the region reads and aligns the contigs to the pseudo-reference.
/// Returns the contig alignment SAM.
pub fn assemble_and_realign(pipeline: &mut Pipeline<'_>, reads: &Path) -> Result<PathBuf> {
    let ctx = pipeline.context().clone();
    let reads_name = reads
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let contigs_name = ctx.coord_file_name("Trinity", ".Trinity.fasta");
    pipeline.tool_stage(
        &ctx.stage_key("trinity"),
        &[Artifact::required(ctx.coord_dir.join(&contigs_name))],
        trinity(&ctx, &reads_name),
    )?;

    let contigs_sam = ctx.coord_file("Trinity_bwa", ".sam");
    pipeline.tool_stage(
        &ctx.stage_key("bwa_mem"),
        &[Artifact::required(&contigs_sam)],
        bwa_mem(&ctx, &contigs_name),
    )?;

    conversion::sam_to_sorted_bam(
        pipeline,
        &ctx.coord_dir,
        &ctx.coord_file_name("Trinity_bwa", ""),
        &ctx.stage_key("contigs"),
    )?;

    Ok(contigs_sam)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::JunctionCoordinate;

    fn context() -> RunContext {
        let coord = JunctionCoordinate::parse("chr3:500-9000", 40).unwrap();
        let mut config = Config::default();
        config.trinity_cpu = 8;
        config.trinity_max_memory = "16G".to_string();
        RunContext::new(Path::new("/data/sample"), coord, config)
    }

    #[test]
    fn test_trinity_invocation() {
        let ctx = context();
        let inv = trinity(&ctx, "Region_reads_chr3:500-9000.fq");
        assert_eq!(
            inv.command_line(),
            "Trinity --seqType fq --single Region_reads_chr3:500-9000.fq --output Trinity_chr3:500-9000 \
             --CPU 8 --max_memory 16G --full_cleanup"
        );
        assert_eq!(inv.current_dir, Some(ctx.coord_dir.clone()));
    }

    #[test]
    fn test_bwa_mem_invocation() {
        let ctx = context();
        let inv = bwa_mem(&ctx, "Trinity_chr3:500-9000.Trinity.fasta");
        assert_eq!(
            inv.command_line(),
            "bwa mem -T 19 Pseudoref_chr3:500-9000.fa Trinity_chr3:500-9000.Trinity.fasta \
             > Trinity_bwa_chr3:500-9000.sam"
        );
    }
}
