//! SAM → BAM → coordinate-sorted BAM → BAI, shared by the input alignment
//! and the realigned contigs.

use super::Pipeline;
use crate::config::ToolPaths;
use crate::error::Result;
use crate::utils::artifacts::{require_input, Artifact};
use crate::utils::external_tools::ToolInvocation;
use std::path::{Path, PathBuf};

pub fn view_to_bam(tools: &ToolPaths, dir: &Path, prefix: &str) -> ToolInvocation {
    ToolInvocation::new("samtools view", &tools.samtools)
        .args(["view", "-b", "-o"])
        .arg(format!("{}.bam", prefix))
        .arg(format!("{}.sam", prefix))
        .in_dir(dir)
}

pub fn sort_by_coordinate(tools: &ToolPaths, dir: &Path, prefix: &str) -> ToolInvocation {
    ToolInvocation::new("samtools sort", &tools.samtools)
        .args(["sort", "-o"])
        .arg(format!("{}.sorted.bam", prefix))
        .arg(format!("{}.bam", prefix))
        .in_dir(dir)
}

pub fn index_bam(tools: &ToolPaths, dir: &Path, prefix: &str) -> ToolInvocation {
    ToolInvocation::new("samtools index", &tools.samtools)
        .arg("index")
        .arg(format!("{}.sorted.bam", prefix))
        .in_dir(dir)
}

/// Converts `<dir>/<prefix>.sam` into `<prefix>.sorted.bam` and its index,
/// skipping each step whose output already exists. Returns the sorted BAM.
pub fn sam_to_sorted_bam(
    pipeline: &mut Pipeline<'_>,
    dir: &Path,
    prefix: &str,
    key: &str,
) -> Result<PathBuf> {
    let tools = pipeline.context().config.tools.clone();
    log::info!("Output prefix is: {}", dir.join(prefix).display());

    let sam = dir.join(format!("{}.sam", prefix));
    let bam = dir.join(format!("{}.bam", prefix));
    let sorted = dir.join(format!("{}.sorted.bam", prefix));
    let index = dir.join(format!("{}.sorted.bam.bai", prefix));

    let sort_key = format!("{}/sort", key);
    let sort_outputs = [Artifact::required(&sorted)];
    // A sorted BAM handed in directly needs no SAM behind it.
    if pipeline.is_complete(&sort_key, &sort_outputs) {
        log::info!("{} present, skipping BAM conversion", sorted.display());
    } else {
        let to_bam = view_to_bam(&tools, dir, prefix);
        pipeline.stage(&format!("{}/to_bam", key), &[Artifact::required(&bam)], |runner| {
            require_input(&sam)?;
            runner.run(&to_bam)
        })?;
    }
    pipeline.tool_stage(&sort_key, &sort_outputs, sort_by_coordinate(&tools, dir, prefix))?;
    pipeline.tool_stage(
        &format!("{}/index", key),
        &[Artifact::required(&index)],
        index_bam(&tools, dir, prefix),
    )?;

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_invocations() {
        let tools = ToolPaths::default();
        let dir = Path::new("/work");
        assert_eq!(
            view_to_bam(&tools, dir, "Trinity_bwa_chr1:1-9").command_line(),
            "samtools view -b -o Trinity_bwa_chr1:1-9.bam Trinity_bwa_chr1:1-9.sam"
        );
        assert_eq!(
            sort_by_coordinate(&tools, dir, "s").command_line(),
            "samtools sort -o s.sorted.bam s.bam"
        );
        let index = index_bam(&tools, dir, "s");
        assert_eq!(index.command_line(), "samtools index s.sorted.bam");
        assert_eq!(index.current_dir.as_deref(), Some(dir));
    }
}
