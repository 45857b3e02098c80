use super::Pipeline;
use crate::config::ToolPaths;
use crate::error::{Result, ValidationError};
use crate::types::FlankingInterval;
use crate::utils::artifacts::Artifact;
use crate::utils::external_tools::{ToolInvocation, ToolRunner};
use rust_htslib::bam::{self, Read};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Writes every read overlapping each interval, in interval order, to a SAM
/// file. Reads overlapping both intervals are written twice. `sam_out` only
/// appears once every record is written.
pub fn write_region_reads(sorted_bam: &Path, intervals: &[FlankingInterval], sam_out: &Path) -> Result<u64> {
    let dir = parent_dir(sam_out);
    let tmp = tempfile::Builder::new()
        .prefix(".region_reads_")
        .suffix(".sam")
        .tempfile_in(dir)
        .map_err(|e| ValidationError::io(e, dir))?;

    let mut reader = bam::IndexedReader::from_path(sorted_bam)?;
    let header = bam::Header::from_template(reader.header());
    let mut written = 0u64;
    {
        let mut writer = bam::Writer::from_path(tmp.path(), &header, bam::Format::Sam)?;
        for interval in intervals {
            let (begin, end) = interval.zero_based();
            reader.fetch((interval.chromosome.as_str(), begin as i64, end as i64))?;
            let mut in_interval = 0u64;
            for record in reader.records() {
                writer.write(&record?)?;
                in_interval += 1;
            }
            log::info!("{} reads overlap {}", in_interval, interval);
            written += in_interval;
        }
    }

    tmp.persist(sam_out)
        .map_err(|e| ValidationError::io(e.error, sam_out))?;
    Ok(written)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Appends `/1` to the name line of every FASTQ record, marking each read as
/// the first mate of a single-end library. Returns the number of records.
pub fn mark_single_end_mates<R: BufRead, W: Write>(input: R, mut output: W) -> io::Result<u64> {
    let mut records = 0u64;
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        if i % 4 == 0 {
            writeln!(output, "{}/1", line)?;
            records += 1;
        } else {
            writeln!(output, "{}", line)?;
        }
    }
    output.flush()?;
    Ok(records)
}

pub fn bam_to_fastq(tools: &ToolPaths, dir: &Path, bam: &str, fastq: &Path) -> ToolInvocation {
    ToolInvocation::new("bamToFastq", &tools.bam_to_fastq)
        .args(["-i", bam, "-fq"])
        .arg(fastq)
        .in_dir(dir)
}

/// Region reads → `Region_reads_<coord>.{sam,bam,qsorted.bam,fq}`. Returns the FASTQ.
pub fn extract_region_reads(pipeline: &mut Pipeline<'_>, sorted_bam: &Path) -> Result<PathBuf> {
    let ctx = pipeline.context().clone();
    let coord = &ctx.coordinate;
    let dir = ctx.coord_dir.as_path();
    let tools = &ctx.config.tools;
    log::info!("{}:{}", coord.start, coord.end);
    log::info!("{}:{}", coord.start_window(), coord.end_window());

    let sam = ctx.coord_file("Region_reads", ".sam");
    let sam_name = ctx.coord_file_name("Region_reads", ".sam");
    let bam = ctx.coord_file_name("Region_reads", ".bam");
    let qsorted = ctx.coord_file_name("Region_reads", ".qsorted.bam");
    let fastq = ctx.coord_file("Region_reads", ".fq");

    pipeline.stage(&ctx.stage_key("region_reads"), &[Artifact::required(&sam)], |_| {
        let intervals = [coord.upstream_flank(), coord.downstream_flank()];
        let n = write_region_reads(sorted_bam, &intervals, &sam)?;
        if n == 0 {
            log::warn!("No reads overlap the flanks of {}", coord);
        }
        Ok(())
    })?;

    pipeline.tool_stage(
        &ctx.stage_key("region_bam"),
        &[Artifact::required(dir.join(&bam))],
        ToolInvocation::new("samtools view", &tools.samtools)
            .args(["view", "-b", "-o", bam.as_str(), sam_name.as_str()])
            .in_dir(dir),
    )?;

    // bamToFastq wants reads grouped by name, not by position.
    pipeline.tool_stage(
        &ctx.stage_key("region_qsort"),
        &[Artifact::required(dir.join(&qsorted))],
        ToolInvocation::new("samtools sort", &tools.samtools)
            .args(["sort", "-n", "-o", qsorted.as_str(), bam.as_str()])
            .in_dir(dir),
    )?;

    pipeline.stage(&ctx.stage_key("region_fastq"), &[Artifact::required(&fastq)], |runner| {
        fastq_with_mate_suffix(runner, tools, dir, &qsorted, &fastq)
    })?;

    Ok(fastq)
}

fn fastq_with_mate_suffix(
    runner: &mut dyn ToolRunner,
    tools: &ToolPaths,
    dir: &Path,
    qsorted: &str,
    fastq: &Path,
) -> Result<()> {
    // The raw conversion goes to a scratch file so a half-written FASTQ never
    // sits under the final name.
    let raw = tempfile::Builder::new()
        .prefix("bamToFastq_")
        .suffix(".fq")
        .tempfile_in(dir)
        .map_err(|e| ValidationError::io(e, dir))?;
    // Tools run inside `dir`, so they are handed bare file names.
    let raw_name = raw.path().file_name().map(Path::new).unwrap_or(raw.path());
    runner.run(&bam_to_fastq(tools, dir, qsorted, raw_name))?;

    let input = BufReader::new(File::open(raw.path()).map_err(|e| ValidationError::io(e, raw.path()))?);
    let mut out = NamedTempFile::new_in(dir).map_err(|e| ValidationError::io(e, dir))?;
    let records = mark_single_end_mates(input, BufWriter::new(out.as_file_mut()))
        .map_err(|e| ValidationError::io(e, fastq))?;
    out.persist(fastq)
        .map_err(|e| ValidationError::io(e.error, fastq))?;
    log::info!("Wrote {} reads to {}", records, fastq.display());
    Ok(())
}
