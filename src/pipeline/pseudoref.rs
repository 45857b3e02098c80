//! Scrambled-junction pseudo-reference.
//!
//! The junction-end flank is placed before the junction-start flank, so a
//! contig assembled from back-spliced reads reads straight through the
//! point where the two meet.

use super::Pipeline;
use crate::error::{Result, ValidationError};
use crate::types::FlankingInterval;
use crate::utils::artifacts::{await_artifacts, require_input, Artifact};
use crate::utils::external_tools::{ToolInvocation, ToolRunner};
use bio::io::fasta::IndexedReader;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Line width of the pseudo-reference FASTA.
pub const PSEUDOREF_LINE_WIDTH: usize = 70;
/// Line width samtools faidx uses for extracted regions.
pub const REGION_LINE_WIDTH: usize = 60;

/// BWA index files written next to the indexed FASTA.
pub const BWA_INDEX_SUFFIXES: [&str; 5] = [".amb", ".ann", ".bwt", ".pac", ".sa"];

/// Writes one FASTA record with the sequence wrapped at `width` columns.
pub fn write_wrapped<W: Write>(out: &mut W, header: &str, seq: &[u8], width: usize) -> std::io::Result<()> {
    writeln!(out, ">{}", header)?;
    for line in seq.chunks(width.max(1)) {
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Concatenates the bases of every record in a FASTA file, dropping header
/// lines and all whitespace.
pub fn read_fasta_bases(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| ValidationError::io(e, path))?;
    let mut bases = String::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| ValidationError::io(e, path))?;
        if line.starts_with('>') {
            continue;
        }
        bases.extend(line.chars().filter(|c| !c.is_whitespace()));
    }
    Ok(bases)
}

/// Fetches 1-based inclusive intervals from an indexed FASTA, in order.
pub fn fetch_intervals(reference: &Path, intervals: &[FlankingInterval]) -> Result<Vec<(FlankingInterval, Vec<u8>)>> {
    let mut reader = IndexedReader::from_file(&reference).map_err(|e| {
        ValidationError::Config(format!("cannot open indexed FASTA {}: {}", reference.display(), e))
    })?;

    let mut fetched = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let (begin, end) = interval.zero_based();
        let mut seq = Vec::new();
        reader
            .fetch(&interval.chromosome, begin, end)
            .and_then(|_| reader.read(&mut seq))
            .map_err(|e| ValidationError::io(e, reference))?;
        fetched.push((interval.clone(), seq));
    }
    Ok(fetched)
}

/// Writes the flank records that make up the scrambled sequence, as `samtools faidx` would.
pub fn write_scrambled(path: &Path, flanks: &[(FlankingInterval, Vec<u8>)]) -> Result<()> {
    let file = File::create(path).map_err(|e| ValidationError::io(e, path))?;
    let mut out = BufWriter::new(file);
    for (interval, seq) in flanks {
        write_wrapped(&mut out, &interval.to_string(), seq, REGION_LINE_WIDTH)
            .map_err(|e| ValidationError::io(e, path))?;
    }
    out.flush().map_err(|e| ValidationError::io(e, path))
}

/// Re-wraps the scrambled records into a single pseudo-reference record and
/// returns its bases.
pub fn write_pseudoref(scrambled: &Path, pseudoref: &Path, header: &str) -> Result<String> {
    let junction = read_fasta_bases(scrambled)?;
    let dir = pseudoref.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ValidationError::io(e, dir))?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write_wrapped(&mut out, header, junction.as_bytes(), PSEUDOREF_LINE_WIDTH)
            .and_then(|_| out.flush())
            .map_err(|e| ValidationError::io(e, pseudoref))?;
    }
    tmp.persist(pseudoref)
        .map_err(|e| ValidationError::io(e.error, pseudoref))?;

    Ok(junction)
}

fn ensure_fasta_index(runner: &mut dyn ToolRunner, samtools: &Path, reference: &Path, timeout: Duration) -> Result<()> {
    let mut fai = reference.as_os_str().to_os_string();
    fai.push(".fai");
    let fai = PathBuf::from(fai);
    if fai.is_file() {
        return Ok(());
    }
    log::info!("No FASTA index for {}, building one", reference.display());
    runner.run(&ToolInvocation::new("samtools faidx", samtools).arg("faidx").arg(reference))?;
    await_artifacts(&[Artifact::required(fai)], timeout)
}

/// Builds `Scrambled_<coord>.fa`, `Pseudoref_<coord>.fa` and its BWA index.
/// Returns the junction sequence.
pub fn build_pseudo_reference(pipeline: &mut Pipeline<'_>) -> Result<String> {
    let ctx = pipeline.context().clone();
    let coord = &ctx.coordinate;
    let dir = ctx.coord_dir.as_path();
    let timeout = Duration::from_secs(ctx.config.artifact_timeout_secs);
    log::info!("Creating pseudoref..");

    let scrambled = ctx.coord_file("Scrambled", ".fa");
    let pseudoref_name = ctx.coord_file_name("Pseudoref", ".fa");
    let pseudoref = dir.join(&pseudoref_name);

    pipeline.stage(&ctx.stage_key("scrambled"), &[Artifact::required(&scrambled)], |runner| {
        let reference = ctx.config.chromosome_fasta(&coord.chromosome)?;
        require_input(&reference)?;
        ensure_fasta_index(runner, &ctx.config.tools.samtools, &reference, timeout)?;
        let flanks = fetch_intervals(&reference, &coord.scrambled_intervals())?;
        write_scrambled(&scrambled, &flanks)
    })?;

    let mut junction = None;
    pipeline.stage(&ctx.stage_key("pseudoref"), &[Artifact::required(&pseudoref)], |_| {
        junction = Some(write_pseudoref(&scrambled, &pseudoref, coord.label())?);
        Ok(())
    })?;

    let index_files: Vec<Artifact> = BWA_INDEX_SUFFIXES
        .iter()
        .map(|suffix| Artifact::required(dir.join(format!("{}{}", pseudoref_name, suffix))))
        .collect();
    pipeline.tool_stage(
        &ctx.stage_key("bwa_index"),
        &index_files,
        ToolInvocation::new("bwa index", &ctx.config.tools.bwa)
            .args(["index", "-a", "bwtsw", pseudoref_name.as_str()])
            .in_dir(dir),
    )?;

    let junction = match junction {
        Some(junction) => junction,
        None => read_fasta_bases(&pseudoref)?,
    };
    log::info!("Junction sequence is {} bases", junction.len());
    Ok(junction)
}
