//! Junction overlap test.
//!
//! A probe of `2k` bases centred on offset `window` of the junction sequence
//! is searched for in every realigned contig, once per stringency level.

use super::Pipeline;
use crate::error::{Result, ValidationError};
use crate::export::summary::ValidationSummary;
use crate::types::Stringency;
use crate::utils::artifacts::Artifact;
use rust_htslib::bam::{self, Read};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const MATCH_LABEL: &str = "Found overlap";

/// An assembled contig as read back from the contig alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub name: String,
    pub sequence: String,
}

impl ReadRecord {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionProbe {
    pub stringency: Stringency,
    pub bases: String,
    /// The ideal `[window - k, window + k)` slice fell off an end of the
    /// junction sequence and was cut back to fit.
    pub clamped: bool,
}

impl JunctionProbe {
    pub fn new(junction: &str, window: u64, stringency: Stringency) -> Self {
        let k = stringency.half_width();
        let len = junction.len() as u64;
        let begin = window.saturating_sub(k).min(len);
        let end = window.saturating_add(k).min(len);
        let clamped = window < k || window.saturating_add(k) > len;

        let bases = junction
            .get(begin as usize..end as usize)
            .unwrap_or_default()
            .to_string();

        Self {
            stringency,
            bases,
            clamped,
        }
    }

    /// Literal containment. An empty probe matches nothing.
    pub fn matches(&self, sequence: &str) -> bool {
        !self.bases.is_empty() && sequence.contains(&self.bases)
    }
}

/// Tests contigs against all four stringency probes.
#[derive(Debug, Clone)]
pub struct OverlapScorer {
    probes: Vec<JunctionProbe>,
}

/// Counts gathered while scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapCounts {
    pub contigs: u64,
    pub without_sequence: u64,
    /// Matches per level, in `Stringency::ALL` order.
    pub matches: [u64; 4],
}

impl OverlapScorer {
    pub fn new(junction: &str, window: u64) -> Self {
        let probes = Stringency::ALL
            .iter()
            .map(|&s| JunctionProbe::new(junction, window, s))
            .collect::<Vec<_>>();
        for probe in probes.iter().filter(|p| p.clamped) {
            log::warn!(
                "Window {} is too small for {} stringency (half-width {}); probe cut to {} bases",
                window,
                probe.stringency.name(),
                probe.stringency.half_width(),
                probe.bases.len()
            );
        }
        Self { probes }
    }

    pub fn probes(&self) -> &[JunctionProbe] {
        &self.probes
    }

    /// Levels whose probe occurs in `sequence`, each level checked on its own.
    pub fn matching_levels(&self, sequence: &str) -> Vec<Stringency> {
        self.probes
            .iter()
            .filter(|probe| probe.matches(sequence))
            .map(|probe| probe.stringency)
            .collect()
    }

    /// Writes `name<TAB>sequence<TAB>Found overlap` to the sink of every level
    /// a record matches. `sinks` follow `Stringency::ALL` order.
    pub fn score<I, W>(&self, records: I, sinks: &mut [W]) -> std::io::Result<OverlapCounts>
    where
        I: IntoIterator<Item = ReadRecord>,
        W: Write,
    {
        let mut counts = OverlapCounts::default();
        for record in records {
            if record.sequence.is_empty() {
                counts.without_sequence += 1;
                continue;
            }
            counts.contigs += 1;
            log::debug!("Sequence is: {}", record.sequence);

            for (i, (probe, sink)) in self.probes.iter().zip(sinks.iter_mut()).enumerate() {
                if probe.matches(&record.sequence) {
                    writeln!(sink, "{}\t{}\t{}", record.name, record.sequence, MATCH_LABEL)?;
                    counts.matches[i] += 1;
                }
            }
        }
        for sink in sinks.iter_mut() {
            sink.flush()?;
        }
        Ok(counts)
    }
}

/// Reads name and stored sequence of every record in a SAM/BAM file.
/// Records without a stored sequence come back with an empty one.
pub fn read_contigs(path: &Path) -> Result<Vec<ReadRecord>> {
    let mut reader = bam::Reader::from_path(path)?;
    let mut contigs = Vec::new();
    for record in reader.records() {
        let record = record?;
        contigs.push(ReadRecord::new(
            String::from_utf8_lossy(record.qname()).into_owned(),
            String::from_utf8_lossy(&record.seq().as_bytes()).into_owned(),
        ));
    }
    Ok(contigs)
}

/// Scores the realigned contigs and writes the four result files plus the
/// run summary.
pub fn score_stage(pipeline: &mut Pipeline<'_>, junction: &str, contigs_sam: &Path) -> Result<ValidationSummary> {
    let ctx = pipeline.context().clone();
    let coord = &ctx.coordinate;
    let summary_path = ctx.coord_file("Validation_summary", ".json");
    let result_paths: Vec<_> = Stringency::ALL.iter().map(|&s| ctx.overlap_output(s)).collect();

    let mut outputs: Vec<Artifact> = result_paths.iter().map(Artifact::maybe_empty).collect();
    outputs.push(Artifact::required(&summary_path));

    let mut summary = None;
    pipeline.stage(&ctx.stage_key("overlap"), &outputs, |_| {
        let scorer = OverlapScorer::new(junction, coord.window);
        log::info!("Fasta string is: {}", junction);
        let contigs = read_contigs(contigs_sam)?;

        let mut files = Vec::with_capacity(4);
        for path in &result_paths {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            files.push(NamedTempFile::new_in(dir).map_err(|e| ValidationError::io(e, dir))?);
        }
        let counts = {
            let mut sinks = files
                .iter_mut()
                .map(|f| BufWriter::new(f.as_file_mut()))
                .collect::<Vec<_>>();
            scorer
                .score(contigs, &mut sinks)
                .map_err(|e| ValidationError::io(e, &ctx.coord_dir))?
        };
        for (file, path) in files.into_iter().zip(&result_paths) {
            file.persist(path).map_err(|e| ValidationError::io(e.error, path))?;
        }

        let built = ValidationSummary::new(coord, junction, &scorer, &counts, &result_paths);
        built.write(&summary_path)?;
        summary = Some(built);
        Ok(())
    })?;

    let summary = match summary {
        Some(summary) => summary,
        None => ValidationSummary::read(&summary_path)?,
    };
    for probe in &summary.probes {
        log::info!(
            "{} stringency: {} contig(s) span the junction",
            probe.stringency,
            probe.matches
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn junction() -> String {
        format!("{}{}", "A".repeat(50), "T".repeat(50))
    }

    fn score(scorer: &OverlapScorer, records: Vec<ReadRecord>) -> ([String; 4], OverlapCounts) {
        let mut sinks: [Vec<u8>; 4] = Default::default();
        let counts = scorer.score(records, &mut sinks).unwrap();
        let text = sinks.map(|s| String::from_utf8(s).unwrap());
        (text, counts)
    }

    #[test]
    fn test_probe_length_is_twice_half_width() {
        let junction = junction();
        for s in Stringency::ALL {
            let probe = JunctionProbe::new(&junction, 50, s);
            assert_eq!(probe.bases.len() as u64, 2 * s.half_width());
            assert!(!probe.clamped);
        }
        let high = JunctionProbe::new(&junction, 50, Stringency::High);
        assert_eq!(high.bases, format!("{}{}", "A".repeat(30), "T".repeat(30)));
    }

    #[test]
    fn test_small_window_clamps_to_start() {
        let junction = "ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT";
        let probe = JunctionProbe::new(junction, 8, Stringency::Medium);
        assert!(probe.clamped);
        assert_eq!(probe.bases, &junction[0..28]);

        let tiny = JunctionProbe::new("ACGT", 2, Stringency::High);
        assert_eq!(tiny.bases, "ACGT");
        assert!(tiny.clamped);

        let empty = JunctionProbe::new("", 10, Stringency::VeryLow);
        assert!(!empty.matches("ACGT"));
    }

    #[test]
    fn test_spanning_contig_matches_all_levels() {
        let scorer = OverlapScorer::new(&junction(), 50);
        let spanning = format!("GGC{}{}CCA", "A".repeat(45), "T".repeat(40));
        let all_a = "A".repeat(120);

        assert_eq!(scorer.matching_levels(&spanning), Stringency::ALL.to_vec());
        assert!(scorer.matching_levels(&all_a).is_empty());

        let (text, counts) = score(
            &scorer,
            vec![ReadRecord::new("TRINITY_DN0_c0_g1_i1", spanning.clone()), ReadRecord::new("TRINITY_DN1_c0_g1_i1", all_a)],
        );
        assert_eq!(counts.contigs, 2);
        assert_eq!(counts.matches, [1, 1, 1, 1]);
        for sink in &text {
            assert_eq!(sink, &format!("TRINITY_DN0_c0_g1_i1\t{}\tFound overlap\n", spanning));
        }
    }

    #[test]
    fn test_levels_are_independent() {
        let scorer = OverlapScorer::new(&junction(), 50);
        // Spans the junction by exactly five bases on each side.
        let short = format!("CC{}{}GG", "A".repeat(5), "T".repeat(5));
        assert_eq!(scorer.matching_levels(&short), vec![Stringency::VeryLow]);

        let (text, counts) = score(&scorer, vec![ReadRecord::new("c1", short.clone()), ReadRecord::new("c1", short)]);
        assert_eq!(counts.matches, [0, 0, 0, 2]);
        assert!(text[0].is_empty() && text[1].is_empty() && text[2].is_empty());
        // The same contig twice is reported twice.
        assert_eq!(text[3].lines().count(), 2);
    }

    #[test]
    fn test_records_without_sequence_are_skipped() {
        let scorer = OverlapScorer::new(&junction(), 50);
        let (text, counts) = score(&scorer, vec![ReadRecord::new("supplementary", "")]);
        assert_eq!(counts.without_sequence, 1);
        assert_eq!(counts.contigs, 0);
        assert!(text.iter().all(|t| t.is_empty()));
    }
}
