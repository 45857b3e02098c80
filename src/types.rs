use crate::error::{Result, ValidationError};
use std::fmt;

/// A candidate back-splice junction `chrom:start-end` together with the
/// flank window used to build both the read query and the pseudo-reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionCoordinate {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub window: u64,
    label: String,
}

impl JunctionCoordinate {
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64, window: u64) -> Result<Self> {
        let chromosome = chromosome.into();
        let label = format!("{}:{}-{}", chromosome, start, end);
        Self::validated(chromosome, start, end, window, label)
    }

    /// Parses `chrom:start-end`. The text is kept verbatim as the label used
    /// in output file names.
    pub fn parse(text: &str, window: u64) -> Result<Self> {
        let text = text.trim();
        // Contig names may themselves contain ':' (e.g. HLA alleles), so split on the last one.
        let (chromosome, range) = text
            .rsplit_once(':')
            .ok_or_else(|| ValidationError::coordinate(text, "expected chrom:start-end"))?;
        if chromosome.is_empty() {
            return Err(ValidationError::coordinate(text, "empty chromosome name"));
        }
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| ValidationError::coordinate(text, "expected start-end range"))?;
        let start = parse_position(text, start)?;
        let end = parse_position(text, end)?;

        Self::validated(chromosome.to_string(), start, end, window, text.to_string())
    }

    fn validated(chromosome: String, start: u64, end: u64, window: u64, label: String) -> Result<Self> {
        if start >= end {
            return Err(ValidationError::coordinate(&label, "start must be less than end"));
        }
        if window > end {
            return Err(ValidationError::coordinate(
                &label,
                format!("window {} reaches past the start of the chromosome", window),
            ));
        }
        if window.saturating_mul(2) >= end - start {
            log::warn!(
                "Window {} is not smaller than half the junction span of {}; flanks will overlap",
                window,
                label
            );
        }

        Ok(Self {
            chromosome,
            start,
            end,
            window,
            label,
        })
    }

    pub fn start_window(&self) -> u64 {
        self.start + self.window
    }

    pub fn end_window(&self) -> u64 {
        self.end - self.window
    }

    /// Coordinate string used in file names and as the pseudo-reference header.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Flank adjacent to the junction end: `[end - window, end]`.
    pub fn upstream_flank(&self) -> FlankingInterval {
        FlankingInterval::new(&self.chromosome, self.end_window(), self.end)
    }

    /// Flank adjacent to the junction start: `[start, start + window]`.
    pub fn downstream_flank(&self) -> FlankingInterval {
        FlankingInterval::new(&self.chromosome, self.start, self.start_window())
    }

    /// Intervals spliced together into the scrambled sequence, in order.
    /// The start-adjacent flank is taken one base further in than the read query.
    pub fn scrambled_intervals(&self) -> [FlankingInterval; 2] {
        [
            self.upstream_flank(),
            FlankingInterval::new(&self.chromosome, self.start + 1, self.start_window() + 1),
        ]
    }
}

impl fmt::Display for JunctionCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

fn parse_position(text: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ValidationError::coordinate(text, format!("bad position '{}': {}", value, e)))
}

/// A genomic interval in samtools region notation (1-based, end inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlankingInterval {
    pub chromosome: String,
    pub begin: u64,
    pub end: u64,
}

impl FlankingInterval {
    pub fn new(chromosome: &str, begin: u64, end: u64) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            begin,
            end,
        }
    }

    pub fn len(&self) -> u64 {
        self.end + 1 - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.begin
    }

    /// 0-based half-open bounds as taken by htslib and rust-bio fetch calls.
    pub fn zero_based(&self) -> (u64, u64) {
        (self.begin.saturating_sub(1), self.end)
    }

    pub fn overlaps(&self, other: &FlankingInterval) -> bool {
        self.chromosome == other.chromosome && self.begin <= other.end && other.begin <= self.end
    }
}

impl fmt::Display for FlankingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.begin, self.end)
    }
}

/// Half-width of the junction probe used by the overlap test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stringency {
    High,
    Medium,
    Low,
    VeryLow,
}

impl Stringency {
    pub const ALL: [Stringency; 4] = [
        Stringency::High,
        Stringency::Medium,
        Stringency::Low,
        Stringency::VeryLow,
    ];

    pub fn half_width(&self) -> u64 {
        match self {
            Stringency::High => 30,
            Stringency::Medium => 20,
            Stringency::Low => 10,
            Stringency::VeryLow => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stringency::High => "high",
            Stringency::Medium => "med",
            Stringency::Low => "low",
            Stringency::VeryLow => "vlow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        let coord = JunctionCoordinate::parse("chr1:1000-5000", 50).unwrap();
        assert_eq!(coord.chromosome, "chr1");
        assert_eq!(coord.start, 1000);
        assert_eq!(coord.end, 5000);
        assert_eq!(coord.start_window(), 1050);
        assert_eq!(coord.end_window(), 4950);
        assert_eq!(coord.label(), "chr1:1000-5000");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["chr1", "chr1:1000", "chr1:a-5000", ":1-2", "chr1:5000-1000", "chr1:10-10"] {
            let err = JunctionCoordinate::parse(bad, 5).unwrap_err();
            assert!(
                matches!(err, ValidationError::CoordinateFormat { .. }),
                "{} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_parse_contig_with_colon() {
        let coord = JunctionCoordinate::parse("HLA-A*01:01:01:01:100-900", 10).unwrap();
        assert_eq!(coord.chromosome, "HLA-A*01:01:01:01");
        assert_eq!((coord.start, coord.end), (100, 900));
    }

    #[test]
    fn test_flanks_disjoint_and_inside_junction() {
        for (start, end, window) in [(1000, 5000, 50), (10, 21, 5), (0, 100, 0), (200, 1000, 399)] {
            let coord = JunctionCoordinate::new("chr2", start, end, window).unwrap();
            let up = coord.upstream_flank();
            let down = coord.downstream_flank();
            assert!(!up.overlaps(&down), "{} / {} overlap", up, down);
            for flank in [&up, &down] {
                assert!(flank.begin >= start && flank.end <= end);
            }
        }
    }

    #[test]
    fn test_scrambled_intervals() {
        let coord = JunctionCoordinate::parse("chr1:1000-5000", 50).unwrap();
        let [first, second] = coord.scrambled_intervals();
        assert_eq!(first.to_string(), "chr1:4950-5000");
        assert_eq!(second.to_string(), "chr1:1001-1051");
        assert_eq!(first.zero_based(), (4949, 5000));
        assert_eq!(first.len() + second.len(), 102);
    }

    #[test]
    fn test_stringency_order() {
        let widths: Vec<u64> = Stringency::ALL.iter().map(|s| s.half_width()).collect();
        assert_eq!(widths, vec![30, 20, 10, 5]);
    }
}
