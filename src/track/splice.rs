use crate::read::{AlignedRead, CigarKind};
use crate::types::Interval;

/// Derives splice junctions from skipped-region (`N`) CIGAR runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpliceJunctionDetector {
    /// Runs must be strictly longer than this to count as a junction.
    pub min_length: u32,
}

impl SpliceJunctionDetector {
    pub fn new(min_length: u32) -> Self {
        Self { min_length }
    }

    /// Junctions of a single read, in reference order.
    pub fn junctions_in(&self, read: &AlignedRead) -> Vec<Interval> {
        let mut junctions = Vec::new();
        let mut ref_pos = read.start_index;

        for op in read.cigar.ops() {
            if op.kind == CigarKind::Skip && op.len > self.min_length {
                junctions.push(Interval {
                    start_index: ref_pos,
                    end_index: ref_pos + u64::from(op.len),
                });
            }
            if op.kind.consumes_reference() {
                ref_pos += u64::from(op.len);
            }
        }

        junctions
    }

    /// Junctions of every read, in read order. Identical intervals are kept.
    pub fn detect<'a>(&self, reads: impl IntoIterator<Item = &'a AlignedRead>) -> Vec<Interval> {
        reads
            .into_iter()
            .flat_map(|read| self.junctions_in(read))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(start: u64, cigar: &str) -> AlignedRead {
        AlignedRead::new("r", start, cigar.parse().unwrap(), "")
    }

    #[test]
    fn test_single_junction() {
        let detector = SpliceJunctionDetector::default();
        let junctions = detector.junctions_in(&read(100, "5S10M200N20M"));
        assert_eq!(
            junctions,
            vec![Interval { start_index: 110, end_index: 310 }]
        );
    }

    #[test]
    fn test_deletions_shift_junctions() {
        let detector = SpliceJunctionDetector::default();
        let junctions = detector.junctions_in(&read(1, "10M2D5M50N5M100N5M"));
        assert_eq!(
            junctions,
            vec![
                Interval { start_index: 18, end_index: 68 },
                Interval { start_index: 73, end_index: 173 },
            ]
        );
    }

    #[test]
    fn test_minimum_length_is_exclusive() {
        let detector = SpliceJunctionDetector::new(50);
        assert!(detector.junctions_in(&read(1, "10M50N10M")).is_empty());
        assert_eq!(detector.junctions_in(&read(1, "10M51N10M")).len(), 1);
    }

    #[test]
    fn test_detect_keeps_duplicates() {
        let detector = SpliceJunctionDetector::default();
        let reads = [read(1, "10M100N10M"), read(1, "10M100N10M"), read(1, "30M")];
        assert_eq!(detector.detect(&reads).len(), 2);
    }
}
