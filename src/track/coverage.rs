//! Per-base coverage arena and downsampling bins.
//!
//! Both structures are built per sub-window and merged element-wise, so the
//! result does not depend on how a window was split.

use crate::read::{AlignedRead, CigarKind};
use crate::types::{BaseCounts, CoverageBin, CoverageValue};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Column of the A/C/G/T/N counter for a base letter.
pub fn base_slot(base: u8) -> usize {
    match base.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4,
    }
}

/// Walk the reference positions a read places bases on.
///
/// Matched bases are always visited. With `clipping`, soft-clipped bases are
/// visited with their read base and hard-clipped bases as `N`, on the positions
/// just before and after the aligned part. Positions may fall below 1 for clips
/// near the chromosome start; callers bound them to their own window.
pub fn for_each_aligned_base(read: &AlignedRead, clipping: bool, mut visit: impl FnMut(i64, u8)) {
    let sequence = read.sequence.as_bytes();
    let mut ref_pos = read.start_index as i64 - read.cigar.leading_clip_len() as i64;
    let mut read_pos = 0usize;

    for op in read.cigar.ops() {
        let len = op.len as usize;
        match op.kind {
            CigarKind::Match | CigarKind::SequenceMatch | CigarKind::SequenceMismatch => {
                for i in 0..len {
                    let base = sequence.get(read_pos + i).copied().unwrap_or(b'N');
                    visit(ref_pos + i as i64, base);
                }
                ref_pos += len as i64;
                read_pos += len;
            }
            CigarKind::SoftClip => {
                if clipping {
                    for i in 0..len {
                        let base = sequence.get(read_pos + i).copied().unwrap_or(b'N');
                        visit(ref_pos + i as i64, base);
                    }
                }
                ref_pos += len as i64;
                read_pos += len;
            }
            CigarKind::HardClip => {
                if clipping {
                    for i in 0..len {
                        visit(ref_pos + i as i64, b'N');
                    }
                }
                ref_pos += len as i64;
            }
            CigarKind::Deletion | CigarKind::Skip => ref_pos += len as i64,
            CigarKind::Insertion => read_pos += len,
            CigarKind::Pad => {}
        }
    }
}

/// Base counters from `start`, indexed by offset.
///
/// The arena covers its initial span up front and grows on demand, in either
/// direction, within `floor..=limit`; bases outside those bounds are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageArena {
    start: u64,
    floor: u64,
    limit: u64,
    counts: Vec<[u32; 5]>,
}

impl CoverageArena {
    /// Fixed arena over `[start, end]`.
    pub fn new(start: u64, end: u64) -> Self {
        Self::growable(start..=end, start..=end)
    }

    /// Arena over `initial` that may extend anywhere inside `bounds`.
    pub fn growable(initial: RangeInclusive<u64>, bounds: RangeInclusive<u64>) -> Self {
        let (floor, limit) = (*bounds.start(), (*bounds.end()).max(*bounds.start()));
        let start = (*initial.start()).clamp(floor, limit);
        let end = (*initial.end()).clamp(start, limit);
        Self {
            start,
            floor,
            limit,
            counts: vec![[0; 5]; (end - start + 1) as usize],
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.start + self.counts.len() as u64 - 1
    }

    /// Add every visible base of `read` that falls inside the arena bounds.
    pub fn add_read(&mut self, read: &AlignedRead, clipping: bool) {
        let (floor, limit) = (self.floor as i64, self.limit as i64);
        let start = &mut self.start;
        let counts = &mut self.counts;
        for_each_aligned_base(read, clipping, |pos, base| {
            if pos < floor || pos > limit {
                return;
            }
            if pos < *start as i64 {
                let missing = (*start as i64 - pos) as usize;
                counts.splice(0..0, std::iter::repeat_n([0; 5], missing));
                *start = pos as u64;
            }
            let offset = (pos - *start as i64) as usize;
            if offset >= counts.len() {
                counts.resize(offset + 1, [0; 5]);
            }
            counts[offset][base_slot(base)] += 1;
        });
    }

    /// Total depth at a 1-based position, 0 outside the arena.
    pub fn depth_at(&self, position: u64) -> u32 {
        position
            .checked_sub(self.start)
            .and_then(|offset| self.counts.get(offset as usize))
            .map_or(0, |c| c.iter().sum())
    }

    /// Mean depth over `[start, end]`.
    pub fn mean_depth(&self, start: u64, end: u64) -> f64 {
        if end < start {
            return 0.0;
        }
        let total: u64 = (start..=end).map(|p| u64::from(self.depth_at(p))).sum();
        total as f64 / (end - start + 1) as f64
    }

    /// Add the counters of `other` position by position.
    ///
    /// `other` may cover any sub-range; positions outside `self` are ignored.
    pub fn merge(&mut self, other: &CoverageArena) {
        for (i, theirs) in other.counts.iter().enumerate() {
            let position = other.start + i as u64;
            let Some(offset) = position.checked_sub(self.start) else {
                continue;
            };
            let Some(ours) = self.counts.get_mut(offset as usize) else {
                break;
            };
            for (a, b) in ours.iter_mut().zip(theirs) {
                *a += b;
            }
        }
    }

    /// One value per position; base breakdown only when bases are visible.
    pub fn into_values(self, with_bases: bool) -> Vec<CoverageValue> {
        let start = self.start;
        self.counts
            .into_iter()
            .enumerate()
            .map(|(i, counts)| {
                let bases = BaseCounts::from_array(counts);
                CoverageValue {
                    position: start + i as u64,
                    depth: bases.total(),
                    bases: with_bases.then_some(bases),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BinState {
    reads: u32,
    kept: u32,
}

/// Frame-sized bins over a window, counting accepted and kept reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampleBins {
    window_start: u64,
    window_end: u64,
    frame: u64,
    cap: Option<usize>,
    bins: BTreeMap<u64, BinState>,
}

impl DownsampleBins {
    pub fn new(window_start: u64, window_end: u64, frame: u64, cap: Option<usize>) -> Self {
        Self {
            window_start,
            window_end,
            frame: frame.max(1),
            cap,
            bins: BTreeMap::new(),
        }
    }

    fn bin_of(&self, read: &AlignedRead) -> u64 {
        (read.start_index.max(self.window_start) - self.window_start) / self.frame
    }

    /// Record an accepted read; returns whether it stays a detail block.
    pub fn admit(&mut self, read: &AlignedRead) -> bool {
        let bin = self.bin_of(read);
        let cap = self.cap;
        let state = self.bins.entry(bin).or_default();
        state.reads += 1;
        let keep = cap.is_none_or(|cap| (state.kept as usize) < cap);
        if keep {
            state.kept += 1;
        }
        keep
    }

    pub fn merge(&mut self, other: DownsampleBins) {
        for (bin, theirs) in other.bins {
            let ours = self.bins.entry(bin).or_default();
            ours.reads += theirs.reads;
            ours.kept += theirs.kept;
        }
    }

    /// Reads left out of the blocks across all bins.
    pub fn dropped(&self) -> u32 {
        self.bins.values().map(|s| s.reads - s.kept).sum()
    }

    /// One bin per frame that received at least one read.
    pub fn into_bins(self, coverage: &CoverageArena) -> Vec<CoverageBin> {
        self.bins
            .into_iter()
            .filter(|(_, state)| state.reads > 0)
            .map(|(bin, state)| {
                let start_index = self.window_start + bin * self.frame;
                let end_index = (start_index + self.frame - 1).min(self.window_end);
                CoverageBin {
                    start_index,
                    end_index,
                    coverage: coverage.mean_depth(start_index, end_index),
                    reads: state.reads,
                    downsampled: state.reads - state.kept,
                }
            })
            .collect()
    }
}
