//! Track assembly and consensus over a read source.
//!
//! # Pipeline
//!
//! 1. [`window`] resolves the fetch window from the range, direction and frame
//! 2. [`filter`] drops reads by flag
//! 3. [`assembler`] streams reads per sub-window, fills a [`coverage`] arena,
//!    downsampling bins and [`splice`] junctions, then merges the parts
//! 4. [`consensus`] is a separate entry point that buckets base counts by scale
//!
//! Sub-windows run on a rayon pool through [`fanout`] and stop on
//! [`cancel::Cancellation`].

pub mod assembler;
pub mod cancel;
pub mod consensus;
pub mod coverage;
pub mod fanout;
pub mod filter;
pub mod splice;
pub mod window;

pub use assembler::TrackAssembler;
pub use cancel::{CancelOnDrop, Cancellation};
pub use consensus::ConsensusCalculator;
pub use filter::ReadFilter;
pub use splice::SpliceJunctionDetector;

use crate::types::GenomicRange;
use crate::{Error, Result};

/// Engine tuning shared by the assembler and the consensus calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblySettings {
    /// Sub-windows processed in parallel per query.
    pub workers: usize,
    /// Reads consumed between cancellation checks.
    pub batch_size: usize,
    /// Skip runs must be longer than this to become junctions.
    pub min_splice_length: u32,
    /// Windows narrower than this are processed as one part.
    pub min_split_width: u64,
    /// Widest resolved window a query may cover, in positions.
    pub max_window_width: u64,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 256,
            min_splice_length: 0,
            min_split_width: 100_000,
            max_window_width: 10_000_000,
        }
    }
}

impl AssemblySettings {
    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Reject a resolved window before any per-position state is allocated.
    pub(crate) fn check_width(&self, window: &GenomicRange) -> Result<()> {
        if window.width() > self.max_window_width {
            return Err(Error::InvalidRange(format!(
                "window {}:{}-{} spans {} positions, more than the limit of {}",
                window.chromosome,
                window.start_index,
                window.end_index,
                window.width(),
                self.max_window_width
            )));
        }
        Ok(())
    }

    /// Number of parts for a window of `width` positions.
    pub(crate) fn parts_for(&self, width: u64) -> usize {
        if self.workers <= 1 || width < self.min_split_width {
            1
        } else {
            self.workers
        }
    }
}
