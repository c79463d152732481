//! Collaborators that feed the track engine.
//!
//! The engine only sees three capabilities:
//!
//! - [`ReadSource`] - ordered, lazy stream of reads overlapping a window
//! - [`ReferenceLookup`] - single reference bases and chromosome lengths
//! - [`SingleReadLookup`] - one read by name and position, implemented for
//!   every read source
//!
//! # Implementations
//!
//! - [`BamReadSource`] - indexed BAM files (`.bai`) via noodles, local or over HTTP
//! - [`FastaReference`] - indexed FASTA files (`.fai`) via noodles, local or over HTTP
//! - [`MemoryReadSource`] / [`MemoryReference`] - in-memory fixtures
//! - [`NoReference`] - placeholder when no genome is attached

mod bam;
mod fasta;
mod memory;
pub mod remote;

pub use bam::BamReadSource;
pub use fasta::FastaReference;
pub use memory::{MemoryReadSource, MemoryReference};
pub use remote::RemoteFile;

use crate::read::AlignedRead;
use crate::{Error, Result};

/// Pull-based stream of reads ordered by start index.
///
/// An `Err(Error::BadRecord(_))` item affects only that read; any other error
/// item means the stream cannot continue.
pub type ReadStream<'a> = Box<dyn Iterator<Item = Result<AlignedRead>> + Send + 'a>;

/// Source of reads for one alignment file.
///
/// The file handle is bound when the source is opened, so `fetch` only takes
/// the chromosome and the 1-based inclusive window.
pub trait ReadSource: Send + Sync {
    /// Stream every read overlapping `[start, end]` on `chromosome`.
    ///
    /// Each call starts a fresh stream. Unknown chromosomes yield an empty stream.
    fn fetch(&self, chromosome: &str, start: u64, end: u64) -> Result<ReadStream<'_>>;
}

/// Reference genome lookup.
pub trait ReferenceLookup: Send + Sync {
    /// Upper-case base at a 1-based position. Fails with `OutOfRange` when the
    /// position or chromosome is not covered.
    fn base_at(&self, chromosome: &str, position: u64) -> Result<u8>;

    fn chromosome_length(&self, chromosome: &str) -> Option<u64>;
}

/// Reference used when a query names no genome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReference;

impl ReferenceLookup for NoReference {
    fn base_at(&self, chromosome: &str, position: u64) -> Result<u8> {
        Err(Error::OutOfRange(format!(
            "no reference attached for {}:{}",
            chromosome, position
        )))
    }

    fn chromosome_length(&self, _chromosome: &str) -> Option<u64> {
        None
    }
}

/// Lookup of one read by name within a coordinate window.
pub trait SingleReadLookup {
    fn load_read(&self, chromosome: &str, name: &str, start: u64, end: u64) -> Result<AlignedRead>;
}

impl<S: ReadSource + ?Sized> SingleReadLookup for S {
    fn load_read(&self, chromosome: &str, name: &str, start: u64, end: u64) -> Result<AlignedRead> {
        if start == 0 || start > end {
            return Err(Error::InvalidRange(format!(
                "invalid read window {}-{}",
                start, end
            )));
        }

        for result in self.fetch(chromosome, start, end)? {
            let read = match result {
                Ok(read) => read,
                Err(Error::BadRecord(msg)) => {
                    tracing::warn!("skipping undecodable record: {}", msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if read.start_index > end {
                break;
            }
            if read.name == name && read.start_index == start && read.end_index == end {
                return Ok(read);
            }
        }

        Err(Error::NotFound(format!(
            "read {} at {}:{}-{}",
            name, chromosome, start, end
        )))
    }
}
