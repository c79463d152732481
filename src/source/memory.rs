use super::{ReadSource, ReadStream, ReferenceLookup};
use crate::read::{AlignedRead, flags};
use crate::{Error, Result};
use std::collections::HashMap;

/// Reads held in memory, kept sorted by start index per chromosome.
#[derive(Debug, Clone, Default)]
pub struct MemoryReadSource {
    chromosomes: HashMap<String, Vec<AlignedRead>>,
}

impl MemoryReadSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chromosome: &str, read: AlignedRead) {
        let reads = self.chromosomes.entry(chromosome.to_string()).or_default();
        let at = reads.partition_point(|r| r.start_index <= read.start_index);
        reads.insert(at, read);
    }

    pub fn extend(&mut self, chromosome: &str, reads: impl IntoIterator<Item = AlignedRead>) {
        for read in reads {
            self.insert(chromosome, read);
        }
    }

    pub fn len(&self) -> usize {
        self.chromosomes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadSource for MemoryReadSource {
    fn fetch(&self, chromosome: &str, start: u64, end: u64) -> Result<ReadStream<'_>> {
        let Some(reads) = self.chromosomes.get(chromosome) else {
            return Ok(Box::new(std::iter::empty()));
        };

        let stream = reads
            .iter()
            .take_while(move |read| read.start_index <= end)
            .filter(move |read| read.flags & flags::UNMAPPED == 0 && read.overlaps(start, end))
            .cloned()
            .map(Ok);

        Ok(Box::new(stream))
    }
}

/// Reference sequences held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReference {
    sequences: HashMap<String, Vec<u8>>,
}

impl MemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence(mut self, chromosome: &str, sequence: &[u8]) -> Self {
        self.sequences
            .insert(chromosome.to_string(), sequence.to_ascii_uppercase());
        self
    }
}

impl ReferenceLookup for MemoryReference {
    fn base_at(&self, chromosome: &str, position: u64) -> Result<u8> {
        self.sequences
            .get(chromosome)
            .and_then(|seq| {
                let index = usize::try_from(position.checked_sub(1)?).ok()?;
                seq.get(index).copied()
            })
            .ok_or_else(|| Error::OutOfRange(format!("{}:{}", chromosome, position)))
    }

    fn chromosome_length(&self, chromosome: &str) -> Option<u64> {
        self.sequences.get(chromosome).map(|seq| seq.len() as u64)
    }
}
