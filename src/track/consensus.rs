use super::AssemblySettings;
use super::cancel::Cancellation;
use super::coverage::{base_slot, for_each_aligned_base};
use super::fanout::fan_out;
use super::filter::ReadFilter;
use super::window::split_window;
use crate::source::{ReadSource, ReferenceLookup};
use crate::types::{ConsensusBase, GenomicRange, Track};
use crate::{Error, Result};
use rayon::ThreadPool;
use std::sync::Arc;

const BASES: [char; 5] = ['A', 'C', 'G', 'T', 'N'];

/// Positions summarized by one consensus call at `scale_factor`.
///
/// Never wider than `width`, the window the buckets tile.
pub fn bucket_size(scale_factor: f64, width: u64) -> u64 {
    let positions = (1.0 / scale_factor).round();
    let bucket = if positions >= width as f64 {
        width
    } else {
        positions as u64
    };
    bucket.max(1)
}

/// Highest count wins; ties go to the earlier of A, C, G, T, N.
fn call(counts: &[u64; 5]) -> char {
    let mut best = 0;
    for slot in 1..counts.len() {
        if counts[slot] > counts[best] {
            best = slot;
        }
    }
    BASES[best]
}

/// Base counters for a run of buckets, growing in either direction.
struct BucketCounts {
    first: usize,
    counts: Vec<[u64; 5]>,
}

impl BucketCounts {
    fn new(first: usize, last: usize) -> Self {
        Self {
            first,
            counts: vec![[0; 5]; last - first + 1],
        }
    }

    fn add(&mut self, bucket: usize, slot: usize) {
        if bucket < self.first {
            let missing = self.first - bucket;
            self.counts.splice(0..0, std::iter::repeat_n([0; 5], missing));
            self.first = bucket;
        }
        let offset = bucket - self.first;
        if offset >= self.counts.len() {
            self.counts.resize(offset + 1, [0; 5]);
        }
        self.counts[offset][slot] += 1;
    }

    fn merge_into(self, totals: &mut [[u64; 5]]) {
        for (i, theirs) in self.counts.into_iter().enumerate() {
            if let Some(ours) = totals.get_mut(self.first + i) {
                for (a, b) in ours.iter_mut().zip(theirs) {
                    *a += b;
                }
            }
        }
    }
}

/// Per-bucket consensus over every accepted read of a range.
pub struct ConsensusCalculator {
    source: Arc<dyn ReadSource>,
    reference: Arc<dyn ReferenceLookup>,
    settings: AssemblySettings,
    pool: Option<Arc<ThreadPool>>,
    clipping: bool,
}

impl ConsensusCalculator {
    pub fn new(
        source: Arc<dyn ReadSource>,
        reference: Arc<dyn ReferenceLookup>,
        settings: AssemblySettings,
    ) -> Self {
        Self {
            source,
            reference,
            settings,
            pool: None,
            clipping: false,
        }
    }

    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Count soft-clipped bases (and hard clips as `N`) next to the aligned part.
    pub fn with_clipping(mut self, clipping: bool) -> Self {
        self.clipping = clipping;
        self
    }

    pub fn calculate(
        &self,
        range: &GenomicRange,
        filter: &ReadFilter,
        cancel: &Cancellation,
    ) -> Result<Track<ConsensusBase>> {
        range.validate()?;
        cancel.check()?;

        let window = range.with_bounds(range.start_index, range.end_index);
        let bucket = bucket_size(window.scale_factor, window.width());
        let buckets = window.width().div_ceil(bucket);
        if buckets > self.settings.max_window_width {
            return Err(Error::InvalidRange(format!(
                "{}:{}-{} needs {} consensus calls, more than the limit of {}",
                window.chromosome,
                window.start_index,
                window.end_index,
                buckets,
                self.settings.max_window_width
            )));
        }

        let windows = split_window(&window, self.settings.parts_for(window.width()), bucket);
        let parts = fan_out(self.pool.as_deref(), &windows, cancel, |i, part, cancel| {
            self.count_part(&window, part, i == 0, bucket, filter, cancel)
        })?;

        let mut counts = vec![[0u64; 5]; buckets as usize];
        for part in parts {
            part.merge_into(&mut counts);
        }

        let batch_size = self.settings.batch_size();
        let mut bases = Vec::with_capacity(counts.len());
        for (i, counts) in counts.into_iter().enumerate() {
            if i % batch_size == 0 {
                cancel.check()?;
            }

            let start_index = window.start_index + i as u64 * bucket;
            let end_index = start_index.saturating_add(bucket - 1).min(window.end_index);
            let depth: u64 = counts.iter().sum();

            let (base, from_reference) = if depth > 0 {
                (call(&counts), false)
            } else {
                (self.reference_base(&window.chromosome, start_index)?, true)
            };

            bases.push(ConsensusBase {
                start_index,
                end_index,
                base,
                depth,
                counts,
                from_reference,
            });
        }

        tracing::debug!(
            "consensus {}:{}-{} at bucket size {}: {} calls",
            window.chromosome,
            window.start_index,
            window.end_index,
            bucket,
            bases.len()
        );

        let mut track = Track::empty(&window);
        track.blocks = bases;
        Ok(track)
    }

    fn reference_base(&self, chromosome: &str, position: u64) -> Result<char> {
        match self.reference.base_at(chromosome, position) {
            Ok(base) => Ok(char::from(base.to_ascii_uppercase())),
            Err(Error::OutOfRange(_)) => Ok('N'),
            Err(e) => Err(e),
        }
    }

    /// Base counts from the reads one part owns, over the whole window.
    ///
    /// A read belongs to the part holding its start; the first part also owns
    /// reads that start before the window.
    fn count_part(
        &self,
        window: &GenomicRange,
        part: &GenomicRange,
        first: bool,
        bucket: u64,
        filter: &ReadFilter,
        cancel: &Cancellation,
    ) -> Result<BucketCounts> {
        let batch_size = self.settings.batch_size();
        let (start, end) = (window.start_index as i64, window.end_index as i64);
        let bucket_of = |pos: i64| ((pos - start) as u64 / bucket) as usize;
        let mut counts = BucketCounts::new(
            bucket_of(part.start_index as i64),
            bucket_of(part.end_index as i64),
        );

        let stream = self
            .source
            .fetch(&part.chromosome, part.start_index, part.end_index)
            .map_err(Error::into_source_unavailable)?;

        for (i, item) in stream.enumerate() {
            if i % batch_size == 0 {
                cancel.check()?;
            }

            let read = match item {
                Ok(read) => read,
                Err(Error::BadRecord(msg)) => {
                    tracing::warn!("skipping undecodable record: {}", msg);
                    continue;
                }
                Err(e) => return Err(e.into_source_unavailable()),
            };
            if read.start_index > part.end_index {
                break;
            }
            if read.start_index < part.start_index && !first {
                continue;
            }
            if !filter.should_include(&read) {
                continue;
            }

            for_each_aligned_base(&read, self.clipping, |pos, base| {
                if pos < start || pos > end {
                    return;
                }
                counts.add(bucket_of(pos), base_slot(base));
            });
        }

        cancel.check()?;
        Ok(counts)
    }
}
