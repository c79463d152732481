use super::AssemblySettings;
use super::cancel::Cancellation;
use super::coverage::{CoverageArena, DownsampleBins};
use super::fanout::fan_out;
use super::filter::ReadFilter;
use super::splice::SpliceJunctionDetector;
use super::window::{resolve_window, split_window};
use crate::read::AlignedRead;
use crate::source::{ReadSource, ReferenceLookup};
use crate::types::{GenomicRange, Interval, QueryOptions, Track};
use crate::{Error, Result};
use rayon::ThreadPool;
use std::sync::Arc;

/// Builds read tracks from a read source.
pub struct TrackAssembler {
    source: Arc<dyn ReadSource>,
    reference: Arc<dyn ReferenceLookup>,
    settings: AssemblySettings,
    pool: Option<Arc<ThreadPool>>,
}

/// Options resolved once per query and shared by every part.
struct Plan {
    window: GenomicRange,
    filter: ReadFilter,
    splice: Option<SpliceJunctionDetector>,
    clipping: bool,
    frame: Option<u64>,
    cap: Option<usize>,
    stop_early: bool,
}

/// Result of one sub-window.
struct Part {
    blocks: Vec<AlignedRead>,
    coverage: CoverageArena,
    bins: Option<DownsampleBins>,
    junctions: Vec<Interval>,
    accepted: u64,
    skipped: u64,
}

impl TrackAssembler {
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
        }
    }

    /// Run sub-windows on `pool` instead of the global rayon pool.
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Assemble the track for `range` under `options`.
    ///
    /// A direction in `options` takes precedence over the range's own.
    pub fn assemble(
        &self,
        range: &GenomicRange,
        options: &QueryOptions,
        cancel: &Cancellation,
    ) -> Result<Track<AlignedRead>> {
        range.validate()?;
        cancel.check()?;

        let direction = options.track_direction.or(range.track_direction);
        let chromosome_length = self.reference.chromosome_length(&range.chromosome);
        let window = resolve_window(range, direction, options.frame, chromosome_length);
        self.settings.check_width(&window)?;

        let frame = options.downsample_frame();
        let cap = options.read_cap();
        let plan = Plan {
            filter: ReadFilter::from(options),
            splice: options
                .splice_junctions_enabled()
                .then(|| SpliceJunctionDetector::new(self.settings.min_splice_length)),
            clipping: options.clipping_enabled(),
            frame,
            cap,
            stop_early: frame.is_none() && cap.is_some(),
            window,
        };

        // A global read cap only holds when the window is read in order.
        let windows = if plan.stop_early {
            vec![plan.window.clone()]
        } else {
            split_window(
                &plan.window,
                self.settings.parts_for(plan.window.width()),
                frame.unwrap_or(1),
            )
        };

        let parts = fan_out(self.pool.as_deref(), &windows, cancel, |i, part, cancel| {
            self.assemble_part(&plan, part, i == 0, cancel)
        })?;

        let track = merge_parts(&plan, parts);
        tracing::debug!(
            "assembled {}:{}-{}: {} blocks, {} coverage bins, {} junctions",
            track.chromosome,
            track.start_index,
            track.end_index,
            track.blocks.len(),
            track.downsample_coverage.len(),
            track.splice_junctions.len()
        );
        Ok(track)
    }

    fn assemble_part(
        &self,
        plan: &Plan,
        part: &GenomicRange,
        first: bool,
        cancel: &Cancellation,
    ) -> Result<Part> {
        let window = &plan.window;
        let batch_size = self.settings.batch_size();

        let stream = self
            .source
            .fetch(&window.chromosome, part.start_index, part.end_index)
            .map_err(Error::into_source_unavailable)?;

        let mut out = Part {
            blocks: Vec::new(),
            // Grows past the part only as far as its own reads reach.
            coverage: CoverageArena::growable(
                part.start_index..=part.end_index,
                window.start_index..=window.end_index,
            ),
            bins: plan
                .frame
                .map(|frame| DownsampleBins::new(window.start_index, window.end_index, frame, plan.cap)),
            junctions: Vec::new(),
            accepted: 0,
            skipped: 0,
        };

        for (i, item) in stream.enumerate() {
            if i % batch_size == 0 {
                cancel.check()?;
            }

            let read = match item {
                Ok(read) => read,
                Err(Error::BadRecord(msg)) => {
                    tracing::warn!("skipping undecodable record: {}", msg);
                    out.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into_source_unavailable()),
            };

            if read.start_index > part.end_index {
                break;
            }
            // Reads starting in an earlier part belong to that part.
            if read.start_index < part.start_index && !first {
                continue;
            }
            if !plan.filter.should_include(&read) {
                continue;
            }

            out.accepted += 1;
            out.coverage.add_read(&read, plan.clipping);
            if let Some(detector) = &plan.splice {
                out.junctions.extend(detector.junctions_in(&read));
            }

            let keep = out.bins.as_mut().is_none_or(|bins| bins.admit(&read));
            if keep {
                out.blocks.push(read.summary());
            }

            if plan.stop_early && plan.cap.is_some_and(|cap| out.accepted as usize >= cap) {
                break;
            }
        }

        cancel.check()?;
        Ok(out)
    }
}

fn merge_parts(plan: &Plan, parts: Vec<Part>) -> Track<AlignedRead> {
    let window = &plan.window;
    let mut blocks = Vec::new();
    let mut coverage = CoverageArena::new(window.start_index, window.end_index);
    let mut bins: Option<DownsampleBins> = None;
    let mut junctions = Vec::new();
    let mut accepted = 0;
    let mut skipped = 0;

    for part in parts {
        blocks.extend(part.blocks);
        coverage.merge(&part.coverage);
        junctions.extend(part.junctions);
        accepted += part.accepted;
        skipped += part.skipped;
        if let Some(theirs) = part.bins {
            match bins.as_mut() {
                Some(ours) => ours.merge(theirs),
                None => bins = Some(theirs),
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            "{} undecodable records skipped in {}:{}-{}",
            skipped,
            window.chromosome,
            window.start_index,
            window.end_index
        );
    }

    let mut track = Track::empty(window);
    if accepted == 0 {
        return track;
    }

    if let Some(bins) = bins {
        track.downsample_coverage = bins.into_bins(&coverage);
    }
    track.blocks = blocks;
    track.base_coverage = coverage.into_values(window.scale_factor >= 1.0);
    track.splice_junctions = junctions;
    track
}
