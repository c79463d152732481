//! Behavioural properties of track assembly and consensus, checked over a
//! matrix of query options.

use bamtrack::{
    Error,
    read::{AlignedRead, Cigar, flags},
    source::{MemoryReadSource, MemoryReference, NoReference, ReadSource, SingleReadLookup},
    track::{AssemblySettings, Cancellation, ConsensusCalculator, ReadFilter, TrackAssembler},
    types::{GenomicRange, QueryOptions, TrackDirection},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const CHROMOSOME: &str = "chr1";
const CHROMOSOME_LENGTH: u64 = 3000;

/// Reads every 3 bases over most of the chromosome, with a mix of flags and shapes.
/// The last few hundred bases are left uncovered.
fn fixture() -> MemoryReadSource {
    let mut source = MemoryReadSource::new();
    let flag_cycle = [
        0,
        flags::REVERSE,
        flags::DUPLICATE,
        flags::SECONDARY | flags::REVERSE,
        flags::QC_FAIL,
        flags::SUPPLEMENTARY,
    ];
    let cigars = ["50M", "5S45M", "20M300N30M", "10M2I38M", "25M3D25M2H"];

    for (i, start) in (1..CHROMOSOME_LENGTH - 400).step_by(3).enumerate() {
        let cigar: Cigar = cigars[i % cigars.len()].parse().unwrap();
        let read_len: usize = cigar
            .ops()
            .iter()
            .filter(|op| op.kind.consumes_read())
            .map(|op| op.len as usize)
            .sum();
        let sequence: String = "ACGGTCAT".chars().cycle().skip(i % 8).take(read_len).collect();

        source.insert(
            CHROMOSOME,
            AlignedRead::new(format!("read{}", i), start, cigar, sequence)
                .with_flags(flag_cycle[i % flag_cycle.len()])
                .with_mate("=", start + 200, 250)
                .with_qualities("I".repeat(read_len))
                .with_tag("NM", (i % 3).to_string()),
        );
    }
    source
}

fn reference() -> MemoryReference {
    let sequence: Vec<u8> = b"TTAGGC".iter().cycle().take(CHROMOSOME_LENGTH as usize).copied().collect();
    MemoryReference::new().with_sequence(CHROMOSOME, &sequence)
}

fn assembler(settings: AssemblySettings) -> TrackAssembler {
    TrackAssembler::new(Arc::new(fixture()), Arc::new(reference()), settings)
}

fn query_range() -> GenomicRange {
    GenomicRange::new(CHROMOSOME, 1000, 1600)
}

fn option_matrix() -> Vec<QueryOptions> {
    let directions = [
        None,
        Some(TrackDirection::Left),
        Some(TrackDirection::Right),
        Some(TrackDirection::Middle),
    ];
    let mut matrix = Vec::new();
    for direction in directions {
        for down_sampling in [true, false] {
            for frame in [30, 0, -1] {
                for count in [Some(30), Some(0), Some(-1), None, Some(10_000_000)] {
                    matrix.push(QueryOptions {
                        track_direction: direction,
                        down_sampling,
                        frame,
                        count,
                        ..Default::default()
                    });
                }
            }
        }
    }
    matrix
}

#[test]
fn blocks_and_coverage_present_for_every_configuration() {
    let assembler = assembler(AssemblySettings::default());
    for options in option_matrix() {
        let track = assembler
            .assemble(&query_range(), &options, &Cancellation::new())
            .unwrap();
        assert!(!track.blocks.is_empty(), "no blocks for {:?}", options);
        assert!(!track.base_coverage.is_empty(), "no coverage for {:?}", options);
        assert_eq!(track.base_coverage.len() as u64, track.end_index - track.start_index + 1);
    }
}

#[test]
fn downsample_coverage_follows_priority_rules() {
    let assembler = assembler(AssemblySettings::default());
    for options in option_matrix() {
        let track = assembler
            .assemble(&query_range(), &options, &Cancellation::new())
            .unwrap();
        let active = options.down_sampling && options.frame > 0;
        assert_eq!(
            track.downsample_coverage.is_empty(),
            !active,
            "downsample coverage mismatch for {:?}",
            options
        );
        if !options.down_sampling {
            assert!(track.downsample_coverage.is_empty());
        }
        if options.frame <= 0 {
            assert!(track.downsample_coverage.is_empty());
        }
    }
}

#[test]
fn count_caps_blocks() {
    let assembler = assembler(AssemblySettings::default());
    for options in option_matrix() {
        let track = assembler
            .assemble(&query_range(), &options, &Cancellation::new())
            .unwrap();
        match (options.read_cap(), options.downsample_frame()) {
            (Some(cap), None) => assert!(track.blocks.len() <= cap),
            (Some(cap), Some(_)) => {
                assert!(track.downsample_coverage.iter().all(|b| (b.reads - b.downsampled) as usize <= cap));
                let kept: u32 = track.downsample_coverage.iter().map(|b| b.reads - b.downsampled).sum();
                assert_eq!(kept as usize, track.blocks.len());
            }
            (None, _) => assert!(track.downsample_coverage.iter().all(|b| b.downsampled == 0)),
        }
    }
}

#[test]
fn every_block_is_complete() {
    let assembler = assembler(AssemblySettings::default());
    let track = assembler
        .assemble(&query_range(), &QueryOptions::default(), &Cancellation::new())
        .unwrap();

    for block in &track.blocks {
        assert!(!block.name.is_empty());
        assert!(block.start_index <= block.end_index);
        assert!(block.overlaps(track.start_index, track.end_index));
        assert!(!block.cigar.is_empty());
        assert!(block.mapping_quality > 0);
        assert_ne!(block.template_length, 0);
        assert!(block.mate_position > 0);
        assert!(!block.mate_reference.is_empty());
        assert!(!block.sequence.is_empty());
        assert!(block.qualities.is_empty());
        assert!(block.tags.is_empty());
    }
}

#[test]
fn blocks_are_ordered_by_start() {
    let assembler = assembler(AssemblySettings {
        workers: 4,
        min_split_width: 1,
        ..Default::default()
    });
    let track = assembler
        .assemble(&query_range(), &QueryOptions::default(), &Cancellation::new())
        .unwrap();
    assert!(track.blocks.windows(2).all(|w| w[0].start_index <= w[1].start_index));
}

#[test]
fn splice_junctions_toggle() {
    let assembler = assembler(AssemblySettings::default());

    let on = assembler
        .assemble(&query_range(), &QueryOptions::default(), &Cancellation::new())
        .unwrap();
    assert!(!on.splice_junctions.is_empty());
    assert!(on.splice_junctions.iter().all(|j| j.end_index - j.start_index == 300));

    let off = assembler
        .assemble(
            &query_range(),
            &QueryOptions {
                show_splice_junction: Some(false),
                ..Default::default()
            },
            &Cancellation::new(),
        )
        .unwrap();
    assert!(off.splice_junctions.is_empty());
}

#[test]
fn clipping_adds_coverage() {
    let assembler = assembler(AssemblySettings::default());
    let total = |clipping: bool| -> u64 {
        let options = QueryOptions {
            show_clipping: Some(clipping),
            ..Default::default()
        };
        assembler
            .assemble(&query_range(), &options, &Cancellation::new())
            .unwrap()
            .base_coverage
            .iter()
            .map(|v| u64::from(v.depth))
            .sum()
    };
    assert!(total(true) > total(false));
}

#[test]
fn enabling_filters_never_admits_more_reads() {
    let assembler = assembler(AssemblySettings::default());
    let block_count = |options: QueryOptions| {
        assembler
            .assemble(&query_range(), &options, &Cancellation::new())
            .unwrap()
            .blocks
            .len()
    };

    let mut previous = block_count(QueryOptions::default());
    let steps = [
        QueryOptions { filter_duplicate: true, ..Default::default() },
        QueryOptions { filter_duplicate: true, filter_not_primary: true, ..Default::default() },
        QueryOptions {
            filter_duplicate: true,
            filter_not_primary: true,
            filter_vendor_quality_fail: true,
            ..Default::default()
        },
        QueryOptions {
            filter_duplicate: true,
            filter_not_primary: true,
            filter_vendor_quality_fail: true,
            filter_supplementary_alignment: true,
            ..Default::default()
        },
    ];
    for options in steps {
        let current = block_count(options);
        assert!(current <= previous);
        previous = current;
    }
    assert!(previous > 0);
}

#[test]
fn split_and_merge_equals_single_pass() {
    let single = assembler(AssemblySettings { workers: 1, ..Default::default() });
    let split = assembler(AssemblySettings {
        workers: 5,
        min_split_width: 1,
        batch_size: 7,
        ..Default::default()
    });

    let clipped = option_matrix().into_iter().map(|options| QueryOptions {
        show_clipping: Some(true),
        ..options
    });
    for options in option_matrix().into_iter().chain(clipped) {
        let a = single
            .assemble(&query_range(), &options, &Cancellation::new())
            .unwrap();
        let b = split
            .assemble(&query_range(), &options, &Cancellation::new())
            .unwrap();
        assert_eq!(a, b, "split result differs for {:?}", options);
    }
}

#[test]
fn zoomed_out_coverage_has_no_base_breakdown() {
    let assembler = assembler(AssemblySettings::default());
    let range = query_range().with_scale_factor(0.01);
    let track = assembler
        .assemble(&range, &QueryOptions::default(), &Cancellation::new())
        .unwrap();
    assert!(track.base_coverage.iter().all(|v| v.bases.is_none()));
}

#[test]
fn unknown_chromosome_is_empty() {
    let assembler = assembler(AssemblySettings::default());
    let track = assembler
        .assemble(
            &GenomicRange::new("chrUn", 1, 500),
            &QueryOptions { frame: 30, ..Default::default() },
            &Cancellation::new(),
        )
        .unwrap();
    assert!(track.blocks.is_empty());
    assert!(track.base_coverage.is_empty());
    assert!(track.downsample_coverage.is_empty());
    assert!(track.splice_junctions.is_empty());
}

#[test]
fn undecodable_records_are_skipped() {
    struct Flaky(MemoryReadSource);

    impl ReadSource for Flaky {
        fn fetch(&self, chromosome: &str, start: u64, end: u64) -> bamtrack::Result<bamtrack::source::ReadStream<'_>> {
            let inner = self.0.fetch(chromosome, start, end)?;
            Ok(Box::new(inner.enumerate().map(|(i, item)| {
                if i % 10 == 0 {
                    Err(Error::BadRecord(format!("record {}", i)))
                } else {
                    item
                }
            })))
        }
    }

    let assembler = TrackAssembler::new(
        Arc::new(Flaky(fixture())),
        Arc::new(NoReference),
        AssemblySettings::default(),
    );
    let track = assembler
        .assemble(&query_range(), &QueryOptions::default(), &Cancellation::new())
        .unwrap();
    assert!(!track.blocks.is_empty());
}

#[test]
fn source_failure_is_source_unavailable() {
    struct Broken;

    impl ReadSource for Broken {
        fn fetch(&self, _: &str, _: u64, _: u64) -> bamtrack::Result<bamtrack::source::ReadStream<'_>> {
            Ok(Box::new(std::iter::once(Err(Error::Corrupt("truncated block".to_string())))))
        }
    }

    let assembler = TrackAssembler::new(Arc::new(Broken), Arc::new(NoReference), AssemblySettings::default());
    let err = assembler
        .assemble(&query_range(), &QueryOptions::default(), &Cancellation::new())
        .unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable(_)));
}

#[test]
fn cancelled_query_returns_no_partial_result() {
    let cancel = Cancellation::new();
    cancel.cancel();
    let split = assembler(AssemblySettings {
        workers: 3,
        min_split_width: 1,
        ..Default::default()
    });
    let err = split
        .assemble(&query_range(), &QueryOptions::default(), &cancel)
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

/// Counts every read it hands out and raises `cancel` after the `after`-th.
struct CancellingSource {
    inner: MemoryReadSource,
    cancel: Cancellation,
    after: usize,
    pulled: AtomicUsize,
}

impl CancellingSource {
    fn new(cancel: &Cancellation, after: usize) -> Self {
        Self {
            inner: fixture(),
            cancel: cancel.clone(),
            after,
            pulled: AtomicUsize::new(0),
        }
    }
}

impl ReadSource for CancellingSource {
    fn fetch(&self, chromosome: &str, start: u64, end: u64) -> bamtrack::Result<bamtrack::source::ReadStream<'_>> {
        let inner = self.inner.fetch(chromosome, start, end)?;
        Ok(Box::new(inner.inspect(move |_| {
            if self.pulled.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
                self.cancel.cancel();
            }
        })))
    }
}

#[test]
fn cancellation_mid_stream_stops_within_one_batch() {
    const AFTER: usize = 100;
    const BATCH: usize = 16;
    let whole = GenomicRange::new(CHROMOSOME, 1, CHROMOSOME_LENGTH);

    for workers in [1, 4] {
        let cancel = Cancellation::new();
        let source = Arc::new(CancellingSource::new(&cancel, AFTER));
        let assembler = TrackAssembler::new(
            Arc::clone(&source) as Arc<dyn ReadSource>,
            Arc::new(reference()),
            AssemblySettings {
                workers,
                batch_size: BATCH,
                min_split_width: 1,
                ..Default::default()
            },
        );

        let err = assembler
            .assemble(&whole, &QueryOptions::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled), "{} workers: {:?}", workers, err);

        // Each sub-window stops at its next batch boundary.
        let pulled = source.pulled.load(Ordering::SeqCst);
        assert!(pulled >= AFTER);
        assert!(
            pulled <= AFTER + workers * BATCH,
            "{} workers pulled {} reads",
            workers,
            pulled
        );
    }
}

#[test]
fn consensus_cancellation_mid_stream_stops_within_one_batch() {
    const AFTER: usize = 50;
    const BATCH: usize = 8;

    let cancel = Cancellation::new();
    let source = Arc::new(CancellingSource::new(&cancel, AFTER));
    let calculator = ConsensusCalculator::new(
        Arc::clone(&source) as Arc<dyn ReadSource>,
        Arc::new(reference()),
        AssemblySettings { workers: 1, batch_size: BATCH, ..Default::default() },
    );

    let err = calculator
        .calculate(
            &GenomicRange::new(CHROMOSOME, 1, CHROMOSOME_LENGTH),
            &ReadFilter::default(),
            &cancel,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(source.pulled.load(Ordering::SeqCst) <= AFTER + BATCH);
}

#[test]
fn oversized_window_is_rejected_without_reference() {
    let assembler = TrackAssembler::new(
        Arc::new(fixture()),
        Arc::new(NoReference),
        AssemblySettings::default(),
    );
    let range = query_range().with_direction(TrackDirection::Right);
    let options = QueryOptions { frame: 1 << 42, ..Default::default() };
    let err = assembler
        .assemble(&range, &options, &Cancellation::new())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRange(_)));
}

#[test]
fn window_is_clipped_to_chromosome_for_every_direction() {
    let assembler = assembler(AssemblySettings::default());
    let range = GenomicRange::new(CHROMOSOME, 2900, 1_000_000_000_000);
    for direction in [None, Some(TrackDirection::None), Some(TrackDirection::Middle)] {
        let options = QueryOptions {
            track_direction: direction,
            frame: 1 << 42,
            ..Default::default()
        };
        let track = assembler
            .assemble(&range, &options, &Cancellation::new())
            .unwrap();
        assert_eq!(track.end_index, CHROMOSOME_LENGTH, "{:?}", direction);
    }
}

#[test]
fn load_read_returns_qualities_and_tags() {
    let source = fixture();
    let track = assembler(AssemblySettings::default())
        .assemble(&query_range(), &QueryOptions::default(), &Cancellation::new())
        .unwrap();

    let block = &track.blocks[0];
    let read = source
        .load_read(CHROMOSOME, &block.name, block.start_index, block.end_index)
        .unwrap();
    assert_eq!(read.summary(), *block);
    assert!(!read.qualities.is_empty());
    assert!(read.tags.contains_key("NM"));
}

#[test]
fn consensus_has_one_base_per_position_at_scale_one() {
    let calculator = ConsensusCalculator::new(
        Arc::new(fixture()),
        Arc::new(reference()),
        AssemblySettings::default(),
    );
    let track = calculator
        .calculate(
            &GenomicRange::new(CHROMOSOME, 100, 140),
            &ReadFilter::default(),
            &Cancellation::new(),
        )
        .unwrap();

    assert_eq!(track.blocks.len(), 41);
    for (i, base) in track.blocks.iter().enumerate() {
        assert_eq!(base.start_index, 100 + i as u64);
        assert_eq!(base.start_index, base.end_index);
        assert!("ACGTN".contains(base.base));
    }
}

#[test]
fn consensus_bucket_count_follows_scale() {
    let calculator = ConsensusCalculator::new(
        Arc::new(fixture()),
        Arc::new(reference()),
        AssemblySettings::default(),
    );
    let range = GenomicRange::new(CHROMOSOME, 1, 2000).with_scale_factor(0.0105);
    let track = calculator
        .calculate(&range, &ReadFilter::default(), &Cancellation::new())
        .unwrap();

    // 2000 positions in buckets of 95
    assert_eq!(track.blocks.len(), 22);
    assert_eq!(track.blocks.last().unwrap().end_index, 2000);
}

#[test]
fn consensus_outside_reads_uses_reference() {
    let calculator = ConsensusCalculator::new(
        Arc::new(fixture()),
        Arc::new(reference()),
        AssemblySettings::default(),
    );
    let track = calculator
        .calculate(
            &GenomicRange::new(CHROMOSOME, 2995, 3005),
            &ReadFilter::default(),
            &Cancellation::new(),
        )
        .unwrap();

    assert_eq!(track.blocks.len(), 11);
    assert!(track.blocks.iter().all(|b| b.from_reference));
    assert_eq!(track.blocks[0].base, 'T');
    assert_eq!(track.blocks[5].base, 'C');
    // Past the chromosome end
    assert_eq!(track.blocks[10].base, 'N');
}
