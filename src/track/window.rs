use crate::types::{GenomicRange, TrackDirection};

/// Effective fetch window for a range, direction and frame.
///
/// Coordinates are 1-based. LEFT and MIDDLE windows never start before 1, and
/// every window end is clipped to `chromosome_length` when it is known.
pub fn resolve_window(
    range: &GenomicRange,
    direction: Option<TrackDirection>,
    frame: i64,
    chromosome_length: Option<u64>,
) -> GenomicRange {
    let (start, end) = if frame <= 0 {
        (range.start_index, range.end_index)
    } else {
        let frame = frame as u64;
        match direction.unwrap_or_default() {
            TrackDirection::None => (range.start_index, range.end_index),
            TrackDirection::Left => (
                range.start_index.saturating_sub(frame).max(1),
                range.start_index,
            ),
            TrackDirection::Right => (range.end_index, range.end_index.saturating_add(frame)),
            TrackDirection::Middle => (
                range.start_index.saturating_sub(frame / 2).max(1),
                range.end_index.saturating_add(frame / 2),
            ),
        }
    };

    // A window past the chromosome end collapses onto its start.
    let end = match chromosome_length {
        Some(length) => end.min(length).max(start),
        None => end,
    };

    range.with_bounds(start, end)
}

/// Partition `window` into at most `parts` contiguous sub-windows.
///
/// Internal boundaries fall on multiples of `alignment` counted from the window
/// start, so per-bin state never straddles two sub-windows.
pub fn split_window(window: &GenomicRange, parts: usize, alignment: u64) -> Vec<GenomicRange> {
    let width = window.width();
    let parts = (parts.max(1) as u64).min(width);
    let alignment = alignment.max(1);

    let chunk = width.div_ceil(parts).div_ceil(alignment) * alignment;

    let mut windows = Vec::with_capacity(parts as usize);
    let mut start = window.start_index;
    while start <= window.end_index {
        let end = start.saturating_add(chunk - 1).min(window.end_index);
        windows.push(window.with_bounds(start, end));
        if end == window.end_index {
            break;
        }
        start = end + 1;
    }
    windows
}
