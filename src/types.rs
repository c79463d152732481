use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Windowing mode for "load more reads toward this edge" queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackDirection {
    #[default]
    None,
    Left,
    Right,
    Middle,
}

/// Coordinate range on one chromosome, 1-based inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenomicRange {
    pub chromosome: String,
    pub start_index: u64,
    pub end_index: u64,
    /// Output units per base; below 1.0 several bases share one unit.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_direction: Option<TrackDirection>,
}

fn default_scale_factor() -> f64 {
    1.0
}

impl GenomicRange {
    pub fn new(chromosome: impl Into<String>, start_index: u64, end_index: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            start_index,
            end_index,
            scale_factor: 1.0,
            track_direction: None,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_direction(mut self, direction: TrackDirection) -> Self {
        self.track_direction = Some(direction);
        self
    }

    /// Same chromosome and scale, new bounds, no direction.
    pub fn with_bounds(&self, start_index: u64, end_index: u64) -> Self {
        Self {
            chromosome: self.chromosome.clone(),
            start_index,
            end_index,
            scale_factor: self.scale_factor,
            track_direction: None,
        }
    }

    /// Number of positions covered by the range.
    pub fn width(&self) -> u64 {
        self.end_index - self.start_index + 1
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start_index && position <= self.end_index
    }

    pub fn validate(&self) -> Result<()> {
        if self.chromosome.is_empty() {
            return Err(Error::InvalidRange("chromosome is empty".to_string()));
        }
        if self.start_index == 0 {
            return Err(Error::InvalidRange(format!(
                "start index must be 1-based, got {}",
                self.start_index
            )));
        }
        if self.start_index > self.end_index {
            return Err(Error::InvalidRange(format!(
                "start index {} is after end index {}",
                self.start_index, self.end_index
            )));
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(Error::InvalidRange(format!(
                "scale factor must be positive, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Count values at or above this are treated as "no cap".
pub const UNBOUNDED_COUNT: i64 = 1_000_000;

/// Per-call track options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default)]
    pub track_direction: Option<TrackDirection>,
    #[serde(default)]
    pub show_splice_junction: Option<bool>,
    #[serde(default)]
    pub show_clipping: Option<bool>,
    #[serde(default)]
    pub filter_duplicate: bool,
    #[serde(default)]
    pub filter_not_primary: bool,
    #[serde(default)]
    pub filter_vendor_quality_fail: bool,
    #[serde(default)]
    pub filter_supplementary_alignment: bool,
    #[serde(default)]
    pub frame: i64,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default = "default_down_sampling")]
    pub down_sampling: bool,
}

fn default_down_sampling() -> bool {
    true
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            track_direction: None,
            show_splice_junction: None,
            show_clipping: None,
            filter_duplicate: false,
            filter_not_primary: false,
            filter_vendor_quality_fail: false,
            filter_supplementary_alignment: false,
            frame: 0,
            count: None,
            down_sampling: default_down_sampling(),
        }
    }
}

impl QueryOptions {
    /// Detail-read cap, or `None` when the count cannot bound anything.
    pub fn read_cap(&self) -> Option<usize> {
        match self.count {
            Some(count) if count > 0 && count < UNBOUNDED_COUNT => Some(count as usize),
            _ => None,
        }
    }

    /// Bin width when downsampling is in effect.
    ///
    /// `downSampling == false` always wins, then `frame <= 0` disables it.
    pub fn downsample_frame(&self) -> Option<u64> {
        if !self.down_sampling || self.frame <= 0 {
            return None;
        }
        Some(self.frame as u64)
    }

    pub fn splice_junctions_enabled(&self) -> bool {
        self.show_splice_junction.unwrap_or(true)
    }

    pub fn clipping_enabled(&self) -> bool {
        self.show_clipping.unwrap_or(false)
    }
}

/// Positional result set over a genomic range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track<T> {
    pub chromosome: String,
    pub start_index: u64,
    pub end_index: u64,
    pub scale_factor: f64,
    pub blocks: Vec<T>,
    pub base_coverage: Vec<CoverageValue>,
    pub downsample_coverage: Vec<CoverageBin>,
    pub splice_junctions: Vec<Interval>,
}

impl<T> Track<T> {
    pub fn empty(window: &GenomicRange) -> Self {
        Self {
            chromosome: window.chromosome.clone(),
            start_index: window.start_index,
            end_index: window.end_index,
            scale_factor: window.scale_factor,
            blocks: Vec::new(),
            base_coverage: Vec::new(),
            downsample_coverage: Vec::new(),
            splice_junctions: Vec::new(),
        }
    }
}

/// A/C/G/T/N tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCounts {
    pub a: u32,
    pub c: u32,
    pub g: u32,
    pub t: u32,
    pub n: u32,
}

impl BaseCounts {
    pub fn from_array(counts: [u32; 5]) -> Self {
        let [a, c, g, t, n] = counts;
        Self { a, c, g, t, n }
    }

    pub fn total(&self) -> u32 {
        self.a + self.c + self.g + self.t + self.n
    }
}

/// Depth at one position of the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageValue {
    pub position: u64,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bases: Option<BaseCounts>,
}

/// Aggregated depth over a frame-sized sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageBin {
    pub start_index: u64,
    pub end_index: u64,
    /// Mean per-base depth over the bin.
    pub coverage: f64,
    /// Accepted reads starting in the bin.
    pub reads: u32,
    /// Reads left out of the track blocks.
    pub downsampled: u32,
}

/// Half-open interval `[start_index, end_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start_index: u64,
    pub end_index: u64,
}

/// Consensus call for one bucket of positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusBase {
    pub start_index: u64,
    pub end_index: u64,
    pub base: char,
    pub depth: u64,
    pub counts: [u64; 5],
    /// True when no read covered the bucket and the reference base was used.
    pub from_reference: bool,
}

/// Request body for `POST /reads/{id}/track`.
#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub range: GenomicRange,
    #[serde(default)]
    pub options: QueryOptions,
    /// Reference genome id, used to clip windows at the chromosome end.
    pub reference: Option<String>,
}

/// Filter flags accepted by consensus requests.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterFlags {
    #[serde(default)]
    pub filter_duplicate: bool,
    #[serde(default)]
    pub filter_not_primary: bool,
    #[serde(default)]
    pub filter_vendor_quality_fail: bool,
    #[serde(default)]
    pub filter_supplementary_alignment: bool,
}

/// Request body for `POST /reads/{id}/consensus`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusRequest {
    pub range: GenomicRange,
    pub reference: Option<String>,
    #[serde(default)]
    pub filters: FilterFlags,
    /// Count clipped bases next to the aligned part; off when absent.
    #[serde(default)]
    pub show_clipping: Option<bool>,
}

/// Query parameters for single-read lookups.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuery {
    pub chromosome: String,
    pub name: String,
    pub start_index: u64,
    pub end_index: u64,
}

/// Service info response (GA4GH service-info spec)
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub organization: Organization,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}
