//! Aligned reads as handed to the track engine.
//!
//! [`AlignedRead`] is decoupled from any file format: the BAM adapter in
//! [`crate::source`] converts noodles records into it, and the in-memory source
//! builds it directly.

use crate::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// SAM flag bits consulted by the engine.
pub mod flags {
    pub const UNMAPPED: u16 = 0x4;
    pub const REVERSE: u16 = 0x10;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// Read orientation relative to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strand {
    Positive,
    Negative,
}

/// CIGAR operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarKind {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Pad,
    SequenceMatch,
    SequenceMismatch,
}

impl CigarKind {
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarKind::Match
                | CigarKind::Deletion
                | CigarKind::Skip
                | CigarKind::SequenceMatch
                | CigarKind::SequenceMismatch
        )
    }

    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            CigarKind::Match
                | CigarKind::Insertion
                | CigarKind::SoftClip
                | CigarKind::SequenceMatch
                | CigarKind::SequenceMismatch
        )
    }

    pub fn is_clip(self) -> bool {
        matches!(self, CigarKind::SoftClip | CigarKind::HardClip)
    }

    fn symbol(self) -> char {
        match self {
            CigarKind::Match => 'M',
            CigarKind::Insertion => 'I',
            CigarKind::Deletion => 'D',
            CigarKind::Skip => 'N',
            CigarKind::SoftClip => 'S',
            CigarKind::HardClip => 'H',
            CigarKind::Pad => 'P',
            CigarKind::SequenceMatch => '=',
            CigarKind::SequenceMismatch => 'X',
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        Some(match c {
            'M' => CigarKind::Match,
            'I' => CigarKind::Insertion,
            'D' => CigarKind::Deletion,
            'N' => CigarKind::Skip,
            'S' => CigarKind::SoftClip,
            'H' => CigarKind::HardClip,
            'P' => CigarKind::Pad,
            '=' => CigarKind::SequenceMatch,
            'X' => CigarKind::SequenceMismatch,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub kind: CigarKind,
    pub len: u32,
}

impl CigarOp {
    pub fn new(kind: CigarKind, len: u32) -> Self {
        Self { kind, len }
    }
}

/// Run-length alignment description. Serialized as its SAM text form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar(Vec<CigarOp>);

impl Cigar {
    pub fn new(ops: Vec<CigarOp>) -> Self {
        Self(ops)
    }

    pub fn ops(&self) -> &[CigarOp] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of reference bases spanned by the alignment.
    pub fn reference_len(&self) -> u64 {
        self.0
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| u64::from(op.len))
            .sum()
    }

    /// Clipped bases (soft + hard) before the first aligned base.
    pub fn leading_clip_len(&self) -> u64 {
        self.0
            .iter()
            .take_while(|op| op.kind.is_clip())
            .map(|op| u64::from(op.len))
            .sum()
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("*");
        }
        for op in &self.0 {
            write!(f, "{}{}", op.len, op.kind.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for Cigar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "*" || s.is_empty() {
            return Ok(Cigar::default());
        }

        let mut ops = Vec::new();
        let mut len: Option<u32> = None;

        for c in s.chars() {
            if let Some(digit) = c.to_digit(10) {
                let current = len.unwrap_or(0);
                len = Some(
                    current
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(digit))
                        .ok_or_else(|| Error::InvalidInput(format!("CIGAR length overflow: {}", s)))?,
                );
                continue;
            }

            let kind = CigarKind::from_symbol(c)
                .ok_or_else(|| Error::InvalidInput(format!("invalid CIGAR operation '{}' in {}", c, s)))?;
            let op_len = len
                .take()
                .ok_or_else(|| Error::InvalidInput(format!("missing CIGAR length in {}", s)))?;
            if op_len > 0 {
                ops.push(CigarOp::new(kind, op_len));
            }
        }

        if len.is_some() {
            return Err(Error::InvalidInput(format!("trailing CIGAR length in {}", s)));
        }

        Ok(Cigar(ops))
    }
}

impl Serialize for Cigar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One aligned read, 1-based inclusive coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedRead {
    pub id: String,
    pub name: String,
    pub start_index: u64,
    pub end_index: u64,
    pub strand: Strand,
    #[serde(rename = "cigarString")]
    pub cigar: Cigar,
    #[serde(rename = "flagMask")]
    pub flags: u16,
    pub mapping_quality: u8,
    #[serde(rename = "tLen")]
    pub template_length: i32,
    #[serde(rename = "pNext")]
    pub mate_position: u64,
    #[serde(rename = "rNext")]
    pub mate_reference: String,
    pub sequence: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub qualities: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl AlignedRead {
    /// Build a mapped, forward-strand read with no mate.
    ///
    /// The end index is derived from the CIGAR.
    pub fn new(name: impl Into<String>, start_index: u64, cigar: Cigar, sequence: impl Into<String>) -> Self {
        let name = name.into();
        let span = cigar.reference_len().max(1);
        Self {
            id: read_id(&name, start_index, 0),
            name,
            start_index,
            end_index: start_index + span - 1,
            strand: Strand::Positive,
            cigar,
            flags: 0,
            mapping_quality: 60,
            template_length: 0,
            mate_position: 0,
            mate_reference: "*".to_string(),
            sequence: sequence.into(),
            qualities: String::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_flags(mut self, bits: u16) -> Self {
        self.flags = bits;
        self.strand = if bits & flags::REVERSE != 0 {
            Strand::Negative
        } else {
            Strand::Positive
        };
        self.id = read_id(&self.name, self.start_index, bits);
        self
    }

    pub fn with_mate(mut self, reference: impl Into<String>, position: u64, template_length: i32) -> Self {
        self.mate_reference = reference.into();
        self.mate_position = position;
        self.template_length = template_length;
        self
    }

    pub fn with_qualities(mut self, qualities: impl Into<String>) -> Self {
        self.qualities = qualities.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(tag.into(), value.into());
        self
    }

    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start_index <= end && self.end_index >= start
    }

    /// Copy without qualities and tags, as shipped in track blocks.
    pub fn summary(&self) -> AlignedRead {
        AlignedRead {
            qualities: String::new(),
            tags: BTreeMap::new(),
            ..self.clone()
        }
    }
}

/// Stable identifier for a read within a file: name, start and flags.
pub fn read_id(name: &str, start_index: u64, flags: u16) -> String {
    format!("{}:{}:{}", name, start_index, flags)
}
