use super::remote::{self, Location, ReadSeek, RemoteFile};
use super::{ReadSource, ReadStream};
use crate::read::{AlignedRead, Cigar, CigarKind, CigarOp, Strand, read_id};
use crate::{Error, Result};
use noodles::bam;
use noodles::bam::bai;
use noodles::bgzf;
use noodles::bgzf::VirtualPosition;
use noodles::core::Position;
use noodles::core::region::Interval;
use noodles::csi::binning_index::BinningIndex;
use noodles::sam;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::data::field::value::Array;
use reqwest::Client;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;

/// Indexed BAM file opened for read streaming.
///
/// The BAI index and the header are loaded once at open time; every
/// [`fetch`](ReadSource::fetch) opens its own reader, so streams are
/// independent and can run on separate worker threads. The file may be local
/// or served over HTTP.
pub struct BamReadSource {
    location: Location,
    header: Arc<sam::Header>,
    index: Arc<bai::Index>,
}

impl BamReadSource {
    /// Open a BAM file and its BAI index
    pub async fn open(bam_path: &Path, index_path: &Path) -> Result<Self> {
        let index = bai::r#async::read(index_path)
            .await
            .map_err(|e| Error::Corrupt(format!("failed to read BAI index: {}", e)))?;

        let header = Self::read_header(bam_path).await?;

        tracing::debug!(
            "opened {:?} with {} reference sequences",
            bam_path,
            header.reference_sequences().len()
        );

        Ok(Self {
            location: Location::Local(bam_path.to_path_buf()),
            header: Arc::new(header),
            index: Arc::new(index),
        })
    }

    /// Open a BAM file and its BAI index over HTTP.
    ///
    /// The index is downloaded whole; the header and records are read with
    /// range requests.
    pub async fn open_remote(client: &Client, bam_url: &str, index_url: &str) -> Result<Self> {
        let bytes = remote::download(client, index_url).await?;
        let index = bai::io::Reader::new(Cursor::new(bytes))
            .read_index()
            .map_err(|e| Error::Corrupt(format!("failed to read BAI index {}: {}", index_url, e)))?;

        let file = RemoteFile::open(client.clone(), bam_url).await?;
        let header = tokio::task::spawn_blocking({
            let file = file.clone();
            move || decode_header(file.reader())
        })
        .await
        .map_err(|e| Error::Internal(format!("header task failed: {}", e)))??;

        tracing::debug!(
            "opened {} ({} bytes) with {} reference sequences",
            bam_url,
            file.len(),
            header.reference_sequences().len()
        );

        Ok(Self {
            location: Location::Remote(file),
            header: Arc::new(header),
            index: Arc::new(index),
        })
    }

    /// Read the BAM header from a file
    pub async fn read_header(bam_path: &Path) -> Result<sam::Header> {
        let file = File::open(bam_path)
            .await
            .map_err(|e| Error::NotFound(format!("failed to open BAM file: {}", e)))?;

        // bam::Reader::new wraps the file in a BGZF reader internally - don't double-wrap
        let mut reader = bam::r#async::io::Reader::new(file);

        reader
            .read_header()
            .await
            .map_err(|e| Error::Corrupt(format!("failed to read BAM header: {}", e)))
    }

    pub fn header(&self) -> &sam::Header {
        &self.header
    }

    /// Index chunks for a window, sorted and merged so records come out in file order.
    fn chunks(&self, reference_sequence_id: usize, start: u64, end: u64) -> Result<Vec<(VirtualPosition, VirtualPosition)>> {
        let start = Position::try_from(start as usize)
            .map_err(|e| Error::InvalidRange(format!("invalid start position: {}", e)))?;
        let end = Position::try_from(end as usize)
            .map_err(|e| Error::InvalidRange(format!("invalid end position: {}", e)))?;
        let interval = Interval::from(start..=end);

        let mut chunks: Vec<(VirtualPosition, VirtualPosition)> = self
            .index
            .query(reference_sequence_id, interval)
            .map_err(|e| Error::Corrupt(format!("index query failed: {}", e)))?
            .into_iter()
            .map(|chunk| (chunk.start(), chunk.end()))
            .collect();

        chunks.sort_by_key(|(start, _)| *start);

        let mut merged: Vec<(VirtualPosition, VirtualPosition)> = Vec::with_capacity(chunks.len());
        for (start, end) in chunks {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        Ok(merged)
    }
}

impl ReadSource for BamReadSource {
    fn fetch(&self, chromosome: &str, start: u64, end: u64) -> Result<ReadStream<'_>> {
        let Some(reference_sequence_id) = self
            .header
            .reference_sequences()
            .get_index_of(chromosome.as_bytes())
        else {
            tracing::debug!("{} not present in {}", chromosome, self.location);
            return Ok(Box::new(std::iter::empty()));
        };

        let chunks = self.chunks(reference_sequence_id, start, end)?;

        // Every chunk starts with a seek, so the header is never re-read here.
        let reader = bam::io::Reader::new(self.location.open()?);

        Ok(Box::new(BamQuery {
            reader,
            header: Arc::clone(&self.header),
            chunks: chunks.into_iter(),
            chunk_end: None,
            reference_sequence_id,
            start,
            end,
            record: bam::Record::default(),
            done: false,
        }))
    }
}

/// Pull-based walk over the index chunks of one window.
struct BamQuery {
    reader: bam::io::Reader<bgzf::Reader<Box<dyn ReadSeek>>>,
    header: Arc<sam::Header>,
    chunks: std::vec::IntoIter<(VirtualPosition, VirtualPosition)>,
    chunk_end: Option<VirtualPosition>,
    reference_sequence_id: usize,
    start: u64,
    end: u64,
    record: bam::Record,
    done: bool,
}

impl BamQuery {
    /// Load the next raw record into `self.record`, moving across chunks.
    /// Returns false once every chunk is exhausted.
    fn advance(&mut self) -> Result<bool> {
        loop {
            if let Some(chunk_end) = self.chunk_end {
                if self.reader.get_ref().virtual_position() < chunk_end {
                    let n = self
                        .reader
                        .read_record(&mut self.record)
                        .map_err(|e| Error::Corrupt(format!("failed to read BAM record: {}", e)))?;
                    if n > 0 {
                        return Ok(true);
                    }
                }
            }

            let Some((chunk_start, chunk_end)) = self.chunks.next() else {
                return Ok(false);
            };

            self.reader
                .get_mut()
                .seek(chunk_start)
                .map_err(|e| Error::Corrupt(format!("failed to seek BAM file: {}", e)))?;
            self.chunk_end = Some(chunk_end);
        }
    }
}

impl Iterator for BamQuery {
    type Item = Result<AlignedRead>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.advance() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }

            let record = match RecordBuf::try_from_alignment_record(&self.header, &self.record) {
                Ok(record) => record,
                Err(e) => return Some(Err(Error::BadRecord(e.to_string()))),
            };

            if record.reference_sequence_id() != Some(self.reference_sequence_id)
                || record.flags().is_unmapped()
            {
                continue;
            }

            let Some(alignment_start) = record.alignment_start() else {
                continue;
            };

            // Coordinate-sorted input: nothing further can overlap the window.
            if alignment_start.get() as u64 > self.end {
                self.done = true;
                return None;
            }

            let read = to_aligned_read(&self.header, &record, alignment_start);
            if read.end_index >= self.start {
                return Some(Ok(read));
            }
        }

        None
    }
}

fn decode_header<R: Read>(reader: R) -> Result<sam::Header> {
    bam::io::Reader::new(reader)
        .read_header()
        .map_err(|e| Error::Corrupt(format!("failed to read BAM header: {}", e)))
}

fn to_aligned_read(header: &sam::Header, record: &RecordBuf, alignment_start: Position) -> AlignedRead {
    let name = record
        .name()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "*".to_string());

    let start_index = alignment_start.get() as u64;
    let flags = record.flags().bits();

    let cigar = Cigar::new(
        record
            .cigar()
            .as_ref()
            .iter()
            .map(|op| CigarOp::new(cigar_kind(op.kind()), op.len() as u32))
            .collect(),
    );
    let end_index = start_index + cigar.reference_len().max(1) - 1;

    let mate_reference = match record.mate_reference_sequence_id() {
        Some(id) if Some(id) == record.reference_sequence_id() => "=".to_string(),
        Some(id) => header
            .reference_sequences()
            .get_index(id)
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| "*".to_string()),
        None => "*".to_string(),
    };

    let sequence = String::from_utf8_lossy(record.sequence().as_ref()).into_owned();
    let qualities = record
        .quality_scores()
        .as_ref()
        .iter()
        .map(|q| (q + 33) as char)
        .collect();

    let tags: BTreeMap<String, String> = record
        .data()
        .iter()
        .map(|(tag, value)| (format_tag(tag), format_tag_value(value)))
        .collect();

    AlignedRead {
        id: read_id(&name, start_index, flags),
        name,
        start_index,
        end_index,
        strand: if record.flags().is_reverse_complemented() {
            Strand::Negative
        } else {
            Strand::Positive
        },
        cigar,
        flags,
        mapping_quality: record.mapping_quality().map_or(255, |q| q.get()),
        template_length: record.template_length(),
        mate_position: record.mate_alignment_start().map_or(0, |p| p.get() as u64),
        mate_reference,
        sequence,
        qualities,
        tags,
    }
}

fn cigar_kind(kind: Kind) -> CigarKind {
    match kind {
        Kind::Match => CigarKind::Match,
        Kind::Insertion => CigarKind::Insertion,
        Kind::Deletion => CigarKind::Deletion,
        Kind::Skip => CigarKind::Skip,
        Kind::SoftClip => CigarKind::SoftClip,
        Kind::HardClip => CigarKind::HardClip,
        Kind::Pad => CigarKind::Pad,
        Kind::SequenceMatch => CigarKind::SequenceMatch,
        Kind::SequenceMismatch => CigarKind::SequenceMismatch,
    }
}

fn format_tag(tag: Tag) -> String {
    let bytes: [u8; 2] = tag.into();
    String::from_utf8_lossy(&bytes).to_string()
}

fn format_tag_value(value: &Value) -> String {
    match value {
        Value::Character(c) => char::from(*c).to_string(),
        Value::Int8(n) => n.to_string(),
        Value::UInt8(n) => n.to_string(),
        Value::Int16(n) => n.to_string(),
        Value::UInt16(n) => n.to_string(),
        Value::Int32(n) => n.to_string(),
        Value::UInt32(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::String(s) => s.to_string(),
        Value::Hex(h) => format!("{h:?}").trim_matches('"').to_string(),
        Value::Array(array) => format_array(array),
    }
}

fn format_array(array: &Array) -> String {
    fn join<T: ToString>(values: &[T]) -> String {
        values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }

    match array {
        Array::Int8(v) => format!("c,{}", join(v)),
        Array::UInt8(v) => format!("C,{}", join(v)),
        Array::Int16(v) => format!("s,{}", join(v)),
        Array::UInt16(v) => format!("S,{}", join(v)),
        Array::Int32(v) => format!("i,{}", join(v)),
        Array::UInt32(v) => format!("I,{}", join(v)),
        Array::Float(v) => format!("f,{}", join(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SingleReadLookup;

    const TEST_BAM: &str = "tests/data/sample.bam";
    const TEST_BAI: &str = "tests/data/sample.bam.bai";

    #[test]
    fn test_cigar_kind_mapping() {
        assert_eq!(cigar_kind(Kind::Skip), CigarKind::Skip);
        assert_eq!(cigar_kind(Kind::SoftClip), CigarKind::SoftClip);
        assert_eq!(cigar_kind(Kind::SequenceMismatch), CigarKind::SequenceMismatch);
    }

    #[test]
    fn test_format_tag_values() {
        assert_eq!(format_tag(Tag::from([b'N', b'M'])), "NM");
        assert_eq!(format_tag_value(&Value::Int32(3)), "3");
        assert_eq!(format_tag_value(&Value::String("grp1".into())), "grp1");
        assert_eq!(
            format_tag_value(&Value::Array(Array::UInt8(vec![1, 2, 3]))),
            "C,1,2,3"
        );
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = BamReadSource::read_header(Path::new("tests/data/does-not-exist.bam")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_from_bam() {
        let (bam_path, bai_path) = (Path::new(TEST_BAM), Path::new(TEST_BAI));
        if !bam_path.exists() || !bai_path.exists() {
            return;
        }

        let source = BamReadSource::open(bam_path, bai_path).await.unwrap();
        let Some((name, map)) = source.header().reference_sequences().first() else {
            return;
        };
        let chromosome = name.to_string();
        let length = usize::from(map.length()) as u64;

        let reads: Vec<AlignedRead> = source
            .fetch(&chromosome, 1, length)
            .unwrap()
            .filter_map(|r| r.ok())
            .take(50)
            .collect();

        for pair in reads.windows(2) {
            assert!(pair[0].start_index <= pair[1].start_index);
        }

        if let Some(first) = reads.first() {
            let loaded = source
                .load_read(&chromosome, &first.name, first.start_index, first.end_index)
                .unwrap();
            assert_eq!(loaded.name, first.name);
            assert!(!loaded.cigar.is_empty());
        }
    }
}
