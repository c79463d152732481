use super::ReferenceLookup;
use super::remote::{self, Location, ReadSeek, RemoteFile};
use crate::{Error, Result};
use noodles::fasta::fai;
use reqwest::Client;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// Indexed FASTA reference with single-base random access.
pub struct FastaReference {
    location: Location,
    index: fai::Index,
    file: Mutex<Box<dyn ReadSeek>>,
}

impl FastaReference {
    /// Open a FASTA file and its FAI index
    pub async fn open(fasta_path: &Path, index_path: &Path) -> Result<Self> {
        // Read the FAI index (synchronous, then wrap in async context)
        let index = tokio::task::spawn_blocking({
            let path = index_path.to_path_buf();
            move || fai::read(&path)
        })
        .await
        .map_err(|e| Error::Internal(format!("failed to read FAI index: {}", e)))?
        .map_err(|e| Error::Corrupt(format!("failed to read FAI index: {}", e)))?;

        Self::with_index(Location::Local(fasta_path.to_path_buf()), index)
    }

    /// Open a FASTA file and its FAI index over HTTP.
    ///
    /// Base lookups issue range requests and block, like reads from a local file.
    pub async fn open_remote(client: &Client, fasta_url: &str, index_url: &str) -> Result<Self> {
        let bytes = remote::download(client, index_url).await?;
        let index = fai::io::Reader::new(Cursor::new(bytes))
            .read_index()
            .map_err(|e| Error::Corrupt(format!("failed to read FAI index {}: {}", index_url, e)))?;

        let file = RemoteFile::open(client.clone(), fasta_url).await?;
        Self::with_index(Location::Remote(file), index)
    }

    fn with_index(location: Location, index: fai::Index) -> Result<Self> {
        let file = location.open()?;

        tracing::debug!("opened {} with {} sequences", location, index.as_ref().len());

        Ok(Self {
            location,
            index,
            file: Mutex::new(file),
        })
    }

    fn record(&self, chromosome: &str) -> Option<&fai::Record> {
        // FAI Index wraps Vec<Record>, access via as_ref()
        self.index
            .as_ref()
            .iter()
            .find(|r| r.name() == chromosome.as_bytes())
    }
}

impl ReferenceLookup for FastaReference {
    fn base_at(&self, chromosome: &str, position: u64) -> Result<u8> {
        let out_of_range = || Error::OutOfRange(format!("{}:{}", chromosome, position));

        let record = self.record(chromosome).ok_or_else(out_of_range)?;
        let length = record.length() as u64;
        if position == 0 || position > length {
            return Err(out_of_range());
        }

        let line_bases = record.line_bases() as u64;
        let line_width = record.line_width() as u64;
        if line_bases == 0 {
            return Err(Error::Corrupt(format!(
                "FAI record for {} has zero line length",
                chromosome
            )));
        }

        let base = position - 1;
        let byte_offset = record.offset() + (base / line_bases) * line_width + base % line_bases;

        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::Internal("FASTA file lock poisoned".to_string()))?;
        let mut buf = [0u8; 1];
        file.seek(SeekFrom::Start(byte_offset))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| Error::Corrupt(format!("failed to read {}: {}", self.location, e)))?;

        Ok(buf[0].to_ascii_uppercase())
    }

    fn chromosome_length(&self, chromosome: &str) -> Option<u64> {
        self.record(chromosome).map(|r| r.length() as u64)
    }
}
