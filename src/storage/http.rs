//! HTTP/HTTPS storage backend for alignment and reference files.
//!
//! Files live under one base URL with the same naming as [`LocalStorage`]:
//! `<id>.bam` with `<id>.bam.bai` or `<id>.bai`, and `<id>.fa`/`<id>.fasta`
//! with a `.fai` index. The server must honor HTTP `Range` requests.
//!
//! [`LocalStorage`]: super::LocalStorage

use super::{FileKind, Storage, validate_id};
use crate::source::{BamReadSource, FastaReference, ReadSource, ReferenceLookup, remote};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// HTTP/HTTPS storage backend.
pub struct HttpStorage {
    client: Client,
    base_url: String,
}

impl HttpStorage {
    /// Create a new HttpStorage instance.
    ///
    /// * `base_url` - Base URL for data files (e.g., "https://example.com/data/")
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Construct the URL for a data file.
    fn file_url(&self, id: &str, ext: &str) -> String {
        format!("{}/{}.{}", self.base_url, id, ext)
    }

    /// Data and index URLs for `id`, found with HEAD requests.
    async fn resolve(&self, id: &str, kind: FileKind) -> Result<(String, String)> {
        validate_id(id)?;

        let mut data_url = None;
        for ext in kind.extensions() {
            let url = self.file_url(id, ext);
            if remote::url_exists(&self.client, &url).await {
                data_url = Some(url);
                break;
            }
        }
        let data_url = data_url.ok_or_else(|| Error::NotFound(id.to_string()))?;

        let idx_ext = kind.index_extension();
        // e.g., sample.bam.bai, then sample.bai
        let appended = format!("{}.{}", data_url, idx_ext);
        let replaced = self.file_url(id, idx_ext);
        for index_url in [appended, replaced] {
            if remote::url_exists(&self.client, &index_url).await {
                return Ok((data_url, index_url));
            }
        }

        Err(Error::NotFound(format!("{} has no .{} index", id, idx_ext)))
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn open_reads(&self, id: &str) -> Result<Arc<dyn ReadSource>> {
        let (bam_url, index_url) = self.resolve(id, FileKind::Reads).await?;
        let source = BamReadSource::open_remote(&self.client, &bam_url, &index_url).await?;
        Ok(Arc::new(source))
    }

    async fn open_reference(&self, id: &str) -> Result<Arc<dyn ReferenceLookup>> {
        let (fasta_url, index_url) = self.resolve(id, FileKind::Reference).await?;
        let reference = FastaReference::open_remote(&self.client, &fasta_url, &index_url).await?;
        Ok(Arc::new(reference))
    }
}
