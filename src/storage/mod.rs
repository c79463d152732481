//! Storage backend abstraction for alignment and reference files.
//!
//! A storage backend resolves file ids to opened collaborators: a
//! [`ReadSource`] for alignment files and a [`ReferenceLookup`] for reference
//! genomes. Opening binds the file handle and loads its index once.
//!
//! # Implementations
//!
//! - [`LocalStorage`] - Local filesystem storage
//! - [`HttpStorage`] - Files under a base URL, read with HTTP range requests
//! - [`MemoryStorage`] - In-memory sources, registered by id
//!
//! # Example
//!
//! ```no_run
//! use bamtrack::storage::{Storage, LocalStorage};
//! use std::path::PathBuf;
//!
//! let storage = LocalStorage::new(PathBuf::from("./data"));
//! ```

mod http;
mod local;
mod memory;

pub use http::HttpStorage;
pub use local::LocalStorage;
pub use memory::MemoryStorage;

use crate::source::{ReadSource, ReferenceLookup};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Kind of file a storage id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileKind {
    /// Coordinate-sorted BAM with a BAI index
    Reads,
    /// FASTA with an FAI index
    Reference,
}

impl FileKind {
    /// Data file extensions, in lookup order.
    pub(crate) fn extensions(self) -> &'static [&'static str] {
        match self {
            FileKind::Reads => &["bam"],
            FileKind::Reference => &["fa", "fasta"],
        }
    }

    pub(crate) fn index_extension(self) -> &'static str {
        match self {
            FileKind::Reads => "bai",
            FileKind::Reference => "fai",
        }
    }
}

/// Storage backend trait for opening alignment and reference files
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open an alignment file for streaming
    async fn open_reads(&self, id: &str) -> Result<Arc<dyn ReadSource>>;

    /// Open a reference genome for base lookups
    async fn open_reference(&self, id: &str) -> Result<Arc<dyn ReferenceLookup>>;
}

/// Reject ids that could escape the storage root.
pub fn validate_id(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id.contains(['/', '\\'])
        || id.contains("..")
        || id.chars().any(char::is_control);
    if bad {
        return Err(Error::InvalidInput(format!("invalid file id: {:?}", id)));
    }
    Ok(())
}
