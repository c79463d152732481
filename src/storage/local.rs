use super::{FileKind, Storage, validate_id};
use crate::source::{BamReadSource, FastaReference, ReadSource, ReferenceLookup};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct LocalStorage {
    data_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// First existing candidate, or the primary name when none exists.
    fn make_file_path(&self, id: &str, kind: FileKind) -> PathBuf {
        let candidates: Vec<PathBuf> = kind
            .extensions()
            .iter()
            .map(|ext| self.data_dir.join(format!("{}.{}", id, ext)))
            .collect();

        candidates
            .iter()
            .find(|path| path.exists())
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }

    /// Index next to `path`, appended (`file.bam.bai`) before replaced (`file.bai`).
    fn index_path(path: &Path, kind: FileKind) -> Option<PathBuf> {
        let idx_ext = kind.index_extension();

        let appended_idx = PathBuf::from(format!("{}.{}", path.display(), idx_ext));
        if appended_idx.exists() {
            return Some(appended_idx);
        }

        let replaced_idx = path.with_extension(idx_ext);
        if replaced_idx.exists() {
            return Some(replaced_idx);
        }

        None
    }

    fn require_file(&self, id: &str, kind: FileKind) -> Result<(PathBuf, PathBuf)> {
        validate_id(id)?;
        let path = self.make_file_path(id, kind);
        if !path.exists() {
            return Err(Error::NotFound(id.to_string()));
        }
        let index = Self::index_path(&path, kind).ok_or_else(|| {
            Error::NotFound(format!("{} has no .{} index", id, kind.index_extension()))
        })?;
        Ok((path, index))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn open_reads(&self, id: &str) -> Result<Arc<dyn ReadSource>> {
        let (path, index) = self.require_file(id, FileKind::Reads)?;
        let source = BamReadSource::open(&path, &index).await?;
        Ok(Arc::new(source))
    }

    async fn open_reference(&self, id: &str) -> Result<Arc<dyn ReferenceLookup>> {
        let (path, index) = self.require_file(id, FileKind::Reference)?;
        let reference = FastaReference::open(&path, &index).await?;
        Ok(Arc::new(reference))
    }
}
