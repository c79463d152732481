use super::{Storage, validate_id};
use crate::source::{ReadSource, ReferenceLookup};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage over sources registered in memory.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    reads: HashMap<String, Arc<dyn ReadSource>>,
    references: HashMap<String, Arc<dyn ReferenceLookup>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reads(mut self, id: &str, source: impl ReadSource + 'static) -> Self {
        self.reads.insert(id.to_string(), Arc::new(source));
        self
    }

    pub fn with_reference(mut self, id: &str, reference: impl ReferenceLookup + 'static) -> Self {
        self.references.insert(id.to_string(), Arc::new(reference));
        self
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn open_reads(&self, id: &str) -> Result<Arc<dyn ReadSource>> {
        validate_id(id)?;
        self.reads
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn open_reference(&self, id: &str) -> Result<Arc<dyn ReferenceLookup>> {
        validate_id(id)?;
        self.references
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}
