//! Async entry points over the blocking track engine.
//!
//! Each query opens its collaborators from storage, then runs on tokio's
//! blocking pool. Dropping the returned future cancels the running query.

use crate::read::AlignedRead;
use crate::source::{NoReference, ReferenceLookup, SingleReadLookup};
use crate::storage::Storage;
use crate::track::{
    AssemblySettings, CancelOnDrop, Cancellation, ConsensusCalculator, ReadFilter, TrackAssembler,
};
use crate::types::{ConsensusBase, ConsensusRequest, ReadQuery, Track, TrackRequest};
use crate::{Error, Result};
use rayon::ThreadPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct TrackEngine {
    storage: Arc<dyn Storage>,
    settings: AssemblySettings,
    pool: Arc<ThreadPool>,
}

impl TrackEngine {
    pub fn new(storage: Arc<dyn Storage>, settings: AssemblySettings) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers.max(1))
            .thread_name(|i| format!("bamtrack-worker-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build worker pool: {}", e)))?;

        Ok(Self {
            storage,
            settings,
            pool: Arc::new(pool),
        })
    }

    pub fn settings(&self) -> &AssemblySettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Read track for file `id`.
    pub async fn get_track(
        &self,
        id: &str,
        request: TrackRequest,
        cancel: &Cancellation,
    ) -> Result<Track<AlignedRead>> {
        request.range.validate()?;

        let source = self.storage.open_reads(id).await.map_err(open_failure)?;
        let reference = self.open_reference(request.reference.as_deref()).await?;
        let assembler = TrackAssembler::new(source, reference, self.settings)
            .with_pool(Arc::clone(&self.pool));

        tracing::debug!(
            "track {} {}:{}-{} scale {}",
            id,
            request.range.chromosome,
            request.range.start_index,
            request.range.end_index,
            request.range.scale_factor
        );

        let TrackRequest { range, options, .. } = request;
        run_blocking(cancel, move |cancel| {
            assembler.assemble(&range, &options, cancel)
        })
        .await
    }

    /// Consensus track for file `id`.
    pub async fn get_consensus(
        &self,
        id: &str,
        request: ConsensusRequest,
        cancel: &Cancellation,
    ) -> Result<Track<ConsensusBase>> {
        request.range.validate()?;

        let source = self.storage.open_reads(id).await.map_err(open_failure)?;
        let reference = self.open_reference(request.reference.as_deref()).await?;
        let calculator = ConsensusCalculator::new(source, reference, self.settings)
            .with_pool(Arc::clone(&self.pool))
            .with_clipping(request.show_clipping.unwrap_or(false));

        let filter = ReadFilter::from(request.filters);
        let range = request.range;
        run_blocking(cancel, move |cancel| {
            calculator.calculate(&range, &filter, cancel)
        })
        .await
    }

    /// One read with qualities and tags.
    pub async fn load_read(&self, id: &str, query: ReadQuery) -> Result<AlignedRead> {
        let source = self.storage.open_reads(id).await.map_err(open_failure)?;

        run_blocking(&Cancellation::new(), move |_| {
            source.load_read(&query.chromosome, &query.name, query.start_index, query.end_index)
        })
        .await
    }

    async fn open_reference(&self, id: Option<&str>) -> Result<Arc<dyn ReferenceLookup>> {
        match id {
            Some(id) => self.storage.open_reference(id).await,
            None => Ok(Arc::new(NoReference)),
        }
    }
}

/// Unknown ids stay `NotFound`; anything else about opening means the source is unusable.
fn open_failure(e: Error) -> Error {
    match e {
        Error::NotFound(_) | Error::InvalidInput(_) => e,
        other => other.into_source_unavailable(),
    }
}

/// Run `work` on the blocking pool, cancelling it if this future is dropped.
async fn run_blocking<T, F>(cancel: &Cancellation, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Cancellation) -> Result<T> + Send + 'static,
{
    let cancel = cancel.child();
    let guard = CancelOnDrop::new(cancel.clone());

    let result = tokio::task::spawn_blocking(move || work(&cancel))
        .await
        .map_err(|e| Error::Internal(format!("query task failed: {}", e)))?;

    guard.disarm();
    result
}
