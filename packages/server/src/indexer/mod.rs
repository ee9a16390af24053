//! Search projection of track descriptors.
//!
//! Writers enqueue [`IndexEvent`]s on an unbounded outbox and return
//! immediately; a single background task applies them to the configured
//! [`SearchIndex`] in order. [`Indexer::flush`] waits until everything
//! enqueued before it has been applied.

pub mod elasticsearch;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use common::search::{QueryError, SearchQuery};
use common::{TrackDocument, TrackId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::tracks::{RepositoryError, TrackRepository};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("search backend error: {0}")]
    Backend(String),
    #[error("search backend unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("indexer outbox is closed")]
    Closed,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, doc: &TrackDocument) -> Result<(), SearchError>;
    async fn remove(&self, id: TrackId) -> Result<(), SearchError>;
    /// Drop every document.
    async fn clear(&self) -> Result<(), SearchError>;
    async fn search(&self, query: &SearchQuery) -> Result<Vec<TrackDocument>, SearchError>;
    /// Distinct titles starting with `prefix`, case-insensitive.
    async fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<String>, SearchError>;
}

#[derive(Debug)]
pub enum IndexEvent {
    Upsert(TrackDocument),
    Remove(TrackId),
    Reset,
    Flush(oneshot::Sender<()>),
}

/// Handle to the outbox and the index it feeds. Cheap to clone.
#[derive(Clone)]
pub struct Indexer {
    tx: mpsc::UnboundedSender<IndexEvent>,
    index: Arc<dyn SearchIndex>,
}

impl Indexer {
    /// Start the consumer task on the current runtime.
    pub fn spawn(index: Arc<dyn SearchIndex>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_indexer(index.clone(), rx));
        Self { tx, index }
    }

    fn enqueue(&self, event: IndexEvent) {
        if self.tx.send(event).is_err() {
            warn!("Indexer outbox closed, dropping event");
        }
    }

    pub fn index_track(&self, doc: TrackDocument) {
        self.enqueue(IndexEvent::Upsert(doc));
    }

    pub fn remove_track(&self, id: TrackId) {
        self.enqueue(IndexEvent::Remove(id));
    }

    /// Staleness barrier: resolves once every earlier event is applied.
    pub async fn flush(&self) -> Result<(), SearchError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(IndexEvent::Flush(done_tx))
            .map_err(|_| SearchError::Closed)?;
        done_rx.await.map_err(|_| SearchError::Closed)
    }

    /// Clear the index and re-project every complete track.
    pub async fn rebuild(&self, repo: &TrackRepository) -> Result<usize, SearchError> {
        let tracks = repo.list().await?;
        let count = tracks.len();
        self.enqueue(IndexEvent::Reset);
        for track in tracks {
            self.enqueue(IndexEvent::Upsert(track.document()));
        }
        self.flush().await?;
        info!(count, "Search index rebuilt");
        Ok(count)
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<TrackDocument>, SearchError> {
        self.index.search(query).await
    }

    pub async fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        self.index.suggest(prefix, limit).await
    }
}

/// Apply outbox events until every sender is dropped.
async fn run_indexer(index: Arc<dyn SearchIndex>, mut rx: mpsc::UnboundedReceiver<IndexEvent>) {
    info!("Search indexer started");

    while let Some(event) = rx.recv().await {
        match event {
            IndexEvent::Upsert(doc) => {
                if let Err(e) = index.upsert(&doc).await {
                    error!(track_id = %doc.id, error = %e, "Failed to index track");
                } else {
                    debug!(track_id = %doc.id, "Track indexed");
                }
            }
            IndexEvent::Remove(id) => {
                if let Err(e) = index.remove(id).await {
                    error!(track_id = %id, error = %e, "Failed to remove track from index");
                }
            }
            IndexEvent::Reset => {
                if let Err(e) = index.clear().await {
                    error!(error = %e, "Failed to clear search index");
                }
            }
            IndexEvent::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    info!("Search indexer stopped");
}
