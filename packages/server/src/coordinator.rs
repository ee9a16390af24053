//! Upload coordination: one binary transfer plus one two-part metadata write,
//! joined under a deadline, with compensation when either side fails.
//!
//! ```text
//! Initiated -> MetadataPending -> Bound
//!                              -> Failed    (transfer or metadata failed; compensated)
//!                              -> Orphaned  (both succeeded, locator bind failed)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use common::upload::{UploadEngine, UploadError, UploadId, UploadInfo, locator_from_location};
use common::{TrackDescriptor, TrackId};
use serde::Serialize;
use tokio::io::AsyncRead;
use tracing::{Span, debug, error, field, info, instrument, warn};

use crate::tracks::{RepositoryError, TrackRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Initiated,
    MetadataPending,
    Bound,
    Failed,
    Orphaned,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadState::Initiated => "initiated",
            UploadState::MetadataPending => "metadata_pending",
            UploadState::Bound => "bound",
            UploadState::Failed => "failed",
            UploadState::Orphaned => "orphaned",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("upload transfer failed: {0}")]
    Transfer(#[source] UploadError),
    #[error("track metadata write failed: {0}")]
    Metadata(#[source] RepositoryError),
    #[error("upload did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Terminal result of a coordinated upload that was not `Failed`.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub track_id: TrackId,
    pub upload: UploadInfo,
    pub locator: String,
    pub state: UploadState,
}

#[derive(Clone)]
pub struct UploadCoordinator {
    engine: Arc<dyn UploadEngine>,
    repo: TrackRepository,
    join_timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(engine: Arc<dyn UploadEngine>, repo: TrackRepository, join_timeout: Duration) -> Self {
        Self {
            engine,
            repo,
            join_timeout,
        }
    }

    /// Run one upload to a terminal state.
    ///
    /// Every attempt allocates a new track id; retrying a failed upload never
    /// reuses the failed one.
    #[instrument(
        skip(self, descriptor, body),
        fields(track_id = field::Empty, upload_id = field::Empty)
    )]
    pub async fn upload(
        &self,
        owner_id: i32,
        length: u64,
        descriptor: TrackDescriptor,
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<UploadReport, CoordinatorError> {
        let track_id = TrackId::generate();
        let upload = self
            .engine
            .create(length)
            .await
            .map_err(CoordinatorError::Transfer)?;

        let span = Span::current();
        span.record("track_id", field::display(track_id));
        span.record("upload_id", field::display(upload.id));
        debug!(state = %UploadState::Initiated, "Upload created");

        let transfer = async {
            self.engine
                .write(&upload.id, 0, body)
                .await
                .map_err(CoordinatorError::Transfer)
        };
        let metadata = async {
            self.repo
                .begin_track_as(track_id, owner_id, descriptor)
                .await
                .map_err(CoordinatorError::Metadata)
        };

        debug!(state = %UploadState::MetadataPending, "Transfer and metadata write started");
        let joined = tokio::time::timeout(self.join_timeout, async {
            tokio::try_join!(transfer, metadata)
        })
        .await;

        let info = match joined {
            Ok(Ok((info, ()))) => info,
            Ok(Err(e)) => {
                self.compensate(track_id, upload.id).await;
                warn!(state = %UploadState::Failed, error = %e, "Upload failed");
                return Err(e);
            }
            Err(_) => {
                self.compensate(track_id, upload.id).await;
                warn!(state = %UploadState::Failed, "Upload timed out");
                return Err(CoordinatorError::Timeout(self.join_timeout));
            }
        };

        let location = info.location();
        let locator = locator_from_location(&location)
            .unwrap_or_default()
            .to_string();

        let state = match self.repo.bind_locator(track_id, &locator).await {
            Ok(()) => UploadState::Bound,
            Err(e) => {
                // Metadata exists without a pointer and the object is
                // unreferenced. Left for manual reconciliation.
                error!(state = %UploadState::Orphaned, error = %e, %locator, "Track orphaned");
                UploadState::Orphaned
            }
        };

        info!(%state, offset = info.offset, length = info.length, "Upload finished");
        Ok(UploadReport {
            track_id,
            upload: info,
            locator,
            state,
        })
    }

    /// Best-effort: failures are logged, never escalated.
    async fn compensate(&self, track_id: TrackId, upload_id: UploadId) {
        match self.repo.delete(track_id).await {
            Ok(()) | Err(RepositoryError::NotFound(_)) => {}
            Err(e) => warn!(%track_id, error = %e, "Compensation: failed to delete track metadata"),
        }
        if let Err(e) = self.engine.terminate(&upload_id).await {
            warn!(%upload_id, error = %e, "Compensation: failed to terminate upload");
        }
    }
}
