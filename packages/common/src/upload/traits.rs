use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use super::UPLOAD_PATH;
use super::error::UploadError;
use super::id::UploadId;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Persistent state of one resumable upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub id: UploadId,
    /// Declared total length in bytes.
    pub length: u64,
    /// Bytes received so far.
    pub offset: u64,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the content, hex encoded. Set once `offset == length`.
    pub checksum: Option<String>,
}

impl UploadInfo {
    pub fn is_complete(&self) -> bool {
        self.offset == self.length
    }

    /// Path at which the upload is served.
    pub fn location(&self) -> String {
        format!("{UPLOAD_PATH}/{}", self.id)
    }
}

/// Resumable object storage addressed by opaque upload identifiers.
#[async_trait]
pub trait UploadEngine: Send + Sync {
    /// Reserve a new upload of `length` bytes.
    async fn create(&self, length: u64) -> Result<UploadInfo, UploadError>;

    /// Append bytes from `reader` starting at `offset`.
    ///
    /// `offset` must equal the upload's current offset. Bytes persisted before
    /// a read error are kept, so the client can resume from the new offset.
    async fn write(
        &self,
        id: &UploadId,
        offset: u64,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<UploadInfo, UploadError>;

    async fn info(&self, id: &UploadId) -> Result<UploadInfo, UploadError>;

    /// Stream a completed upload.
    async fn open(&self, id: &UploadId) -> Result<(UploadInfo, BoxReader), UploadError>;

    /// Remove an upload and its data.
    ///
    /// Returns `true` if the upload was removed, `false` if it did not exist.
    async fn terminate(&self, id: &UploadId) -> Result<bool, UploadError>;
}
