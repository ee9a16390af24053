use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::UploadError;
use super::id::UploadId;
use super::traits::{BoxReader, UploadEngine, UploadInfo};

const READ_BUF: usize = 64 * 1024;

/// Filesystem-backed resumable upload engine.
///
/// Each upload is a pair of files in one flat directory:
/// `{base_path}/{id}.bin` holds the bytes, `{base_path}/{id}.info` the JSON
/// [`UploadInfo`]. Writes to the same upload are serialized by a per-upload
/// lock; different uploads proceed in parallel.
pub struct FilesystemUploadEngine {
    base_path: PathBuf,
    max_size: u64,
    locks: DashMap<UploadId, Arc<Mutex<()>>>,
}

impl FilesystemUploadEngine {
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, UploadError> {
        fs::create_dir_all(&base_path).await?;
        Ok(Self {
            base_path,
            max_size,
            locks: DashMap::new(),
        })
    }

    fn data_path(&self, id: &UploadId) -> PathBuf {
        self.base_path.join(format!("{id}.bin"))
    }

    fn info_path(&self, id: &UploadId) -> PathBuf {
        self.base_path.join(format!("{id}.info"))
    }

    fn lock_for(&self, id: &UploadId) -> Arc<Mutex<()>> {
        self.locks.entry(*id).or_default().value().clone()
    }

    /// Drop the lock entry unless another caller still holds or awaits it.
    /// Callers must drop their own clone first.
    fn release_lock(&self, id: &UploadId) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn load_info(&self, id: &UploadId) -> Result<UploadInfo, UploadError> {
        match fs::read(self.info_path(id)).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(UploadError::NotFound(id.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist info via temp file + rename so readers never see a torn file.
    async fn store_info(&self, info: &UploadInfo) -> Result<(), UploadError> {
        let path = self.info_path(&info.id);
        let temp_path = path.with_extension("info.tmp");
        let raw = serde_json::to_vec(info)?;
        if let Err(e) = fs::write(&temp_path, raw).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Append `reader` at `offset`. The caller holds the upload's lock.
    async fn write_locked(
        &self,
        id: &UploadId,
        offset: u64,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<UploadInfo, UploadError> {
        let mut info = self.load_info(id).await?;
        if offset != info.offset {
            return Err(UploadError::OffsetMismatch {
                expected: info.offset,
                actual: offset,
            });
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .open(self.data_path(id))
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let remaining = info.length - info.offset;
        let mut written: u64 = 0;
        let mut buf = vec![0u8; READ_BUF];

        let outcome: Result<(), UploadError> = loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(e.into()),
            };

            if written + n as u64 > remaining {
                // The whole write is discarded, not just the overflow.
                file.flush().await?;
                file.set_len(offset).await?;
                return Err(UploadError::LengthExceeded {
                    length: info.length,
                });
            }

            if let Err(e) = file.write_all(&buf[..n]).await {
                break Err(e.into());
            }
            written += n as u64;
        };

        file.flush().await?;
        file.set_len(offset + written).await?;
        file.sync_data().await?;
        drop(file);

        info.offset += written;
        if info.is_complete() {
            info.checksum = Some(self.digest(id).await?);
        }
        self.store_info(&info).await?;

        debug!(
            upload_id = %id,
            offset = info.offset,
            length = info.length,
            written,
            "Upload chunk persisted"
        );

        outcome.map(|()| info)
    }

    /// Remove both files; `false` when the upload did not exist.
    async fn remove_files(&self, id: &UploadId) -> Result<bool, UploadError> {
        let removed = match fs::remove_file(self.info_path(id)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(self.data_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(removed)
    }

    async fn digest(&self, id: &UploadId) -> Result<String, UploadError> {
        let mut file = fs::File::open(self.data_path(id)).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_BUF];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl UploadEngine for FilesystemUploadEngine {
    async fn create(&self, length: u64) -> Result<UploadInfo, UploadError> {
        if length > self.max_size {
            return Err(UploadError::SizeLimitExceeded {
                declared: length,
                limit: self.max_size,
            });
        }

        let id = UploadId::generate();
        fs::File::create(self.data_path(&id)).await?;

        let mut info = UploadInfo {
            id,
            length,
            offset: 0,
            created_at: Utc::now(),
            checksum: None,
        };
        if length == 0 {
            info.checksum = Some(self.digest(&id).await?);
        }
        self.store_info(&info).await?;

        debug!(upload_id = %id, length, "Upload created");
        Ok(info)
    }

    async fn write(
        &self,
        id: &UploadId,
        offset: u64,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<UploadInfo, UploadError> {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            self.write_locked(id, offset, reader).await
        };
        drop(lock);
        self.release_lock(id);
        result
    }

    async fn info(&self, id: &UploadId) -> Result<UploadInfo, UploadError> {
        self.load_info(id).await
    }

    async fn open(&self, id: &UploadId) -> Result<(UploadInfo, BoxReader), UploadError> {
        let info = self.load_info(id).await?;
        if !info.is_complete() {
            return Err(UploadError::Incomplete {
                offset: info.offset,
                length: info.length,
            });
        }
        match fs::File::open(self.data_path(id)).await {
            Ok(file) => Ok((info, Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(UploadError::NotFound(id.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn terminate(&self, id: &UploadId) -> Result<bool, UploadError> {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            self.remove_files(id).await
        };
        drop(lock);
        self.release_lock(id);
        let removed = result?;

        debug!(upload_id = %id, removed, "Upload terminated");
        Ok(removed)
    }
}
