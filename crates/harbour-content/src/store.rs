use std::io::{Cursor, SeekFrom};
use std::sync::Arc;

use harbour_crypto::ContentHasher;
use harbour_types::{ObjectRecord, Oid};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{ContentError, ContentResult};
use crate::traits::{BlobReader, ByteStorage};

/// Uploads up to this size are verified in memory; larger ones are spooled
/// to an anonymous temporary file.
pub const DEFAULT_MEMORY_SPOOL_LIMIT: u64 = 8 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

/// Holds an upload while it is being verified.
enum Spool {
    Memory(Vec<u8>),
    File(File),
}

impl Spool {
    async fn for_size(declared: u64, memory_limit: u64) -> ContentResult<Self> {
        if declared <= memory_limit {
            let capacity = usize::try_from(declared).unwrap_or(0);
            Ok(Self::Memory(Vec::with_capacity(capacity)))
        } else {
            let file = tokio::task::spawn_blocking(tempfile::tempfile)
                .await
                .map_err(|e| ContentError::Backend(format!("spool task failed: {e}")))??;
            Ok(Self::File(File::from_std(file)))
        }
    }

    async fn append(&mut self, chunk: &[u8]) -> ContentResult<()> {
        match self {
            Self::Memory(buf) => buf.extend_from_slice(chunk),
            Self::File(file) => file.write_all(chunk).await?,
        }
        Ok(())
    }

    async fn into_reader(self) -> ContentResult<BlobReader> {
        match self {
            Self::Memory(buf) => Ok(Box::new(Cursor::new(buf))),
            Self::File(mut file) => {
                file.flush().await?;
                file.seek(SeekFrom::Start(0)).await?;
                Ok(Box::new(file))
            }
        }
    }
}

/// Verifying blob store.
///
/// Nothing reaches the backend until the uploaded bytes have been counted
/// and hashed and both match the record they claim to be.
#[derive(Clone)]
pub struct ContentStore {
    backend: Arc<dyn ByteStorage>,
    memory_spool_limit: u64,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn ByteStorage>) -> Self {
        Self {
            backend,
            memory_spool_limit: DEFAULT_MEMORY_SPOOL_LIMIT,
        }
    }

    pub fn with_memory_spool_limit(mut self, limit: u64) -> Self {
        self.memory_spool_limit = limit;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Verify `reader` against `record` and store it.
    ///
    /// Fails with `SizeMismatch` if the byte count differs from the declared
    /// size (reading stops as soon as the declared size is exceeded) and
    /// with `HashMismatch` if the digest differs from the oid. After the
    /// write, the backend's stored size is read back and checked again.
    pub async fn put<R>(&self, record: &ObjectRecord, mut reader: R) -> ContentResult<()>
    where
        R: AsyncRead + Send + Unpin,
    {
        let oid = record.oid;
        let declared = u64::try_from(record.size).map_err(|_| ContentError::SizeMismatch {
            expected: record.size,
            actual: 0,
        })?;

        let mut hasher = ContentHasher::new();
        let mut spool = Spool::for_size(declared, self.memory_spool_limit).await?;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
            if hasher.bytes_hashed() > declared {
                warn!(oid = %oid, declared, "upload exceeds declared size");
                return Err(ContentError::SizeMismatch {
                    expected: record.size,
                    actual: hasher.bytes_hashed(),
                });
            }
            spool.append(&chunk[..n]).await?;
        }

        let received = hasher.bytes_hashed();
        if received != declared {
            warn!(oid = %oid, declared, received, "upload shorter than declared size");
            return Err(ContentError::SizeMismatch {
                expected: record.size,
                actual: received,
            });
        }
        let computed = hasher.finalize();
        if computed != oid {
            warn!(oid = %oid, computed = %computed, "upload does not hash to its oid");
            return Err(ContentError::HashMismatch {
                expected: oid.to_hex(),
                actual: computed.to_hex(),
            });
        }

        let mut verified = spool.into_reader().await?;
        self.backend.write(&oid, &mut verified, declared).await?;

        match self.backend.size(&oid).await? {
            Some(stored) if stored == declared => {
                debug!(oid = %oid, size = declared, "content stored");
                Ok(())
            }
            stored => {
                let stored = stored.unwrap_or(0);
                warn!(oid = %oid, declared, stored, "stored size disagrees with declared size");
                Err(ContentError::SizeMismatch {
                    expected: record.size,
                    actual: stored,
                })
            }
        }
    }

    /// Stream the stored bytes of `record`.
    pub async fn get(&self, record: &ObjectRecord) -> ContentResult<BlobReader> {
        self.backend
            .open(&record.oid)
            .await?
            .ok_or_else(|| ContentError::NotFound(record.oid.to_hex()))
    }

    /// Whether bytes are stored for `record`. Backend faults are logged and
    /// reported as absent.
    pub async fn exists(&self, record: &ObjectRecord) -> bool {
        match self.backend.exists(&record.oid).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(oid = %record.oid, error = %e, "content existence check failed");
                false
            }
        }
    }

    /// Discard stored bytes. Returns `true` if they existed.
    pub async fn delete(&self, oid: &Oid) -> ContentResult<bool> {
        let deleted = self.backend.delete(oid).await?;
        if deleted {
            debug!(oid = %oid, "content deleted");
        }
        Ok(deleted)
    }
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("backend", &self.backend.backend_name())
            .field("memory_spool_limit", &self.memory_spool_limit)
            .finish()
    }
}
