use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use harbour_types::Oid;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ContentError, ContentResult};
use crate::traits::{BlobReader, ByteStorage};

fn poisoned<T>(e: PoisonError<T>) -> ContentError {
    ContentError::Backend(format!("lock poisoned: {e}"))
}

/// In-memory blob storage for tests and embedding.
#[derive(Default)]
pub struct InMemoryByteStorage {
    blobs: RwLock<HashMap<Oid, Bytes>>,
}

impl InMemoryByteStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ByteStorage for InMemoryByteStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, key: &Oid) -> ContentResult<Option<BlobReader>> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs
            .get(key)
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as BlobReader))
    }

    async fn write(
        &self,
        key: &Oid,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        len: u64,
    ) -> ContentResult<()> {
        let mut buf = Vec::new();
        reader.take(len).read_to_end(&mut buf).await?;
        if buf.len() as u64 != len {
            return Err(ContentError::SizeMismatch {
                expected: i64::try_from(len).unwrap_or(i64::MAX),
                actual: buf.len() as u64,
            });
        }
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        blobs.insert(*key, Bytes::from(buf));
        Ok(())
    }

    async fn size(&self, key: &Oid) -> ContentResult<Option<u64>> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.get(key).map(|b| b.len() as u64))
    }

    async fn delete(&self, key: &Oid) -> ContentResult<bool> {
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        Ok(blobs.remove(key).is_some())
    }
}

impl std::fmt::Debug for InMemoryByteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryByteStorage")
            .field("blob_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbour_crypto::ContentHasher;

    #[tokio::test]
    async fn write_read_delete() {
        let storage = InMemoryByteStorage::new();
        let oid = ContentHasher::digest(b"data");
        assert!(storage.is_empty());

        let mut src: &[u8] = b"data";
        storage.write(&oid, &mut src, 4).await.unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.size(&oid).await.unwrap(), Some(4));

        let mut out = Vec::new();
        storage
            .open(&oid)
            .await
            .unwrap()
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"data");

        assert!(storage.delete(&oid).await.unwrap());
        assert!(!storage.exists(&oid).await.unwrap());
        assert!(storage.open(&oid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn short_write_is_rejected() {
        let storage = InMemoryByteStorage::new();
        let oid = ContentHasher::digest(b"data");
        let mut src: &[u8] = b"da";
        assert!(storage.write(&oid, &mut src, 4).await.is_err());
        assert!(storage.is_empty());
    }
}
