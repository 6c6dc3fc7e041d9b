use async_trait::async_trait;
use harbour_types::Oid;
use tokio::io::AsyncRead;

use crate::error::ContentResult;

/// A boxed byte stream handed out by [`ByteStorage::open`].
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Durable byte storage keyed by oid.
///
/// Backends store exactly what they are given. Verification against the
/// key happens above them, in [`ContentStore`](crate::ContentStore).
/// Implementations must satisfy these invariants:
/// - A write is all-or-nothing: a partial write is never visible under
///   the final key.
/// - Rewriting a key replaces it with the new bytes.
/// - Missing keys are `Ok(None)` / `Ok(false)`, never errors.
#[async_trait]
pub trait ByteStorage: Send + Sync {
    /// Short name used in logs.
    fn backend_name(&self) -> &'static str;

    /// Open the stored bytes for reading.
    async fn open(&self, key: &Oid) -> ContentResult<Option<BlobReader>>;

    /// Store exactly `len` bytes read from `reader` under `key`.
    async fn write(
        &self,
        key: &Oid,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        len: u64,
    ) -> ContentResult<()>;

    /// Size of the stored bytes, as reported by the backend.
    async fn size(&self, key: &Oid) -> ContentResult<Option<u64>>;

    async fn exists(&self, key: &Oid) -> ContentResult<bool> {
        Ok(self.size(key).await?.is_some())
    }

    /// Remove the stored bytes. Returns `true` if they existed.
    async fn delete(&self, key: &Oid) -> ContentResult<bool>;
}
