use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harbour_types::Oid;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::{ContentError, ContentResult};
use crate::traits::{BlobReader, ByteStorage};

/// Blob storage on a local filesystem.
///
/// Objects live at `<root>/<hex[0..2]>/<hex[2..4]>/<hex>`. A write goes to a
/// uniquely named temporary file beside its destination and is renamed into
/// place once synced, so readers only ever see complete objects.
#[derive(Clone, Debug)]
pub struct FsByteStorage {
    root: PathBuf,
}

impl FsByteStorage {
    /// Use `root` as the storage directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> ContentResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, oid: &Oid) -> PathBuf {
        let hex = oid.to_hex();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(hex)
    }

    async fn write_partial(
        path: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        len: u64,
    ) -> ContentResult<()> {
        let mut file = File::create(path).await?;
        let mut limited = reader.take(len);
        let copied = tokio::io::copy(&mut limited, &mut file).await?;
        if copied != len {
            return Err(ContentError::SizeMismatch {
                expected: i64::try_from(len).unwrap_or(i64::MAX),
                actual: copied,
            });
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

fn missing<T>(e: std::io::Error, none: T) -> ContentResult<T> {
    if e.kind() == ErrorKind::NotFound {
        Ok(none)
    } else {
        Err(e.into())
    }
}

#[async_trait]
impl ByteStorage for FsByteStorage {
    fn backend_name(&self) -> &'static str {
        "fs"
    }

    async fn open(&self, key: &Oid) -> ContentResult<Option<BlobReader>> {
        match File::open(self.path_for(key)).await {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) => missing(e, None),
        }
    }

    async fn write(
        &self,
        key: &Oid,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        len: u64,
    ) -> ContentResult<()> {
        let dest = self.path_for(key);
        let dir = dest
            .parent()
            .ok_or_else(|| ContentError::Backend(format!("no parent for {}", dest.display())))?;
        fs::create_dir_all(dir).await?;

        let partial = dir.join(format!(".{}.{}.partial", key.to_hex(), uuid::Uuid::now_v7()));
        if let Err(e) = Self::write_partial(&partial, reader, len).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&partial, &dest).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        debug!(oid = %key, len, path = %dest.display(), "blob written");
        Ok(())
    }

    async fn size(&self, key: &Oid) -> ContentResult<Option<u64>> {
        match fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) => missing(e, None),
        }
    }

    async fn delete(&self, key: &Oid) -> ContentResult<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) => missing(e, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbour_crypto::ContentHasher;

    async fn read_all(mut reader: BlobReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[test]
    fn layout_is_two_level_fanout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsByteStorage::new(dir.path()).unwrap();
        let oid = ContentHasher::digest(b"hello world");
        let path = storage.path_for(&oid);
        let rel = path.strip_prefix(storage.root()).unwrap();
        assert_eq!(
            rel,
            Path::new("b9").join("4d").join(oid.to_hex()).as_path()
        );
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsByteStorage::new(dir.path()).unwrap();
        let oid = ContentHasher::digest(b"abc");

        assert!(storage.open(&oid).await.unwrap().is_none());
        assert_eq!(storage.size(&oid).await.unwrap(), None);

        let mut src: &[u8] = b"abc";
        storage.write(&oid, &mut src, 3).await.unwrap();
        assert!(storage.exists(&oid).await.unwrap());
        assert_eq!(storage.size(&oid).await.unwrap(), Some(3));
        assert_eq!(read_all(storage.open(&oid).await.unwrap().unwrap()).await, b"abc");
    }

    #[tokio::test]
    async fn short_input_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsByteStorage::new(dir.path()).unwrap();
        let oid = ContentHasher::digest(b"abcdef");

        let mut src: &[u8] = b"abc";
        let err = storage.write(&oid, &mut src, 6).await.unwrap_err();
        assert!(matches!(err, ContentError::SizeMismatch { expected: 6, actual: 3 }));
        assert!(!storage.exists(&oid).await.unwrap());

        let shard = storage.path_for(&oid).parent().unwrap().to_path_buf();
        assert_eq!(std::fs::read_dir(shard).unwrap().count(), 0, "no partial files");
    }

    #[tokio::test]
    async fn write_reads_at_most_len_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsByteStorage::new(dir.path()).unwrap();
        let oid = ContentHasher::digest(b"ab");

        let mut src: &[u8] = b"abcdef";
        storage.write(&oid, &mut src, 2).await.unwrap();
        assert_eq!(storage.size(&oid).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn rewrite_replaces_and_delete_removes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsByteStorage::new(dir.path().join("nested")).unwrap();
        let oid = ContentHasher::digest(b"x");

        let mut first: &[u8] = b"x";
        storage.write(&oid, &mut first, 1).await.unwrap();
        let mut second: &[u8] = b"x";
        storage.write(&oid, &mut second, 1).await.unwrap();
        assert_eq!(storage.size(&oid).await.unwrap(), Some(1));

        assert!(storage.delete(&oid).await.unwrap());
        assert!(!storage.delete(&oid).await.unwrap());
        assert!(!storage.exists(&oid).await.unwrap());
    }
}
