use harbour_types::Oid;
use sha2::{Digest, Sha256};

/// Incremental SHA-256 hasher for object content.
///
/// Bytes are fed in as they arrive from a stream; [`finalize`](Self::finalize)
/// yields the [`Oid`] the content is stored under. The hasher also counts the
/// bytes it has seen so callers can check a declared size in the same pass.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    bytes_hashed: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot digest of an in-memory buffer.
    pub fn digest(data: &[u8]) -> Oid {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.bytes_hashed += chunk.len() as u64;
    }

    /// Total number of bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }

    pub fn finalize(self) -> Oid {
        let digest = self.inner.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Oid::from_digest(out)
    }
}

impl std::fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHasher")
            .field("bytes_hashed", &self.bytes_hashed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hello world")
    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn digest_matches_known_vector() {
        let oid = ContentHasher::digest(b"hello world");
        assert_eq!(oid.to_hex(), HELLO_WORLD);
    }

    #[test]
    fn empty_input() {
        let oid = ContentHasher::digest(b"");
        assert_eq!(
            oid.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn chunked_equals_one_shot() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"hello");
        hasher.update(b" ");
        hasher.update(b"world");
        assert_eq!(hasher.bytes_hashed(), 11);
        assert_eq!(hasher.finalize().to_hex(), HELLO_WORLD);
    }
}
