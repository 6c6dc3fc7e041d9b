//! Content-addressed blob storage for the Harbour object store.
//!
//! Bytes are stored under the SHA-256 digest of their content. The
//! [`ContentStore`] front refuses any upload whose size or digest does not
//! match the record it claims to be, so shared, deduplicated storage cannot
//! be poisoned by a misbehaving client.
//!
//! # Storage Backends
//!
//! All backends implement the async [`ByteStorage`] trait:
//!
//! - [`FsByteStorage`] -- fanned-out directory tree with atomic renames
//! - [`InMemoryByteStorage`] -- `HashMap`-based store for tests and embedding

pub mod error;
pub mod fs;
pub mod memory;
pub mod store;
pub mod traits;

pub use error::{ContentError, ContentResult};
pub use fs::FsByteStorage;
pub use memory::InMemoryByteStorage;
pub use store::{ContentStore, DEFAULT_MEMORY_SPOOL_LIMIT};
pub use traits::{BlobReader, ByteStorage};
