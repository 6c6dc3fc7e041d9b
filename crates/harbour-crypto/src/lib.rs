//! Cryptographic primitives for the Harbour object store.
//!
//! - [`ContentHasher`] -- incremental SHA-256 producing an [`Oid`](harbour_types::Oid)
//! - [`PasswordHasher`] -- Argon2id PHC hashes for stored credentials
//!
//! All crypto operations wrap established libraries; no custom primitives.

pub mod hasher;
pub mod password;

pub use hasher::ContentHasher;
pub use password::{PasswordError, PasswordHasher};
