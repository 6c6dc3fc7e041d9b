//! Metadata lifecycle for the Harbour object store.
//!
//! Tracks what the store knows about each object, which projects reference
//! it, and who may ask. Byte storage lives in `harbour-content`.
//!
//! # Key Types
//!
//! - [`ObjectService`] -- the facade consumed by the protocol layer
//! - [`ObjectLedger`] -- two-phase `Pending` -> `Committed` lifecycle
//! - [`ProjectIndex`] -- project to object associations
//! - [`CredentialStore`] -- basic-auth verification and user management
//! - [`DirectoryAuthenticator`] -- external directory used instead of local users
//!
//! # Storage Backends
//!
//! All backends implement the [`MetadataStore`] trait and are selected at
//! startup through [`MetaBackend`]:
//!
//! - [`InMemoryMetaStore`] -- map-based store for tests and embedding
//! - [`SqliteMetaStore`] -- single-file SQLite database

pub mod backend;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod project;
pub mod service;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod testing;

pub use backend::MetaBackend;
pub use credentials::{parse_basic, AuthMode, CredentialStore};
pub use directory::{
    escape_dn_value, escape_filter_value, DirectoryAuth, DirectoryAuthenticator, DirectoryEntry,
    DirectorySettings, StaticDirectory, StaticEntry,
};
pub use error::{MetaError, MetaResult};
pub use ledger::ObjectLedger;
pub use memory::InMemoryMetaStore;
pub use project::ProjectIndex;
pub use service::ObjectService;
pub use sqlite::SqliteMetaStore;
pub use traits::MetadataStore;
