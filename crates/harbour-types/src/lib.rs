//! Foundation types for the Harbour object store.
//!
//! Every other Harbour crate depends on `harbour-types`.
//!
//! # Key Types
//!
//! - [`Oid`] — content identifier (SHA-256 digest, hex encoded)
//! - [`ObjectRecord`] — ledger metadata for one object
//! - [`ObjectState`] — two-phase lifecycle: pending, then committed
//! - [`ProjectRecord`] — a project and the objects it references
//! - [`UserRecord`] — a locally stored credential
//! - [`RequestVars`] — the fields a protocol request carries into the core

pub mod error;
pub mod oid;
pub mod record;
pub mod request;

pub use error::TypeError;
pub use oid::{Oid, OID_HEX_LEN};
pub use record::{ObjectRecord, ObjectState, ProjectRecord, UserRecord};
pub use request::RequestVars;
