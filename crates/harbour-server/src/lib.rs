//! HTTP server for the Harbour object store.
//!
//! Speaks the Git LFS transfer API and a small management API, backed by
//! `harbour-meta` for object lifecycle and `harbour-content` for bytes.
//!
//! # Endpoints
//!
//! - `POST /:ns/:repo/objects` -- announce an object, receive its links
//! - `POST /:ns/:repo/objects/batch` -- resolve many objects at once
//! - `GET|HEAD|PUT /:ns/:repo/objects/:oid` -- content and metadata
//! - `GET /search/:oid` -- does a committed object exist
//! - `/mgmt/...` -- admin-only user, project and object management

pub mod config;
pub mod error;
pub mod lfs;
pub mod mgmt;
pub mod router;
pub mod server;
pub mod state;

pub use config::{ContentConfig, DirectoryConfig, HarbourConfig, DEFAULT_CONFIG_FILE};
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::HarbourServer;
pub use state::{open_service, AppState};
