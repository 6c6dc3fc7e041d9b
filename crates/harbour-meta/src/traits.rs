use harbour_types::{ObjectRecord, ObjectState, Oid, ProjectRecord, UserRecord};

use crate::error::MetaResult;

/// Backend storage for object, project and credential metadata.
///
/// One implementation exists per backend; the ledger, project index and
/// credential store are written once against this trait. Implementations
/// must satisfy these invariants:
/// - Every method is a single-key operation and atomic on its own.
///   Nothing spans keys; callers never rely on cross-key transactions.
/// - `insert_*` is insert-if-absent and reports whether it inserted.
/// - Enumerations return a stable order (by oid, project name, username).
/// - Backend faults are returned as [`MetaError::Backend`](crate::MetaError),
///   never as panics.
pub trait MetadataStore: Send + Sync {
    /// Short name used in logs and the management API.
    fn backend_name(&self) -> &'static str;

    // ---- objects ----

    /// Read an object record. Returns `Ok(None)` if absent.
    fn read_object(&self, oid: &Oid) -> MetaResult<Option<ObjectRecord>>;

    /// Insert a record unless one already exists under its oid.
    fn insert_object(&self, record: &ObjectRecord) -> MetaResult<bool>;

    /// Set the lifecycle state. Returns `false` if no record exists.
    fn set_object_state(&self, oid: &Oid, state: ObjectState) -> MetaResult<bool>;

    /// Add a project reference to an object record. Returns `false` if no
    /// record exists.
    fn add_object_project(&self, oid: &Oid, project: &str) -> MetaResult<bool>;

    /// Remove a project reference from an object record. Returns `true` if
    /// the reference was present.
    fn remove_object_project(&self, oid: &Oid, project: &str) -> MetaResult<bool>;

    /// Delete an object record. Returns `true` if it existed.
    fn delete_object(&self, oid: &Oid) -> MetaResult<bool>;

    fn list_objects(&self) -> MetaResult<Vec<ObjectRecord>>;

    fn count_objects(&self) -> MetaResult<u64> {
        Ok(self.list_objects()?.len() as u64)
    }

    // ---- projects ----

    fn read_project(&self, name: &str) -> MetaResult<Option<ProjectRecord>>;

    /// Create an empty project. Returns `false` if it already existed.
    fn create_project(&self, name: &str) -> MetaResult<bool>;

    /// Add an oid to a project's set, creating the project if absent.
    fn add_project_member(&self, name: &str, oid: &Oid) -> MetaResult<()>;

    /// Remove an oid from a project's set. Returns `true` if it was a member.
    fn remove_project_member(&self, name: &str, oid: &Oid) -> MetaResult<bool>;

    fn list_projects(&self) -> MetaResult<Vec<ProjectRecord>>;

    // ---- users ----

    fn read_user(&self, username: &str) -> MetaResult<Option<UserRecord>>;

    /// Insert a credential unless the username is taken.
    fn insert_user(&self, record: &UserRecord) -> MetaResult<bool>;

    /// Delete a credential. Returns `true` if it existed.
    fn delete_user(&self, username: &str) -> MetaResult<bool>;

    fn list_usernames(&self) -> MetaResult<Vec<String>>;

    /// Release backend resources. Later calls may fail with a backend error.
    fn close(&self) -> MetaResult<()> {
        Ok(())
    }
}
