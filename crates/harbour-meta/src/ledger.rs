use std::sync::Arc;

use harbour_types::{ObjectRecord, ObjectState, Oid, ProjectRecord};
use tracing::{debug, warn};

use crate::error::{MetaError, MetaResult};
use crate::project::ProjectIndex;
use crate::traits::MetadataStore;

/// Tracks objects through the two-phase `Pending` -> `Committed` lifecycle.
///
/// `put` claims an oid for an in-flight upload; `commit` makes it visible
/// to readers once its bytes have landed. Every step is a separate
/// single-key backend operation: there is no transaction spanning the
/// object record and its project memberships.
///
/// The ledger assumes its caller has already authenticated the request.
#[derive(Clone)]
pub struct ObjectLedger {
    store: Arc<dyn MetadataStore>,
    projects: ProjectIndex,
}

impl ObjectLedger {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        let projects = ProjectIndex::new(Arc::clone(&store));
        Self { store, projects }
    }

    pub fn projects(&self) -> &ProjectIndex {
        &self.projects
    }

    /// Claim `oid` with a declared size, associated with `project`.
    ///
    /// If a record already exists it is returned with `existing = true`.
    /// Its size and state are left alone; only a missing project reference
    /// is appended.
    pub fn put(&self, oid: Oid, size: i64, project: &str) -> MetaResult<ObjectRecord> {
        if size < 0 {
            return Err(MetaError::InvalidRequest(format!(
                "negative object size: {size}"
            )));
        }

        if let Some(existing) = self.store.read_object(&oid)? {
            return self.join_existing(existing, project);
        }

        // Project first, so a reader never sees a record whose project
        // has not been created yet.
        self.projects.add_object(&oid, project)?;

        let record = ObjectRecord::pending(oid, size, project);
        if self.store.insert_object(&record)? {
            debug!(oid = %oid, size, project, "object claimed");
            return Ok(record);
        }

        // Lost an insert race to a concurrent put.
        match self.store.read_object(&oid)? {
            Some(existing) => self.join_existing(existing, project),
            None => Err(MetaError::Backend(format!(
                "object {oid} vanished after a conflicting insert"
            ))),
        }
    }

    fn join_existing(&self, mut record: ObjectRecord, project: &str) -> MetaResult<ObjectRecord> {
        if !project.is_empty() && !record.projects.contains(project) {
            self.projects.add_object(&record.oid, project)?;
            self.store.add_object_project(&record.oid, project)?;
            record.projects.insert(project.to_string());
        }
        Ok(record.into_existing())
    }

    /// Promote a pending record to `Committed`, finalizing its project
    /// memberships. Committing a committed record is a no-op.
    pub fn commit(&self, oid: Oid) -> MetaResult<ObjectRecord> {
        let mut record = self.require(&oid)?;
        if record.is_committed() {
            return Ok(record.into_existing());
        }

        for project in &record.projects {
            self.projects.add_object(&oid, project)?;
        }
        if !self.store.set_object_state(&oid, ObjectState::Committed)? {
            return Err(MetaError::ObjectNotFound(oid.to_hex()));
        }
        record.state = ObjectState::Committed;
        debug!(oid = %oid, size = record.size, "object committed");
        Ok(record.into_existing())
    }

    /// The committed record for `oid`. A pending record is not found.
    pub fn get(&self, oid: Oid) -> MetaResult<ObjectRecord> {
        let record = self.require(&oid)?;
        if !record.is_committed() {
            return Err(MetaError::ObjectNotFound(oid.to_hex()));
        }
        Ok(record.into_existing())
    }

    /// The record for `oid` in any state.
    pub fn get_pending(&self, oid: Oid) -> MetaResult<ObjectRecord> {
        self.require(&oid).map(ObjectRecord::into_existing)
    }

    fn require(&self, oid: &Oid) -> MetaResult<ObjectRecord> {
        self.store
            .read_object(oid)?
            .ok_or_else(|| MetaError::ObjectNotFound(oid.to_hex()))
    }

    /// Detach `oid` from `project`.
    ///
    /// The object record is deleted only once no project references it,
    /// either through its own reference set or through any project's
    /// member set. Returns `true` when the record was deleted, in which
    /// case the caller may also discard the stored bytes.
    pub fn remove_from_project(&self, oid: Oid, project: &str) -> MetaResult<bool> {
        let was_member = self.projects.remove_object(&oid, project)?;
        let had_ref = self.store.remove_object_project(&oid, project)?;

        let Some(record) = self.store.read_object(&oid)? else {
            if was_member {
                return Ok(false);
            }
            return Err(MetaError::ObjectNotFound(oid.to_hex()));
        };
        if !was_member && !had_ref {
            return Err(MetaError::InvalidRequest(format!(
                "object {oid} is not part of project {project}"
            )));
        }

        if !record.projects.is_empty() {
            return Ok(false);
        }
        let still_referenced = self.projects.referencing(&oid)?;
        if !still_referenced.is_empty() {
            warn!(
                oid = %oid,
                projects = ?still_referenced,
                "object has project members without matching references; keeping it"
            );
            return Ok(false);
        }

        let deleted = self.store.delete_object(&oid)?;
        if deleted {
            debug!(oid = %oid, "unreferenced object deleted");
        }
        Ok(deleted)
    }

    pub fn list_objects(&self) -> MetaResult<Vec<ObjectRecord>> {
        self.store.list_objects()
    }

    pub fn count_objects(&self) -> MetaResult<u64> {
        self.store.count_objects()
    }

    pub fn list_projects(&self) -> MetaResult<Vec<ProjectRecord>> {
        self.projects.list()
    }

    pub fn find_project(&self, name: &str) -> MetaResult<ProjectRecord> {
        self.projects.find(name)
    }
}

impl std::fmt::Debug for ObjectLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLedger")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}
