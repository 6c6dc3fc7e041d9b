use std::sync::Arc;

use harbour_types::{Oid, ProjectRecord};
use tracing::debug;

use crate::error::{MetaError, MetaResult};
use crate::traits::MetadataStore;

/// Many-to-many association between project names and object ids.
///
/// Projects are created lazily on first reference and never removed
/// automatically. Membership is plain set semantics: adding twice is a no-op.
#[derive(Clone)]
pub struct ProjectIndex {
    store: Arc<dyn MetadataStore>,
}

impl ProjectIndex {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Associate `oid` with `project`, creating the project if needed.
    /// An empty project name means "no project" and is ignored.
    pub fn add_object(&self, oid: &Oid, project: &str) -> MetaResult<()> {
        if project.is_empty() {
            return Ok(());
        }
        self.store.add_project_member(project, oid)?;
        debug!(oid = %oid, project, "object associated with project");
        Ok(())
    }

    /// Drop the association. Returns `true` if `oid` was a member.
    pub fn remove_object(&self, oid: &Oid, project: &str) -> MetaResult<bool> {
        let removed = self.store.remove_project_member(project, oid)?;
        if removed {
            debug!(oid = %oid, project, "object removed from project");
        }
        Ok(removed)
    }

    pub fn find(&self, name: &str) -> MetaResult<ProjectRecord> {
        self.store
            .read_project(name)?
            .ok_or_else(|| MetaError::ProjectNotFound(name.to_string()))
    }

    pub fn list(&self) -> MetaResult<Vec<ProjectRecord>> {
        self.store.list_projects()
    }

    /// Create an empty project. Creating an existing project succeeds
    /// silently.
    pub fn create(&self, name: &str) -> MetaResult<()> {
        if name.is_empty() {
            return Err(MetaError::InvalidRequest("project name is empty".into()));
        }
        if self.store.create_project(name)? {
            debug!(project = name, "project created");
        }
        Ok(())
    }

    /// Names of every project whose member set contains `oid`.
    pub fn referencing(&self, oid: &Oid) -> MetaResult<Vec<String>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.contains(oid))
            .map(|p| p.name)
            .collect())
    }
}

impl std::fmt::Debug for ProjectIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectIndex")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}
