use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use harbour_types::{ObjectRecord, ObjectState, Oid, ProjectRecord, UserRecord};

use crate::error::{MetaError, MetaResult};
use crate::traits::MetadataStore;

/// In-memory, map-based metadata store.
///
/// Intended for tests and embedding. Objects, projects and users live in
/// separate maps, each behind its own `RwLock`, mirroring the per-key
/// atomicity of the persistent backends. Data is lost when the store is
/// dropped.
pub struct InMemoryMetaStore {
    objects: RwLock<HashMap<Oid, ObjectRecord>>,
    projects: RwLock<BTreeMap<String, BTreeSet<Oid>>>,
    users: RwLock<BTreeMap<String, UserRecord>>,
}

fn poisoned<T>(e: PoisonError<T>) -> MetaError {
    MetaError::Backend(format!("lock poisoned: {e}"))
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            projects: RwLock::new(BTreeMap::new()),
            users: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryMetaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore for InMemoryMetaStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn read_object(&self, oid: &Oid) -> MetaResult<Option<ObjectRecord>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.get(oid).cloned())
    }

    fn insert_object(&self, record: &ObjectRecord) -> MetaResult<bool> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        if objects.contains_key(&record.oid) {
            return Ok(false);
        }
        let mut stored = record.clone();
        stored.existing = false;
        objects.insert(record.oid, stored);
        Ok(true)
    }

    fn set_object_state(&self, oid: &Oid, state: ObjectState) -> MetaResult<bool> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        match objects.get_mut(oid) {
            Some(record) => {
                record.state = state;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn add_object_project(&self, oid: &Oid, project: &str) -> MetaResult<bool> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        match objects.get_mut(oid) {
            Some(record) => {
                record.projects.insert(project.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_object_project(&self, oid: &Oid, project: &str) -> MetaResult<bool> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        Ok(objects
            .get_mut(oid)
            .map(|record| record.projects.remove(project))
            .unwrap_or(false))
    }

    fn delete_object(&self, oid: &Oid) -> MetaResult<bool> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        Ok(objects.remove(oid).is_some())
    }

    fn list_objects(&self) -> MetaResult<Vec<ObjectRecord>> {
        let objects = self.objects.read().map_err(poisoned)?;
        let mut records: Vec<ObjectRecord> = objects.values().cloned().collect();
        records.sort_by(|a, b| a.oid.cmp(&b.oid));
        Ok(records)
    }

    fn count_objects(&self) -> MetaResult<u64> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.len() as u64)
    }

    fn read_project(&self, name: &str) -> MetaResult<Option<ProjectRecord>> {
        let projects = self.projects.read().map_err(poisoned)?;
        Ok(projects.get(name).map(|oids| ProjectRecord {
            name: name.to_string(),
            oids: oids.clone(),
        }))
    }

    fn create_project(&self, name: &str) -> MetaResult<bool> {
        let mut projects = self.projects.write().map_err(poisoned)?;
        if projects.contains_key(name) {
            return Ok(false);
        }
        projects.insert(name.to_string(), BTreeSet::new());
        Ok(true)
    }

    fn add_project_member(&self, name: &str, oid: &Oid) -> MetaResult<()> {
        let mut projects = self.projects.write().map_err(poisoned)?;
        projects.entry(name.to_string()).or_default().insert(*oid);
        Ok(())
    }

    fn remove_project_member(&self, name: &str, oid: &Oid) -> MetaResult<bool> {
        let mut projects = self.projects.write().map_err(poisoned)?;
        Ok(projects
            .get_mut(name)
            .map(|oids| oids.remove(oid))
            .unwrap_or(false))
    }

    fn list_projects(&self) -> MetaResult<Vec<ProjectRecord>> {
        let projects = self.projects.read().map_err(poisoned)?;
        Ok(projects
            .iter()
            .map(|(name, oids)| ProjectRecord {
                name: name.clone(),
                oids: oids.clone(),
            })
            .collect())
    }

    fn read_user(&self, username: &str) -> MetaResult<Option<UserRecord>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(username).cloned())
    }

    fn insert_user(&self, record: &UserRecord) -> MetaResult<bool> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.contains_key(&record.username) {
            return Ok(false);
        }
        users.insert(record.username.clone(), record.clone());
        Ok(true)
    }

    fn delete_user(&self, username: &str) -> MetaResult<bool> {
        let mut users = self.users.write().map_err(poisoned)?;
        Ok(users.remove(username).is_some())
    }

    fn list_usernames(&self) -> MetaResult<Vec<String>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.keys().cloned().collect())
    }
}

impl std::fmt::Debug for InMemoryMetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.count_objects().unwrap_or_default();
        f.debug_struct("InMemoryMetaStore")
            .field("object_count", &count)
            .finish()
    }
}
