use std::sync::Arc;

use harbour_types::{ObjectRecord, Oid, ProjectRecord, RequestVars};
use tracing::{debug, warn};

use crate::credentials::{AuthMode, CredentialStore};
use crate::error::{MetaError, MetaResult};
use crate::ledger::ObjectLedger;
use crate::traits::MetadataStore;

/// The contract consumed by the protocol layer.
///
/// Request-scoped operations (`put`, `commit`, `get`, `get_pending`)
/// authenticate before anything else is looked at, including the syntax of
/// the oid, so a bad credential always yields [`MetaError::Unauthorized`].
/// The remaining operations are administrative; the caller gates them.
#[derive(Clone)]
pub struct ObjectService {
    store: Arc<dyn MetadataStore>,
    ledger: ObjectLedger,
    credentials: CredentialStore,
}

impl ObjectService {
    pub fn new(store: Arc<dyn MetadataStore>, mode: AuthMode) -> Self {
        let credentials = CredentialStore::new(Arc::clone(&store), mode);
        Self::with_credentials(store, credentials)
    }

    pub fn with_credentials(store: Arc<dyn MetadataStore>, credentials: CredentialStore) -> Self {
        let ledger = ObjectLedger::new(Arc::clone(&store));
        Self {
            store,
            ledger,
            credentials,
        }
    }

    pub fn ledger(&self) -> &ObjectLedger {
        &self.ledger
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Authenticate `rv`, then parse its oid.
    fn admit(&self, rv: &RequestVars) -> MetaResult<Oid> {
        if !self.credentials.authenticate(&rv.authorization) {
            debug!(namespace = %rv.namespace, repo = %rv.repo, "request rejected");
            return Err(MetaError::Unauthorized);
        }
        Ok(Oid::parse(&rv.oid)?)
    }

    pub fn put(&self, rv: &RequestVars) -> MetaResult<ObjectRecord> {
        let oid = self.admit(rv)?;
        self.ledger.put(oid, rv.size, &rv.repo)
    }

    pub fn commit(&self, rv: &RequestVars) -> MetaResult<ObjectRecord> {
        let oid = self.admit(rv)?;
        self.ledger.commit(oid)
    }

    pub fn get(&self, rv: &RequestVars) -> MetaResult<ObjectRecord> {
        let oid = self.admit(rv)?;
        self.ledger.get(oid)
    }

    pub fn get_pending(&self, rv: &RequestVars) -> MetaResult<ObjectRecord> {
        let oid = self.admit(rv)?;
        self.ledger.get_pending(oid)
    }

    // ---- administration ----

    pub fn add_user(&self, user: &str, password: &str) -> MetaResult<()> {
        self.credentials.add_user(user, password)
    }

    pub fn delete_user(&self, user: &str) -> MetaResult<()> {
        self.credentials.delete_user(user)
    }

    pub fn list_users(&self) -> MetaResult<Vec<String>> {
        self.credentials
            .list_users()
            .inspect_err(|e| warn!(error = %e, "listing users failed"))
    }

    pub fn list_objects(&self) -> MetaResult<Vec<ObjectRecord>> {
        self.ledger
            .list_objects()
            .inspect_err(|e| warn!(error = %e, "listing objects failed"))
    }

    pub fn count_objects(&self) -> MetaResult<u64> {
        self.ledger
            .count_objects()
            .inspect_err(|e| warn!(error = %e, "counting objects failed"))
    }

    pub fn list_projects(&self) -> MetaResult<Vec<ProjectRecord>> {
        self.ledger
            .list_projects()
            .inspect_err(|e| warn!(error = %e, "listing projects failed"))
    }

    pub fn find_project(&self, name: &str) -> MetaResult<ProjectRecord> {
        self.ledger.find_project(name)
    }

    pub fn add_project(&self, name: &str) -> MetaResult<()> {
        self.ledger.projects().create(name)
    }

    /// Reference-aware removal; see [`ObjectLedger::remove_from_project`].
    pub fn remove_from_project(&self, oid: Oid, project: &str) -> MetaResult<bool> {
        self.ledger.remove_from_project(oid, project)
    }

    pub fn close(&self) -> MetaResult<()> {
        self.store.close()
    }
}

impl std::fmt::Debug for ObjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectService")
            .field("backend", &self.store.backend_name())
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use harbour_crypto::{ContentHasher, PasswordHasher};
    use harbour_types::ObjectState;

    use crate::memory::InMemoryMetaStore;
    use crate::sqlite::SqliteMetaStore;

    const GOOD: &str = "alice:secret";
    const BAD: &str = "alice:wrong";

    fn header(pair: &str) -> String {
        format!("Basic {}", STANDARD.encode(pair))
    }

    fn service(store: Arc<dyn MetadataStore>) -> ObjectService {
        let creds = CredentialStore::new(Arc::clone(&store), AuthMode::Local)
            .with_hasher(PasswordHasher::with_cost(8, 1));
        let svc = ObjectService::with_credentials(store, creds);
        svc.add_user("alice", "secret").unwrap();
        svc
    }

    fn backends() -> Vec<ObjectService> {
        vec![
            service(Arc::new(InMemoryMetaStore::new())),
            service(Arc::new(SqliteMetaStore::open_in_memory().unwrap())),
        ]
    }

    fn rv(content: &[u8], repo: &str, auth: &str) -> RequestVars {
        RequestVars::new(ContentHasher::digest(content).to_hex(), content.len() as i64)
            .with_repo("org", repo)
            .with_authorization(header(auth))
    }

    #[test]
    fn put_commit_get_scenario() {
        for svc in backends() {
            let req = rv(b"hello world!", "repo", GOOD);

            let put = svc.put(&req).unwrap();
            assert!(!put.existing);
            assert_eq!(put.size, 12);

            let committed = svc.commit(&req).unwrap();
            assert!(committed.existing);
            assert_eq!(committed.state, ObjectState::Committed);

            assert_eq!(svc.get(&req).unwrap(), committed);

            let never = rv(b"never uploaded", "repo", GOOD);
            assert!(matches!(svc.get(&never), Err(MetaError::ObjectNotFound(_))));
        }
    }

    #[test]
    fn every_request_operation_is_auth_gated() {
        for svc in backends() {
            let good = rv(b"payload", "repo", GOOD);
            svc.put(&good).unwrap();

            // Both for an existing object and an absent one: forbidden, never absent.
            for content in [&b"payload"[..], &b"absent"[..]] {
                let bad = rv(content, "repo", BAD);
                assert!(svc.put(&bad).unwrap_err().is_unauthorized());
                assert!(svc.commit(&bad).unwrap_err().is_unauthorized());
                assert!(svc.get(&bad).unwrap_err().is_unauthorized());
                assert!(svc.get_pending(&bad).unwrap_err().is_unauthorized());
            }

            let anonymous = RequestVars::new(ContentHasher::digest(b"payload").to_hex(), 7);
            assert!(svc.get_pending(&anonymous).unwrap_err().is_unauthorized());
        }
    }

    #[test]
    fn auth_is_checked_before_oid_syntax() {
        for svc in backends() {
            let bad = RequestVars::new("not-an-oid", 1).with_authorization(header(BAD));
            assert!(svc.put(&bad).unwrap_err().is_unauthorized());

            let good = RequestVars::new("not-an-oid", 1).with_authorization(header(GOOD));
            assert!(matches!(svc.put(&good), Err(MetaError::InvalidRequest(_))));
        }
    }

    #[test]
    fn project_association_through_service() {
        for svc in backends() {
            let req = rv(b"abc", "proj1", GOOD);
            let record = svc.put(&req).unwrap();
            assert!(svc.find_project("proj1").unwrap().contains(&record.oid));
            assert_eq!(svc.list_projects().unwrap().len(), 1);
            assert_eq!(svc.list_objects().unwrap().len(), 1);
            assert_eq!(svc.count_objects().unwrap(), 1);
        }
    }

    #[test]
    fn admin_operations() {
        for svc in backends() {
            svc.add_project("empty").unwrap();
            svc.add_project("empty").unwrap();
            assert!(svc.find_project("empty").unwrap().oids.is_empty());
            assert!(matches!(
                svc.find_project("missing"),
                Err(MetaError::ProjectNotFound(_))
            ));

            svc.add_user("bob", "pw").unwrap();
            assert_eq!(svc.list_users().unwrap(), vec!["alice", "bob"]);
            svc.delete_user("bob").unwrap();
            assert_eq!(svc.list_users().unwrap(), vec!["alice"]);

            let req = rv(b"shared", "a", GOOD);
            let record = svc.put(&req).unwrap();
            assert!(svc.remove_from_project(record.oid, "a").unwrap());
            assert!(svc.list_objects().unwrap().is_empty());
            assert_eq!(svc.count_objects().unwrap(), 0);

            svc.close().unwrap();
        }
    }

    #[test]
    fn public_service_needs_no_credentials() {
        let svc = ObjectService::new(Arc::new(InMemoryMetaStore::new()), AuthMode::Public);
        let req = RequestVars::new(ContentHasher::digest(b"x").to_hex(), 1);
        assert!(!svc.put(&req).unwrap().existing);
        assert!(svc.commit(&req).unwrap().is_committed());
    }
}
