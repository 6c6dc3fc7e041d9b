use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use harbour_crypto::PasswordHasher;
use harbour_types::UserRecord;
use tracing::{debug, warn};

use crate::directory::DirectoryAuth;
use crate::error::{MetaError, MetaResult};
use crate::traits::MetadataStore;

/// Where credentials are checked.
#[derive(Clone, Default)]
pub enum AuthMode {
    /// Every request is accepted without looking at credentials.
    Public,
    /// Hashed credentials held in the metadata store.
    #[default]
    Local,
    /// An external directory; local user management is disabled.
    Directory(DirectoryAuth),
}

impl AuthMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Local => "local",
            Self::Directory(_) => "directory",
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Split a `Basic` authorization header into username and password.
///
/// The password is everything after the first `:`. Returns `None` for any
/// header that is not well-formed basic auth.
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let (scheme, payload) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let payload = payload.trim();
    let decoded = STANDARD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Authenticates callers and manages locally stored credentials.
///
/// Authentication never distinguishes an unknown user from a wrong
/// password. Every call re-reads the backend; nothing is cached.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn MetadataStore>,
    mode: AuthMode,
    hasher: PasswordHasher,
    /// Verified against when the user does not exist, so that unknown users
    /// cost the same as wrong passwords.
    unknown_user_hash: String,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn MetadataStore>, mode: AuthMode) -> Self {
        Self::with_parts(store, mode, PasswordHasher::new())
    }

    fn with_parts(store: Arc<dyn MetadataStore>, mode: AuthMode, hasher: PasswordHasher) -> Self {
        Self {
            store,
            mode,
            unknown_user_hash: hasher.decoy(),
            hasher,
        }
    }

    /// Use a custom hasher for newly added users.
    pub fn with_hasher(self, hasher: PasswordHasher) -> Self {
        Self::with_parts(self.store, self.mode, hasher)
    }

    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    pub fn is_public(&self) -> bool {
        matches!(self.mode, AuthMode::Public)
    }

    /// Check a raw `Authorization` header value.
    pub fn authenticate(&self, authorization: &str) -> bool {
        if self.is_public() {
            return true;
        }
        let Some((user, password)) = parse_basic(authorization) else {
            debug!("missing or malformed basic credentials");
            return false;
        };
        match &self.mode {
            AuthMode::Public => true,
            AuthMode::Directory(directory) => directory.authenticate(&user, &password),
            AuthMode::Local => self.verify_local(&user, &password),
        }
    }

    fn verify_local(&self, user: &str, password: &str) -> bool {
        match self.store.read_user(user) {
            Ok(Some(record)) => PasswordHasher::verify(password, &record.password_hash),
            Ok(None) => {
                PasswordHasher::verify(password, &self.unknown_user_hash);
                false
            }
            Err(e) => {
                warn!(user, error = %e, "credential lookup failed");
                false
            }
        }
    }

    fn require_local(&self, operation: &'static str) -> MetaResult<()> {
        match self.mode {
            AuthMode::Directory(_) => Err(MetaError::NotImplemented(operation)),
            _ => Ok(()),
        }
    }

    /// Store a credential. Adding an existing user is a silent success and
    /// keeps the original password.
    pub fn add_user(&self, user: &str, password: &str) -> MetaResult<()> {
        self.require_local("add user")?;
        if user.is_empty() {
            return Err(MetaError::InvalidRequest("username is empty".into()));
        }
        if user.contains(':') {
            return Err(MetaError::InvalidRequest(
                "username may not contain ':'".into(),
            ));
        }
        if self.store.read_user(user)?.is_some() {
            return Ok(());
        }
        let record = UserRecord {
            username: user.to_string(),
            password_hash: self
                .hasher
                .hash(password)
                .map_err(|e| MetaError::Backend(e.to_string()))?,
        };
        if self.store.insert_user(&record)? {
            debug!(user, "user added");
        }
        Ok(())
    }

    /// Remove a credential if present.
    pub fn delete_user(&self, user: &str) -> MetaResult<()> {
        self.require_local("delete user")?;
        if self.store.delete_user(user)? {
            debug!(user, "user deleted");
        }
        Ok(())
    }

    pub fn list_users(&self) -> MetaResult<Vec<String>> {
        self.require_local("list users")?;
        self.store.list_usernames()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("mode", &self.mode)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectorySettings, StaticDirectory, StaticEntry};
    use crate::memory::InMemoryMetaStore;
    use crate::sqlite::SqliteMetaStore;

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
    }

    fn local(store: Arc<dyn MetadataStore>) -> CredentialStore {
        CredentialStore::new(store, AuthMode::Local).with_hasher(PasswordHasher::with_cost(8, 1))
    }

    fn backends() -> Vec<CredentialStore> {
        vec![
            local(Arc::new(InMemoryMetaStore::new())),
            local(Arc::new(SqliteMetaStore::open_in_memory().unwrap())),
        ]
    }

    fn directory_mode() -> CredentialStore {
        let entry = StaticEntry {
            dn: "uid=alice,dc=example,dc=com".into(),
            object_class: "person".into(),
            uid: "alice".into(),
            password_hash: PasswordHasher::with_cost(8, 1).hash("wonderland").unwrap(),
        };
        let auth = DirectoryAuth::new(
            Arc::new(StaticDirectory::new(vec![entry])),
            DirectorySettings::default(),
        );
        CredentialStore::new(Arc::new(InMemoryMetaStore::new()), AuthMode::Directory(auth))
    }

    // ---- header parsing ----

    #[test]
    fn parse_basic_splits_on_first_colon() {
        assert_eq!(
            parse_basic(&basic("alice", "pa:ss")),
            Some(("alice".into(), "pa:ss".into()))
        );
        assert_eq!(parse_basic(&basic("alice", "")), Some(("alice".into(), String::new())));
    }

    #[test]
    fn parse_basic_accepts_url_safe_alphabet() {
        // "?>?:~~~" encodes with '/' and '+' in the standard alphabet.
        let raw = "?>?:~~~";
        let header = format!("Basic {}", URL_SAFE.encode(raw));
        assert_ne!(header, format!("Basic {}", STANDARD.encode(raw)));
        assert_eq!(parse_basic(&header), Some(("?>?".into(), "~~~".into())));
    }

    #[test]
    fn parse_basic_rejects_malformed() {
        assert_eq!(parse_basic(""), None);
        assert_eq!(parse_basic("Basic"), None);
        assert_eq!(parse_basic("Bearer abc"), None);
        assert_eq!(parse_basic("Basic !!!notbase64"), None);
        assert_eq!(parse_basic(&format!("Basic {}", STANDARD.encode("nocolon"))), None);
        assert_eq!(parse_basic(&format!("Basic {}", STANDARD.encode([0xff, b':', 0xfe]))), None);
    }

    // ---- local mode ----

    #[test]
    fn local_authentication() {
        for creds in backends() {
            creds.add_user("alice", "secret").unwrap();
            assert!(creds.authenticate(&basic("alice", "secret")));
            assert!(!creds.authenticate(&basic("alice", "wrong")));
            assert!(!creds.authenticate(&basic("mallory", "secret")));
            assert!(!creds.authenticate(""));
            assert!(!creds.authenticate("Basic garbage"));
        }
    }

    #[test]
    fn add_existing_user_keeps_first_password() {
        for creds in backends() {
            creds.add_user("alice", "first").unwrap();
            creds.add_user("alice", "second").unwrap();
            assert!(creds.authenticate(&basic("alice", "first")));
            assert!(!creds.authenticate(&basic("alice", "second")));
            assert_eq!(creds.list_users().unwrap(), vec!["alice"]);
        }
    }

    #[test]
    fn delete_and_list_users() {
        for creds in backends() {
            creds.add_user("bob", "b").unwrap();
            creds.add_user("alice", "a").unwrap();
            assert_eq!(creds.list_users().unwrap(), vec!["alice", "bob"]);
            creds.delete_user("bob").unwrap();
            creds.delete_user("bob").unwrap();
            assert_eq!(creds.list_users().unwrap(), vec!["alice"]);
            assert!(!creds.authenticate(&basic("bob", "b")));
        }
    }

    #[test]
    fn rejects_unusable_usernames() {
        for creds in backends() {
            assert!(matches!(creds.add_user("", "x"), Err(MetaError::InvalidRequest(_))));
            assert!(matches!(creds.add_user("a:b", "x"), Err(MetaError::InvalidRequest(_))));
        }
    }

    #[test]
    fn stored_hash_is_not_the_password() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetaStore::new());
        let creds = local(Arc::clone(&store));
        creds.add_user("alice", "secret").unwrap();
        let record = store.read_user("alice").unwrap().unwrap();
        assert!(!record.password_hash.contains("secret"));
    }

    // ---- public mode ----

    #[test]
    fn public_mode_accepts_anything() {
        let creds = CredentialStore::new(Arc::new(InMemoryMetaStore::new()), AuthMode::Public);
        assert!(creds.is_public());
        assert!(creds.authenticate(""));
        assert!(creds.authenticate("Basic garbage"));
    }

    // ---- directory mode ----

    #[test]
    fn directory_mode_delegates() {
        let creds = directory_mode();
        assert!(creds.authenticate(&basic("alice", "wonderland")));
        assert!(!creds.authenticate(&basic("alice", "nope")));
        assert!(!creds.authenticate(&basic("bob", "wonderland")));
    }

    #[test]
    fn directory_mode_disables_user_management() {
        let creds = directory_mode();
        assert!(matches!(creds.add_user("x", "y"), Err(MetaError::NotImplemented(_))));
        assert!(matches!(creds.delete_user("x"), Err(MetaError::NotImplemented(_))));
        assert!(matches!(creds.list_users(), Err(MetaError::NotImplemented(_))));
    }

    #[test]
    fn stored_hashes_are_argon2id() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetaStore::new());
        local(Arc::clone(&store)).add_user("alice", "secret").unwrap();
        let record = store.read_user("alice").unwrap().unwrap();
        assert!(record.password_hash.starts_with("$argon2id$"), "{}", record.password_hash);
    }

    #[test]
    fn unknown_user_hash_follows_the_hasher_cost() {
        let creds = local(Arc::new(InMemoryMetaStore::new()));
        assert!(creds.unknown_user_hash.contains("m=8,t=1,p=1"));
        assert!(!PasswordHasher::verify("", &creds.unknown_user_hash));
        assert!(!creds.authenticate(&basic("nobody", "")));
    }

    #[test]
    fn mode_names() {
        assert_eq!(AuthMode::default().name(), "local");
        assert_eq!(format!("{:?}", directory_mode().mode()), "directory");
    }
}
