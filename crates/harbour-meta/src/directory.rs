//! Directory (LDAP-style) authentication.
//!
//! The credential store never talks to a directory server itself; it goes
//! through [`DirectoryAuthenticator`], which exposes the two operations a
//! simple bind flow needs: resolve a username to a DN with `search`, then
//! `bind` as that DN with the supplied password.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use harbour_crypto::PasswordHasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MetaError, MetaResult};

/// One entry returned from a directory search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    /// Attribute values keyed by lower-cased attribute name.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// External identity system consulted instead of locally stored credentials.
pub trait DirectoryAuthenticator: Send + Sync {
    /// Attempt a simple bind. `Ok(false)` means the directory rejected the
    /// credentials; `Err` means it could not be asked.
    fn bind(&self, dn: &str, password: &str) -> MetaResult<bool>;

    /// Search the subtree rooted at `base_dn` with an RFC 4515 filter.
    fn search(&self, filter: &str, base_dn: &str) -> MetaResult<Vec<DirectoryEntry>>;
}

/// How usernames are mapped onto directory entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub base_dn: String,
    pub user_object_class: String,
    /// Attribute holding the login name, e.g. `uid` or `cn`.
    pub user_attribute: String,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            base_dn: "dc=example,dc=com".into(),
            user_object_class: "person".into(),
            user_attribute: "uid".into(),
        }
    }
}

impl DirectorySettings {
    pub fn user_filter(&self, username: &str) -> String {
        format!(
            "(&(objectClass={})({}={}))",
            escape_filter_value(&self.user_object_class),
            self.user_attribute,
            escape_filter_value(username)
        )
    }

    pub fn user_base(&self, username: &str) -> String {
        format!(
            "{}={},{}",
            self.user_attribute,
            escape_dn_value(username),
            self.base_dn
        )
    }
}

/// Username/password verification against a [`DirectoryAuthenticator`].
#[derive(Clone)]
pub struct DirectoryAuth {
    directory: Arc<dyn DirectoryAuthenticator>,
    settings: DirectorySettings,
}

impl DirectoryAuth {
    pub fn new(directory: Arc<dyn DirectoryAuthenticator>, settings: DirectorySettings) -> Self {
        Self {
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &DirectorySettings {
        &self.settings
    }

    /// Resolve `username` to the DN of its directory entry.
    pub fn find_user_dn(&self, username: &str) -> MetaResult<Option<String>> {
        let filter = self.settings.user_filter(username);
        let base = self.settings.user_base(username);
        let entries = self.directory.search(&filter, &base)?;
        Ok(entries.into_iter().next().map(|e| e.dn))
    }

    /// Fails closed: directory faults and unknown users both yield `false`.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        // An empty password would turn the bind into an unauthenticated one.
        if username.is_empty() || password.is_empty() {
            return false;
        }
        let dn = match self.find_user_dn(username) {
            Ok(Some(dn)) => dn,
            Ok(None) => {
                debug!(user = username, "no directory entry for user");
                return false;
            }
            Err(e) => {
                warn!(user = username, error = %e, "directory search failed");
                return false;
            }
        };
        match self.directory.bind(&dn, password) {
            Ok(bound) => bound,
            Err(e) => {
                warn!(dn = %dn, error = %e, "directory bind failed");
                false
            }
        }
    }
}

impl fmt::Debug for DirectoryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryAuth")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Escape a value for use inside an RFC 4515 filter assertion.
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

/// Escape a value for use as an RDN attribute value (RFC 4514).
pub fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Static directory
// ---------------------------------------------------------------------------

/// A directory entry as written in configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEntry {
    pub dn: String,
    #[serde(default = "default_object_class")]
    pub object_class: String,
    pub uid: String,
    /// Encoded [`PasswordHasher`] hash.
    pub password_hash: String,
}

fn default_object_class() -> String {
    "person".into()
}

impl fmt::Debug for StaticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticEntry")
            .field("dn", &self.dn)
            .field("object_class", &self.object_class)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

/// In-process [`DirectoryAuthenticator`] over a fixed list of entries.
///
/// Supports `&`, `|`, `!`, equality and presence filters with
/// case-insensitive matching, and subtree scoping by DN suffix.
pub struct StaticDirectory {
    entries: Vec<(DirectoryEntry, String)>,
}

impl StaticDirectory {
    pub fn new(entries: impl IntoIterator<Item = StaticEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| {
                let mut entry = DirectoryEntry::new(e.dn.clone())
                    .with_attribute("objectClass", e.object_class)
                    .with_attribute("uid", e.uid);
                if let Some((attr, value)) = first_rdn(&e.dn) {
                    if !entry.values(&attr).iter().any(|v| v.eq_ignore_ascii_case(&value)) {
                        entry = entry.with_attribute(&attr, value);
                    }
                }
                (entry, e.password_hash)
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DirectoryAuthenticator for StaticDirectory {
    fn bind(&self, dn: &str, password: &str) -> MetaResult<bool> {
        if password.is_empty() {
            return Ok(false);
        }
        let target = normalize_dn(dn);
        Ok(self
            .entries
            .iter()
            .find(|(entry, _)| normalize_dn(&entry.dn) == target)
            .map(|(_, hash)| PasswordHasher::verify(password, hash))
            .unwrap_or(false))
    }

    fn search(&self, filter: &str, base_dn: &str) -> MetaResult<Vec<DirectoryEntry>> {
        let filter = Filter::parse(filter)?;
        let base = normalize_dn(base_dn);
        Ok(self
            .entries
            .iter()
            .map(|(entry, _)| entry)
            .filter(|entry| in_subtree(&normalize_dn(&entry.dn), &base))
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }
}

impl fmt::Debug for StaticDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticDirectory")
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| rdn.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

fn in_subtree(dn: &str, base: &str) -> bool {
    base.is_empty() || dn == base || dn.ends_with(&format!(",{base}"))
}

fn first_rdn(dn: &str) -> Option<(String, String)> {
    let rdn = dn.split(',').next()?;
    let (attr, value) = rdn.split_once('=')?;
    Some((attr.trim().to_string(), value.trim().to_string()))
}

/// Parsed subset of an RFC 4515 search filter.
#[derive(Debug, PartialEq, Eq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal(String, String),
    Present(String),
}

impl Filter {
    fn parse(input: &str) -> MetaResult<Self> {
        let mut parser = FilterParser {
            input: input.trim().as_bytes(),
            pos: 0,
        };
        let filter = parser.filter()?;
        if parser.pos != parser.input.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(filter)
    }

    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|f| f.matches(entry)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(entry)),
            Self::Not(inner) => !inner.matches(entry),
            Self::Equal(attr, value) => entry
                .values(attr)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            Self::Present(attr) => !entry.values(attr).is_empty(),
        }
    }
}

struct FilterParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl FilterParser<'_> {
    fn error(&self, what: &str) -> MetaError {
        MetaError::InvalidRequest(format!("bad directory filter at {}: {what}", self.pos))
    }

    fn expect(&mut self, byte: u8) -> MetaResult<()> {
        if self.input.get(self.pos) == Some(&byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn filter(&mut self) -> MetaResult<Filter> {
        self.expect(b'(')?;
        let filter = match self.input.get(self.pos) {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end")),
        };
        self.expect(b')')?;
        Ok(filter)
    }

    fn list(&mut self) -> MetaResult<Vec<Filter>> {
        let mut parts = Vec::new();
        while self.input.get(self.pos) == Some(&b'(') {
            parts.push(self.filter()?);
        }
        if parts.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(parts)
    }

    fn item(&mut self) -> MetaResult<Filter> {
        let start = self.pos;
        while let Some(&b) = self.input.get(self.pos) {
            if b == b'=' {
                break;
            }
            if matches!(b, b'(' | b')' | b'~' | b'<' | b'>') {
                return Err(self.error("unsupported filter type"));
            }
            self.pos += 1;
        }
        let attr = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("attribute is not utf-8"))?
            .trim()
            .to_string();
        if attr.is_empty() {
            return Err(self.error("missing attribute"));
        }
        self.expect(b'=')?;

        let mut value = Vec::new();
        let mut wildcard = false;
        while let Some(&b) = self.input.get(self.pos) {
            match b {
                b')' => break,
                b'(' => return Err(self.error("unescaped '('")),
                b'*' => {
                    wildcard = true;
                    self.pos += 1;
                }
                b'\\' => {
                    let hex = self
                        .input
                        .get(self.pos + 1..self.pos + 3)
                        .ok_or_else(|| self.error("truncated escape"))?;
                    let decoded = std::str::from_utf8(hex)
                        .ok()
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                        .ok_or_else(|| self.error("bad escape"))?;
                    value.push(decoded);
                    self.pos += 3;
                }
                _ => {
                    value.push(b);
                    self.pos += 1;
                }
            }
        }

        if wildcard {
            return if value.is_empty() {
                Ok(Filter::Present(attr))
            } else {
                Err(self.error("substring filters are not supported"))
            };
        }
        let value = String::from_utf8(value).map_err(|_| self.error("value is not utf-8"))?;
        Ok(Filter::Equal(attr, value))
    }
}
