use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use harbour_content::DEFAULT_MEMORY_SPOOL_LIMIT;
use harbour_meta::{AuthMode, DirectoryAuth, DirectorySettings, MetaBackend, StaticDirectory, StaticEntry};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// File consulted when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "harbour.toml";

/// Server configuration, read once at startup from TOML.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarbourConfig {
    pub listen: SocketAddr,
    /// Host (and port) clients use to reach this server; used in links.
    pub host: String,
    pub scheme: String,
    /// Accept every request without credentials.
    pub public: bool,
    pub admin_user: String,
    /// Management endpoints are disabled while this is empty.
    pub admin_pass: String,
    pub meta: MetaBackend,
    pub content: ContentConfig,
    pub directory: DirectoryConfig,
}

impl Default for HarbourConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            host: "localhost:8080".into(),
            scheme: "http".into(),
            public: false,
            admin_user: "admin".into(),
            admin_pass: String::new(),
            meta: MetaBackend::default(),
            content: ContentConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub path: PathBuf,
    pub memory_spool_limit: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("harbour-content"),
            memory_spool_limit: DEFAULT_MEMORY_SPOOL_LIMIT,
        }
    }
}

/// Directory authentication. When enabled, local users are bypassed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub settings: DirectorySettings,
    pub entries: Vec<StaticEntry>,
}

impl HarbourConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from `explicit` if given, else from `harbour.toml` in the
    /// working directory if it exists, else use defaults.
    pub fn resolve(explicit: Option<&Path>) -> ServerResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn is_https(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }

    /// Scheme used when building links; anything but `https` means `http`.
    pub fn link_scheme(&self) -> &'static str {
        if self.is_https() {
            "https"
        } else {
            "http"
        }
    }

    pub fn admin_enabled(&self) -> bool {
        !self.admin_user.is_empty() && !self.admin_pass.is_empty()
    }

    pub fn auth_mode(&self) -> AuthMode {
        if self.public {
            AuthMode::Public
        } else if self.directory.enabled {
            let directory = StaticDirectory::new(self.directory.entries.clone());
            AuthMode::Directory(DirectoryAuth::new(
                Arc::new(directory),
                self.directory.settings.clone(),
            ))
        } else {
            AuthMode::Local
        }
    }

    /// A copy safe to print: secrets are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.admin_pass.is_empty() {
            copy.admin_pass = "********".into();
        }
        for entry in &mut copy.directory.entries {
            entry.password_hash = "********".into();
        }
        copy
    }
}
