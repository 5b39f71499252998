//! Runtime configuration.
//!
//! Values come from an optional JSON file under the user config directory,
//! then environment variables override them field by field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connectivity::TcpProbe;
use crate::error::{Error, Result};
use crate::remote::HttpRemoteStore;
use crate::util::{is_http_url, normalize_text_option};

const CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_COLLECTION: &str = "books";
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 3;

pub const ENV_DB_PATH: &str = "SHELF_DB_PATH";
pub const ENV_REMOTE_URL: &str = "SHELF_REMOTE_URL";
pub const ENV_AUTH_TOKEN: &str = "SHELF_AUTH_TOKEN";
pub const ENV_COLLECTION: &str = "SHELF_COLLECTION";
pub const ENV_PROBE_HOST: &str = "SHELF_PROBE_HOST";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShelfConfig {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// `host:port` probed for reachability; derived from `remote_url` when unset.
    #[serde(default)]
    pub probe_host: Option<String>,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            remote_url: None,
            auth_token: None,
            collection: default_collection(),
            probe_host: None,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
        }
    }
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

const fn default_probe_interval_secs() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECS
}

const fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shelf").join(CONFIG_FILE_NAME))
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelf")
        .join("shelf.db")
}

impl ShelfConfig {
    /// Load the default config file (if any), then apply the process environment.
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `lookup`, which maps an environment variable name
    /// to its value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db_path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(db_path));
        }
        if let Some(remote_url) = normalize_text_option(lookup(ENV_REMOTE_URL)) {
            self.remote_url = Some(remote_url);
        }
        if let Some(auth_token) = normalize_text_option(lookup(ENV_AUTH_TOKEN)) {
            self.auth_token = Some(auth_token);
        }
        if let Some(collection) = normalize_text_option(lookup(ENV_COLLECTION)) {
            self.collection = collection;
        }
        if let Some(probe_host) = normalize_text_option(lookup(ENV_PROBE_HOST)) {
            self.probe_host = Some(probe_host);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(remote_url) = &self.remote_url {
            if !is_http_url(remote_url) {
                return Err(Error::Config(
                    "remote_url must include http:// or https://".to_string(),
                ));
            }
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Config("collection must not be empty".to_string()));
        }
        if self.probe_interval_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(Error::Config(
                "probe interval and timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    pub const fn has_remote(&self) -> bool {
        self.remote_url.is_some()
    }

    /// HTTP client for the configured remote, `None` when running local-only.
    pub fn http_remote(&self) -> Result<Option<HttpRemoteStore>> {
        let Some(remote_url) = &self.remote_url else {
            return Ok(None);
        };
        let store = HttpRemoteStore::new(remote_url.clone(), self.collection.clone())
            .map_err(|error| Error::Config(error.to_string()))?
            .with_auth_token(self.auth_token.clone());
        Ok(Some(store))
    }

    /// Reachability probe for the remote, `None` without a usable target.
    pub fn tcp_probe(&self) -> Option<TcpProbe> {
        let target = self
            .probe_host
            .clone()
            .or_else(|| self.remote_url.as_deref().and_then(probe_target_from_url))?;
        Some(
            TcpProbe::new(target)
                .with_interval(Duration::from_secs(self.probe_interval_secs))
                .with_timeout(Duration::from_secs(self.probe_timeout_secs)),
        )
    }

    fn normalize(&mut self) {
        self.remote_url = normalize_text_option(self.remote_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.auth_token = normalize_text_option(self.auth_token.take());
        self.probe_host = normalize_text_option(self.probe_host.take());
        self.collection = self.collection.trim().to_string();
    }
}

/// `host:port` for an `http(s)://` URL, using the scheme's default port.
fn probe_target_from_url(url: &str) -> Option<String> {
    let (rest, default_port) = if let Some(rest) = url.strip_prefix("https://") {
        (rest, 443)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (rest, 80)
    } else {
        return None;
    };

    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    if host_port.is_empty() {
        return None;
    }

    let has_port = match host_port.strip_prefix('[') {
        Some(bracketed) => bracketed.contains("]:"),
        None => host_port.contains(':'),
    };
    if has_port {
        Some(host_port.to_string())
    } else {
        Some(format!("{host_port}:{default_port}"))
    }
}
