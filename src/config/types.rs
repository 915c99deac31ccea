//! Configuration data model.
//!
//! Structs deserialize straight from `fedsign.toml`; every section and field
//! is optional and falls back to the defaults in `config::defaults`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::{
    DEFAULT_EXISTS_STATUSES, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOGIN_PATH, DEFAULT_LOG_FILTER,
    DEFAULT_REGISTER_PATH, DEFAULT_SESSION_KEY, DEFAULT_UPLOAD_PATH,
};
use crate::identity::IdentityProvider;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub providers: ProvidersConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// "Account already exists" statuses in effect for `provider`.
    ///
    /// A provider-level `exists_statuses` list replaces the backend-wide one.
    pub fn exists_statuses_for(&self, provider: IdentityProvider) -> &[u16] {
        self.providers
            .get(provider)
            .exists_statuses
            .as_deref()
            .unwrap_or(&self.backend.exists_statuses)
    }
}

/// Account backend endpoints and reconciliation policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub register_path: String,
    pub login_path: String,
    pub upload_path: String,
    /// Registration statuses that mean "account already exists".
    pub exists_statuses: Vec<u16>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            register_path: DEFAULT_REGISTER_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            exists_statuses: DEFAULT_EXISTS_STATUSES.to_vec(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Durable session storage settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit storage file; `None` uses `~/.config/fedsign/session.json`.
    pub path: Option<PathBuf>,
    /// Fixed key under which the backend session token is cached.
    pub session_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

/// Per-provider client registrations.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google: ProviderSettings,
    pub facebook: ProviderSettings,
    pub github: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, provider: IdentityProvider) -> &ProviderSettings {
        match provider {
            IdentityProvider::Google => &self.google,
            IdentityProvider::Facebook => &self.facebook,
            IdentityProvider::GitHub => &self.github,
        }
    }

    pub fn get_mut(&mut self, provider: IdentityProvider) -> &mut ProviderSettings {
        match provider {
            IdentityProvider::Google => &mut self.google,
            IdentityProvider::Facebook => &mut self.facebook,
            IdentityProvider::GitHub => &mut self.github,
        }
    }
}

/// OAuth client registration plus optional endpoint overrides for one provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub device_code_url: Option<String>,
    pub token_url: Option<String>,
    /// REST API root (GitHub API, Facebook Graph) for profile calls.
    pub api_base_url: Option<String>,
    /// Userinfo endpoint (Google).
    pub profile_url: Option<String>,
    pub revoke_url: Option<String>,
    pub exists_statuses: Option<Vec<u16>>,
}

impl ProviderSettings {
    /// True when a client id is configured.
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
    }

    /// Client secret with blank values treated as absent.
    pub fn secret(&self) -> Option<&str> {
        self.client_secret
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Outcome of `fedsign init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalConfigInitResult {
    Created { path: PathBuf },
    AlreadyInitialized { path: PathBuf },
    Overwritten { path: PathBuf, backup_path: PathBuf },
}
