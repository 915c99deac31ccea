//! Shared error types for config, storage, and backend layers.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors from the durable key/value storage layer.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Invalid(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Invalid(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Errors from the account backend HTTP API.
#[derive(Debug)]
pub enum BackendError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the backend.
    Status(u16, String),
    /// 2xx status whose body carried no session token.
    MissingToken(u16),
    /// Request could not be built or response could not be decoded.
    Invalid(String),
}

impl BackendError {
    /// HTTP status carried by this error, when the backend answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(code, _) | Self::MissingToken(code) => Some(*code),
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            Self::Invalid(_) => None,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status(code, body) => write!(f, "status {code}: {body}"),
            Self::MissingToken(code) => {
                write!(f, "status {code}: response did not include a session token")
            }
            Self::Invalid(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Client-side form validation failure listing every rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

/// One rejected form field and its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    /// Message recorded for `field`, if it was rejected.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.message.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .fields
            .iter()
            .map(|entry| format!("{}: {}", entry.field, entry.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "invalid input: {joined}")
    }
}

impl std::error::Error for ValidationError {}
