//! Identity adapter error definitions.

use std::fmt;

use crate::error::StorageError;

/// Errors surfaced by provider sign-in and sign-out.
#[derive(Debug)]
pub enum IdentityError {
    /// User dismissed, denied, or let the interactive step expire.
    PopupCancelled(String),
    /// Provider failure during the interactive step.
    PopupFailed(String),
    /// Supplementary profile request failed.
    ProfileFetch(String),
    /// Identity still lacks mandatory fields after supplementation.
    MissingIdentityFields(Vec<&'static str>),
    /// Provider refused or failed to terminate the session.
    SignOut(String),
    /// No capability registered for the requested provider.
    UnknownProvider(String),
    Storage(StorageError),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PopupCancelled(msg) => write!(f, "sign-in cancelled: {msg}"),
            Self::PopupFailed(msg) => write!(f, "sign-in failed: {msg}"),
            Self::ProfileFetch(msg) => write!(f, "profile fetch failed: {msg}"),
            Self::MissingIdentityFields(fields) => write!(
                f,
                "provider did not supply required fields: {}",
                fields.join(", ")
            ),
            Self::SignOut(msg) => write!(f, "sign-out failed: {msg}"),
            Self::UnknownProvider(name) => write!(f, "provider `{name}` is not configured"),
            Self::Storage(err) => write!(f, "storage: {err}"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<StorageError> for IdentityError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl IdentityError {
    /// True when the user backed out rather than something breaking.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::PopupCancelled(_))
    }
}
