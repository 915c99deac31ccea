//! Account backend API: register, login, file upload, and form validation.

mod http;
mod types;
mod validate;

use async_trait::async_trait;

use crate::error::BackendError;

pub use http::{build_http_client, HttpBackend};
pub use types::{extract_session_token, Address, LoginRequest, RegisterRequest};
pub use validate::{is_plausible_email, validate_login, validate_registration};

/// Register/login operations the reconciliation controller depends on.
///
/// Both return the backend session token on success.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<String, BackendError>;
    async fn login(&self, request: &LoginRequest) -> Result<String, BackendError>;
}

/// Registration failures that mean "this account already exists".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsPolicy {
    statuses: Vec<u16>,
}

impl ExistsPolicy {
    pub fn new(statuses: impl Into<Vec<u16>>) -> Self {
        Self {
            statuses: statuses.into(),
        }
    }

    pub fn statuses(&self) -> &[u16] {
        &self.statuses
    }

    /// True when `err` carries a status listed in this policy.
    pub fn signals_existing_account(&self, err: &BackendError) -> bool {
        err.status_code()
            .is_some_and(|status| self.statuses.contains(&status))
    }
}
