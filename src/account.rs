//! Direct password login and account registration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{
    validate_login, validate_registration, AccountBackend, Address, HttpBackend, LoginRequest,
    RegisterRequest,
};
use crate::error::{BackendError, StorageError, ValidationError};
use crate::session::SessionCache;

#[derive(Debug)]
pub enum AccountError {
    Validation(ValidationError),
    Backend(BackendError),
    Storage(StorageError),
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Backend(err) => write!(f, "backend: {err}"),
            Self::Storage(err) => write!(f, "session storage: {err}"),
        }
    }
}

impl std::error::Error for AccountError {}

impl From<ValidationError> for AccountError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<BackendError> for AccountError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<StorageError> for AccountError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Input of the registration form.
#[derive(Clone)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<PathBuf>,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("avatar", &self.avatar)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAccount {
    /// Where the uploaded avatar was stored, if one was given.
    pub avatar_location: Option<String>,
    /// Whether the backend returned a session token that is now cached.
    pub session_cached: bool,
}

/// Password-based account operations against the backend.
pub struct AccountClient {
    backend: Arc<HttpBackend>,
    cache: Arc<SessionCache>,
}

impl AccountClient {
    pub fn new(backend: Arc<HttpBackend>, cache: Arc<SessionCache>) -> Self {
        Self { backend, cache }
    }

    /// Validate, log in, and cache the returned session token.
    pub async fn password_login(&self, email: &str, password: &str) -> Result<(), AccountError> {
        validate_login(email, password)?;
        let token = self
            .backend
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.cache.store(&token)?;
        tracing::info!("password login succeeded");
        Ok(())
    }

    /// Validate, upload the avatar if any, and register the account.
    pub async fn register_account(
        &self,
        form: &RegistrationForm,
    ) -> Result<RegisteredAccount, AccountError> {
        validate_registration(&form.name, &form.email, &form.password)?;

        let avatar_location = match &form.avatar {
            Some(path) => Some(self.backend.upload_file(path).await?),
            None => None,
        };
        let request = RegisterRequest {
            username: form.name.clone(),
            email: form.email.clone(),
            password: form.password.clone(),
            confirm_password: form.password.clone(),
            phone_number: String::new(),
            address: Address::default(),
            profile: avatar_location.clone().unwrap_or_default(),
        };

        // A token-less 2xx still means the account was created.
        let session_cached = match self.backend.register(&request).await {
            Ok(token) => {
                self.cache.store(&token)?;
                true
            }
            Err(BackendError::MissingToken(_)) => false,
            Err(err) => return Err(err.into()),
        };
        tracing::info!(session_cached, "account registered");
        Ok(RegisteredAccount {
            avatar_location,
            session_cached,
        })
    }
}
