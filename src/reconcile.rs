//! Register-else-login reconciliation of an external identity with the
//! account backend.
//!
//! State moves Idle -> Pending -> Succeeded | Failed and is observable through
//! a watch channel. A call made while another is pending is rejected without
//! touching the state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::backend::{AccountBackend, Address, ExistsPolicy, LoginRequest, RegisterRequest};
use crate::credential::SynthesizedCredential;
use crate::error::BackendError;
use crate::identity::{ExternalIdentity, IdentityProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// Observable controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub state: ReconcileState,
    pub last_error: Option<String>,
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            state: ReconcileState::Idle,
            last_error: None,
        }
    }
}

impl ControllerStatus {
    pub fn is_pending(&self) -> bool {
        self.state == ReconcileState::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Registered,
    LoggedIn,
    Failed,
}

#[derive(Debug)]
pub enum ReconcileError {
    /// Registration failed with a status outside the "exists" policy.
    Registration(BackendError),
    /// Registration signalled an existing account and the login fallback failed.
    Login(BackendError),
    /// Identity has no email; no backend call was made.
    IncompleteIdentity,
    /// Another reconciliation is still pending on this controller.
    AlreadyPending,
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration(err) => write!(f, "registration failed: {err}"),
            Self::Login(err) => write!(f, "login after existing-account response failed: {err}"),
            Self::IncompleteIdentity => write!(f, "identity has no email address"),
            Self::AlreadyPending => write!(f, "a sign-in is already in progress"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registration(err) | Self::Login(err) => Some(err),
            Self::IncompleteIdentity | Self::AlreadyPending => None,
        }
    }
}

/// Result of one `reconcile` call.
pub struct ReconciliationResult {
    pub outcome: ReconcileOutcome,
    pub session_token: Option<String>,
    pub error: Option<ReconcileError>,
}

impl ReconciliationResult {
    fn success(outcome: ReconcileOutcome, token: String) -> Self {
        Self {
            outcome,
            session_token: Some(token),
            error: None,
        }
    }

    fn failed(error: ReconcileError) -> Self {
        Self {
            outcome: ReconcileOutcome::Failed,
            session_token: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome != ReconcileOutcome::Failed
    }
}

impl fmt::Debug for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationResult")
            .field("outcome", &self.outcome)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("error", &self.error)
            .finish()
    }
}

/// Account reconciliation controller.
pub struct Reconciler {
    backend: Arc<dyn AccountBackend>,
    default_policy: ExistsPolicy,
    provider_policies: BTreeMap<IdentityProvider, ExistsPolicy>,
    status: watch::Sender<ControllerStatus>,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn AccountBackend>, default_policy: ExistsPolicy) -> Self {
        let (status, _) = watch::channel(ControllerStatus::default());
        Self {
            backend,
            default_policy,
            provider_policies: BTreeMap::new(),
            status,
        }
    }

    /// Override the "exists" policy for one provider.
    pub fn with_provider_policy(mut self, provider: IdentityProvider, policy: ExistsPolicy) -> Self {
        self.provider_policies.insert(provider, policy);
        self
    }

    pub fn policy_for(&self, provider: IdentityProvider) -> &ExistsPolicy {
        self.provider_policies
            .get(&provider)
            .unwrap_or(&self.default_policy)
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    /// Ensure a backend account exists for `identity` and obtain a session.
    pub async fn reconcile(&self, identity: &ExternalIdentity) -> ReconciliationResult {
        let acquired = self.status.send_if_modified(|status| {
            if status.is_pending() {
                return false;
            }
            *status = ControllerStatus {
                state: ReconcileState::Pending,
                last_error: None,
            };
            true
        });
        if !acquired {
            tracing::debug!(provider = %identity.provider, "reconciliation already pending");
            return ReconciliationResult::failed(ReconcileError::AlreadyPending);
        }

        let mut guard = PendingGuard {
            status: &self.status,
            armed: true,
        };
        let result = self.register_else_login(identity).await;
        guard.settle(&result);
        result
    }

    async fn register_else_login(&self, identity: &ExternalIdentity) -> ReconciliationResult {
        let Some(email) = identity.email.clone() else {
            tracing::warn!(provider = %identity.provider, "identity without email; skipping backend");
            return ReconciliationResult::failed(ReconcileError::IncompleteIdentity);
        };
        let credential = SynthesizedCredential::for_identity(identity);
        let request = RegisterRequest {
            username: credential.username.clone(),
            email: email.clone(),
            password: credential.password().to_string(),
            confirm_password: credential.password().to_string(),
            phone_number: identity.phone_number.clone().unwrap_or_default(),
            address: Address::default(),
            profile: identity.avatar_url.clone().unwrap_or_default(),
        };

        tracing::info!(
            provider = %identity.provider,
            username = %credential.username,
            "registering federated account"
        );
        let err = match self.backend.register(&request).await {
            Ok(token) => {
                tracing::info!(provider = %identity.provider, "account registered");
                return ReconciliationResult::success(ReconcileOutcome::Registered, token);
            }
            Err(err) => err,
        };

        if !self.policy_for(identity.provider).signals_existing_account(&err) {
            tracing::warn!(provider = %identity.provider, status = ?err.status_code(), "registration failed");
            return ReconciliationResult::failed(ReconcileError::Registration(err));
        }

        tracing::info!(
            provider = %identity.provider,
            status = ?err.status_code(),
            "account exists; falling back to login"
        );
        let login = LoginRequest {
            email,
            password: credential.password().to_string(),
        };
        match self.backend.login(&login).await {
            Ok(token) => {
                tracing::info!(provider = %identity.provider, "logged in to existing account");
                ReconciliationResult::success(ReconcileOutcome::LoggedIn, token)
            }
            Err(err) => {
                tracing::warn!(provider = %identity.provider, status = ?err.status_code(), "login fallback failed");
                ReconciliationResult::failed(ReconcileError::Login(err))
            }
        }
    }
}

/// Clears Pending when a reconciliation ends or is dropped mid-flight.
struct PendingGuard<'a> {
    status: &'a watch::Sender<ControllerStatus>,
    armed: bool,
}

impl PendingGuard<'_> {
    fn settle(&mut self, result: &ReconciliationResult) {
        self.armed = false;
        let next = match &result.error {
            None => ControllerStatus {
                state: ReconcileState::Succeeded,
                last_error: None,
            },
            Some(err) => ControllerStatus {
                state: ReconcileState::Failed,
                last_error: Some(err.to_string()),
            },
        };
        self.status.send_replace(next);
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.status.send_replace(ControllerStatus::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Backend double replaying scripted register/login answers.
    #[derive(Default)]
    struct ScriptedBackend {
        register: Mutex<Vec<Result<String, BackendError>>>,
        login: Mutex<Vec<Result<String, BackendError>>>,
        registered: Mutex<Vec<RegisterRequest>>,
        logins: Mutex<Vec<LoginRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedBackend {
        fn new(
            register: Vec<Result<String, BackendError>>,
            login: Vec<Result<String, BackendError>>,
        ) -> Self {
            Self {
                register: Mutex::new(register),
                login: Mutex::new(login),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl AccountBackend for ScriptedBackend {
        async fn register(&self, request: &RegisterRequest) -> Result<String, BackendError> {
            self.registered.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.register.lock().unwrap().remove(0)
        }

        async fn login(&self, request: &LoginRequest) -> Result<String, BackendError> {
            self.logins.lock().unwrap().push(request.clone());
            self.login.lock().unwrap().remove(0)
        }
    }

    fn identity() -> ExternalIdentity {
        ExternalIdentity::new(IdentityProvider::GitHub, "42")
            .with_email("octo@example.com")
            .with_display_name("The Octocat")
            .with_avatar_url("https://avatars.example/42")
    }

    fn reconciler(backend: Arc<ScriptedBackend>) -> Reconciler {
        Reconciler::new(backend, ExistsPolicy::new([400, 200]))
    }

    #[tokio::test]
    async fn new_account_registers_without_login() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("t-reg".into())], vec![]));
        let controller = reconciler(backend.clone());

        let result = controller.reconcile(&identity()).await;
        assert_eq!(result.outcome, ReconcileOutcome::Registered);
        assert_eq!(result.session_token.as_deref(), Some("t-reg"));
        assert!(backend.logins.lock().unwrap().is_empty());
        assert_eq!(controller.status().state, ReconcileState::Succeeded);

        let sent = &backend.registered.lock().unwrap()[0];
        assert_eq!(sent.username, "The_Octocat");
        assert_eq!(sent.password, sent.confirm_password);
        assert_eq!(sent.profile, "https://avatars.example/42");
        assert_eq!(sent.phone_number, "");
        assert_eq!(sent.address, Address::default());
    }

    #[tokio::test]
    async fn exists_status_falls_back_to_login_with_same_password() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Err(BackendError::Status(400, "exists".into()))],
            vec![Ok("t-login".into())],
        ));
        let controller = reconciler(backend.clone());

        let result = controller.reconcile(&identity()).await;
        assert_eq!(result.outcome, ReconcileOutcome::LoggedIn);
        assert_eq!(result.session_token.as_deref(), Some("t-login"));

        let registered = backend.registered.lock().unwrap();
        let logins = backend.logins.lock().unwrap();
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].email, "octo@example.com");
        assert_eq!(logins[0].password, registered[0].password);
    }

    #[tokio::test]
    async fn tokenless_success_counts_as_exists() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Err(BackendError::MissingToken(200))],
            vec![Ok("t".into())],
        ));
        let result = reconciler(backend).reconcile(&identity()).await;
        assert_eq!(result.outcome, ReconcileOutcome::LoggedIn);
    }

    #[tokio::test]
    async fn failed_login_fallback_reports_login_error() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Err(BackendError::Status(400, "exists".into()))],
            vec![Err(BackendError::Status(401, "bad credentials".into()))],
        ));
        let controller = reconciler(backend);
        let result = controller.reconcile(&identity()).await;
        assert_eq!(result.outcome, ReconcileOutcome::Failed);
        assert!(matches!(result.error, Some(ReconcileError::Login(_))));
        let status = controller.status();
        assert_eq!(status.state, ReconcileState::Failed);
        assert!(status.last_error.unwrap().contains("bad credentials"));
    }

    #[tokio::test]
    async fn other_registration_errors_skip_login() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Err(BackendError::Status(500, "boom".into()))],
            vec![],
        ));
        let controller = reconciler(backend.clone());
        let result = controller.reconcile(&identity()).await;
        assert!(matches!(result.error, Some(ReconcileError::Registration(_))));
        assert!(backend.logins.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_policy_overrides_default() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Err(BackendError::MissingToken(200))],
            vec![],
        ));
        let controller = reconciler(backend.clone())
            .with_provider_policy(IdentityProvider::GitHub, ExistsPolicy::new([400]));
        let result = controller.reconcile(&identity()).await;
        assert!(matches!(result.error, Some(ReconcileError::Registration(_))));
        assert!(backend.logins.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn identity_without_email_makes_no_backend_call() {
        let backend = Arc::new(ScriptedBackend::default());
        let controller = reconciler(backend.clone());
        let bare = ExternalIdentity::new(IdentityProvider::Google, "1").with_display_name("G");
        let result = controller.reconcile(&bare).await;
        assert!(matches!(result.error, Some(ReconcileError::IncompleteIdentity)));
        assert!(backend.registered.lock().unwrap().is_empty());
        assert_eq!(controller.status().state, ReconcileState::Failed);
    }

    #[tokio::test]
    async fn concurrent_call_is_rejected_while_pending() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend {
            gate: Some(gate.clone()),
            ..ScriptedBackend::new(vec![Ok("t".into())], vec![])
        });
        let controller = Arc::new(reconciler(backend.clone()));
        let mut status = controller.subscribe_status();

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.reconcile(&identity()).await }
        });
        status.wait_for(ControllerStatus::is_pending).await.unwrap();

        let second = controller.reconcile(&identity()).await;
        assert!(matches!(second.error, Some(ReconcileError::AlreadyPending)));
        assert!(controller.status().is_pending(), "rejection leaves state alone");

        gate.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.outcome, ReconcileOutcome::Registered);
        assert_eq!(backend.registered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn abandoned_reconciliation_returns_to_idle() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend {
            gate: Some(gate),
            ..ScriptedBackend::new(vec![Ok("t".into())], vec![])
        });
        let controller = Arc::new(reconciler(backend));
        let mut status = controller.subscribe_status();

        let task = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.reconcile(&identity()).await }
        });
        status.wait_for(ControllerStatus::is_pending).await.unwrap();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(controller.status(), ControllerStatus::default());
    }

    #[tokio::test]
    async fn new_attempt_clears_previous_error() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Err(BackendError::Status(500, "boom".into())), Ok("t".into())],
            vec![],
        ));
        let controller = reconciler(backend);
        controller.reconcile(&identity()).await;
        assert!(controller.status().last_error.is_some());
        let result = controller.reconcile(&identity()).await;
        assert!(result.is_success());
        assert_eq!(controller.status().last_error, None);
    }
}
