//! Federated sign-in orchestration: identity adapter, reconciliation, and
//! session caching wired together.

use std::fmt;
use std::sync::Arc;

use crate::error::StorageError;
use crate::identity::{
    ExternalIdentity, IdentityAdapter, IdentityError, IdentityProvider, IdentitySubscription,
};
use crate::reconcile::{ControllerStatus, ReconciliationResult, Reconciler};
use crate::session::{CachedSession, SessionCache};

#[derive(Debug)]
pub enum FederatedError {
    Identity(IdentityError),
    Storage(StorageError),
}

impl fmt::Display for FederatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "session storage: {err}"),
        }
    }
}

impl std::error::Error for FederatedError {}

impl From<IdentityError> for FederatedError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}

impl From<StorageError> for FederatedError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Result of a federated sign-in: the asserted identity plus how the
/// backend account was reconciled.
#[derive(Debug)]
pub struct FederatedSignInResult {
    pub identity: ExternalIdentity,
    pub reconciliation: ReconciliationResult,
}

/// Snapshot for `fedsign status`.
#[derive(Debug, Clone)]
pub struct FederatedStatus {
    pub identity: Option<ExternalIdentity>,
    pub session: Option<CachedSession>,
    pub controller: ControllerStatus,
}

pub struct FederatedSignIn {
    adapter: Arc<IdentityAdapter>,
    reconciler: Arc<Reconciler>,
    cache: Arc<SessionCache>,
    subscription: IdentitySubscription,
}

impl FederatedSignIn {
    /// Subscribe the session cache to identity events.
    ///
    /// A published "no identity" clears the cache at that epoch. The initial
    /// epoch-0 state is not a publication and leaves the cache alone.
    pub fn new(
        adapter: Arc<IdentityAdapter>,
        reconciler: Arc<Reconciler>,
        cache: Arc<SessionCache>,
    ) -> Self {
        let listener_cache = Arc::clone(&cache);
        let subscription = adapter.events().subscribe(move |snapshot| {
            if snapshot.identity.is_some() || snapshot.epoch == 0 {
                return;
            }
            match listener_cache.clear_for_epoch(snapshot.epoch) {
                Ok(true) => tracing::debug!(epoch = snapshot.epoch, "session cleared on sign-out"),
                Ok(false) => {}
                Err(err) => tracing::warn!(error = %err, "failed to clear session on sign-out"),
            }
        });
        Self {
            adapter,
            reconciler,
            cache,
            subscription,
        }
    }

    pub async fn sign_in(
        &self,
        provider: IdentityProvider,
    ) -> Result<FederatedSignInResult, FederatedError> {
        let signed_in = self.adapter.sign_in(provider).await?;
        let reconciliation = self.reconciler.reconcile(&signed_in.identity).await;
        if let Some(token) = reconciliation.session_token.as_deref() {
            if !self.cache.store_for_epoch(signed_in.epoch, token)? {
                tracing::warn!(epoch = signed_in.epoch, "identity changed before session was cached");
            }
        }
        Ok(FederatedSignInResult {
            identity: signed_in.identity,
            reconciliation,
        })
    }

    /// Sign out of the provider, then clear the cached session.
    ///
    /// If the provider does not confirm, the cached session is kept.
    pub async fn sign_out(&self) -> Result<bool, FederatedError> {
        let ended = self.adapter.sign_out().await?;
        let epoch = self.adapter.events().current().epoch;
        self.cache.clear_for_epoch(epoch)?;
        Ok(ended)
    }

    pub fn status(&self) -> Result<FederatedStatus, FederatedError> {
        Ok(FederatedStatus {
            identity: self.adapter.current_session()?,
            session: self.cache.load()?,
            controller: self.reconciler.status(),
        })
    }

    /// Stop reacting to identity events.
    pub fn release(&mut self) {
        self.subscription.release();
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_active()
    }
}
