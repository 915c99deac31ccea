//! Generic provider sign-in flow.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::IdentityError;
use super::events::IdentityEvents;
use super::provider::ProviderCapabilities;
use super::types::{ExternalIdentity, ExternalSessionRecord, IdentityProvider};
use crate::error::StorageError;
use crate::storage::KeyValueStore;

/// Storage key for the active provider session marker.
pub const EXTERNAL_SESSION_KEY: &str = "externalSession";

/// Identity returned by a successful sign-in with its publication epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInIdentity {
    pub identity: ExternalIdentity,
    pub epoch: u64,
}

/// Runs provider sign-in/sign-out and publishes identity changes.
pub struct IdentityAdapter {
    providers: BTreeMap<IdentityProvider, Arc<dyn ProviderCapabilities>>,
    events: IdentityEvents,
    store: Arc<dyn KeyValueStore>,
}

impl IdentityAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>, events: IdentityEvents) -> Self {
        Self {
            providers: BTreeMap::new(),
            events,
            store,
        }
    }

    /// Register a provider capability, replacing any earlier one.
    pub fn with_provider(mut self, capability: Arc<dyn ProviderCapabilities>) -> Self {
        self.providers.insert(capability.provider(), capability);
        self
    }

    pub fn events(&self) -> &IdentityEvents {
        &self.events
    }

    pub fn supports(&self, provider: IdentityProvider) -> bool {
        self.providers.contains_key(&provider)
    }

    pub fn configured_providers(&self) -> Vec<IdentityProvider> {
        self.providers.keys().copied().collect()
    }

    /// Sign in with `provider` and publish the resulting identity.
    pub async fn sign_in(
        &self,
        provider: IdentityProvider,
    ) -> Result<SignedInIdentity, IdentityError> {
        let capability = self
            .providers
            .get(&provider)
            .ok_or_else(|| IdentityError::UnknownProvider(provider.key().to_string()))?;

        tracing::info!(provider = %provider, "identity sign-in started");
        let assertion = capability.sign_in().await?;
        let mut identity = capability.extract_identity(&assertion)?;

        if !identity.missing_required_fields().is_empty() {
            tracing::debug!(provider = %provider, "fetching supplemental profile");
            let profile = capability.fetch_supplemental_profile(&assertion).await?;
            identity.merge_supplemental(profile);
        }
        let missing = identity.missing_required_fields();
        if !missing.is_empty() {
            tracing::warn!(provider = %provider, ?missing, "identity incomplete");
            return Err(IdentityError::MissingIdentityFields(missing));
        }

        self.persist(&identity)?;
        let epoch = self.events.publish(Some(identity.clone()));
        tracing::info!(provider = %provider, epoch, "identity published");
        Ok(SignedInIdentity { identity, epoch })
    }

    /// End the provider session, if any.
    ///
    /// Returns `false` when nobody was signed in. The persisted marker is
    /// removed and "no identity" published only after the provider confirms.
    pub async fn sign_out(&self) -> Result<bool, IdentityError> {
        let Some(identity) = self.current_session()? else {
            return Ok(false);
        };
        match self.providers.get(&identity.provider) {
            Some(capability) => capability.sign_out(&identity).await?,
            None => tracing::warn!(
                provider = %identity.provider,
                "provider no longer configured; ending local session only"
            ),
        }
        self.store.remove(EXTERNAL_SESSION_KEY)?;
        let epoch = self.events.publish(None);
        tracing::info!(provider = %identity.provider, epoch, "identity signed out");
        Ok(true)
    }

    /// Republish a persisted provider session after a restart.
    pub fn restore(&self) -> Result<Option<SignedInIdentity>, IdentityError> {
        let Some(identity) = self.current_session()? else {
            return Ok(None);
        };
        let epoch = self.events.publish(Some(identity.clone()));
        Ok(Some(SignedInIdentity { identity, epoch }))
    }

    /// Provider session recorded in storage, if any.
    pub fn current_session(&self) -> Result<Option<ExternalIdentity>, IdentityError> {
        let Some(raw) = self.store.get(EXTERNAL_SESSION_KEY)? else {
            return Ok(None);
        };
        let record: ExternalSessionRecord = serde_json::from_str(&raw).map_err(|err| {
            StorageError::Invalid(format!("stored external session is malformed: {err}"))
        })?;
        Ok(Some(record.into()))
    }

    fn persist(&self, identity: &ExternalIdentity) -> Result<(), IdentityError> {
        let record = ExternalSessionRecord::from(identity);
        let raw = serde_json::to_string(&record).map_err(|err| {
            StorageError::Invalid(format!("failed to encode external session: {err}"))
        })?;
        self.store.set(EXTERNAL_SESSION_KEY, &raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::types::{ProviderAssertion, SupplementalProfile};
    use crate::storage::MemoryKeyValueStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted provider double.
    struct FakeProvider {
        asserted: ExternalIdentity,
        supplemental: Result<SupplementalProfile, String>,
        sign_in_error: Mutex<Option<IdentityError>>,
        sign_out_error: Option<String>,
        supplemental_calls: AtomicUsize,
        sign_out_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(asserted: ExternalIdentity) -> Self {
            Self {
                asserted,
                supplemental: Ok(SupplementalProfile::default()),
                sign_in_error: Mutex::new(None),
                sign_out_error: None,
                supplemental_calls: AtomicUsize::new(0),
                sign_out_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProviderCapabilities for FakeProvider {
        fn provider(&self) -> IdentityProvider {
            self.asserted.provider
        }

        async fn sign_in(&self) -> Result<ProviderAssertion, IdentityError> {
            if let Some(err) = self.sign_in_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(ProviderAssertion {
                provider: self.asserted.provider,
                access_token: "provider-token".to_string(),
                id_token: None,
                profile: serde_json::Value::Null,
            })
        }

        async fn sign_out(&self, _identity: &ExternalIdentity) -> Result<(), IdentityError> {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            match &self.sign_out_error {
                Some(msg) => Err(IdentityError::SignOut(msg.clone())),
                None => Ok(()),
            }
        }

        fn extract_identity(
            &self,
            _assertion: &ProviderAssertion,
        ) -> Result<ExternalIdentity, IdentityError> {
            Ok(self.asserted.clone())
        }

        async fn fetch_supplemental_profile(
            &self,
            _assertion: &ProviderAssertion,
        ) -> Result<SupplementalProfile, IdentityError> {
            self.supplemental_calls.fetch_add(1, Ordering::SeqCst);
            self.supplemental.clone().map_err(IdentityError::ProfileFetch)
        }
    }

    fn adapter_with(provider: Arc<FakeProvider>) -> (IdentityAdapter, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let adapter =
            IdentityAdapter::new(store.clone(), IdentityEvents::new()).with_provider(provider);
        (adapter, store)
    }

    fn complete_identity() -> ExternalIdentity {
        ExternalIdentity::new(IdentityProvider::Google, "sub-1")
            .with_email("a@example.com")
            .with_display_name("Alice")
            .with_access_token("provider-token")
    }

    #[tokio::test]
    async fn complete_identity_skips_supplemental_fetch_and_persists() {
        let provider = Arc::new(FakeProvider::new(complete_identity()));
        let (adapter, store) = adapter_with(provider.clone());

        let signed_in = adapter.sign_in(IdentityProvider::Google).await.unwrap();
        assert_eq!(signed_in.epoch, 1);
        assert_eq!(signed_in.identity.email.as_deref(), Some("a@example.com"));
        assert_eq!(provider.supplemental_calls.load(Ordering::SeqCst), 0);
        assert!(store.get(EXTERNAL_SESSION_KEY).unwrap().is_some());
        assert_eq!(adapter.events().current().identity, Some(signed_in.identity));
    }

    #[tokio::test]
    async fn missing_email_triggers_exactly_one_supplemental_fetch() {
        let mut fake = FakeProvider::new(
            ExternalIdentity::new(IdentityProvider::Facebook, "fb-1").with_display_name("Fay"),
        );
        fake.supplemental = Ok(SupplementalProfile {
            email: Some("fay@example.com".to_string()),
            display_name: Some("Other".to_string()),
            avatar_url: None,
        });
        let provider = Arc::new(fake);
        let (adapter, _) = adapter_with(provider.clone());

        let signed_in = adapter.sign_in(IdentityProvider::Facebook).await.unwrap();
        assert_eq!(provider.supplemental_calls.load(Ordering::SeqCst), 1);
        assert_eq!(signed_in.identity.email.as_deref(), Some("fay@example.com"));
        assert_eq!(signed_in.identity.display_name.as_deref(), Some("Fay"));
    }

    #[tokio::test]
    async fn still_missing_fields_fail_without_publishing() {
        let provider = Arc::new(FakeProvider::new(ExternalIdentity::new(
            IdentityProvider::GitHub,
            "gh-1",
        )));
        let (adapter, store) = adapter_with(provider.clone());

        let err = adapter.sign_in(IdentityProvider::GitHub).await.unwrap_err();
        match err {
            IdentityError::MissingIdentityFields(fields) => {
                assert_eq!(fields, vec!["email", "displayName"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(provider.supplemental_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.events().current().epoch, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn supplemental_failure_is_profile_fetch_error() {
        let mut fake = FakeProvider::new(
            ExternalIdentity::new(IdentityProvider::GitHub, "gh-1").with_display_name("Octo"),
        );
        fake.supplemental = Err("403".to_string());
        let (adapter, _) = adapter_with(Arc::new(fake));
        let err = adapter.sign_in(IdentityProvider::GitHub).await.unwrap_err();
        assert!(matches!(err, IdentityError::ProfileFetch(_)));
    }

    #[tokio::test]
    async fn cancelled_popup_propagates() {
        let fake = FakeProvider::new(complete_identity());
        *fake.sign_in_error.lock().unwrap() =
            Some(IdentityError::PopupCancelled("closed".to_string()));
        let (adapter, _) = adapter_with(Arc::new(fake));
        let err = adapter.sign_in(IdentityProvider::Google).await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn unregistered_provider_is_rejected() {
        let (adapter, _) = adapter_with(Arc::new(FakeProvider::new(complete_identity())));
        let err = adapter.sign_in(IdentityProvider::Facebook).await.unwrap_err();
        assert!(matches!(err, IdentityError::UnknownProvider(name) if name == "facebook"));
    }

    #[tokio::test]
    async fn sign_out_confirms_then_clears_and_publishes_none() {
        let provider = Arc::new(FakeProvider::new(complete_identity()));
        let (adapter, store) = adapter_with(provider.clone());
        adapter.sign_in(IdentityProvider::Google).await.unwrap();

        assert!(adapter.sign_out().await.unwrap());
        assert_eq!(provider.sign_out_calls.load(Ordering::SeqCst), 1);
        assert!(store.get(EXTERNAL_SESSION_KEY).unwrap().is_none());
        assert_eq!(adapter.events().current().identity, None);

        assert!(!adapter.sign_out().await.unwrap(), "second sign-out is a no-op");
        assert_eq!(provider.sign_out_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_provider_sign_out_keeps_session() {
        let mut fake = FakeProvider::new(complete_identity());
        fake.sign_out_error = Some("network".to_string());
        let (adapter, store) = adapter_with(Arc::new(fake));
        adapter.sign_in(IdentityProvider::Google).await.unwrap();

        assert!(matches!(
            adapter.sign_out().await,
            Err(IdentityError::SignOut(_))
        ));
        assert!(store.get(EXTERNAL_SESSION_KEY).unwrap().is_some());
        assert!(adapter.events().current().identity.is_some());
    }

    #[tokio::test]
    async fn restore_republishes_persisted_session() {
        let provider = Arc::new(FakeProvider::new(complete_identity()));
        let (adapter, store) = adapter_with(provider.clone());
        adapter.sign_in(IdentityProvider::Google).await.unwrap();

        let fresh = IdentityAdapter::new(store, IdentityEvents::new()).with_provider(provider);
        let restored = fresh.restore().unwrap().expect("restored");
        assert_eq!(restored.epoch, 1);
        assert_eq!(restored.identity.subject_id, "sub-1");
        assert_eq!(restored.identity.provider_access_token.as_deref(), Some("provider-token"));
    }

    #[test]
    fn malformed_session_record_is_storage_error() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set(EXTERNAL_SESSION_KEY, "{not json").unwrap();
        let adapter = IdentityAdapter::new(store, IdentityEvents::new());
        assert!(matches!(
            adapter.current_session(),
            Err(IdentityError::Storage(_))
        ));
    }
}
