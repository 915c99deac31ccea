//! Service wiring from a loaded [`Config`].

use std::sync::Arc;
use std::time::Duration;

use fedsign::account::AccountClient;
use fedsign::backend::{build_http_client, ExistsPolicy, HttpBackend};
use fedsign::config::Config;
use fedsign::federated::FederatedSignIn;
use fedsign::identity::{
    configured_providers, IdentityAdapter, IdentityEvents, IdentityProvider, SignInPrompt,
};
use fedsign::reconcile::Reconciler;
use fedsign::render::Renderer;
use fedsign::session::SessionCache;
use fedsign::storage::{default_store_path, FileKeyValueStore, KeyValueStore};

/// Everything a subcommand needs, built once per invocation.
pub(crate) struct AppContext {
    pub adapter: Arc<IdentityAdapter>,
    pub cache: Arc<SessionCache>,
    pub federated: FederatedSignIn,
    pub account: AccountClient,
}

pub(crate) fn build_context(config: &Config, renderer: Renderer) -> Result<AppContext, String> {
    let store_path = config
        .storage
        .path
        .clone()
        .or_else(default_store_path)
        .ok_or_else(|| {
            "unable to resolve a storage path; set storage.path in fedsign.toml".to_string()
        })?;
    tracing::debug!(path = %store_path.display(), "using session store");
    let store: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(store_path));

    let http = build_http_client(Duration::from_secs(config.backend.timeout_secs));
    let backend = Arc::new(
        HttpBackend::from_config(&config.backend, http.clone()).map_err(|err| err.to_string())?,
    );

    let prompt: Arc<dyn SignInPrompt> = Arc::new(renderer);
    let adapter = configured_providers(&config.providers, &http, prompt)
        .into_iter()
        .fold(
            IdentityAdapter::new(Arc::clone(&store), IdentityEvents::new()),
            IdentityAdapter::with_provider,
        );
    if let Some(restored) = adapter.restore().map_err(|err| err.to_string())? {
        tracing::debug!(
            provider = %restored.identity.provider,
            epoch = restored.epoch,
            "restored provider session"
        );
    }
    let adapter = Arc::new(adapter);

    let reconciler = Arc::new(reconciler_for(config, backend.clone()));
    let cache = Arc::new(SessionCache::new(store, config.storage.session_key.clone()));
    let federated = FederatedSignIn::new(Arc::clone(&adapter), reconciler, Arc::clone(&cache));
    let account = AccountClient::new(backend, Arc::clone(&cache));

    Ok(AppContext {
        adapter,
        cache,
        federated,
        account,
    })
}

/// Reconciler with the "exists" policy in effect for each provider.
fn reconciler_for(config: &Config, backend: Arc<HttpBackend>) -> Reconciler {
    let default_policy = ExistsPolicy::new(config.backend.exists_statuses.clone());
    IdentityProvider::ALL.into_iter().fold(
        Reconciler::new(backend, default_policy),
        |reconciler, provider| {
            let statuses = config.exists_statuses_for(provider).to_vec();
            reconciler.with_provider_policy(provider, ExistsPolicy::new(statuses))
        },
    )
}
