//! Third-party identity assertion.
//!
//! `IdentityAdapter` runs one generic sign-in flow over any
//! [`ProviderCapabilities`] implementation and publishes identity changes on
//! an [`IdentityEvents`] channel. Google, Facebook, and GitHub variants use
//! the OAuth device authorization grant for their interactive step.

mod adapter;
mod browser;
mod device;
mod error;
mod events;
mod facebook;
mod github;
mod google;
mod provider;
mod types;

use std::sync::Arc;

use crate::config::ProvidersConfig;

pub use adapter::{IdentityAdapter, SignedInIdentity, EXTERNAL_SESSION_KEY};
pub use browser::try_open_browser;
pub use device::{classify_poll_response, DeviceDialect, DeviceFlow, DeviceTokens, PollOutcome};
pub use error::IdentityError;
pub use events::{IdentityEvents, IdentitySnapshot, IdentitySubscription};
pub use facebook::FacebookProvider;
pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use provider::{DeviceCodePrompt, ProviderCapabilities, SignInPrompt, SilentPrompt};
pub use types::{
    ExternalIdentity, ExternalSessionRecord, IdentityProvider, ProviderAssertion,
    SupplementalProfile,
};

/// Build capabilities for every provider with a configured client id.
pub fn configured_providers(
    providers: &ProvidersConfig,
    http: &reqwest::Client,
    prompt: Arc<dyn SignInPrompt>,
) -> Vec<Arc<dyn ProviderCapabilities>> {
    IdentityProvider::ALL
        .into_iter()
        .filter(|provider| providers.get(*provider).is_configured())
        .map(|provider| -> Arc<dyn ProviderCapabilities> {
            let settings = providers.get(provider);
            let http = http.clone();
            let prompt = Arc::clone(&prompt);
            match provider {
                IdentityProvider::Google => {
                    Arc::new(GoogleProvider::from_settings(settings, http, prompt))
                }
                IdentityProvider::Facebook => {
                    Arc::new(FacebookProvider::from_settings(settings, http, prompt))
                }
                IdentityProvider::GitHub => {
                    Arc::new(GitHubProvider::from_settings(settings, http, prompt))
                }
            }
        })
        .collect()
}

/// Configured endpoint value, or `default` when unset or blank.
pub(crate) fn setting_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(default)
        .to_string()
}
