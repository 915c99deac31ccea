//! Provider capability traits.

use async_trait::async_trait;

use super::error::IdentityError;
use super::types::{
    ExternalIdentity, IdentityProvider, ProviderAssertion, SupplementalProfile,
};

/// Operations one identity provider must supply to the adapter.
///
/// The adapter owns the generic flow; implementations only talk to their
/// provider and normalize what comes back.
#[async_trait]
pub trait ProviderCapabilities: Send + Sync {
    fn provider(&self) -> IdentityProvider;

    /// Run the interactive sign-in step.
    async fn sign_in(&self) -> Result<ProviderAssertion, IdentityError>;

    /// Terminate the provider session for `identity`.
    async fn sign_out(&self, identity: &ExternalIdentity) -> Result<(), IdentityError>;

    /// Normalize an assertion into an identity. Missing fields stay `None`.
    fn extract_identity(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<ExternalIdentity, IdentityError>;

    /// One request to the provider's profile API.
    async fn fetch_supplemental_profile(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<SupplementalProfile, IdentityError>;
}

/// Verification details the user needs to approve a device sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodePrompt {
    pub provider: IdentityProvider,
    pub verification_uri: String,
    pub user_code: String,
    pub expires_in_secs: u64,
}

/// Presentation hook for the interactive step.
pub trait SignInPrompt: Send + Sync {
    fn show_device_code(&self, prompt: &DeviceCodePrompt);
}

/// Prompt that shows nothing. Used by headless callers and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPrompt;

impl SignInPrompt for SilentPrompt {
    fn show_device_code(&self, _prompt: &DeviceCodePrompt) {}
}
