//! Google sign-in over the OAuth device flow with OpenID Connect claims.

use async_trait::async_trait;
use base64::Engine as _;
use std::sync::Arc;

use super::device::{DeviceDialect, DeviceFlow};
use super::error::IdentityError;
use super::provider::{ProviderCapabilities, SignInPrompt};
use super::setting_or;
use super::types::{
    json_id, json_str, ExternalIdentity, IdentityProvider, ProviderAssertion, SupplementalProfile,
};
use crate::config::ProviderSettings;

const GOOGLE_DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const GOOGLE_SCOPE: &str = "openid email profile";

pub struct GoogleProvider {
    flow: DeviceFlow,
    userinfo_url: String,
    revoke_url: String,
    http: reqwest::Client,
    prompt: Arc<dyn SignInPrompt>,
}

impl GoogleProvider {
    pub fn from_settings(
        settings: &ProviderSettings,
        http: reqwest::Client,
        prompt: Arc<dyn SignInPrompt>,
    ) -> Self {
        let flow = DeviceFlow {
            provider: IdentityProvider::Google,
            dialect: DeviceDialect::Standard,
            device_code_url: setting_or(&settings.device_code_url, GOOGLE_DEVICE_CODE_URL),
            token_url: setting_or(&settings.token_url, GOOGLE_TOKEN_URL),
            client_id: settings.client_id.trim().to_string(),
            client_secret: settings.secret().map(str::to_string),
            scope: setting_or(&settings.scope, GOOGLE_SCOPE),
        };
        Self {
            flow,
            userinfo_url: setting_or(&settings.profile_url, GOOGLE_USERINFO_URL),
            revoke_url: setting_or(&settings.revoke_url, GOOGLE_REVOKE_URL),
            http,
            prompt,
        }
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<serde_json::Value, String> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("userinfo returned status {code}: {body}"));
        }
        response.json().await.map_err(|err| err.to_string())
    }
}

#[async_trait]
impl ProviderCapabilities for GoogleProvider {
    fn provider(&self) -> IdentityProvider {
        IdentityProvider::Google
    }

    async fn sign_in(&self) -> Result<ProviderAssertion, IdentityError> {
        let tokens = self.flow.run(&self.http, self.prompt.as_ref()).await?;
        let profile = match tokens.id_token.as_deref() {
            Some(id_token) => decode_id_token_claims(id_token).map_err(IdentityError::PopupFailed)?,
            // Without `openid` scope there is no ID token; ask userinfo instead.
            None => self
                .fetch_userinfo(&tokens.access_token)
                .await
                .map_err(IdentityError::PopupFailed)?,
        };
        Ok(ProviderAssertion {
            provider: IdentityProvider::Google,
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            profile,
        })
    }

    async fn sign_out(&self, identity: &ExternalIdentity) -> Result<(), IdentityError> {
        let Some(token) = identity.provider_access_token.as_deref() else {
            return Ok(());
        };
        let response = self
            .http
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|err| IdentityError::SignOut(err.to_string()))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::SignOut(format!(
                "revoke returned status {code}: {body}"
            )));
        }
        Ok(())
    }

    fn extract_identity(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<ExternalIdentity, IdentityError> {
        let claims = &assertion.profile;
        let subject = json_id(claims, "sub").ok_or_else(|| {
            IdentityError::PopupFailed("Google assertion did not include a subject".to_string())
        })?;
        let mut identity = ExternalIdentity::new(IdentityProvider::Google, subject)
            .with_access_token(assertion.access_token.clone());
        identity.email = json_str(claims, "email");
        identity.display_name = json_str(claims, "name");
        identity.avatar_url = json_str(claims, "picture");
        identity.phone_number = json_str(claims, "phone_number");
        Ok(identity)
    }

    async fn fetch_supplemental_profile(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<SupplementalProfile, IdentityError> {
        let info = self
            .fetch_userinfo(&assertion.access_token)
            .await
            .map_err(IdentityError::ProfileFetch)?;
        Ok(SupplementalProfile {
            email: json_str(&info, "email"),
            display_name: json_str(&info, "name"),
            avatar_url: json_str(&info, "picture"),
        })
    }
}

/// Decode the claims segment of a JWT without verifying its signature.
///
/// The token comes straight from Google's token endpoint over TLS.
pub(crate) fn decode_id_token_claims(id_token: &str) -> Result<serde_json::Value, String> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| "id_token is not a JWT".to_string())?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| format!("id_token payload is not base64url: {err}"))?;
    serde_json::from_slice(&bytes).map_err(|err| format!("id_token payload is not JSON: {err}"))
}
