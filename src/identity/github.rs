//! GitHub sign-in over the OAuth device flow and the REST user API.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::device::{DeviceDialect, DeviceFlow};
use super::error::IdentityError;
use super::provider::{ProviderCapabilities, SignInPrompt};
use super::setting_or;
use super::types::{
    json_id, json_str, ExternalIdentity, IdentityProvider, ProviderAssertion, SupplementalProfile,
};
use crate::config::ProviderSettings;

const GITHUB_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_SCOPE: &str = "read:user user:email";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
}

pub struct GitHubProvider {
    flow: DeviceFlow,
    api_base: String,
    http: reqwest::Client,
    prompt: Arc<dyn SignInPrompt>,
}

impl GitHubProvider {
    pub fn from_settings(
        settings: &ProviderSettings,
        http: reqwest::Client,
        prompt: Arc<dyn SignInPrompt>,
    ) -> Self {
        let flow = DeviceFlow {
            provider: IdentityProvider::GitHub,
            dialect: DeviceDialect::Standard,
            device_code_url: setting_or(&settings.device_code_url, GITHUB_DEVICE_CODE_URL),
            token_url: setting_or(&settings.token_url, GITHUB_TOKEN_URL),
            client_id: settings.client_id.trim().to_string(),
            client_secret: settings.secret().map(str::to_string),
            scope: setting_or(&settings.scope, GITHUB_SCOPE),
        };
        Self {
            flow,
            api_base: setting_or(&settings.api_base_url, GITHUB_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            http,
            prompt,
        }
    }

    async fn api_get(&self, path: &str, token: &str) -> Result<reqwest::Response, String> {
        let response = self
            .http
            .get(format!("{}{path}", self.api_base))
            .header("Accept", GITHUB_ACCEPT)
            .header("Authorization", format!("token {token}"))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("GET {path} returned status {code}: {body}"));
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderCapabilities for GitHubProvider {
    fn provider(&self) -> IdentityProvider {
        IdentityProvider::GitHub
    }

    async fn sign_in(&self) -> Result<ProviderAssertion, IdentityError> {
        let tokens = self.flow.run(&self.http, self.prompt.as_ref()).await?;
        let profile = self
            .api_get("/user", &tokens.access_token)
            .await
            .map_err(IdentityError::PopupFailed)?
            .json::<serde_json::Value>()
            .await
            .map_err(|err| IdentityError::PopupFailed(err.to_string()))?;
        Ok(ProviderAssertion {
            provider: IdentityProvider::GitHub,
            access_token: tokens.access_token,
            id_token: None,
            profile,
        })
    }

    async fn sign_out(&self, identity: &ExternalIdentity) -> Result<(), IdentityError> {
        let (Some(secret), Some(token)) = (
            self.flow.client_secret.as_deref(),
            identity.provider_access_token.as_deref(),
        ) else {
            // Token revocation needs the OAuth app secret; without it only
            // the local session ends.
            tracing::debug!("github sign-out without client secret; skipping token revocation");
            return Ok(());
        };
        let response = self
            .http
            .delete(format!(
                "{}/applications/{}/token",
                self.api_base, self.flow.client_id
            ))
            .header("Accept", GITHUB_ACCEPT)
            .basic_auth(&self.flow.client_id, Some(secret))
            .json(&serde_json::json!({ "access_token": token }))
            .send()
            .await
            .map_err(|err| IdentityError::SignOut(err.to_string()))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::SignOut(format!(
                "token revocation returned status {code}: {body}"
            )));
        }
        Ok(())
    }

    fn extract_identity(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<ExternalIdentity, IdentityError> {
        let user = &assertion.profile;
        let subject = json_id(user, "id").ok_or_else(|| {
            IdentityError::PopupFailed("GitHub user profile did not include an id".to_string())
        })?;
        let mut identity = ExternalIdentity::new(IdentityProvider::GitHub, subject)
            .with_access_token(assertion.access_token.clone());
        identity.email = json_str(user, "email");
        identity.display_name = json_str(user, "name").or_else(|| json_str(user, "login"));
        identity.avatar_url = json_str(user, "avatar_url");
        Ok(identity)
    }

    async fn fetch_supplemental_profile(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<SupplementalProfile, IdentityError> {
        let emails = self
            .api_get("/user/emails", &assertion.access_token)
            .await
            .map_err(IdentityError::ProfileFetch)?
            .json::<Vec<GitHubEmail>>()
            .await
            .map_err(|err| IdentityError::ProfileFetch(err.to_string()))?;
        let email = emails
            .iter()
            .find(|entry| entry.primary)
            .or_else(|| emails.first())
            .map(|entry| entry.email.clone());
        Ok(SupplementalProfile {
            email,
            ..SupplementalProfile::default()
        })
    }
}
