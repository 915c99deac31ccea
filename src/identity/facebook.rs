//! Facebook sign-in over Graph API device login.

use async_trait::async_trait;
use std::sync::Arc;

use super::device::{DeviceDialect, DeviceFlow};
use super::error::IdentityError;
use super::provider::{ProviderCapabilities, SignInPrompt};
use super::setting_or;
use super::types::{
    json_id, json_str, ExternalIdentity, IdentityProvider, ProviderAssertion, SupplementalProfile,
};
use crate::config::ProviderSettings;

const GRAPH_API_BASE: &str = "https://graph.facebook.com";
const FACEBOOK_SCOPE: &str = "public_profile,email";
const ASSERTION_FIELDS: &str = "id,name,picture";
const SUPPLEMENTAL_FIELDS: &str = "name,email,picture.type(large)";

pub struct FacebookProvider {
    flow: DeviceFlow,
    graph_base: String,
    http: reqwest::Client,
    prompt: Arc<dyn SignInPrompt>,
}

impl FacebookProvider {
    pub fn from_settings(
        settings: &ProviderSettings,
        http: reqwest::Client,
        prompt: Arc<dyn SignInPrompt>,
    ) -> Self {
        let graph_base = setting_or(&settings.api_base_url, GRAPH_API_BASE)
            .trim_end_matches('/')
            .to_string();
        let flow = DeviceFlow {
            provider: IdentityProvider::Facebook,
            dialect: DeviceDialect::Graph,
            device_code_url: setting_or(
                &settings.device_code_url,
                &format!("{graph_base}/device/login"),
            ),
            token_url: setting_or(
                &settings.token_url,
                &format!("{graph_base}/device/login_status"),
            ),
            client_id: settings.client_id.trim().to_string(),
            client_secret: settings.secret().map(str::to_string),
            scope: setting_or(&settings.scope, FACEBOOK_SCOPE),
        };
        Self {
            flow,
            graph_base,
            http,
            prompt,
        }
    }

    async fn me(&self, fields: &str, token: &str) -> Result<serde_json::Value, String> {
        let response = self
            .http
            .get(format!("{}/me", self.graph_base))
            .query(&[("fields", fields), ("access_token", token)])
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("graph /me returned status {code}: {body}"));
        }
        response.json().await.map_err(|err| err.to_string())
    }
}

/// Graph nests the picture URL as `picture.data.url`.
fn picture_url(profile: &serde_json::Value) -> Option<String> {
    profile
        .get("picture")
        .and_then(|picture| picture.get("data"))
        .and_then(|data| json_str(data, "url"))
}

#[async_trait]
impl ProviderCapabilities for FacebookProvider {
    fn provider(&self) -> IdentityProvider {
        IdentityProvider::Facebook
    }

    async fn sign_in(&self) -> Result<ProviderAssertion, IdentityError> {
        let tokens = self.flow.run(&self.http, self.prompt.as_ref()).await?;
        let profile = self
            .me(ASSERTION_FIELDS, &tokens.access_token)
            .await
            .map_err(IdentityError::PopupFailed)?;
        Ok(ProviderAssertion {
            provider: IdentityProvider::Facebook,
            access_token: tokens.access_token,
            id_token: None,
            profile,
        })
    }

    async fn sign_out(&self, identity: &ExternalIdentity) -> Result<(), IdentityError> {
        let Some(token) = identity.provider_access_token.as_deref() else {
            return Ok(());
        };
        let response = self
            .http
            .delete(format!("{}/me/permissions", self.graph_base))
            .query(&[("access_token", token)])
            .send()
            .await
            .map_err(|err| IdentityError::SignOut(err.to_string()))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::SignOut(format!(
                "graph permission revoke returned status {code}: {body}"
            )));
        }
        Ok(())
    }

    fn extract_identity(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<ExternalIdentity, IdentityError> {
        let me = &assertion.profile;
        let subject = json_id(me, "id").ok_or_else(|| {
            IdentityError::PopupFailed("Facebook profile did not include an id".to_string())
        })?;
        let mut identity = ExternalIdentity::new(IdentityProvider::Facebook, subject)
            .with_access_token(assertion.access_token.clone());
        identity.email = json_str(me, "email");
        identity.display_name = json_str(me, "name");
        identity.avatar_url = picture_url(me);
        Ok(identity)
    }

    async fn fetch_supplemental_profile(
        &self,
        assertion: &ProviderAssertion,
    ) -> Result<SupplementalProfile, IdentityError> {
        let me = self
            .me(SUPPLEMENTAL_FIELDS, &assertion.access_token)
            .await
            .map_err(IdentityError::ProfileFetch)?;
        Ok(SupplementalProfile {
            email: json_str(&me, "email"),
            display_name: json_str(&me, "name"),
            avatar_url: picture_url(&me),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::provider::SilentPrompt;
    use crate::testsupport::ScriptedHttpServer;
    use serde_json::json;

    fn provider_for(server: &ScriptedHttpServer) -> FacebookProvider {
        let settings = ProviderSettings {
            client_id: "app-id".to_string(),
            client_secret: Some("client-token".to_string()),
            api_base_url: Some(server.base_url().to_string()),
            ..ProviderSettings::default()
        };
        FacebookProvider::from_settings(&settings, reqwest::Client::new(), Arc::new(SilentPrompt))
    }

    #[test]
    fn endpoints_default_under_graph_base() {
        let facebook = FacebookProvider::from_settings(
            &ProviderSettings::default(),
            reqwest::Client::new(),
            Arc::new(SilentPrompt),
        );
        assert_eq!(facebook.flow.device_code_url, "https://graph.facebook.com/device/login");
        assert_eq!(
            facebook.flow.token_url,
            "https://graph.facebook.com/device/login_status"
        );
    }

    #[test]
    fn extract_identity_reads_nested_picture() {
        let facebook = FacebookProvider::from_settings(
            &ProviderSettings::default(),
            reqwest::Client::new(),
            Arc::new(SilentPrompt),
        );
        let assertion = ProviderAssertion {
            provider: IdentityProvider::Facebook,
            access_token: "EAAB".to_string(),
            id_token: None,
            profile: json!({
                "id": "1020",
                "name": "Face Book",
                "picture": {"data": {"url": "https://fb.example/p.jpg"}}
            }),
        };
        let identity = facebook.extract_identity(&assertion).unwrap();
        assert_eq!(identity.subject_id, "1020");
        assert_eq!(identity.display_name.as_deref(), Some("Face Book"));
        assert_eq!(identity.avatar_url.as_deref(), Some("https://fb.example/p.jpg"));
        assert_eq!(identity.email, None);
    }

    #[tokio::test]
    async fn supplemental_profile_requests_email_field() {
        let server = ScriptedHttpServer::start(vec![(
            200,
            json!({"id": "1020", "name": "Face Book", "email": "fb@example.com"}).to_string(),
        )])
        .await;
        let facebook = provider_for(&server);
        let assertion = ProviderAssertion {
            provider: IdentityProvider::Facebook,
            access_token: "EAAB".to_string(),
            id_token: None,
            profile: json!({"id": "1020"}),
        };
        let profile = facebook.fetch_supplemental_profile(&assertion).await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("fb@example.com"));

        let path = &server.requests()[0].path;
        assert!(path.starts_with("/me?fields=name%2Cemail"), "got {path}");
        assert!(path.contains("access_token=EAAB"));
    }

    #[tokio::test]
    async fn sign_out_deletes_permissions() {
        let server = ScriptedHttpServer::start(vec![(200, json!({"success": true}).to_string())]).await;
        let facebook = provider_for(&server);
        let identity = ExternalIdentity::new(IdentityProvider::Facebook, "1020").with_access_token("EAAB");
        facebook.sign_out(&identity).await.unwrap();
        let request = &server.requests()[0];
        assert_eq!(request.method, "DELETE");
        assert!(request.path.starts_with("/me/permissions"));
    }
}
