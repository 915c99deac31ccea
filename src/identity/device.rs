//! OAuth device authorization grant shared by the provider variants.
//!
//! Google and GitHub speak RFC 8628 (`error` codes in the poll body).
//! Facebook's Graph API runs the same flow but reports poll state through
//! `error.error_subcode` and authenticates with an app token.

use serde::Deserialize;
use std::time::{Duration, Instant};

use super::error::IdentityError;
use super::provider::{DeviceCodePrompt, SignInPrompt};
use super::types::{json_str, IdentityProvider};

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
/// Extra wait added on each `slow_down` answer.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);
/// Upper bounds applied to server-supplied timing.
const MAX_CODE_LIFETIME: Duration = Duration::from_secs(30 * 60);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

const GRAPH_PENDING_SUBCODE: i64 = 1_349_174;
const GRAPH_SLOW_DOWN_SUBCODE: i64 = 1_349_172;
const GRAPH_EXPIRED_SUBCODE: i64 = 1_349_152;

/// Wire dialect of a device-flow endpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDialect {
    Standard,
    Graph,
}

/// Device-flow endpoints and client registration for one provider.
#[derive(Debug, Clone)]
pub struct DeviceFlow {
    pub provider: IdentityProvider,
    pub dialect: DeviceDialect,
    pub device_code_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: String,
}

/// Tokens issued once the user approves the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTokens {
    pub access_token: String,
    pub id_token: Option<String>,
}

/// Device-code response.
#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    /// Graph names this `code`.
    #[serde(alias = "code")]
    device_code: String,
    user_code: String,
    /// Google names this `verification_url`.
    #[serde(alias = "verification_url")]
    verification_uri: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_expires_in() -> u64 {
    900
}

fn default_interval() -> u64 {
    5
}

/// Code lifetime and initial poll interval, clamped to sane bounds.
fn poll_schedule(expires_in: u64, interval: u64) -> (Duration, Duration) {
    (
        Duration::from_secs(expires_in).min(MAX_CODE_LIFETIME),
        Duration::from_secs(interval.max(1)).min(MAX_POLL_INTERVAL),
    )
}

/// Classified answer from one token poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Token(DeviceTokens),
    Pending,
    SlowDown,
    Cancelled(String),
    Failed(String),
}

impl DeviceFlow {
    /// Request a device code, show it, and poll until the user decides.
    pub async fn run(
        &self,
        http: &reqwest::Client,
        prompt: &dyn SignInPrompt,
    ) -> Result<DeviceTokens, IdentityError> {
        let code = self.request_device_code(http).await?;
        let (lifetime, mut interval) = poll_schedule(code.expires_in, code.interval);
        prompt.show_device_code(&DeviceCodePrompt {
            provider: self.provider,
            verification_uri: code.verification_uri.clone(),
            user_code: code.user_code.clone(),
            expires_in_secs: lifetime.as_secs(),
        });
        tracing::debug!(
            provider = %self.provider,
            expires_in = code.expires_in,
            interval = code.interval,
            "device code issued"
        );

        let deadline = Instant::now() + lifetime;
        loop {
            let (status, body) = self.poll_once(http, &code.device_code).await?;
            match classify_poll_response(self.dialect, status, &body) {
                PollOutcome::Token(tokens) => return Ok(tokens),
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => {
                    interval = interval.saturating_add(SLOW_DOWN_STEP).min(MAX_POLL_INTERVAL);
                }
                PollOutcome::Cancelled(reason) => {
                    return Err(IdentityError::PopupCancelled(reason));
                }
                PollOutcome::Failed(reason) => return Err(IdentityError::PopupFailed(reason)),
            }
            if Instant::now() + interval >= deadline {
                return Err(IdentityError::PopupCancelled(
                    "device code expired before it was approved".to_string(),
                ));
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn request_device_code(
        &self,
        http: &reqwest::Client,
    ) -> Result<DeviceCodeResponse, IdentityError> {
        let mut form = vec![("scope", self.scope.clone())];
        match self.dialect {
            DeviceDialect::Standard => form.push(("client_id", self.client_id.clone())),
            DeviceDialect::Graph => form.push(("access_token", self.graph_app_token())),
        }
        let response = http
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|err| IdentityError::PopupFailed(format!("device code request: {err}")))?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::PopupFailed(format!(
                "device code request returned status {code}: {body}"
            )));
        }
        response
            .json::<DeviceCodeResponse>()
            .await
            .map_err(|err| IdentityError::PopupFailed(format!("device code response: {err}")))
    }

    async fn poll_once(
        &self,
        http: &reqwest::Client,
        device_code: &str,
    ) -> Result<(u16, serde_json::Value), IdentityError> {
        let mut form = vec![("client_id", self.client_id.clone())];
        match self.dialect {
            DeviceDialect::Standard => {
                form.push(("device_code", device_code.to_string()));
                form.push(("grant_type", DEVICE_GRANT_TYPE.to_string()));
                if let Some(secret) = &self.client_secret {
                    form.push(("client_secret", secret.clone()));
                }
            }
            DeviceDialect::Graph => {
                form = vec![
                    ("access_token", self.graph_app_token()),
                    ("code", device_code.to_string()),
                ];
            }
        }
        let response = http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|err| IdentityError::PopupFailed(format!("token poll: {err}")))?;
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
        Ok((status, body))
    }

    /// Graph client token: `{app_id}|{client_token}`.
    fn graph_app_token(&self) -> String {
        format!(
            "{}|{}",
            self.client_id,
            self.client_secret.as_deref().unwrap_or_default()
        )
    }
}

/// Classify one poll response body for the given dialect.
pub fn classify_poll_response(
    dialect: DeviceDialect,
    status: u16,
    body: &serde_json::Value,
) -> PollOutcome {
    if let Some(access_token) = json_str(body, "access_token") {
        return PollOutcome::Token(DeviceTokens {
            access_token,
            id_token: json_str(body, "id_token"),
        });
    }
    match dialect {
        DeviceDialect::Standard => classify_standard(status, body),
        DeviceDialect::Graph => classify_graph(status, body),
    }
}

fn classify_standard(status: u16, body: &serde_json::Value) -> PollOutcome {
    let description = json_str(body, "error_description");
    match json_str(body, "error").as_deref() {
        Some("authorization_pending") => PollOutcome::Pending,
        Some("slow_down") => PollOutcome::SlowDown,
        Some(code @ ("access_denied" | "expired_token")) => {
            PollOutcome::Cancelled(description.unwrap_or_else(|| code.to_string()))
        }
        Some(code) => PollOutcome::Failed(match description {
            Some(text) => format!("{code}: {text}"),
            None => code.to_string(),
        }),
        None => PollOutcome::Failed(format!("token endpoint returned status {status}")),
    }
}

fn classify_graph(status: u16, body: &serde_json::Value) -> PollOutcome {
    let Some(error) = body.get("error") else {
        return PollOutcome::Failed(format!("graph device login returned status {status}"));
    };
    let message = json_str(error, "message").unwrap_or_else(|| format!("status {status}"));
    match error.get("error_subcode").and_then(serde_json::Value::as_i64) {
        Some(GRAPH_PENDING_SUBCODE) => PollOutcome::Pending,
        Some(GRAPH_SLOW_DOWN_SUBCODE) => PollOutcome::SlowDown,
        Some(GRAPH_EXPIRED_SUBCODE) => PollOutcome::Cancelled(message),
        _ => PollOutcome::Failed(message),
    }
}
