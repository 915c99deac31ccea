//! Identity model types shared by the adapter and provider variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported third-party identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    Google,
    Facebook,
    #[serde(rename = "github")]
    GitHub,
}

impl IdentityProvider {
    pub const ALL: [IdentityProvider; 3] = [Self::Google, Self::Facebook, Self::GitHub];

    /// Stable lowercase key used in config, storage, and CLI arguments.
    pub fn key(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::GitHub => "github",
        }
    }

    /// Username substituted when the identity carries no usable name.
    pub fn default_username(self) -> &'static str {
        match self {
            Self::Google => "google_user",
            Self::Facebook => "facebook_user",
            Self::GitHub => "github_user",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Facebook => "Facebook",
            Self::GitHub => "GitHub",
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for IdentityProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.key() == normalized)
            .ok_or_else(|| {
                format!("unknown provider `{value}` (expected one of: google, facebook, github)")
            })
    }
}

/// Normalized identity asserted by a third-party provider.
///
/// Held for the duration of one sign-in; only the subset in
/// [`ExternalSessionRecord`] is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: IdentityProvider,
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone_number: Option<String>,
    pub provider_access_token: Option<String>,
}

impl ExternalIdentity {
    pub fn new(provider: IdentityProvider, subject_id: impl Into<String>) -> Self {
        Self {
            provider,
            subject_id: subject_id.into(),
            email: None,
            display_name: None,
            avatar_url: None,
            phone_number: None,
            provider_access_token: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.provider_access_token = Some(token.into());
        self
    }

    /// Fill fields that are still unset from a supplemental profile.
    ///
    /// Values already asserted by the provider are never replaced.
    pub fn merge_supplemental(&mut self, profile: SupplementalProfile) {
        if self.email.is_none() {
            self.email = profile.email;
        }
        if self.display_name.is_none() {
            self.display_name = profile.display_name;
        }
        if self.avatar_url.is_none() {
            self.avatar_url = profile.avatar_url;
        }
    }

    /// Names of the mandatory fields (`email`, `displayName`) still unset.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.email.is_none() {
            missing.push("email");
        }
        if self.display_name.is_none() {
            missing.push("displayName");
        }
        missing
    }
}

/// Raw result of a provider's interactive sign-in step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAssertion {
    pub provider: IdentityProvider,
    pub access_token: String,
    /// OpenID Connect ID token, when the provider issued one.
    pub id_token: Option<String>,
    /// Provider-specific profile document (claims or REST profile).
    pub profile: serde_json::Value,
}

/// Extra profile fields fetched from a provider's own profile API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplementalProfile {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Persisted marker of the active provider session.
///
/// Lets a later process sign out of the provider and republish the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSessionRecord {
    pub provider: IdentityProvider,
    pub subject_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl From<&ExternalIdentity> for ExternalSessionRecord {
    fn from(identity: &ExternalIdentity) -> Self {
        Self {
            provider: identity.provider,
            subject_id: identity.subject_id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            access_token: identity.provider_access_token.clone(),
        }
    }
}

impl From<ExternalSessionRecord> for ExternalIdentity {
    fn from(record: ExternalSessionRecord) -> Self {
        Self {
            provider: record.provider,
            subject_id: record.subject_id,
            email: record.email,
            display_name: record.display_name,
            avatar_url: record.avatar_url,
            phone_number: None,
            provider_access_token: record.access_token,
        }
    }
}

/// Read a non-blank string field from a JSON profile document.
pub(crate) fn json_str(value: &serde_json::Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Read an id that providers send as either a string or a number.
pub(crate) fn json_id(value: &serde_json::Value, field: &str) -> Option<String> {
    match value.get(field)? {
        serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        serde_json::Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}
