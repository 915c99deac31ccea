//! Account backend request and response payloads.

use serde::{Deserialize, Serialize};

/// Postal address block the register endpoint requires. Always empty here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address_line1: String,
    pub address_line2: String,
    pub road: String,
    pub link_address: String,
}

/// Body of `POST {register_path}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
    pub address: Address,
    pub profile: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

/// Body of `POST {login_path}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct UploadResponse {
    pub location: Option<String>,
}

const TOKEN_FIELDS: [&str; 3] = ["token", "accessToken", "access_token"];

/// Pull the session token out of a register/login response body.
///
/// Accepts the token at the top level or inside a `data` envelope.
pub fn extract_session_token(body: &serde_json::Value) -> Option<String> {
    let direct = |value: &serde_json::Value| {
        TOKEN_FIELDS.iter().find_map(|field| {
            value
                .get(*field)
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
    };
    direct(body).or_else(|| body.get("data").and_then(direct))
}
