//! Default configuration constants.

/// Embedded default `fedsign.toml` template written by `fedsign init`.
pub(super) const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../templates/fedsign.toml");
pub(super) const DEFAULT_REGISTER_PATH: &str = "/api/v1/auth/register";
pub(super) const DEFAULT_LOGIN_PATH: &str = "/api/v1/auth/login";
pub(super) const DEFAULT_UPLOAD_PATH: &str = "/api/v1/files/upload";
/// The backend answers an existing-account registration with 400 on some
/// paths and with a token-less 200 on others; both count as "exists".
pub(super) const DEFAULT_EXISTS_STATUSES: &[u16] = &[400, 200];
pub(super) const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub(super) const DEFAULT_SESSION_KEY: &str = "accessToken";
pub(super) const DEFAULT_LOG_FILTER: &str = "warn";
