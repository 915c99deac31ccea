//! `FEDSIGN_*` environment overrides applied after file parsing.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::identity::IdentityProvider;

use super::Config;

pub(super) fn apply_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty(env_lookup("FEDSIGN_BACKEND_URL")) {
        config.backend.base_url = url;
    }
    if let Some(timeout) = non_empty(env_lookup("FEDSIGN_HTTP_TIMEOUT_SECS")) {
        let parsed = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid FEDSIGN_HTTP_TIMEOUT_SECS value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        // Clamp to at least 1 second so a zero never disables the timeout.
        config.backend.timeout_secs = parsed.max(1);
    }
    if let Some(path) = non_empty(env_lookup("FEDSIGN_STORAGE_PATH")) {
        config.storage.path = Some(PathBuf::from(path));
    }

    for provider in IdentityProvider::ALL {
        let prefix = format!("FEDSIGN_{}", provider.key().to_ascii_uppercase());
        let settings = config.providers.get_mut(provider);
        if let Some(id) = non_empty(env_lookup(&format!("{prefix}_CLIENT_ID"))) {
            settings.client_id = id;
        }
        if let Some(secret) = non_empty(env_lookup(&format!("{prefix}_CLIENT_SECRET"))) {
            settings.client_secret = Some(secret);
        }
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
