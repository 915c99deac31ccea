//! Top-level config loading pipeline.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::identity::IdentityProvider;

use super::env::apply_env_overrides;
use super::init::config_root_dir;
use super::sources::read_config_text_with_sources;
use super::{Config, LoadedConfig};

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from `--config`).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    Ok(load_config_with_source(path_override)?.config)
}

/// Load configuration and report which source supplied it.
pub fn load_config_with_source(path_override: Option<&str>) -> Result<LoadedConfig, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

pub(super) fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text_with_sources(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&text)?;
    apply_env_overrides(&mut config, &env_lookup)?;
    validate(&config)?;
    Ok(LoadedConfig { config, source })
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut lists = vec![(
        "backend.exists_statuses".to_string(),
        &config.backend.exists_statuses,
    )];
    for provider in IdentityProvider::ALL {
        if let Some(list) = config.providers.get(provider).exists_statuses.as_ref() {
            lists.push((format!("providers.{}.exists_statuses", provider.key()), list));
        }
    }
    for (field, statuses) in lists {
        if let Some(bad) = statuses.iter().find(|code| !(100..=599).contains(*code)) {
            return Err(ConfigError::Invalid(format!(
                "{field} contains `{bad}`, which is not an HTTP status code"
            )));
        }
    }
    if config.storage.session_key.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "storage.session_key must not be empty".to_string(),
        ));
    }
    Ok(())
}
