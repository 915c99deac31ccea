//! Configuration loading from TOML files and environment variables.
//!
//! Precedence (highest wins):
//! 1. `FEDSIGN_*` environment variables.
//! 2. TOML file given via `--config`.
//! 3. `./fedsign.toml` in the current directory.
//! 4. `$XDG_CONFIG_HOME/fedsign/fedsign.toml` (or `~/.config/fedsign/fedsign.toml`).
//! 5. Built-in defaults.

mod defaults;
mod env;
mod init;
mod loader;
mod sources;
mod types;

pub use init::{config_root_dir, default_global_config_path, initialize_default_global_config};
pub use loader::{load_config, load_config_with_source};
pub use sources::ConfigSource;
pub use types::{
    BackendConfig, Config, DisplayConfig, GlobalConfigInitResult, LoggingConfig,
    ProviderSettings, ProvidersConfig, StorageConfig,
};

/// Parsed config plus the source it was read from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
}
