//! Config-path helpers and `fedsign init`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ConfigError;

use super::defaults::DEFAULT_CONFIG_TEMPLATE;
use super::GlobalConfigInitResult;

/// Default per-user config path (`~/.config/fedsign/fedsign.toml`).
pub fn default_global_config_path() -> Option<PathBuf> {
    config_root_dir().map(|dir| dir.join("fedsign").join("fedsign.toml"))
}

/// Write the default template to `~/.config/fedsign/fedsign.toml`.
///
/// Without `force` an existing file is left untouched. With `force` the
/// existing file is first copied to a timestamped backup next to it.
pub fn initialize_default_global_config(
    force: bool,
) -> Result<GlobalConfigInitResult, ConfigError> {
    let path = default_global_config_path().ok_or_else(|| {
        ConfigError::Invalid("cannot locate a home or XDG config directory".to_string())
    })?;
    initialize_config_at_path(&path, force)
}

pub(super) fn initialize_config_at_path(
    path: &Path,
    force: bool,
) -> Result<GlobalConfigInitResult, ConfigError> {
    let exists = match std::fs::metadata(path) {
        Ok(_) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => return Err(err.into()),
    };
    if exists && !force {
        return Ok(GlobalConfigInitResult::AlreadyInitialized {
            path: path.to_path_buf(),
        });
    }

    let backup_path = if exists {
        let backup = backup_path_for(path, unix_now());
        std::fs::copy(path, &backup)?;
        Some(backup)
    } else {
        None
    };
    write_template(path)?;

    let path = path.to_path_buf();
    Ok(match backup_path {
        Some(backup_path) => GlobalConfigInitResult::Overwritten { path, backup_path },
        None => GlobalConfigInitResult::Created { path },
    })
}

/// Write the template through a sibling temp file so readers never see a
/// partial config.
fn write_template(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension(format!("toml.{}.tmp", std::process::id()));
    std::fs::write(&staging, DEFAULT_CONFIG_TEMPLATE)?;
    std::fs::rename(&staging, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&staging);
    })?;
    Ok(())
}

/// First free `<name>.bak-<secs>[-n]` next to `path`.
fn backup_path_for(path: &Path, secs: u64) -> PathBuf {
    let name = path
        .file_name()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fedsign.toml".to_string());
    let base = path.with_file_name(format!("{name}.bak-{secs}"));
    let mut candidate = base.clone();
    let mut n = 1u32;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{name}.bak-{secs}-{n}"));
        n += 1;
    }
    candidate
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Config base directory: `$XDG_CONFIG_HOME`, else `~/.config`, else the
/// platform config dir.
pub fn config_root_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .or_else(dirs::config_dir)
}
