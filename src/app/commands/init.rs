//! `fedsign init`.

use fedsign::config::{initialize_default_global_config, GlobalConfigInitResult};
use fedsign::render::Renderer;

pub(crate) fn run_init(renderer: &Renderer, force: bool) -> Result<(), String> {
    let result = initialize_default_global_config(force)
        .map_err(|err| format!("failed to initialize config: {err}"))?;
    match result {
        GlobalConfigInitResult::Created { path } => {
            renderer.success(&format!("wrote default config to {}", path.display()));
            renderer.detail("set backend.base_url and a provider client_id to get started");
        }
        GlobalConfigInitResult::AlreadyInitialized { path } => {
            renderer.warn(&format!(
                "{} already exists; pass --force to overwrite it",
                path.display()
            ));
        }
        GlobalConfigInitResult::Overwritten { path, backup_path } => {
            renderer.success(&format!("rewrote {}", path.display()));
            renderer.field("backup", &backup_path.display().to_string());
        }
    }
    Ok(())
}
