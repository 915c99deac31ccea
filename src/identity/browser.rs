//! Best-effort browser launching for device verification pages.

use std::process::{Command, Stdio};

/// Platform launcher program and arguments that open `url`.
fn launcher(url: &str) -> Option<(&'static str, Vec<&str>)> {
    if cfg!(target_os = "macos") {
        Some(("open", vec![url]))
    } else if cfg!(target_os = "windows") {
        Some(("cmd", vec!["/C", "start", "", url]))
    } else if cfg!(unix) {
        Some(("xdg-open", vec![url]))
    } else {
        None
    }
}

/// Open `url` in the desktop browser. Returns `false` when no launcher ran.
pub fn try_open_browser(url: &str) -> bool {
    let Some((program, args)) = launcher(url) else {
        return false;
    };
    let opened = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());
    if !opened {
        tracing::debug!(program, "browser launcher failed");
    }
    opened
}
