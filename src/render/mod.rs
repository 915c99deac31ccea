//! Terminal output for the `fedsign` CLI. Everything is written to stderr.

mod progress;
mod settings;

use crossterm::style::Stylize;

use crate::identity::{try_open_browser, DeviceCodePrompt, SignInPrompt};

pub use progress::{start_progress, ProgressHandle};

/// Handles all terminal output formatting.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
    open_browser: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            open_browser: true,
        }
    }

    /// Disable launching a browser for device verification pages.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    pub fn progress(&self, label: &str) -> ProgressHandle {
        start_progress(label, self.color)
    }

    /// Print a small section header.
    pub fn section(&self, title: &str) {
        if self.color {
            eprintln!(
                "\r{} {}",
                settings::GLYPH_SECTION_BULLET.with(settings::COLOR_SECTION_BULLET),
                title.with(settings::COLOR_SECTION_TITLE).bold()
            );
        } else {
            eprintln!("\r{title}:");
        }
    }

    /// Print a `key: value` line under a section.
    pub fn field(&self, key: &str, value: &str) {
        if self.color {
            eprintln!(
                "\r{}{} {}",
                settings::INDENT_1,
                format!("{key}:").with(settings::COLOR_FIELD_KEY),
                value.with(settings::COLOR_FIELD_VALUE),
            );
        } else {
            eprintln!("\r{}{key}: {value}", settings::INDENT_1);
        }
    }

    pub fn detail(&self, text: &str) {
        if self.color {
            eprintln!(
                "\r{}{}",
                settings::INDENT_1,
                text.with(settings::COLOR_FIELD_VALUE)
            );
        } else {
            eprintln!("\r{}{text}", settings::INDENT_1);
        }
    }

    pub fn success(&self, msg: &str) {
        if self.color {
            eprintln!(
                "\r{} {msg}",
                settings::LABEL_OK.with(settings::COLOR_SUCCESS).bold()
            );
        } else {
            eprintln!("\r{} {msg}", settings::LABEL_OK);
        }
    }

    pub fn warn(&self, msg: &str) {
        if self.color {
            eprintln!(
                "\r{} {msg}",
                settings::LABEL_WARNING.with(settings::COLOR_WARNING).bold()
            );
        } else {
            eprintln!("\r{} {msg}", settings::LABEL_WARNING);
        }
    }

    pub fn error(&self, msg: &str) {
        if self.color {
            eprintln!(
                "\r{} {msg}",
                settings::LABEL_ERROR.with(settings::COLOR_ERROR).bold()
            );
        } else {
            eprintln!("\r{} {msg}", settings::LABEL_ERROR);
        }
    }
}

impl SignInPrompt for Renderer {
    fn show_device_code(&self, prompt: &DeviceCodePrompt) {
        self.section(&format!("sign in with {}", prompt.provider.display_name()));
        self.field("open", &prompt.verification_uri);
        if self.color {
            self.field(
                "code",
                &prompt
                    .user_code
                    .as_str()
                    .with(settings::COLOR_USER_CODE)
                    .bold()
                    .to_string(),
            );
        } else {
            self.field("code", &prompt.user_code);
        }
        self.detail(&format!(
            "code expires in {} minutes",
            prompt.expires_in_secs.div_ceil(60)
        ));
        if self.open_browser && !try_open_browser(&prompt.verification_uri) {
            self.detail("could not open a browser; visit the link above manually");
        }
    }
}
