//! CLI argument parsing via clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fedsign::identity::IdentityProvider;

#[derive(Debug, Parser)]
#[command(
    name = "fedsign",
    version,
    about = "Sign in with Google, Facebook, or GitHub and reconcile a backend account",
    after_help = fedsign::build_info::HELP_BUILD_METADATA
)]
pub struct Args {
    /// Path to config file (default: ./fedsign.toml or ~/.config/fedsign/fedsign.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Disable colored output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Print the verification link instead of opening a browser.
    #[arg(long = "no-browser")]
    pub no_browser: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Sign in with a third-party provider and reconcile the backend account.
    Login {
        /// One of: google, facebook, github.
        provider: IdentityProvider,
    },
    /// Sign out of the current provider and clear the cached session.
    Logout,
    /// Show the current identity, cached session, and controller state.
    Status,
    /// Log in with an email and password.
    PasswordLogin {
        #[arg(long)]
        email: String,
    },
    /// Create an account with a name, email, password, and optional avatar.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Image uploaded before registration; its location becomes the profile.
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// Write the default config to ~/.config/fedsign/fedsign.toml.
    Init {
        /// Overwrite an existing config after writing a timestamped backup.
        #[arg(long)]
        force: bool,
    },
    /// Print version and build metadata.
    Version,
}
