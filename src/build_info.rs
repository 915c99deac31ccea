//! Compile-time build metadata exposed to the CLI.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit hash captured at build time.
pub const GIT_COMMIT: &str = env!("FEDSIGN_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("FEDSIGN_BUILD_TIMESTAMP");

/// Help trailer block that surfaces build metadata in `fedsign --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("FEDSIGN_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("FEDSIGN_BUILD_TIMESTAMP")
);

/// Version line followed by the same metadata block `--help` shows.
pub fn cli_version_text() -> String {
    format!("fedsign {VERSION}\n{HELP_BUILD_METADATA}")
}
