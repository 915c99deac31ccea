//! Backend credentials derived from an external identity.
//!
//! The password is a throwaway: it exists only for the single register or
//! login call of one reconciliation attempt and is never shown or stored.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;

use crate::identity::{ExternalIdentity, IdentityProvider};

const PASSWORD_PREFIX: &str = "Aa1@";
const PASSWORD_SUFFIX: &str = "@";
const PASSWORD_RANDOM_LEN: usize = 16;
const PASSWORD_MIN_LEN: usize = 8;

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Empty input yields the provider's default username.
pub fn synthesize_username(input: &str, provider: IdentityProvider) -> String {
    if input.is_empty() {
        return provider.default_username().to_string();
    }
    input
        .chars()
        .map(|ch| if is_username_char(ch) { ch } else { '_' })
        .collect()
}

/// Fresh random password satisfying [`satisfies_password_policy`].
pub fn synthesize_password() -> String {
    synthesize_password_with(&mut rand::thread_rng())
}

pub fn synthesize_password_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let random: String = rng
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{PASSWORD_PREFIX}{random}{PASSWORD_SUFFIX}")
}

/// Length >= 8 with at least one upper, lower, digit, and symbol.
pub fn satisfies_password_policy(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LEN
        && password.chars().any(|ch| ch.is_ascii_uppercase())
        && password.chars().any(|ch| ch.is_ascii_lowercase())
        && password.chars().any(|ch| ch.is_ascii_digit())
        && password.chars().any(|ch| !ch.is_ascii_alphanumeric())
}

/// Non-empty and drawn from `[A-Za-z0-9._-]`.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty() && username.chars().all(is_username_char)
}

fn is_username_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')
}

/// One-shot backend credential for a reconciliation attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct SynthesizedCredential {
    pub username: String,
    password: String,
}

impl SynthesizedCredential {
    /// Username from display name, else email, else the provider default.
    pub fn for_identity(identity: &ExternalIdentity) -> Self {
        let source = identity
            .display_name
            .as_deref()
            .or(identity.email.as_deref())
            .unwrap_or_default();
        Self {
            username: synthesize_username(source, identity.provider),
            password: synthesize_password(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for SynthesizedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
