//! Client-side validation for the password login and registration forms.
//!
//! Each field reports only its first failing rule, so an empty password says
//! "Password is required" rather than also complaining about its length.

use crate::error::{FieldError, ValidationError};

const REGISTER_PASSWORD_MIN_LEN: usize = 4;

/// Validate the password login form.
pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    let mut fields = Vec::new();
    if let Some(message) = email_problem(email) {
        fields.push(field("email", message));
    }
    if password.is_empty() {
        fields.push(field("password", "Password is required"));
    }
    finish(fields)
}

/// Validate the registration form.
pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), ValidationError> {
    let mut fields = Vec::new();
    if name.is_empty() {
        fields.push(field("name", "Name is required"));
    }
    if let Some(message) = email_problem(email) {
        fields.push(field("email", message));
    }
    if password.is_empty() {
        fields.push(field("password", "Password is required"));
    } else if password.chars().count() < REGISTER_PASSWORD_MIN_LEN {
        fields.push(field("password", "Must be greater than 4"));
    }
    finish(fields)
}

fn email_problem(email: &str) -> Option<&'static str> {
    if email.is_empty() {
        Some("Email is required")
    } else if !is_plausible_email(email) {
        Some("Invalid email")
    } else {
        None
    }
}

/// `local@domain.tld` with no whitespace and a dotted domain.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

fn field(name: &'static str, message: &str) -> FieldError {
    FieldError {
        field: name,
        message: message.to_string(),
    }
}

fn finish(fields: Vec<FieldError>) -> Result<(), ValidationError> {
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { fields })
    }
}
