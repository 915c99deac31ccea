//! `password-login` and `register`.

use std::path::PathBuf;

use fedsign::account::{AccountError, RegistrationForm};
use fedsign::render::Renderer;

use crate::app::context::AppContext;

pub(crate) async fn run_password_login(
    ctx: &AppContext,
    renderer: &Renderer,
    email: &str,
) -> Result<(), String> {
    let password = read_password("Password: ")?;
    let mut progress = renderer.progress("logging in");
    let result = ctx.account.password_login(email, &password).await;
    progress.finish();

    result.map_err(|err| describe_account_error(renderer, err))?;
    renderer.success(&format!("logged in as {email}"));
    renderer.field("session", &format!("cached under `{}`", ctx.cache.key()));
    Ok(())
}

pub(crate) async fn run_register(
    ctx: &AppContext,
    renderer: &Renderer,
    name: &str,
    email: &str,
    avatar: Option<PathBuf>,
) -> Result<(), String> {
    let password = read_password("Password: ")?;
    let confirm = read_password("Confirm password: ")?;
    if password != confirm {
        return Err("passwords do not match".to_string());
    }

    let form = RegistrationForm {
        name: name.to_string(),
        email: email.to_string(),
        password,
        avatar,
    };
    let mut progress = renderer.progress("creating account");
    let result = ctx.account.register_account(&form).await;
    progress.finish();

    let account = result.map_err(|err| describe_account_error(renderer, err))?;
    renderer.success(&format!("account created for {email}"));
    if let Some(location) = &account.avatar_location {
        renderer.field("avatar", location);
    }
    if account.session_cached {
        renderer.field("session", &format!("cached under `{}`", ctx.cache.key()));
    } else {
        renderer.detail("run `fedsign password-login` to start a session");
    }
    Ok(())
}

fn read_password(prompt: &str) -> Result<String, String> {
    rpassword::prompt_password(prompt).map_err(|err| format!("failed to read password: {err}"))
}

/// Print per-field validation messages; return the summary line.
fn describe_account_error(renderer: &Renderer, err: AccountError) -> String {
    match err {
        AccountError::Validation(validation) => {
            for field in &validation.fields {
                renderer.field(field.field, &field.message);
            }
            "please fix the fields above".to_string()
        }
        other => other.to_string(),
    }
}
