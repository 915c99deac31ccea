//! `login`, `logout`, and `status`.

use fedsign::federated::{FederatedError, FederatedSignInResult, FederatedStatus};
use fedsign::identity::{ExternalIdentity, IdentityError, IdentityProvider};
use fedsign::reconcile::{ReconcileOutcome, ReconcileState};
use fedsign::render::Renderer;

use crate::app::context::AppContext;

pub(crate) async fn run_login(
    ctx: &AppContext,
    renderer: &Renderer,
    provider: IdentityProvider,
) -> Result<(), String> {
    if !ctx.adapter.supports(provider) {
        return Err(format!(
            "{} sign-in is not configured; set providers.{}.client_id in fedsign.toml",
            provider.display_name(),
            provider.key()
        ));
    }

    // Ctrl-C while waiting on the provider counts as the user backing out.
    let result = tokio::select! {
        result = ctx.federated.sign_in(provider) => result,
        _ = tokio::signal::ctrl_c() => Err(FederatedError::Identity(
            IdentityError::PopupCancelled("interrupted".to_string()),
        )),
    };

    match result {
        Ok(result) => render_sign_in(renderer, &result, ctx.cache.key()),
        Err(FederatedError::Identity(err)) if err.is_cancellation() => {
            renderer.warn(&err.to_string());
            Err("sign-in was not completed".to_string())
        }
        Err(err) => Err(err.to_string()),
    }
}

fn render_sign_in(
    renderer: &Renderer,
    result: &FederatedSignInResult,
    session_key: &str,
) -> Result<(), String> {
    renderer.section("provider identity");
    render_identity(renderer, &result.identity);

    let reconciliation = &result.reconciliation;
    match (reconciliation.outcome, &reconciliation.error) {
        (ReconcileOutcome::Registered, _) => {
            renderer.success("created a backend account for this identity");
        }
        (ReconcileOutcome::LoggedIn, _) => {
            renderer.success("signed in to the existing backend account");
        }
        (ReconcileOutcome::Failed, error) => {
            let reason = error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown error".to_string());
            renderer.detail(&format!(
                "{} session is still active; run `fedsign logout` to end it",
                result.identity.provider.display_name()
            ));
            return Err(format!("account reconciliation failed: {reason}"));
        }
    }
    renderer.field("session", &format!("cached under `{session_key}`"));
    Ok(())
}

pub(crate) async fn run_logout(ctx: &AppContext, renderer: &Renderer) -> Result<(), String> {
    let previous = ctx
        .adapter
        .current_session()
        .map_err(|err| err.to_string())?;
    let ended = ctx.federated.sign_out().await.map_err(|err| err.to_string())?;
    match previous {
        Some(identity) if ended => renderer.success(&format!(
            "signed out of {} and cleared the cached session",
            identity.provider.display_name()
        )),
        _ => renderer.warn("no provider session was active; cached session cleared"),
    }
    Ok(())
}

pub(crate) fn run_status(ctx: &AppContext, renderer: &Renderer) -> Result<(), String> {
    let status = ctx.federated.status().map_err(|err| err.to_string())?;
    render_status(renderer, &status, ctx.cache.key());
    Ok(())
}

fn render_status(renderer: &Renderer, status: &FederatedStatus, session_key: &str) {
    renderer.section("provider identity");
    match &status.identity {
        Some(identity) => render_identity(renderer, identity),
        None => renderer.detail("not signed in"),
    }

    renderer.section("backend session");
    match &status.session {
        Some(_) => renderer.field(session_key, "cached"),
        None => renderer.field(session_key, "none"),
    }
    renderer.field("controller", state_label(status.controller.state));
    if let Some(err) = &status.controller.last_error {
        renderer.field("last error", err);
    }
}

fn render_identity(renderer: &Renderer, identity: &ExternalIdentity) {
    renderer.field("provider", identity.provider.display_name());
    renderer.field("subject", &identity.subject_id);
    if let Some(email) = &identity.email {
        renderer.field("email", email);
    }
    if let Some(name) = &identity.display_name {
        renderer.field("name", name);
    }
}

fn state_label(state: ReconcileState) -> &'static str {
    match state {
        ReconcileState::Idle => "idle",
        ReconcileState::Pending => "pending",
        ReconcileState::Succeeded => "succeeded",
        ReconcileState::Failed => "failed",
    }
}
