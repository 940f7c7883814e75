//! Session authenticator: open the portal, submit credentials, confirm the landing page.

use super::driver::{poll_until, wait_visible, PortalSession};
use super::layout::PortalLayout;
use super::PortalError;
use crate::config::{Credentials, Timeouts};
use crate::progress::{ProgressSink, RunEvent};

const SUBMIT_FORM_SCRIPT: &str = r#"(function() {
  const pwd = document.querySelector("input[type='password']");
  const form = pwd && pwd.form;
  if (!form) return false;
  if (typeof form.requestSubmit === 'function') form.requestSubmit(); else form.submit();
  return true;
})()"#;

/// What the portal shows right after opening the entry URL.
enum Entry {
    LoginForm,
    /// A live portal session skipped the form.
    AlreadyLoggedIn,
}

/// Log in and return the landing URL, which later serves as the reset baseline.
pub async fn authenticate(
    session: &dyn PortalSession,
    portal_url: &str,
    layout: &PortalLayout,
    credentials: &Credentials,
    timeouts: &Timeouts,
    progress: &dyn ProgressSink,
) -> Result<String, PortalError> {
    progress.report(RunEvent::step("Logging in to the portal"));
    let page = session.page();
    let login = &layout.login;

    page.goto(portal_url)
        .await
        .map_err(|e| PortalError::Authentication(format!("portal unreachable: {e}")))?;

    let marker = &layout.landing_marker;
    let entry = poll_until(timeouts.step, timeouts.poll, move || async move {
        if page.is_visible(&login.username).await? {
            return Ok(Some(Entry::LoginForm));
        }
        Ok(page
            .is_visible(marker)
            .await?
            .then_some(Entry::AlreadyLoggedIn))
    })
    .await;
    match entry {
        Some(Entry::LoginForm) => {}
        Some(Entry::AlreadyLoggedIn) => {
            let landing = page.current_url().await?;
            tracing::info!(landing = %landing, "portal session already authenticated");
            progress.report(RunEvent::step("Logged in"));
            return Ok(landing);
        }
        None => return Err(PortalError::Authentication("login form not found".into())),
    }

    let filled = page.fill(&login.username, &credentials.username).await?
        && page.fill(&login.password, credentials.password.as_str()).await?;
    if !filled {
        return Err(PortalError::Authentication(
            "username or password field missing".into(),
        ));
    }

    let mut submitted = false;
    for control in &login.submit {
        if page.click(control).await.unwrap_or(false) {
            submitted = true;
            break;
        }
    }
    if !submitted {
        tracing::debug!("no submit control clicked, submitting the form directly");
        submitted = page
            .run_script(SUBMIT_FORM_SCRIPT)
            .await?
            .as_bool()
            .unwrap_or(false);
    }
    if !submitted {
        return Err(PortalError::Authentication("could not submit login form".into()));
    }

    if !wait_visible(page, &layout.landing_marker, timeouts.login, timeouts.poll).await {
        return Err(PortalError::Authentication(
            "post-login marker did not appear (wrong credentials or changed layout)".into(),
        ));
    }

    let landing = page.current_url().await?;
    tracing::info!(landing = %landing, "authenticated");
    progress.report(RunEvent::step("Logged in"));
    Ok(landing)
}
