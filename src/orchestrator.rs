//! Retrieval orchestrator: one browser session, one login, two document pipelines.
//!
//! The payslip and attendance pipelines are isolated from each other. Any
//! failure inside one becomes a missing document plus a warning; only a
//! failed launch or login ends the run early. The session is closed exactly
//! once, whichever way the run ends.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

use crate::config::{Credentials, Settings, Timeouts};
use crate::period::{DocumentKind, RetrievalTarget};
use crate::portal::{
    authenticate, navigate, reset_to_baseline, retrieve_document, set_date_range,
    DateFilterOutcome, PortalError, PortalLayout, PortalSession, SessionLauncher,
};
use crate::progress::{ProgressSink, RunEvent};

/// Paths of the documents a run saved. `None` means not found, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalOutcome {
    pub payslip: Option<PathBuf>,
    pub attendance: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl RetrievalOutcome {
    pub fn path(&self, kind: DocumentKind) -> Option<&PathBuf> {
        match kind {
            DocumentKind::Payslip => self.payslip.as_ref(),
            DocumentKind::Attendance => self.attendance.as_ref(),
        }
    }
}

/// Forwards events and remembers the ones the operator must see at the end.
struct WarningTap<'a> {
    inner: &'a dyn ProgressSink,
    warnings: Mutex<Vec<String>>,
}

impl<'a> WarningTap<'a> {
    fn new(inner: &'a dyn ProgressSink) -> Self {
        Self {
            inner,
            warnings: Mutex::new(Vec::new()),
        }
    }

    fn take(self) -> Vec<String> {
        self.warnings.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressSink for WarningTap<'_> {
    fn report(&self, event: RunEvent) {
        if matches!(
            event,
            RunEvent::Warning { .. } | RunEvent::DocumentMissing { .. }
        ) {
            if let Ok(mut warnings) = self.warnings.lock() {
                warnings.push(event.message());
            }
        }
        self.inner.report(event);
    }
}

pub struct RetrievalOrchestrator {
    launcher: Box<dyn SessionLauncher>,
    layout: PortalLayout,
    portal_url: String,
    credentials: Credentials,
    output_dir: PathBuf,
    timeouts: Timeouts,
}

impl RetrievalOrchestrator {
    pub fn new(launcher: Box<dyn SessionLauncher>, layout: PortalLayout, settings: &Settings) -> Self {
        Self {
            launcher,
            layout,
            portal_url: settings.portal_url.clone(),
            credentials: settings.credentials.clone(),
            output_dir: settings.output_dir.clone(),
            timeouts: settings.timeouts,
        }
    }

    /// Retrieve both documents for `target`.
    ///
    /// Errors only when no browser could be started or login failed.
    pub async fn run(
        &self,
        target: &RetrievalTarget,
        progress: &dyn ProgressSink,
    ) -> Result<RetrievalOutcome, PortalError> {
        let tap = WarningTap::new(progress);
        tap.report(RunEvent::step(format!(
            "Starting retrieval for {}",
            target.named_period_key()
        )));

        let mut session = self.launcher.launch().await?;
        let result = self.run_in_session(session.as_ref(), target, &tap).await;

        tap.report(RunEvent::step("Closing browser session"));
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "browser session did not close cleanly");
        }

        let (payslip, attendance) = result?;
        Ok(RetrievalOutcome {
            payslip,
            attendance,
            warnings: tap.take(),
        })
    }

    async fn run_in_session(
        &self,
        session: &dyn PortalSession,
        target: &RetrievalTarget,
        progress: &dyn ProgressSink,
    ) -> Result<(Option<PathBuf>, Option<PathBuf>), PortalError> {
        let landing = authenticate(
            session,
            &self.portal_url,
            &self.layout,
            &self.credentials,
            &self.timeouts,
            progress,
        )
        .await?;

        let payslip = self.payslip_pipeline(session, target, progress).await;
        let payslip = settle(DocumentKind::Payslip, payslip, progress);

        let attendance = self
            .attendance_pipeline(session, &landing, target, progress)
            .await;
        let attendance = settle(DocumentKind::Attendance, attendance, progress);

        Ok((payslip, attendance))
    }

    async fn payslip_pipeline(
        &self,
        session: &dyn PortalSession,
        target: &RetrievalTarget,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, PortalError> {
        let kind = DocumentKind::Payslip;
        navigate(session, self.layout.route(kind), &self.timeouts, progress).await?;
        retrieve_document(
            session,
            kind,
            target,
            self.layout.listing(kind),
            &self.output_dir,
            &self.timeouts,
            progress,
        )
        .await
    }

    async fn attendance_pipeline(
        &self,
        session: &dyn PortalSession,
        landing: &str,
        target: &RetrievalTarget,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, PortalError> {
        let kind = DocumentKind::Attendance;
        reset_to_baseline(session, &self.layout, landing, &self.timeouts, progress).await?;
        navigate(session, self.layout.route(kind), &self.timeouts, progress).await?;

        let filter = set_date_range(
            session,
            &self.layout.date_range,
            target,
            &self.timeouts,
            progress,
        )
        .await;
        if let DateFilterOutcome::Confirmed { strategy } = &filter {
            tracing::debug!(strategy = %strategy, "date range confirmed");
        }

        retrieve_document(
            session,
            kind,
            target,
            self.layout.listing(kind),
            &self.output_dir,
            &self.timeouts,
            progress,
        )
        .await
    }
}

/// Downgrade a pipeline failure to a missing document.
fn settle(
    kind: DocumentKind,
    result: Result<PathBuf, PortalError>,
    progress: &dyn ProgressSink,
) -> Option<PathBuf> {
    match result {
        Ok(path) => {
            progress.report(RunEvent::DocumentRetrieved {
                kind,
                path: path.clone(),
            });
            Some(path)
        }
        Err(e) => {
            progress.report(RunEvent::DocumentMissing {
                kind,
                reason: e.to_string(),
            });
            None
        }
    }
}
