//! Full run: retrieve both documents, extract their fields, build the dashboard report.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::extraction::{DocumentFieldExtractor, ExtractedFields};
use crate::orchestrator::RetrievalOrchestrator;
use crate::period::{DocumentKind, RetrievalTarget};
use crate::portal::PortalError;
use crate::progress::{CollectingProgress, ProgressSink, RunEvent};

/// Monetary summary of the payslip plus every field the model returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayslipView {
    pub net_pay: Option<Decimal>,
    pub gross: Option<Decimal>,
    pub deductions: Option<Decimal>,
    pub fields: Map<String, Value>,
}

impl PayslipView {
    fn from_fields(fields: &ExtractedFields) -> Self {
        let amount = |name: &str| fields.get(name).and_then(|v| v.as_decimal());
        Self {
            net_pay: amount("netto_a_pagare"),
            gross: amount("totale_competenze"),
            deductions: amount("totale_trattenute"),
            fields: fields.raw.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceView {
    pub worked_days: Option<i64>,
    pub note: Option<String>,
    pub fields: Map<String, Value>,
}

impl AttendanceView {
    fn from_fields(fields: &ExtractedFields) -> Self {
        Self {
            worked_days: fields.get("giorni_lavorati").and_then(|v| v.as_integer()),
            note: fields
                .get("note")
                .and_then(|v| v.as_text())
                .map(str::to_string),
            fields: fields.raw.clone(),
        }
    }
}

/// What the dashboard shows after a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub period: String,
    pub messages: Vec<String>,
    pub warnings: Vec<String>,
    pub payslip_file: Option<PathBuf>,
    pub attendance_file: Option<PathBuf>,
    pub payslip: Option<PayslipView>,
    pub attendance: Option<AttendanceView>,
}

pub struct PaydeskPipeline {
    orchestrator: RetrievalOrchestrator,
    extractor: DocumentFieldExtractor,
}

impl PaydeskPipeline {
    pub fn new(orchestrator: RetrievalOrchestrator, extractor: DocumentFieldExtractor) -> Self {
        Self {
            orchestrator,
            extractor,
        }
    }

    /// Run retrieval and extraction for `target`.
    ///
    /// Only a failed browser launch or login is an error; everything else
    /// shows up as a missing view plus a warning.
    pub async fn run(&self, target: &RetrievalTarget) -> Result<RunReport, PortalError> {
        let progress = CollectingProgress::new();
        let outcome = self.orchestrator.run(target, &progress).await?;
        let mut warnings = outcome.warnings.clone();

        let mut extracted = Vec::new();
        for kind in [DocumentKind::Payslip, DocumentKind::Attendance] {
            let Some(path) = outcome.path(kind) else {
                extracted.push(None);
                continue;
            };
            progress.report(RunEvent::step(format!("Extracting {kind} fields")));
            let fields = self.extractor.extract(kind, path).await;
            if fields.is_none() {
                let event = RunEvent::warning(Some(kind), "ExtractionFailure: no data extracted");
                warnings.push(event.message());
                progress.report(event);
            }
            extracted.push(fields);
        }

        progress.report(RunEvent::step("Run complete"));
        let mut extracted = extracted.into_iter();
        let payslip = extracted.next().flatten();
        let attendance = extracted.next().flatten();

        Ok(RunReport {
            period: target.named_period_key(),
            messages: progress.messages(),
            warnings,
            payslip_file: outcome.payslip.clone(),
            attendance_file: outcome.attendance.clone(),
            payslip: payslip.as_ref().map(PayslipView::from_fields),
            attendance: attendance.as_ref().map(AttendanceView::from_fields),
        })
    }
}
