//! Progress reporting injected into the retrieval pipeline.
//!
//! Retrieval code never talks to the UI. It emits `RunEvent`s into a
//! `ProgressSink`; the dashboard collects them, the tracing sink logs them.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::period::DocumentKind;

/// Event emitted during a run. One `Step` per major step, plus strategy outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    Step {
        message: String,
    },
    StrategySucceeded {
        step: String,
        strategy: String,
    },
    StrategyFailed {
        step: String,
        strategy: String,
        reason: String,
    },
    Warning {
        kind: Option<DocumentKind>,
        message: String,
    },
    DocumentRetrieved {
        kind: DocumentKind,
        path: PathBuf,
    },
    DocumentMissing {
        kind: DocumentKind,
        reason: String,
    },
}

impl RunEvent {
    pub fn step(message: impl Into<String>) -> Self {
        Self::Step {
            message: message.into(),
        }
    }

    pub fn warning(kind: Option<DocumentKind>, message: impl Into<String>) -> Self {
        Self::Warning {
            kind,
            message: message.into(),
        }
    }

    /// One-line, user-facing rendering.
    pub fn message(&self) -> String {
        match self {
            Self::Step { message } => message.clone(),
            Self::StrategySucceeded { step, strategy } => {
                format!("{step}: succeeded via {strategy}")
            }
            Self::StrategyFailed {
                step,
                strategy,
                reason,
            } => format!("{step}: {strategy} failed ({reason})"),
            Self::Warning {
                kind: Some(kind),
                message,
            } => format!("[{kind}] warning: {message}"),
            Self::Warning {
                kind: None,
                message,
            } => format!("warning: {message}"),
            Self::DocumentRetrieved { kind, path } => {
                format!("{kind} saved to {}", path.display())
            }
            Self::DocumentMissing { kind, reason } => format!("no {kind} document: {reason}"),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: RunEvent);
}

/// Logs every event through `tracing`.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: RunEvent) {
        match &event {
            RunEvent::Step { message } => tracing::info!("{message}"),
            RunEvent::StrategySucceeded { step, strategy } => {
                tracing::info!(step = %step, strategy = %strategy, "strategy succeeded")
            }
            RunEvent::StrategyFailed {
                step,
                strategy,
                reason,
            } => tracing::debug!(step = %step, strategy = %strategy, reason = %reason, "strategy failed"),
            RunEvent::Warning { kind, message } => {
                tracing::warn!(kind = ?kind, "{message}")
            }
            RunEvent::DocumentRetrieved { kind, path } => {
                tracing::info!(kind = %kind, path = %path.display(), "document retrieved")
            }
            RunEvent::DocumentMissing { kind, reason } => {
                tracing::warn!(kind = %kind, reason = %reason, "document not retrieved")
            }
        }
    }
}

/// Keeps events in memory (and logs them) so a caller can show them after the run.
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<RunEvent>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(RunEvent::message).collect()
    }
}

impl ProgressSink for CollectingProgress {
    fn report(&self, event: RunEvent) {
        TracingProgress.report(event.clone());
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
