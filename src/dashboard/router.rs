//! Dashboard routes: the page, the run trigger and a health probe.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Mutex as TokioMutex;

use super::error::DashboardError;
use super::page::render_index;
use super::ReportRunner;
use crate::period::RetrievalTarget;
use crate::pipeline::RunReport;

#[derive(Clone)]
pub struct DashboardState {
    runner: Arc<dyn ReportRunner>,
    /// Held for the whole run; a second trigger is refused instead of queued.
    run_lock: Arc<TokioMutex<()>>,
}

impl DashboardState {
    pub fn new(runner: Arc<dyn ReportRunner>) -> Self {
        Self {
            runner,
            run_lock: Arc::new(TokioMutex::new(())),
        }
    }
}

/// Month as a number (`6`) or a name (`"Giugno"`, `"june"`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MonthInput {
    Number(u32),
    Name(String),
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub month: MonthInput,
    pub year: i32,
}

impl RunRequest {
    fn target(&self) -> Result<RetrievalTarget, DashboardError> {
        let target = match &self.month {
            MonthInput::Number(month) => RetrievalTarget::new(*month, self.year)?,
            MonthInput::Name(name) => RetrievalTarget::from_month_name(name, self.year)?,
        };
        Ok(target)
    }
}

pub fn dashboard_router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/run", post(run))
        .route("/api/health", get(|| async { "ok" }))
        .with_state(state)
}

async fn index() -> Html<String> {
    Html(render_index(chrono::Local::now().date_naive()))
}

/// `POST /api/run`: run the whole pipeline and return the report.
async fn run(
    State(state): State<DashboardState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunReport>, DashboardError> {
    let target = request.target()?;
    let _guard = state
        .run_lock
        .try_lock()
        .map_err(|_| DashboardError::RunInProgress)?;

    tracing::info!(period = %target.named_period_key(), "dashboard run requested");
    let report = state.runner.run_report(&target).await?;
    Ok(Json(report))
}
