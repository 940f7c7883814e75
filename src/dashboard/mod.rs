//! Local web dashboard: pick a month, trigger a run, read the extracted figures.

pub mod error;
pub mod page;
pub mod router;

pub use error::DashboardError;
pub use router::{dashboard_router, DashboardState};

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::period::RetrievalTarget;
use crate::pipeline::{PaydeskPipeline, RunReport};
use crate::portal::PortalError;

/// Whatever produces a report for a month.
#[async_trait]
pub trait ReportRunner: Send + Sync {
    async fn run_report(&self, target: &RetrievalTarget) -> Result<RunReport, PortalError>;
}

#[async_trait]
impl ReportRunner for PaydeskPipeline {
    async fn run_report(&self, target: &RetrievalTarget) -> Result<RunReport, PortalError> {
        self.run(target).await
    }
}

/// Serve the dashboard on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, runner: Arc<dyn ReportRunner>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = dashboard_router(DashboardState::new(runner));
    tracing::info!(addr = %addr, "dashboard listening on http://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {e}");
            }
            tracing::info!("dashboard shutting down");
        })
        .await
}
