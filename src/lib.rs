pub mod config;
pub mod period;
pub mod progress;
pub mod portal; // browser seam, strategy chains, login/navigation/download
pub mod orchestrator;
pub mod extraction;
pub mod pipeline;
pub mod dashboard;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use config::{ConfigError, Settings};
use extraction::{DocumentFieldExtractor, ExtractionError, GeminiClient};
use orchestrator::RetrievalOrchestrator;
use period::{PeriodError, RetrievalTarget};
use pipeline::PaydeskPipeline;
use portal::chrome::ChromeLauncher;
use portal::{PortalError, PortalLayout};

#[derive(Parser, Debug)]
#[command(name = "paydesk", version)]
#[command(about = "Fetch the monthly payslip and attendance record from the HR portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Serve the local dashboard (the default)
    Serve,
    /// Retrieve and extract one month, print the report as JSON
    Fetch {
        /// Month number (1-12) or name (Giugno, june)
        month: String,
        year: i32,
    },
}

impl Commands {
    fn fetch_target(month: &str, year: i32) -> Result<RetrievalTarget, PeriodError> {
        match month.parse::<u32>() {
            Ok(number) => RetrievalTarget::new(number, year),
            Err(_) => RetrievalTarget::from_month_name(month, year),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error(transparent)]
    Portal(#[from] PortalError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Report serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire the Chrome session launcher and the Gemini client into a pipeline.
pub fn build_pipeline(settings: &Settings) -> Result<PaydeskPipeline, AppError> {
    let layout = match &settings.layout_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "using portal layout override");
            PortalLayout::load(path)?
        }
        None => PortalLayout::default(),
    };
    let launcher = ChromeLauncher {
        headless: settings.headless,
        chrome_path: settings.chrome_path.clone(),
        http_timeout: settings.timeouts.download,
    };
    let orchestrator = RetrievalOrchestrator::new(Box::new(launcher), layout, settings);

    let client = GeminiClient::new(
        &settings.extraction,
        Duration::from_secs(config::EXTRACTION_TIMEOUT_SECS),
    )?;
    let extractor = DocumentFieldExtractor::new(Box::new(client));
    Ok(PaydeskPipeline::new(orchestrator, extractor))
}

async fn execute(command: Commands) -> Result<(), AppError> {
    // Validate the month before touching the environment.
    let target = match &command {
        Commands::Fetch { month, year } => Some(Commands::fetch_target(month, *year)?),
        Commands::Serve => None,
    };

    let settings = Settings::from_env()?;
    tracing::debug!(settings = ?settings, "settings loaded");
    std::fs::create_dir_all(&settings.output_dir)?;
    let pipeline = build_pipeline(&settings)?;

    match target {
        Some(target) => {
            let report = pipeline.run(&target).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => dashboard::serve(settings.dashboard_addr, Arc::new(pipeline)).await?,
    }
    Ok(())
}

pub fn run() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::from)
        .and_then(|runtime| runtime.block_on(execute(command)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "{} stopped", config::APP_NAME);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
