use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dayplan::config::Config;
use dayplan::db::Repository;
use dayplan::error::{AppError, Result};
use dayplan::notify::Notifier;
use dayplan::schedule::{ChainSettings, ScheduleService, Sweeper};
use dayplan::server::{self, AppState};
use dayplan::travel::{DistanceMatrixEstimator, DurationEstimator, UnconfiguredEstimator};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .ok_or_else(|| AppError::Config("--config needs a path".to_string()))?;
            Config::load_from(&PathBuf::from(path))?
        }
        None => Config::load()?,
    };

    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let repo = Repository::new(&config.db_path).await?;

    let estimator: Arc<dyn DurationEstimator> = match &config.maps_api_key {
        Some(key) => Arc::new(DistanceMatrixEstimator::new(
            config.maps_api_url.clone(),
            key.clone(),
            config.estimator_timeout_secs,
        )),
        None => {
            tracing::warn!("No maps API key configured; travel legs will be skipped");
            Arc::new(UnconfiguredEstimator)
        }
    };

    let notifier = Arc::new(Notifier::new());
    let service = Arc::new(ScheduleService::new(
        repo,
        estimator,
        Arc::clone(&notifier),
        ChainSettings {
            fallback_duration: config.fallback_duration(),
            batch_size: config.batch_size,
        },
    ));

    let sweeper = Sweeper::new(
        Arc::clone(&service),
        Duration::from_secs(config.sweep_interval_secs),
        config.utc_offset_hours,
    )?;
    let sweep_task = sweeper.spawn();

    let app = server::router(AppState { service, notifier });
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("dayplan-server listening on http://{}", config.listen_addr);

    tokio::select! {
        served = async { axum::serve(listener, app).await } => served?,
        stopped = sweep_task => {
            tracing::error!("Sweeper task ended: {:?}", stopped);
            return Err(AppError::Other(anyhow::anyhow!("sweeper task ended")));
        }
    }

    Ok(())
}
