mod api;
mod config;
mod error;
mod job;
mod scheduler;
mod stats;
mod store;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::{Config, TRIGGER_CHANNEL_CAPACITY};
use crate::error::Result;
use crate::job::ComputeJob;
use crate::scheduler::{JobScheduler, JobState};
use crate::store::sqlite::SqliteListingStore;
use crate::store::ListingStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    let store: Arc<dyn ListingStore> = Arc::new(SqliteListingStore::new(
        pool.clone(),
        Duration::from_secs(cfg.query_timeout_secs),
    ));

    // --- Scheduler ---
    let job_state = JobState::new();
    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);

    let job = ComputeJob::new(Arc::clone(&store), &cfg);
    let scheduler = JobScheduler::new(
        job,
        Arc::clone(&job_state),
        trigger_rx,
        cfg.compute_interval_secs,
    );
    tokio::spawn(async move { scheduler.run().await });
    info!(
        "Scheduler started: one compute run every {}s (radius={}m, batch_size={}, max_concurrency={}, stale_threshold={}h)",
        cfg.compute_interval_secs,
        cfg.nearby_radius_m,
        cfg.batch_size,
        cfg.max_concurrency,
        cfg.stale_threshold_hours,
    );

    // --- HTTP API server ---
    let api_state = ApiState { pool, job_state, trigger_tx };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
