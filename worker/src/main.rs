use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use worker::Worker;
use worker::config::WorkerConfig;
use worker::shutdown::install_shutdown_handler;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("worker=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start worker");
            std::process::exit(1);
        }
    };
    let worker = match Worker::new(&config) {
        Ok(worker) => worker,
        Err(e) => {
            tracing::error!(error = %e, "Cannot build HTTP client");
            std::process::exit(1);
        }
    };

    tracing::info!(
        server = %config.server_url,
        worker_id = %config.worker_id,
        work_dir = %config.work_dir.display(),
        "Connecting to dispatch server"
    );
    worker.run(install_shutdown_handler()).await;
}
