use api::auth::middleware::log_request;
use api::routes::app;
use axum::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    middleware::from_fn,
};
use migration::Migrator;
use sea_orm_migration::MigratorTrait;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::cors::CorsLayer;
use tracing_appender::rolling;
use util::{config, state::AppState, worker_auth::SharedSecret};

#[tokio::main]
async fn main() {
    let _log_guard = init_logging(&config::log_file());

    let db = db::connect().await.expect("Failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to apply migrations");

    let (explicit_secret, secret_path) = {
        let cfg = config::AppConfig::global();
        (
            cfg.worker_shared_secret.clone(),
            cfg.worker_secret_path.clone().map(PathBuf::from),
        )
    };
    let secret = SharedSecret::load(explicit_secret, secret_path).expect("Failed to load worker secret");
    if !secret.is_configured() {
        tracing::warn!("WORKER_SHARED_SECRET is not set; every worker request will be refused");
    }

    let app_state = AppState::from_config(db, Arc::new(secret));

    let cors = CorsLayer::very_permissive().expose_headers([CONTENT_DISPOSITION, CONTENT_TYPE]);
    let app = app(app_state).layer(from_fn(log_request)).layer(cors);

    let addr: SocketAddr = format!("{}:{}", config::host(), config::port())
        .parse()
        .expect("Invalid address");

    tracing::info!(
        "Starting {} on http://{} (public URL {})",
        config::project_name(),
        addr,
        config::public_base_url()
    );

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server crashed");
}

fn init_logging(log_file: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = config::log_to_stdout().then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true)
    });

    let env_filter = EnvFilter::try_new(config::log_level())
        .unwrap_or_else(|_| EnvFilter::new("api=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    guard
}
