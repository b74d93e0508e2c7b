use clap::Parser;
use dotenvy::dotenv;
use rust_drive_backend::config::ServiceConfig;
use rust_drive_backend::infrastructure::{database, storage};
use rust_drive_backend::services::worker::BackgroundWorker;
use rust_drive_backend::{AppState, create_app};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_drive_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting drive backend [mode: {}]", args.mode);

    let config = ServiceConfig::from_env();
    let db = database::setup_database().await?;
    let storage_service = storage::setup_storage(&config).await;

    info!(
        "Limits: max file size {} MiB, quota {} GiB per user",
        config.max_file_size / 1024 / 1024,
        config.storage_per_user / 1024 / 1024 / 1024
    );

    let state = AppState::new(db, storage_service, config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    if args.mode == "worker" || args.mode == "all" {
        let worker = BackgroundWorker::new(state.uploads.clone(), shutdown_rx.clone());
        handles.push(tokio::spawn(async move {
            worker.run().await;
        }));
        info!("Worker service initialized");
    }

    if args.mode == "api" || args.mode == "all" {
        let app = create_app(state).layer(TraceLayer::new_for_http());
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("API server listening on http://0.0.0.0:{}", args.port);
        info!(
            "Swagger UI available at http://localhost:{}/swagger-ui",
            args.port
        );

        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
            {
                error!("Server runtime error: {}", e);
            }
        }));
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("Shutting down");
    for handle in handles {
        let _ = handle.await;
    }

    info!("Backend exited cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, initiating graceful shutdown");
        },
    }
}
