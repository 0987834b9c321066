// Parley API - Local Development Server

use std::net::SocketAddr;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use parley_app::{body_limit_layer, build_cors_layer, create_app};
use parley_common::{Config, StoreBackend};
use sqlx::PgPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.rust_log)),
        )
        .pretty()
        .init();

    info!(?config, "Starting Parley API local development server");

    let pool = match (config.store_backend, config.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(url)) => {
            let pool = PgPool::connect(url).await.map_err(|e| {
                error!("Failed to connect to database: {}", e);
                anyhow::anyhow!("Database connection failed: {}", e)
            })?;
            info!("Database connection established");

            sqlx::migrate!("../../migrations").run(&pool).await?;
            info!("Database migrations applied");
            Some(pool)
        }
        _ => None,
    };

    let app = create_app(&config, pool).await.map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;

    let cors = match config.cors_allowed_origins.as_deref() {
        Some(origins) => build_cors_layer(origins),
        None => CorsLayer::permissive(),
    };

    let router = app
        .router
        .layer(body_limit_layer())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(worker) = app.auto_reply_worker {
        worker.abort();
    }
    app.feed_cleanup.abort();

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
