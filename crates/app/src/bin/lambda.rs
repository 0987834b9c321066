//! Parley API - AWS Lambda Runtime

use lambda_http::{run, Error};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_app::{body_limit_layer, build_cors_layer, create_app};
use parley_common::{Config, StoreBackend};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .without_time()
        .init();

    info!("Initializing Parley API Lambda");

    let config = Config::from_env().map_err(|e| Error::from(e.to_string()))?;

    // Migrations run out of band for Lambda deployments
    let pool = match (config.store_backend, config.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(url)) => {
            let pool = PgPool::connect(url)
                .await
                .map_err(|e| Error::from(format!("Database error: {}", e)))?;
            info!("Database connection established");
            Some(pool)
        }
        _ => None,
    };

    let app = create_app(&config, pool)
        .await
        .map_err(|e| Error::from(format!("App initialization error: {}", e)))?;

    let cors_origins = config
        .cors_allowed_origins
        .as_deref()
        .ok_or_else(|| Error::from("CORS_ALLOWED_ORIGINS environment variable is required"))?;

    let router = app
        .router
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .layer(body_limit_layer());

    info!("Parley API Lambda ready to serve requests");

    run(router).await
}
