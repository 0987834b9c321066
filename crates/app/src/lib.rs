//! Parley application composition root
//!
//! Wires storage, moderation, automated replies and the change feed into
//! the conversations router.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderValue, Router};
use parley_autoreply::{ReplyConfig, ReplyService, ReplyServiceFactory};
use parley_common::{Config, StoreBackend};
use parley_conversations::{
    service::MessageDelivery, AutoResponder, AutoResponderWorker, ConversationsRepositories,
    ConversationsState, EventHub, MessagingService,
};
use parley_moderation::{ContentModerator, ModerationConfig, ModeratorFactory};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

/// Largest accepted request body. Messages are capped well below this.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// How often change-feed channels without subscribers are dropped
pub const FEED_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// A composed application: the router plus the background reply worker
pub struct App {
    pub router: Router,
    pub auto_reply_worker: Option<AutoResponderWorker>,
    /// Periodic reclamation of idle change-feed channels
    pub feed_cleanup: JoinHandle<()>,
}

/// Build the application from configuration and the process environment.
///
/// `pool` must be present for the postgres backend and is ignored otherwise.
pub async fn create_app(config: &Config, pool: Option<PgPool>) -> Result<App, anyhow::Error> {
    let repos = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                anyhow::anyhow!("A database pool is required for the postgres store backend")
            })?;
            ConversationsRepositories::postgres(pool)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            ConversationsRepositories::in_memory()
        }
    };

    let moderator = ModeratorFactory::create(ModerationConfig::from_env())?;
    let reply = ReplyServiceFactory::create(ReplyConfig::from_env()?)?;

    Ok(build_app(config, repos, moderator, reply))
}

/// Compose the router from already-built components
pub fn build_app(
    config: &Config,
    repos: ConversationsRepositories,
    moderator: Arc<dyn ContentModerator>,
    reply: Option<Arc<dyn ReplyService>>,
) -> App {
    let hub = EventHub::new();
    let feed_cleanup = hub.spawn_cleanup(FEED_CLEANUP_INTERVAL);
    let delivery = MessageDelivery::new(repos.messages.clone(), hub.clone());

    let (trigger, auto_reply_worker) = match reply {
        Some(reply) => {
            let responder = AutoResponder::new(
                reply,
                &repos,
                moderator.clone(),
                delivery,
                config.autoresponder_timeout(),
            );
            let (trigger, worker) = responder.start(config.autoresponder_queue_capacity);
            (Some(trigger), Some(worker))
        }
        None => (None, None),
    };

    let mut service = MessagingService::new(repos, moderator, hub);
    if let Some(trigger) = trigger {
        service = service.with_auto_responder(trigger);
    }

    let router = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { concat!("Parley API v", env!("CARGO_PKG_VERSION")) }),
        )
        .merge(parley_conversations::routes().with_state(ConversationsState::new(service)));

    App {
        router,
        auto_reply_worker,
        feed_cleanup,
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Reject oversized request bodies before they reach extractors
pub fn body_limit_layer() -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(MAX_BODY_BYTES)
}

/// CORS for a comma-separated origin list. Unparseable entries are skipped.
pub fn build_cors_layer(origins: &str) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static(parley_common::VIEWER_HEADER),
        ])
}
