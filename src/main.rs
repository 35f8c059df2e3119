//! Wiring: config, pools, router, and background workers (ingestion,
//! dispatcher, token-revocation sweep), mirroring how the teacher spawns
//! its axum server from `main.rs` with a shared `AppState`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use chainwatch::auth::TokenService;
use chainwatch::config::Config;
use chainwatch::db;
use chainwatch::db::models::Channel;
use chainwatch::ingestion;
use chainwatch::kv::KvStore;
use chainwatch::notify::channels::email::EmailHandler;
use chainwatch::notify::channels::webhook::WebhookHandler;
use chainwatch::notify::channels::ChannelHandler;
use chainwatch::notify::dispatcher::Dispatcher;
use chainwatch::rules::RuleIndexCache;
use chainwatch::state::AppState;
use chainwatch::telemetry;
use chainwatch::webhook;

const INGESTION_QUEUE_CAPACITY: usize = 1024;
const DISPATCH_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = Config::from_env()?;
    tracing::info!("starting chainwatch");

    let db_pool = db::connect(&config.db_url).await?;
    db::run_migrations(&db_pool).await?;

    let kv = KvStore::connect(&config.kv_url, config.kv_password.as_deref()).await?;

    let private_key = std::fs::read(&config.token_private_key_path)?;
    let public_key = std::fs::read(&config.token_public_key_path)?;
    let token_service = Arc::new(TokenService::new(
        &private_key,
        &public_key,
        &config.token_key_id,
        &config.token_issuer,
        config.token_expiration,
        db_pool.clone(),
    )?);

    let rule_index = Arc::new(RuleIndexCache::new());

    let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);

    let ingestion_tx = ingestion::worker::spawn(
        db_pool.clone(),
        rule_index.clone(),
        dispatch_tx.clone(),
        INGESTION_QUEUE_CAPACITY,
    );

    let mut handlers: HashMap<Channel, Arc<dyn ChannelHandler>> = HashMap::new();
    handlers.insert(
        Channel::Webhook,
        Arc::new(WebhookHandler::new(
            reqwest::Client::new(),
            std::time::Duration::from_secs(10),
        )),
    );
    if config.email_enabled {
        let transport = lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::unencrypted_localhost();
        handlers.insert(
            Channel::Email,
            Arc::new(EmailHandler::new(transport, &config.email_from)?),
        );
    }

    Dispatcher::new(db_pool.clone(), handlers, &config).spawn(dispatch_rx);

    spawn_revocation_sweep(token_service.clone());

    let config = Arc::new(config);
    let bind_addr = config.bind_addr.clone();

    let app_state = AppState {
        db: db_pool,
        kv,
        config,
        rule_index,
        token_service,
        ingestion_tx,
        dispatch_tx,
    };

    let app = Router::new()
        .route("/webhooks/indexer", post(webhook::handle))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "chainwatch listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn spawn_revocation_sweep(token_service: Arc<TokenService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            match token_service.sweep_expired().await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "swept expired revoked-token rows");
                }
                Ok(_) => {}
                Err(error) => tracing::error!(%error, "revocation sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining workers");
}
