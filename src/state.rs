//! Shared application state threaded through every axum handler, mirroring
//! the teacher's single `AppState` struct passed via `.with_state(...)`.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::auth::TokenService;
use crate::config::Config;
use crate::ingestion::worker::IngestionSender;
use crate::kv::KvStore;
use crate::notify::DispatchSignal;
use crate::rules::RuleIndexCache;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub kv: KvStore,
    pub config: Arc<Config>,
    pub rule_index: Arc<RuleIndexCache>,
    pub token_service: Arc<TokenService>,
    pub ingestion_tx: IngestionSender,
    pub dispatch_tx: mpsc::Sender<DispatchSignal>,
}
