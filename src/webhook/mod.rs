//! Inbound webhook endpoint (spec §6.1): archives first (C1), authenticates
//! (C2), rate-limits (C3), then hands off to the background ingestion
//! worker and returns 200 immediately.

pub mod authenticity;
pub mod payload;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;

use crate::db::raw_webhook;
use crate::error::AppError;
use crate::ingestion::worker::IngestionJob;
use crate::ratelimit;
use crate::state::AppState;
use authenticity::AuthenticityHeaders;
use payload::IndexerPayload;

pub async fn handle(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<std::net::SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let header_value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let source_addr = header_value("x-forwarded-for")
        .and_then(|h| h.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| remote_addr.ip().to_string());
    let user_agent = header_value("user-agent");

    let headers_json = headers_to_json(&headers);
    let body_json: serde_json::Value =
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    // C1: archive before any authenticity decision, in its own transaction
    // so the audit row survives whatever happens next (spec §4.1, §9).
    let (_, raw_id) = raw_webhook::archive(&state.db, &headers_json, &body_json, &source_addr, user_agent)
        .await
        .map_err(AppError::Db)?;

    let auth_headers = AuthenticityHeaders {
        signature: header_value("x-signature"),
        timestamp: header_value("x-signature-timestamp"),
        nonce: header_value("x-nonce"),
    };

    if let Err(error) = authenticity::verify(
        auth_headers,
        &body,
        &state.config.hmac_secret,
        state.config.hmac_freshness,
        &state.kv,
    )
    .await
    {
        let reason = match &error {
            AppError::Authenticity(reason) => reason.to_string(),
            AppError::Malformed(msg) => msg.clone(),
            _ => "authenticity check failed".to_string(),
        };
        let _ = raw_webhook::mark_rejected(&state.db, raw_id, &reason).await;
        return Err(error);
    }

    let principal = ratelimit::principal_key(None, header_value("x-forwarded-for"), &source_addr);
    let allowed = ratelimit::check(&state.kv, &principal, state.config.rate_limit_per_minute)
        .await
        .map_err(AppError::Kv)?;
    if !allowed {
        return Err(AppError::RateLimited);
    }

    let indexer_payload: IndexerPayload = match serde_json::from_value(body_json) {
        Ok(payload) => payload,
        Err(error) => {
            let _ = raw_webhook::mark_rejected(&state.db, raw_id, &error.to_string()).await;
            return Err(AppError::Malformed(format!("invalid indexer payload: {error}")));
        }
    };

    // Handler returns 200 immediately after the raw event is archived and
    // the request accepted; the ingestion transaction runs on the
    // background worker (spec §5).
    if state
        .ingestion_tx
        .send(IngestionJob {
            raw_id,
            payload: indexer_payload,
        })
        .await
        .is_err()
    {
        let _ = raw_webhook::mark_failed(&state.db, raw_id, "ingestion worker unavailable", None).await;
        return Err(AppError::Internal(anyhow::anyhow!("ingestion worker unavailable")));
    }

    Ok(StatusCode::OK)
}

fn headers_to_json(headers: &HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            map.insert(name.as_str().to_string(), serde_json::Value::String(value.to_string()));
        }
    }
    serde_json::Value::Object(map)
}
