//! Wire format for the upstream indexer's webhook body (spec §4.4, §6.1).

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerPayload {
    #[serde(default)]
    pub apply: Vec<ApplyBlock>,
    #[serde(default)]
    pub rollback: Vec<RollbackBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplyBlock {
    pub hash: String,
    pub height: i64,
    pub parent_hash: String,
    #[serde(default)]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub txs: Vec<ApplyTransaction>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplyTransaction {
    pub tx_id: String,
    pub sender: String,
    pub success: bool,
    pub position: i32,
    pub nonce: i64,
    #[serde(default)]
    pub fee: BigDecimal,
    #[serde(default)]
    pub cost_compute: Option<i64>,
    #[serde(default)]
    pub cost_memory: Option<i64>,
    #[serde(default)]
    pub contract_call: Option<ContractCallInfo>,
    #[serde(default)]
    pub events: Vec<ApplyEvent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractCallInfo {
    pub contract_id: String,
    pub function_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplyEvent {
    pub event_index: i32,
    pub variant: crate::db::models::EventVariant,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub decoded_value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RollbackBlock {
    pub hash: String,
}
