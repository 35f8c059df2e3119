//! C5: immutable multi-level index over active rules (spec §4.5).
//!
//! The index is a plain value published behind an `ArcSwap`; readers take a
//! clone of the `Arc` and need no locks for the duration of their lookup.
//! Any rule mutation calls `RuleIndexCache::invalidate`, which drops the
//! cached snapshot so the next reader rebuilds it from the active rule set.

pub mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use sqlx::PgPool;

use crate::db::models::RuleVariant;
use crate::db::rules as rules_db;
use snapshot::RuleSnapshot;

/// Wildcard function-name bucket key (spec §4.5: "wildcard bucket for 'any
/// function on this contract'").
pub const ANY_FUNCTION: &str = "*";

#[derive(Default)]
pub struct RuleIndex {
    pub by_contract_function: HashMap<String, HashMap<String, Vec<Arc<RuleSnapshot>>>>,
    pub by_asset: HashMap<String, Vec<Arc<RuleSnapshot>>>,
    pub by_address: HashMap<String, Vec<Arc<RuleSnapshot>>>,
    pub by_type: HashMap<RuleVariant, Vec<Arc<RuleSnapshot>>>,
}

impl RuleIndex {
    fn insert(&mut self, snapshot: Arc<RuleSnapshot>) {
        match snapshot.variant {
            RuleVariant::ContractCall => {
                if let Some(contract_id) = snapshot.contract_id.clone() {
                    let function_key = snapshot
                        .function_name
                        .clone()
                        .unwrap_or_else(|| ANY_FUNCTION.to_string());
                    self.by_contract_function
                        .entry(contract_id)
                        .or_default()
                        .entry(function_key)
                        .or_default()
                        .push(snapshot);
                }
            }
            RuleVariant::TokenTransfer => {
                if let Some(asset_id) = snapshot.asset_id.clone() {
                    self.by_asset.entry(asset_id).or_default().push(snapshot);
                }
            }
            RuleVariant::AddressActivity => {
                if let Some(address) = snapshot.watched_address.clone() {
                    self.by_address.entry(address).or_default().push(snapshot);
                }
            }
            RuleVariant::FailedTransaction | RuleVariant::PrintEvent => {
                self.by_type
                    .entry(snapshot.variant)
                    .or_default()
                    .push(snapshot);
            }
        }
    }

    pub fn contract_candidates(&self, contract_id: &str, function_name: &str) -> Vec<Arc<RuleSnapshot>> {
        let Some(by_function) = self.by_contract_function.get(contract_id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if let Some(specific) = by_function.get(function_name) {
            out.extend(specific.iter().cloned());
        }
        if let Some(wildcard) = by_function.get(ANY_FUNCTION) {
            out.extend(wildcard.iter().cloned());
        }
        out
    }

    pub fn asset_candidates(&self, asset_id: &str) -> &[Arc<RuleSnapshot>] {
        self.by_asset.get(asset_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn address_candidates(&self, address: &str) -> &[Arc<RuleSnapshot>] {
        self.by_address.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn type_candidates(&self, variant: RuleVariant) -> &[Arc<RuleSnapshot>] {
        self.by_type.get(&variant).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Read-through cache over the index with a coarse invalidation key: any
/// mutation invalidates the whole thing, next read rebuilds from scratch
/// (spec §4.5 cache contract).
pub struct RuleIndexCache {
    current: ArcSwap<Option<Arc<RuleIndex>>>,
}

impl RuleIndexCache {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(None),
        }
    }

    pub fn invalidate(&self) {
        self.current.store(Arc::new(None));
    }

    pub async fn get(&self, pool: &PgPool) -> Result<Arc<RuleIndex>, sqlx::Error> {
        if let Some(existing) = self.current.load().as_ref().clone() {
            return Ok(existing);
        }
        let rebuilt = Arc::new(rebuild(pool).await?);
        self.current.store(Arc::new(Some(rebuilt.clone())));
        Ok(rebuilt)
    }
}

impl Default for RuleIndexCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn rebuild(pool: &PgPool) -> Result<RuleIndex, sqlx::Error> {
    let rows = rules_db::list_active(pool).await?;
    let mut index = RuleIndex::default();
    for row in &rows {
        index.insert(Arc::new(RuleSnapshot::from_row(row)));
    }
    Ok(index)
}
