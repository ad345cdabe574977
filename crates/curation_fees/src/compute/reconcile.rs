//! Join curations with resolved item ids, detect duplicate curations, price each curation.

use crate::chain::normalize::normalize_id;
use crate::compute::fee::{creation_fee, curator_share, FeeError};
use crate::curation::{CurationRecord, ResolvedItems};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// One fee-bearing (or zero-fee duplicate) curation in a curator's audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationDetail {
    pub curator: String,
    pub timestamp: i64,
    pub transaction_hash: String,
    pub collection_id: String,
    pub collection_name: Option<String>,
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    pub creation_fee: Decimal,
    pub curator_fee: Decimal,
    pub duplicate: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub input: usize,
    pub filtered_legacy: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub duplicates: usize,
    pub zero_fee: usize,
    pub fee_bearing: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Reconciliation {
    /// Fee-bearing curations and duplicates, ascending by timestamp; ties keep input order.
    pub details: Vec<CurationDetail>,
    pub stats: ReconcileStats,
}

/// Reconcile `records` against `resolved`. Pure: `resolved` is not consumed.
pub fn reconcile(
    records: &[CurationRecord],
    resolved: &ResolvedItems,
) -> Result<Reconciliation, FeeError> {
    let mut stats = ReconcileStats {
        input: records.len(),
        ..Default::default()
    };

    let mut curations: Vec<_> = records.iter().filter(|r| !r.is_legacy()).collect();
    stats.filtered_legacy = records.len() - curations.len();
    curations.sort_by_key(|r| r.timestamp);

    let mut queues = resolved.queues();
    // (collection, item) pairs already paid for.
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut details = Vec::with_capacity(curations.len());

    for record in curations {
        let tx_hash = normalize_id(&record.transaction_hash);
        let collection_id = normalize_id(&record.collection_id);
        let item_id = queues.pop_front(&tx_hash, &collection_id);

        // Unresolved curations are never duplicates of each other.
        let duplicate = match &item_id {
            Some(id) => {
                stats.resolved += 1;
                !seen.insert((collection_id.clone(), id.clone()))
            }
            None => {
                stats.unresolved += 1;
                false
            }
        };

        let first_item = record.first_item();
        let raw_fee = first_item.and_then(|i| i.creation_fee.as_deref());
        let (creation, curator_fee) = if duplicate {
            stats.duplicates += 1;
            // Audit only; an unparseable fee on a duplicate is not fatal.
            (creation_fee(raw_fee, &tx_hash).unwrap_or_default(), Decimal::ZERO)
        } else {
            let fee = creation_fee(raw_fee, &tx_hash)?;
            let share = curator_share(fee);
            if share.is_zero() {
                stats.zero_fee += 1;
                debug!(
                    tx_hash = %tx_hash,
                    curator = %record.curator_address,
                    collection = %collection_id,
                    "zero-fee curation excluded"
                );
                continue;
            }
            stats.fee_bearing += 1;
            (fee, share)
        };

        details.push(CurationDetail {
            curator: normalize_id(&record.curator_address),
            timestamp: record.timestamp,
            transaction_hash: tx_hash,
            collection_id,
            collection_name: record.collection_name.clone(),
            item_id,
            item_name: first_item.and_then(|i| i.name.clone()),
            creation_fee: creation,
            curator_fee,
            duplicate,
        });
    }

    info!(
        input = stats.input,
        legacy = stats.filtered_legacy,
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        duplicates = stats.duplicates,
        zero_fee = stats.zero_fee,
        "curations reconciled"
    );
    Ok(Reconciliation { details, stats })
}
