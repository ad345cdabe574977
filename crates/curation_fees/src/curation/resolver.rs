//! Best-effort recovery of item ids from transaction receipts.
//!
//! Hashes are resolved in fixed-size concurrent batches with a pause between
//! batches. A failed receipt contributes an empty mapping and is counted; it
//! never aborts the run.

use crate::chain::normalize::normalize_id;
use crate::chain::source::ReceiptSource;
use crate::curation::logs::{EventMatcher, ITEM_CURATED_EVENT, TRANSFER_EVENT};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};

const BATCH_SIZE: usize = 10;
const BATCH_DELAY_MS: u64 = 100;

#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub transfer_signature: String,
    pub curation_signatures: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            batch_delay: Duration::from_millis(BATCH_DELAY_MS),
            transfer_signature: TRANSFER_EVENT.to_string(),
            curation_signatures: vec![ITEM_CURATED_EVENT.to_string()],
        }
    }
}

impl ResolverConfig {
    pub fn matcher(&self) -> EventMatcher {
        EventMatcher::new(&self.transfer_signature, &self.curation_signatures)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
    pub ids_extracted: usize,
}

/// tx hash -> collection -> item ids in emission order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedItems {
    by_tx: HashMap<String, HashMap<String, Vec<String>>>,
}

impl ResolvedItems {
    pub fn insert(&mut self, tx_hash: &str, by_collection: HashMap<String, Vec<String>>) {
        let by_collection = by_collection
            .into_iter()
            .map(|(c, ids)| (normalize_id(&c), ids))
            .collect();
        self.by_tx.insert(normalize_id(tx_hash), by_collection);
    }

    pub fn ids(&self, tx_hash: &str, collection_id: &str) -> Option<&[String]> {
        self.by_tx
            .get(&normalize_id(tx_hash))?
            .get(&normalize_id(collection_id))
            .map(Vec::as_slice)
    }

    pub fn contains_tx(&self, tx_hash: &str) -> bool {
        self.by_tx.contains_key(&normalize_id(tx_hash))
    }

    pub fn tx_count(&self) -> usize {
        self.by_tx.len()
    }

    /// Fresh consumable queues; `self` is left untouched.
    pub fn queues(&self) -> ItemQueues {
        let mut queues = HashMap::new();
        for (tx, by_collection) in &self.by_tx {
            for (collection, ids) in by_collection {
                queues.insert(
                    (tx.clone(), collection.clone()),
                    ids.iter().cloned().collect::<VecDeque<_>>(),
                );
            }
        }
        ItemQueues { queues }
    }
}

/// FIFO of unclaimed item ids per (tx hash, collection).
#[derive(Debug, Default)]
pub struct ItemQueues {
    queues: HashMap<(String, String), VecDeque<String>>,
}

impl ItemQueues {
    /// Claim the next id for the pair; each id is handed out at most once.
    pub fn pop_front(&mut self, tx_hash: &str, collection_id: &str) -> Option<String> {
        self.queues
            .get_mut(&(normalize_id(tx_hash), normalize_id(collection_id)))?
            .pop_front()
    }
}

/// Fetch receipts for `tx_hashes` and collect item ids per (tx, contract).
pub async fn resolve_item_ids<R: ReceiptSource>(
    source: &R,
    tx_hashes: &[String],
    config: &ResolverConfig,
) -> (ResolvedItems, ResolverStats) {
    let matcher = config.matcher();
    let mut resolved = ResolvedItems::default();
    let mut stats = ResolverStats {
        total: tx_hashes.len(),
        ..Default::default()
    };

    for (batch_no, batch) in tx_hashes.chunks(config.batch_size.max(1)).enumerate() {
        if batch_no > 0 && !config.batch_delay.is_zero() {
            tokio::time::sleep(config.batch_delay).await;
        }
        let results = join_all(
            batch
                .iter()
                .map(|hash| async move { (hash, source.receipt(hash).await) }),
        )
        .await;
        for (hash, result) in results {
            match result {
                Ok(receipt) => {
                    let by_collection = matcher.item_ids(&receipt);
                    stats.ids_extracted += by_collection.values().map(Vec::len).sum::<usize>();
                    stats.resolved += 1;
                    resolved.insert(hash, by_collection);
                }
                Err(e) => {
                    warn!(tx_hash = %hash, error = %e, "receipt fetch failed");
                    stats.failed += 1;
                    resolved.insert(hash, HashMap::new());
                }
            }
        }
        debug!(batch = batch_no, size = batch.len(), "receipt batch done");
    }

    info!(
        total = stats.total,
        resolved = stats.resolved,
        failed = stats.failed,
        ids = stats.ids_extracted,
        "item ids resolved"
    );
    (resolved, stats)
}
