//! Single entry point: fee summaries for a date range.
//!
//! Fetch -> resolve -> reconcile -> aggregate. Every call starts from scratch.

use crate::chain::{
    fetch_all_curations, CurationSource, FetchError, ReceiptSource, TimeWindow, PAGE_SIZE,
};
use crate::compute::{aggregate_fees, reconcile, CuratorFeesSummary, FeeError, ReconcileStats};
use crate::curation::{
    resolve_item_ids, CurationRecord, CuratorDirectory, ResolverConfig, ResolverStats,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("fetch curations: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Fee(#[from] FeeError),
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub page_size: usize,
    pub resolver: ResolverConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            resolver: ResolverConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeeReport {
    pub window: TimeWindow,
    pub summaries: Vec<CuratorFeesSummary>,
    pub resolver_stats: ResolverStats,
    pub reconcile_stats: ReconcileStats,
    /// Unique lowercase tx hashes seen, sorted.
    pub tx_hashes: Vec<String>,
}

/// Unique lowercase transaction hashes, sorted.
pub fn unique_tx_hashes(records: &[CurationRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.transaction_hash.to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub async fn compute_fee_summaries<S, R>(
    curations: &S,
    receipts: &R,
    directory: &CuratorDirectory,
    window: TimeWindow,
    config: &PipelineConfig,
) -> Result<FeeReport, PipelineError>
where
    S: CurationSource,
    R: ReceiptSource,
{
    let records = fetch_all_curations(curations, window, config.page_size).await?;
    let tx_hashes = unique_tx_hashes(&records);
    let (resolved, resolver_stats) =
        resolve_item_ids(receipts, &tx_hashes, &config.resolver).await;

    let reconciliation = reconcile(&records, &resolved)?;
    let summaries = aggregate_fees(reconciliation.details, directory);
    info!(
        curators = summaries.len(),
        curations = records.len(),
        "fee summaries computed"
    );
    Ok(FeeReport {
        window,
        summaries,
        resolver_stats,
        reconcile_stats: reconciliation.stats,
        tx_hashes,
    })
}
