//! Per-curator fee totals with the full audit trail.

use crate::chain::normalize::normalize_id;
use crate::compute::reconcile::CurationDetail;
use crate::curation::CuratorDirectory;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN_CURATOR_NAME: &str = "Unknown Curator";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratorFeesSummary {
    pub curator_id: String,
    pub name: String,
    pub payment_address: String,
    pub total_fees: Decimal,
    /// All details, zero-fee duplicates included.
    pub curation_count: usize,
    pub curations: Vec<CurationDetail>,
}

/// Group `details` by curator, drop zero totals, rank by total descending.
pub fn aggregate_fees(
    details: Vec<CurationDetail>,
    directory: &CuratorDirectory,
) -> Vec<CuratorFeesSummary> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<CurationDetail>)> = Vec::new();
    for detail in details {
        let curator = normalize_id(&detail.curator);
        let slot = *index.entry(curator.clone()).or_insert_with(|| {
            groups.push((curator, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(detail);
    }

    let mut summaries: Vec<CuratorFeesSummary> = groups
        .into_iter()
        .map(|(curator, curations)| {
            let total_fees = curations
                .iter()
                .map(|d| d.curator_fee)
                .filter(|f| !f.is_zero())
                .sum::<Decimal>()
                .normalize();
            let (name, payment_address) = match directory.lookup(&curator) {
                Some(entry) => (entry.name.clone(), entry.payment_address.clone()),
                None => (UNKNOWN_CURATOR_NAME.to_string(), curator.clone()),
            };
            CuratorFeesSummary {
                curator_id: curator,
                name,
                payment_address,
                total_fees,
                curation_count: curations.len(),
                curations,
            }
        })
        .filter(|s| !s.total_fees.is_zero())
        .collect();

    summaries.sort_by(|a, b| b.total_fees.cmp(&a.total_fees));
    summaries
}
