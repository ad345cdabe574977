//! Payout rows (CSV rendering lives in the curation_fees_report crate).

use crate::compute::{to_base_units, CuratorFeesSummary, FeeError};
use serde::{Deserialize, Serialize};

pub const PAYOUT_TOKEN_TYPE: &str = "erc20";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// ERC-20 contract the payout is made in.
    pub token_address: String,
}

/// One transfer in the payout file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRow {
    pub token_type: String,
    pub token_address: String,
    pub receiver: String,
    /// Base units (18 decimals).
    pub amount: String,
}

pub fn payout_rows(
    summaries: &[CuratorFeesSummary],
    config: &PayoutConfig,
) -> Result<Vec<PayoutRow>, FeeError> {
    summaries
        .iter()
        .map(|s| {
            Ok(PayoutRow {
                token_type: PAYOUT_TOKEN_TYPE.to_string(),
                token_address: config.token_address.clone(),
                receiver: s.payment_address.clone(),
                amount: to_base_units(s.total_fees)?,
            })
        })
        .collect()
}
