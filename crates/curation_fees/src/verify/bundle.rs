//! Payout bundle and SHA-256 reproducibility hash.

use crate::chain::TimeWindow;
use crate::compute::{CuratorFeesSummary, ReconcileStats};
use crate::curation::ResolverStats;
use crate::pipeline::FeeReport;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to audit one payout run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutBundle {
    pub version: u32,
    pub window: TimeWindow,
    /// Excluded from the reproducibility hash.
    pub created_utc_rfc3339: String,
    /// Tx hashes used as input (sorted).
    pub tx_hashes: Vec<String>,
    pub resolver_stats: ResolverStats,
    pub reconcile_stats: ReconcileStats,
    pub summaries: Vec<CuratorFeesSummary>,
}

const BUNDLE_VERSION: u32 = 1;
const VOLATILE_FIELDS: [&str; 1] = ["created_utc_rfc3339"];

impl PayoutBundle {
    pub fn from_report(report: &FeeReport) -> Self {
        let created_utc_rfc3339 = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let mut tx_hashes = report.tx_hashes.clone();
        tx_hashes.sort();
        Self {
            version: BUNDLE_VERSION,
            window: report.window,
            created_utc_rfc3339,
            tx_hashes,
            resolver_stats: report.resolver_stats.clone(),
            reconcile_stats: report.reconcile_stats.clone(),
            summaries: report.summaries.clone(),
        }
    }
}

/// Normalize JSON for hashing: sort keys and no whitespace.
pub fn normalize_for_hash(value: &serde_json::Value) -> Result<String, VerifyError> {
    Ok(serde_json::to_string(&sort_json_keys(value))?)
}

fn sort_json_keys(v: &serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(m) => {
            let sorted: std::collections::BTreeMap<&String, serde_json::Value> =
                m.iter().map(|(k, v)| (k, sort_json_keys(v))).collect();
            serde_json::Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}

/// SHA-256 over the normalized bundle JSON, creation time excluded.
pub fn reproducibility_hash(bundle: &PayoutBundle) -> Result<String, VerifyError> {
    let mut json = serde_json::to_value(bundle)?;
    if let serde_json::Value::Object(m) = &mut json {
        for field in VOLATILE_FIELDS {
            m.remove(field);
        }
    }
    let normalized = normalize_for_hash(&json)?;
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationResult {
    pub bundle_hash: String,
    pub expected_hash: Option<String>,
    pub matches: bool,
}

/// Verify a bundle against expected `.sha256` file content, if any.
pub fn verify_bundle_hash(
    bundle: &PayoutBundle,
    expected_hex: Option<&str>,
) -> Result<VerificationResult, VerifyError> {
    let bundle_hash = reproducibility_hash(bundle)?;
    let expected = expected_hex.map(|e| e.trim().to_lowercase());
    let matches = expected.as_deref() == Some(bundle_hash.as_str());
    Ok(VerificationResult {
        bundle_hash,
        expected_hash: expected,
        matches,
    })
}
