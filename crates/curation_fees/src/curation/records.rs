//! Curation records as consumed by reconciliation.

use serde::{Deserialize, Serialize};

/// Collections created at or before this time belong to the legacy program and earn no fees.
pub const LEGACY_COLLECTION_CUTOFF: i64 = 1_658_153_853;

/// Item entry of a collection payload. Fees are 18-decimal fixed-point integer strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStub {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub creation_fee: Option<String>,
}

/// One curator reviewing one collection at one point in time.
///
/// `items` is the item list of the whole collection; only the first entry is priced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationRecord {
    pub timestamp: i64,
    pub transaction_hash: String,
    pub curator_address: String,
    pub collection_id: String,
    #[serde(default)]
    pub collection_name: Option<String>,
    pub collection_created_at: i64,
    #[serde(default)]
    pub items: Vec<ItemStub>,
}

impl CurationRecord {
    pub fn first_item(&self) -> Option<&ItemStub> {
        self.items.first()
    }

    pub fn is_legacy(&self) -> bool {
        self.collection_created_at <= LEGACY_COLLECTION_CUTOFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(created_at: i64) -> CurationRecord {
        CurationRecord {
            timestamp: 1,
            transaction_hash: "0xa".into(),
            curator_address: "0xu".into(),
            collection_id: "0xc".into(),
            collection_name: None,
            collection_created_at: created_at,
            items: vec![],
        }
    }

    #[test]
    fn cutoff_is_inclusive() {
        assert!(record(LEGACY_COLLECTION_CUTOFF).is_legacy());
        assert!(record(LEGACY_COLLECTION_CUTOFF - 1).is_legacy());
        assert!(!record(LEGACY_COLLECTION_CUTOFF + 1).is_legacy());
    }

    #[test]
    fn first_item_of_empty_list() {
        assert!(record(2_000_000_000).first_item().is_none());
    }
}
