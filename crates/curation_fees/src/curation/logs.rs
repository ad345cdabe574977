//! Item-id extraction from receipt event logs.

use crate::chain::fetch::{Receipt, ReceiptLog};
use crate::chain::normalize::normalize_id;
use alloy_primitives::{keccak256, U256};
use std::collections::HashMap;

/// ERC-721 transfer; the token id is the third indexed argument.
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";
/// Registry curation event; the item id is indexed at position 2.
pub const ITEM_CURATED_EVENT: &str = "ItemCurated(address,address,uint256)";

/// `0x`-prefixed keccak-256 topic hash of an event signature.
pub fn event_topic(signature: &str) -> String {
    let hash = keccak256(signature.as_bytes());
    format!("0x{}", hex::encode(hash.as_slice()))
}

/// Decode a 32-byte big-endian word (hex, optional `0x`) into a decimal id.
pub fn decode_word(word: &str) -> Option<String> {
    let bytes = hex::decode(word.trim().trim_start_matches("0x")).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    U256::try_from_be_slice(&bytes).map(|v| v.to_string())
}

/// Recognizes transfer and curation events by their first topic.
#[derive(Clone, Debug)]
pub struct EventMatcher {
    transfer_topic: String,
    curation_topics: Vec<String>,
}

impl EventMatcher {
    pub fn new(transfer_signature: &str, curation_signatures: &[String]) -> Self {
        Self {
            transfer_topic: event_topic(transfer_signature),
            curation_topics: curation_signatures.iter().map(|s| event_topic(s)).collect(),
        }
    }

    /// Item id carried by `log`, if it is a recognized event.
    pub fn item_id(&self, log: &ReceiptLog) -> Option<String> {
        let topic0 = normalize_id(log.topics.first()?);
        if topic0 == self.transfer_topic {
            // ERC-20 transfers have no indexed token id.
            if log.topics.len() < 4 {
                return None;
            }
            return decode_word(&log.topics[3]);
        }
        if !self.curation_topics.contains(&topic0) {
            return None;
        }
        if let Some(topic) = log.topics.get(2).or_else(|| log.topics.get(1)) {
            return decode_word(topic);
        }
        let data = log.data.trim().trim_start_matches("0x");
        decode_word(data.get(..64)?)
    }

    /// Ids per lowercase emitting contract, in emission order.
    pub fn item_ids(&self, receipt: &Receipt) -> HashMap<String, Vec<String>> {
        let mut logs: Vec<&ReceiptLog> = receipt.logs.iter().collect();
        if logs.iter().all(|l| l.log_index().is_some()) {
            logs.sort_by_key(|l| l.log_index());
        }
        let mut by_contract: HashMap<String, Vec<String>> = HashMap::new();
        for log in logs {
            if let Some(id) = self.item_id(log) {
                by_contract
                    .entry(normalize_id(&log.address))
                    .or_default()
                    .push(id);
            }
        }
        by_contract
    }
}

impl Default for EventMatcher {
    fn default() -> Self {
        Self::new(TRANSFER_EVENT, &[ITEM_CURATED_EVENT.to_string()])
    }
}
