//! Curation domain: records, event-log decoding, item-id resolution, curator directory.

mod directory;
pub mod logs;
mod records;
pub mod resolver;

pub use directory::{CuratorDirectory, CuratorEntry};
pub use logs::{decode_word, event_topic, EventMatcher, ITEM_CURATED_EVENT, TRANSFER_EVENT};
pub use records::{CurationRecord, ItemStub, LEGACY_COLLECTION_CUTOFF};
pub use resolver::{resolve_item_ids, ItemQueues, ResolvedItems, ResolverConfig, ResolverStats};
