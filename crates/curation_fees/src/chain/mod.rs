//! Chain and indexer access: fetching, receipt caching, pagination, normalization.

pub(crate) mod cache;
pub(crate) mod fetch;
pub(crate) mod normalize;
pub(crate) mod source;

pub use cache::{CacheError, ReceiptCache};
pub use fetch::{
    parse_curations_response, parse_receipt_response, FetchConfig, FetchError, Fetcher,
    IndexerCollection, IndexerCuration, IndexerEntityRef, Receipt, ReceiptLog,
};
pub use normalize::{normalize_id, parse_bound, Bound, NormalizeError, TimeWindow};
pub use source::{fetch_all_curations, CurationSource, ReceiptSource, PAGE_SIZE};
