//! curation_fees: curator fee reconciliation for curation payouts.
//!
//! Pages curation events from an indexer, recovers item ids from transaction
//! receipts, pays only the first curation of each item and totals fees per curator.
//! Read-only; no keys; no transaction signing.

pub mod chain;
pub mod compute;
pub mod curation;
pub mod pipeline;
pub mod report;
pub mod verify;

pub use chain::{FetchConfig, FetchError, Fetcher, ReceiptCache, TimeWindow};
pub use compute::{CurationDetail, CuratorFeesSummary, FeeError};
pub use curation::{CurationRecord, CuratorDirectory, ResolverConfig};
pub use pipeline::{compute_fee_summaries, FeeReport, PipelineConfig, PipelineError};
pub use report::{payout_rows, PayoutConfig, PayoutRow};
pub use verify::{reproducibility_hash, PayoutBundle, VerificationResult};
