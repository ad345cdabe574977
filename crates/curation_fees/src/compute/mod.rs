//! Fee math, reconciliation and per-curator aggregation. Pure and synchronous.

mod aggregate;
pub mod fee;
mod reconcile;

pub use aggregate::{aggregate_fees, CuratorFeesSummary, UNKNOWN_CURATOR_NAME};
pub use fee::{creation_fee, curator_share, to_base_units, FeeError};
pub use reconcile::{reconcile, CurationDetail, ReconcileStats, Reconciliation};
