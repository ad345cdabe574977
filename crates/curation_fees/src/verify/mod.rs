//! Reproducibility hashing and verification of payout runs.

mod bundle;

pub use bundle::normalize_for_hash;
pub use bundle::{
    reproducibility_hash, verify_bundle_hash, PayoutBundle, VerificationResult, VerifyError,
};
