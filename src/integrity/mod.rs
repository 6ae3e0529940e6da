//! Integrity Verification
//!
//! Content digests, record-level validation against embedded digests,
//! change monitoring and external consistency checks.

pub mod cache;
pub mod digest;
pub mod verifier;

pub use cache::DigestCache;
pub use digest::{digest, verify, DigestCheck};
pub use verifier::{
    ChangeObservation, IntegrityVerifier, InvalidReason, InvalidRecord, RecordValidationReport,
    DIGEST_FIELD,
};
