//! Stable traffic sampling for the corridor.
//!
//! The sampling decision must be reproducible across processes and restarts,
//! so both the digest (SHA-256) and the normalization (first 16 hex digits
//! over 16^16) are fixed. Changing either silently reshuffles which
//! transactions enter the corridor.

use sha2::{Digest, Sha256};

/// Deterministically decide whether a transaction participates.
///
/// `sample_rate <= 0` never samples and `>= 1` always samples. In between,
/// the transaction id (empty string when absent) is hashed and the first
/// eight digest bytes, read big-endian and normalized to `[0, 1)`, are
/// compared against the rate.
pub fn stable_sample(command_id: Option<&str>, sample_rate: f64) -> bool {
    if sample_rate <= 0.0 {
        return false;
    }
    if sample_rate >= 1.0 {
        return true;
    }
    let digest = Sha256::digest(command_id.unwrap_or("").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bucket = u64::from_be_bytes(prefix) as f64 / 2f64.powi(64);
    bucket < sample_rate
}
