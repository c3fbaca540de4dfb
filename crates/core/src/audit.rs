//! Audit log constants and the integrity hash chain.
//!
//! Irreversible ledger operations append an `audit_logs` row whose hash
//! covers the previous row's hash, so a deleted or edited row breaks the
//! chain from that point on.

use crate::hashing;

// ---------------------------------------------------------------------------
// Action type constants
// ---------------------------------------------------------------------------

/// Known action types for audit log entries.
pub mod action_types {
    pub const LEDGER_ARCHIVE: &str = "ledger_archive";
    pub const LEDGER_PURGE: &str = "ledger_purge";
    pub const PAYOUT_CONFIRM: &str = "payout_confirm";
    pub const COMMISSION_CHANGE: &str = "commission_change";
    pub const PASS_REFUND: &str = "pass_refund";
}

/// Entity type names recorded alongside an action.
pub mod entity_types {
    pub const TRANSACTION: &str = "transaction";
    pub const PAYOUT_REQUEST: &str = "payout_request";
    pub const COMMISSION_RATE: &str = "commission_rate";
    pub const PASS: &str = "pass";
}

// ---------------------------------------------------------------------------
// Integrity hash computation
// ---------------------------------------------------------------------------

/// Known seed value for the first entry in the hash chain.
const CHAIN_SEED: &str = "LEDGER_AUDIT_CHAIN_SEED_V1";

/// Compute the SHA-256 integrity hash for an audit log entry.
///
/// `prev_hash` is the previous entry's hash, or `None` for the first entry.
/// `entry_data` is the canonical JSON of the entry's content.
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{entry_data}");
    hashing::sha256_hex(combined.as_bytes())
}

/// Recompute a chain of `(entry_data, stored_hash)` pairs in order and return
/// the index of the first entry whose stored hash does not match.
pub fn first_broken_link<'a, I>(entries: I) -> Option<usize>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut prev: Option<String> = None;
    for (index, (data, stored)) in entries.into_iter().enumerate() {
        let expected = compute_integrity_hash(prev.as_deref(), data);
        if expected != stored {
            return Some(index);
        }
        prev = Some(expected);
    }
    None
}
