//! Squadron state hashing for turn-commit verification.
//!
//! A submitted turn carries the hash of the squadron state the client
//! believes is current; if it disagrees with the server-side hash the turn
//! is rejected and the client must refresh. This is a consistency gate,
//! not a cryptographic boundary.

use sha3::{Digest, Keccak256};

use crate::battle::power::Squadron;
use crate::error::{BattleError, Result};

/// Keccak-256 over the canonical squadron state: the member token-id set
/// (sorted, so insertion order is irrelevant) followed by the category
/// subtotals and the combined total.
pub fn squadron_hash(squadron: &Squadron) -> String {
    let mut ids: Vec<&str> = squadron.members.iter().map(|m| m.token_id.as_str()).collect();
    ids.sort_unstable();

    let power = squadron.power();

    let mut hasher = Keccak256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]); // separator so "ab"+"c" != "a"+"bc"
    }
    for v in [
        power.army,
        power.religion,
        power.civilization,
        power.economic,
        power.total,
    ] {
        hasher.update(v.to_be_bytes());
    }

    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Hard gate: mismatch rejects the turn.
pub fn verify(squadron: &Squadron, claimed: &str) -> Result<()> {
    if squadron_hash(squadron) == claimed {
        Ok(())
    } else {
        Err(BattleError::StateMismatch)
    }
}
