use serde::Serialize;
use sha2::{Digest, Sha256};

/// `0x`-prefixed SHA-256 over the canonical JSON encoding of `payload`.
///
/// Content digest only. Signing and anchoring belong to the ledger collaborator.
pub fn forensic_hash<T: Serialize>(payload: &T) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("0x{}", hex::encode(hasher.finalize()))
}
