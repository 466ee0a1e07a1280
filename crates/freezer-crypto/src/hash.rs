use freezer_core::types::AccountId;
use rand::RngCore;
use sha3::{Digest, Keccak256};

/// Compute BLAKE3 hash of arbitrary bytes → 32-byte array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Keccak-256 (the pre-standard SHA-3 variant used by allow-list trees).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Derive a deterministic AccountId from arbitrary seed bytes (test fixtures,
/// named service accounts such as the ledger's custody account).
pub fn account_id_from_seed(seed: &[u8]) -> AccountId {
    AccountId::from_bytes(blake3_hash(seed))
}

/// A fresh random AccountId.
pub fn random_account_id() -> AccountId {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    AccountId::from_bytes(bytes)
}
