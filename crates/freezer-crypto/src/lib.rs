pub mod hash;
pub mod merkle;

pub use hash::{account_id_from_seed, blake3_hash, keccak256, random_account_id};
pub use merkle::{allowlist_leaf, merkle_proof, merkle_root, verify_merkle_proof, MerkleHash};
