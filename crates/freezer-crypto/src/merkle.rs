//! Sorted-pair Keccak-256 Merkle trees for mint allow-lists.
//!
//! Leaves are `keccak256(account bytes)`. Each parent is the hash of its two
//! children concatenated in ascending byte order, so proofs carry no
//! left/right flags. An odd node at the end of a level is promoted unchanged.

use freezer_core::types::AccountId;

use crate::hash::keccak256;

pub type MerkleHash = [u8; 32];

/// Leaf hash for an allow-listed account.
pub fn allowlist_leaf(account: &AccountId) -> MerkleHash {
    keccak256(account.as_bytes())
}

fn hash_pair(a: &MerkleHash, b: &MerkleHash) -> MerkleHash {
    let mut buf = [0u8; 64];
    if a <= b {
        buf[..32].copy_from_slice(a);
        buf[32..].copy_from_slice(b);
    } else {
        buf[..32].copy_from_slice(b);
        buf[32..].copy_from_slice(a);
    }
    keccak256(&buf)
}

fn next_level(level: &[MerkleHash]) -> Vec<MerkleHash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [a, b] => hash_pair(a, b),
            [a] => *a,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Root over `leaves`. The empty tree has the all-zero root.
pub fn merkle_root(leaves: &[MerkleHash]) -> MerkleHash {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Sibling path for the leaf at `index`, or `None` if out of range.
pub fn merkle_proof(leaves: &[MerkleHash], index: usize) -> Option<Vec<MerkleHash>> {
    if index >= leaves.len() {
        return None;
    }
    let mut proof = Vec::new();
    let mut level = leaves.to_vec();
    let mut idx = index;
    while level.len() > 1 {
        let sibling = idx ^ 1;
        if sibling < level.len() {
            proof.push(level[sibling]);
        }
        level = next_level(&level);
        idx /= 2;
    }
    Some(proof)
}

pub fn verify_merkle_proof(root: &MerkleHash, leaf: &MerkleHash, proof: &[MerkleHash]) -> bool {
    let computed = proof.iter().fold(*leaf, |acc, sibling| hash_pair(&acc, sibling));
    &computed == root
}
