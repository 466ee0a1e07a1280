//! freezer-periphery
//!
//! Satellite registries that live next to the ledger but never touch locked
//! balances: the username registry used for referral links, and the founders
//! collectible collection gated by a Merkle allow-list.

pub mod collectibles;
pub mod registry;

pub use collectibles::{BatchMintRequest, FoundersCollection, TokenId};
pub use registry::UsernameRegistry;
