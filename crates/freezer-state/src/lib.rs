//! freezer-state
//!
//! Persistent storage for the Freezer ledger: a sled database with one named
//! tree per record family, atomic multi-tree changesets, and the explicit
//! schema migrations run at startup.

pub mod db;
pub mod migrate;

pub use db::{Changeset, FreezerDb};
pub use migrate::migrate;
