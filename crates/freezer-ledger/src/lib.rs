//! freezer-ledger
//!
//! The time-locked staking ledger. `FreezerEngine` sequences every operation:
//! pause / reentrancy guard → accrual settlement → participant mutation →
//! referral credit → atomic commit → token custody interaction.
//!
//! The arithmetic lives in small pure modules so it can be reused by views
//! and tested in isolation:
//!   accrual    time-based reward for a locked balance
//!   leveling   threshold checks and the one-tier-per-call transition
//!   referral   tier and percentage of a referrer, reward amount
//!   guard      pause / owner checks and the non-reentrancy guard
//!   custody    the token capability the ledger calls into

pub mod accrual;
pub mod custody;
pub mod engine;
pub mod guard;
pub mod leveling;
pub mod query;
pub mod referral;

pub use custody::{MemoryCustody, MemoryToken, TokenCustody};
pub use engine::FreezerEngine;
pub use query::LedgerQuery;
