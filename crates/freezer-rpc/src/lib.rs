//! freezer-rpc
//!
//! JSON-RPC 2.0 server for the Freezer node.
//!
//! Namespace: "freezer"
//! Views (answered directly from the state DB):
//!   freezer_getParticipant         stored position plus pending reward
//!   freezer_getTotalLocked         Σ deposited
//!   freezer_getReferralRewards     claimable referral balance
//!   freezer_getReferralHistory     referred deposits, oldest first
//!   freezer_canIncreaseLevel       next threshold passed?
//!   freezer_getReferralPercentage  percentage a referral would earn
//!   freezer_getPendingReward       unsettled reward right now
//!   freezer_describeParticipant    one-line human summary
//!   freezer_getLedgerState         totals, owner, pause flag
//!   freezer_getParams              active ledger parameters
//!   freezer_getTokenBalance        local token balance
//!   freezer_getUsername / freezer_resolveUsername
//! Mutations (forwarded to the node's single writer task):
//!   freezer_freeze, freezer_unfreeze, freezer_compound,
//!   freezer_triggerLevelUp, freezer_claimReferralRewards,
//!   freezer_toggleContractActive, freezer_withdrawStrayBalance,
//!   freezer_transferOwnership, freezer_approve, freezer_registerUsername
//!
//! Every u128 amount crosses the wire as a decimal string of base units.

pub mod api;
pub mod command;
pub mod server;
pub mod types;

pub use command::{NodeCommand, NodeEngine};
pub use server::{RpcServer, RpcServerState};
pub use types::{RpcCallOutcome, RpcLedgerState, RpcParams, RpcParticipant, RpcReferralRecord};
