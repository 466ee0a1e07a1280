use freezer_core::call::{CallOutcome, LedgerCall};
use freezer_core::error::FreezerError;
use freezer_core::types::{AccountId, Balance};
use freezer_ledger::{FreezerEngine, MemoryCustody};
use tokio::sync::oneshot;

/// The engine flavour the node runs: ledger over the in-process token.
pub type NodeEngine = FreezerEngine<MemoryCustody>;

/// A state-changing request, applied in order by the node's writer task.
#[derive(Debug)]
pub enum NodeCommand {
    Ledger {
        caller: AccountId,
        call: LedgerCall,
        reply: oneshot::Sender<Result<CallOutcome, FreezerError>>,
    },
    /// Set `owner`'s allowance towards ledger custody.
    Approve {
        owner: AccountId,
        amount: Balance,
        reply: oneshot::Sender<Result<Balance, FreezerError>>,
    },
    RegisterUsername {
        caller: AccountId,
        name: String,
        reply: oneshot::Sender<Result<(), FreezerError>>,
    },
}
