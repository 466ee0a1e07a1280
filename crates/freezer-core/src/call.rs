use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Balance, Level};

/// A mutating ledger operation, as submitted by a caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCall {
    /// Lock `amount` for `beneficiary`, pulled from the caller's allowance.
    Freeze {
        beneficiary: AccountId,
        amount: Balance,
        referral: Option<AccountId>,
    },

    /// Withdraw the caller's matured position.
    Unfreeze,

    /// Settle elapsed reward into the caller's mask.
    Compound,

    /// Advance the caller one level if the next threshold is met.
    TriggerLevelUp,

    /// Pay out the caller's accumulated referral rewards.
    ClaimReferralRewards,

    // ── Owner only ───────────────────────────────────────────────────────────
    ToggleContractActive,
    WithdrawStrayBalance,
    TransferOwnership { new_owner: AccountId },
}

impl LedgerCall {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::Freeze { .. } => "freeze",
            LedgerCall::Unfreeze => "unfreeze",
            LedgerCall::Compound => "compound",
            LedgerCall::TriggerLevelUp => "triggerLevelUp",
            LedgerCall::ClaimReferralRewards => "claimReferralRewards",
            LedgerCall::ToggleContractActive => "toggleContractActive",
            LedgerCall::WithdrawStrayBalance => "withdrawStrayBalance",
            LedgerCall::TransferOwnership { .. } => "transferOwnership",
        }
    }
}

/// What a successful call did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    Frozen {
        deposited: Balance,
        settled_reward: Balance,
        referral_reward: Option<Balance>,
    },
    Unfrozen {
        principal: Balance,
        reward: Balance,
    },
    Compounded {
        reward: Balance,
    },
    LevelUp(LevelUpOutcome),
    ReferralRewardsClaimed {
        amount: Balance,
    },
    ActiveToggled {
        active: bool,
    },
    StrayBalanceWithdrawn {
        amount: Balance,
    },
    OwnershipTransferred {
        new_owner: AccountId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelUpOutcome {
    /// Threshold not met or no deposit; nothing changed.
    Unchanged,
    Advanced { level: Level, folded_reward: Balance },
}
