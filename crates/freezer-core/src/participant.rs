use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Balance, Level, Timestamp};

// ── Participant ───────────────────────────────────────────────────────────────

/// Per-address lock position as stored in the state DB.
///
/// `deposited` is the compounding balance: principal plus every reward
/// settled into it. `reward_mask` is the part of `deposited` that custody does
/// not hold yet and that is minted when the position is levelled up or paid
/// out. The custody-backed part is `principal() = deposited - reward_mask`.
///
/// A participant with `deposited == 0` is always the all-zero record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub deposited: Balance,
    /// Start of the current lock window; 0 = no active lock.
    pub start_time: Timestamp,
    pub reward_mask: Balance,
    pub level: Level,
    /// Accrual checkpoint: reward up to this instant has been settled.
    pub last_accrual: Timestamp,
}

impl Participant {
    pub fn is_active(&self) -> bool {
        self.deposited > 0
    }

    /// True for the implicit never-touched / fully-withdrawn record.
    pub fn is_empty(&self) -> bool {
        *self == Participant::default()
    }

    /// Custody-backed portion of the position.
    pub fn principal(&self) -> Balance {
        self.deposited.saturating_sub(self.reward_mask)
    }

    /// Earliest timestamp at which `unfreeze` succeeds.
    pub fn unlock_at(&self, lock_duration_secs: i64) -> Option<Timestamp> {
        self.is_active()
            .then(|| self.start_time.saturating_add(lock_duration_secs))
    }
}

// ── Referral bookkeeping ──────────────────────────────────────────────────────

/// One referred deposit, appended to the referrer's history. Never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub depositor: AccountId,
    pub reward: Balance,
    pub deposit_amount: Balance,
    pub referred_at: Timestamp,
}

// ── Global ledger state ───────────────────────────────────────────────────────

/// Ledger-wide aggregates and admin state, stored under one meta key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub owner: AccountId,
    /// Σ participant.deposited.
    pub total_locked: Balance,
    /// Σ participant.reward_mask (locked value custody does not hold yet).
    pub total_reward_mask: Balance,
    /// false = paused.
    pub active: bool,
}

impl LedgerState {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            total_locked: 0,
            total_reward_mask: 0,
            active: true,
        }
    }

    /// Amount custody must hold to back every participant's principal.
    pub fn backed_principal(&self) -> Balance {
        self.total_locked.saturating_sub(self.total_reward_mask)
    }
}
