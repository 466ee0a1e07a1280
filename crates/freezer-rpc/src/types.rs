use freezer_core::call::{CallOutcome, LevelUpOutcome};
use freezer_core::params::FreezerParams;
use freezer_core::participant::{LedgerState, Participant, ReferralRecord};
use freezer_core::types::{format_tokens, AccountId, Balance, Timestamp};
use serde::{Deserialize, Serialize};

/// JSON-serializable position returned by `freezer_getParticipant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcParticipant {
    pub account_id: String,
    /// Compounding balance in base units (u128 as string).
    pub deposited: String,
    /// Same, as a decimal token amount.
    pub deposited_tokens: String,
    pub start_time: Timestamp,
    /// Unminted reward part of `deposited` (u128 as string).
    pub reward_mask: String,
    pub level: u8,
    pub last_accrual: Timestamp,
    pub unlock_at: Option<Timestamp>,
    /// Reward accrued since `last_accrual`, not yet settled.
    pub pending_reward: String,
}

impl RpcParticipant {
    pub fn new(
        id: &AccountId,
        p: &Participant,
        unlock_at: Option<Timestamp>,
        pending_reward: Balance,
    ) -> Self {
        Self {
            account_id: id.to_b58(),
            deposited: p.deposited.to_string(),
            deposited_tokens: format_tokens(p.deposited),
            start_time: p.start_time,
            reward_mask: p.reward_mask.to_string(),
            level: p.level,
            last_accrual: p.last_accrual,
            unlock_at,
            pending_reward: pending_reward.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcReferralRecord {
    pub depositor: String,
    pub reward: String,
    pub deposit_amount: String,
    pub referred_at: Timestamp,
}

impl From<&ReferralRecord> for RpcReferralRecord {
    fn from(r: &ReferralRecord) -> Self {
        Self {
            depositor: r.depositor.to_b58(),
            reward: r.reward.to_string(),
            deposit_amount: r.deposit_amount.to_string(),
            referred_at: r.referred_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcLedgerState {
    pub owner: String,
    pub total_locked: String,
    pub total_reward_mask: String,
    pub active: bool,
    pub participant_count: u64,
    /// Token balance held by ledger custody.
    pub custody_balance: String,
}

impl RpcLedgerState {
    pub fn new(state: &LedgerState, participant_count: u64, custody_balance: Balance) -> Self {
        Self {
            owner: state.owner.to_b58(),
            total_locked: state.total_locked.to_string(),
            total_reward_mask: state.total_reward_mask.to_string(),
            active: state.active,
            participant_count,
            custody_balance: custody_balance.to_string(),
        }
    }
}

fn strings(values: &[u128]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcParams {
    pub lock_duration_secs: i64,
    pub base_reward_rate: String,
    pub level_thresholds: Vec<String>,
    pub level_rate_bps: Vec<String>,
    pub referral_percentages: Vec<String>,
    pub custody_account: String,
}

impl RpcParams {
    pub fn new(params: &FreezerParams, custody_account: &AccountId) -> Self {
        Self {
            lock_duration_secs: params.lock_duration_secs,
            base_reward_rate: params.base_reward_rate.to_string(),
            level_thresholds: strings(&params.level_thresholds),
            level_rate_bps: strings(&params.level_rate_bps),
            referral_percentages: strings(&params.referral_percentages),
            custody_account: custody_account.to_b58(),
        }
    }
}

/// Result of a ledger mutation. `kind` names the outcome; amount fields are
/// present only where they apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcCallOutcome {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposited: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_reward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl From<&CallOutcome> for RpcCallOutcome {
    fn from(outcome: &CallOutcome) -> Self {
        let kind = |k: &str| k.to_string();
        match outcome {
            CallOutcome::Frozen { deposited, settled_reward, referral_reward } => Self {
                kind: kind("frozen"),
                deposited: Some(deposited.to_string()),
                reward: Some(settled_reward.to_string()),
                referral_reward: referral_reward.map(|r| r.to_string()),
                ..Default::default()
            },
            CallOutcome::Unfrozen { principal, reward } => Self {
                kind: kind("unfrozen"),
                principal: Some(principal.to_string()),
                reward: Some(reward.to_string()),
                ..Default::default()
            },
            CallOutcome::Compounded { reward } => Self {
                kind: kind("compounded"),
                reward: Some(reward.to_string()),
                ..Default::default()
            },
            CallOutcome::LevelUp(LevelUpOutcome::Unchanged) => Self {
                kind: kind("levelUnchanged"),
                ..Default::default()
            },
            CallOutcome::LevelUp(LevelUpOutcome::Advanced { level, folded_reward }) => Self {
                kind: kind("levelAdvanced"),
                level: Some(*level),
                reward: Some(folded_reward.to_string()),
                ..Default::default()
            },
            CallOutcome::ReferralRewardsClaimed { amount } => Self {
                kind: kind("referralRewardsClaimed"),
                amount: Some(amount.to_string()),
                ..Default::default()
            },
            CallOutcome::ActiveToggled { active } => Self {
                kind: kind("activeToggled"),
                active: Some(*active),
                ..Default::default()
            },
            CallOutcome::StrayBalanceWithdrawn { amount } => Self {
                kind: kind("strayBalanceWithdrawn"),
                amount: Some(amount.to_string()),
                ..Default::default()
            },
            CallOutcome::OwnershipTransferred { new_owner } => Self {
                kind: kind("ownershipTransferred"),
                owner: Some(new_owner.to_b58()),
                ..Default::default()
            },
        }
    }
}
