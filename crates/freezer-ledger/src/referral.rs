//! Referral tiers and rewards.
//!
//! A referrer's tier is the higher of their stored level and the tier their
//! locked balance reaches, so a large depositor earns the matching percentage
//! without levelling up first.

use freezer_core::constants::PERCENT_DENOMINATOR;
use freezer_core::error::FreezerError;
use freezer_core::params::FreezerParams;
use freezer_core::participant::{Participant, ReferralRecord};
use freezer_core::types::{AccountId, Balance, Level, Timestamp};

use crate::leveling;

pub fn referral_tier(referrer: &Participant, params: &FreezerParams) -> Level {
    referrer
        .level
        .max(leveling::balance_tier(params, referrer.deposited))
}

/// Percentage of a referred deposit credited to `referrer`.
pub fn referral_percentage(referrer: &Participant, params: &FreezerParams) -> u128 {
    params.referral_percentage(referral_tier(referrer, params))
}

pub fn referral_reward(deposit: Balance, percentage: u128) -> Result<Balance, FreezerError> {
    deposit
        .checked_mul(percentage)
        .map(|v| v / PERCENT_DENOMINATOR)
        .ok_or(FreezerError::ArithmeticOverflow)
}

/// Reward and history entry for one referred deposit.
pub fn referral_credit(
    referrer: &Participant,
    params: &FreezerParams,
    depositor: AccountId,
    deposit: Balance,
    now: Timestamp,
) -> Result<ReferralRecord, FreezerError> {
    let reward = referral_reward(deposit, referral_percentage(referrer, params))?;
    Ok(ReferralRecord {
        depositor,
        reward,
        deposit_amount: deposit,
        referred_at: now,
    })
}
