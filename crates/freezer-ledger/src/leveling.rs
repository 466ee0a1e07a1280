//! Level thresholds and the one-tier-per-call level transition.

use std::mem;

use freezer_core::error::FreezerError;
use freezer_core::params::FreezerParams;
use freezer_core::participant::Participant;
use freezer_core::types::{Balance, Level, Timestamp};

use crate::accrual;

/// Number of thresholds `balance` meets or exceeds. Used for referral tiers,
/// never to change a stored level.
pub fn balance_tier(params: &FreezerParams, balance: Balance) -> Level {
    params
        .level_thresholds
        .iter()
        .take_while(|t| balance >= **t)
        .count() as Level
}

/// Threshold the position must exceed to reach the next level, if any.
pub fn next_threshold(p: &Participant, params: &FreezerParams) -> Option<Balance> {
    p.level.checked_add(1).and_then(|next| params.threshold_for(next))
}

/// True when the balance including unsettled reward strictly exceeds the next
/// threshold. False at the top level and for empty positions.
pub fn can_increase_level(
    p: &Participant,
    params: &FreezerParams,
    now: Timestamp,
) -> Result<bool, FreezerError> {
    if !p.is_active() {
        return Ok(false);
    }
    let Some(threshold) = next_threshold(p, params) else {
        return Ok(false);
    };
    let pending = accrual::pending_reward(p, params, now)?;
    Ok(p.deposited.saturating_add(pending) > threshold)
}

/// Move a settled position up exactly one level. The lock restarts at `now`
/// and the unminted reward is handed back to the caller for minting.
pub fn advance(p: &mut Participant, now: Timestamp) -> Result<Balance, FreezerError> {
    p.level = p.level.checked_add(1).ok_or(FreezerError::ArithmeticOverflow)?;
    p.start_time = now;
    Ok(mem::take(&mut p.reward_mask))
}
