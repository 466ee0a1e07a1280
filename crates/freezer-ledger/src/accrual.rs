//! Time-based reward accrual.
//!
//! A position earns `base_reward_rate × level_rate_bps / 10_000` base units
//! per whole deposited token per elapsed second since its accrual checkpoint.
//! Settling folds the pending amount into `deposited` (compounding) and into
//! `reward_mask` (not yet minted) and moves the checkpoint to `now`.

use freezer_core::constants::{BPS_DENOMINATOR, UNITS_PER_TOKEN};
use freezer_core::error::FreezerError;
use freezer_core::params::FreezerParams;
use freezer_core::participant::Participant;
use freezer_core::types::{Balance, Timestamp};

/// Reward earned per whole token per second at the participant's level.
pub fn rate_per_token(params: &FreezerParams, p: &Participant) -> Result<Balance, FreezerError> {
    params
        .base_reward_rate
        .checked_mul(params.rate_bps(p.level))
        .map(|scaled| scaled / BPS_DENOMINATOR)
        .ok_or(FreezerError::ArithmeticOverflow)
}

/// Unsettled reward of `p` at `now`. Zero for inactive positions and for a
/// clock that has not moved past the checkpoint.
pub fn pending_reward(
    p: &Participant,
    params: &FreezerParams,
    now: Timestamp,
) -> Result<Balance, FreezerError> {
    if !p.is_active() || now <= p.last_accrual {
        return Ok(0);
    }
    let elapsed = (now - p.last_accrual) as u128;
    let per_token = rate_per_token(params, p)?
        .checked_mul(elapsed)
        .ok_or(FreezerError::ArithmeticOverflow)?;
    mul_units(p.deposited, per_token)
}

/// Fold the pending reward into the position. Returns the settled amount.
///
/// The checkpoint only moves for active positions; callers opening a fresh
/// lock set it themselves.
pub fn settle(
    p: &mut Participant,
    params: &FreezerParams,
    now: Timestamp,
) -> Result<Balance, FreezerError> {
    if !p.is_active() {
        return Ok(0);
    }
    let reward = pending_reward(p, params, now)?;
    p.deposited = p
        .deposited
        .checked_add(reward)
        .ok_or(FreezerError::ArithmeticOverflow)?;
    p.reward_mask = p
        .reward_mask
        .checked_add(reward)
        .ok_or(FreezerError::ArithmeticOverflow)?;
    if now > p.last_accrual {
        p.last_accrual = now;
    }
    Ok(reward)
}

/// `amount × per_token / UNITS_PER_TOKEN` without the intermediate product
/// overflowing for realistic balances.
fn mul_units(amount: Balance, per_token: Balance) -> Result<Balance, FreezerError> {
    let whole = amount / UNITS_PER_TOKEN;
    let frac = amount % UNITS_PER_TOKEN;
    let from_whole = whole
        .checked_mul(per_token)
        .ok_or(FreezerError::ArithmeticOverflow)?;
    let from_frac = frac
        .checked_mul(per_token)
        .ok_or(FreezerError::ArithmeticOverflow)?
        / UNITS_PER_TOKEN;
    from_whole
        .checked_add(from_frac)
        .ok_or(FreezerError::ArithmeticOverflow)
}
