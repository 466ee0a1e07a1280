use freezer_core::error::FreezerError;
use freezer_core::params::FreezerParams;
use freezer_core::types::{format_tokens, AccountId, Timestamp};
use freezer_state::FreezerDb;

use crate::{accrual, leveling, referral};

/// Read-only helpers over stored positions.
pub struct LedgerQuery<'a> {
    db: &'a FreezerDb,
    params: &'a FreezerParams,
}

impl<'a> LedgerQuery<'a> {
    pub fn new(db: &'a FreezerDb, params: &'a FreezerParams) -> Self {
        Self { db, params }
    }

    /// Returns true if `id` holds a position that can be withdrawn at `now`.
    pub fn is_matured(&self, id: &AccountId, now: Timestamp) -> Result<bool, FreezerError> {
        let p = self.db.get_participant(id)?;
        Ok(p
            .unlock_at(self.params.lock_duration_secs)
            .is_some_and(|at| now >= at))
    }

    /// Human-readable summary of a participant's position.
    pub fn describe(&self, id: &AccountId, now: Timestamp) -> Result<String, FreezerError> {
        let p = self.db.get_participant(id)?;
        let rewards = self.db.get_referral_rewards(id)?;
        let referral_pct = referral::referral_percentage(&p, self.params);

        let Some(unlock_at) = p.unlock_at(self.params.lock_duration_secs) else {
            return Ok(format!(
                "Participant {} | no active lock | referral {}% | {} claimable",
                id,
                referral_pct,
                format_tokens(rewards)
            ));
        };

        let pending = accrual::pending_reward(&p, self.params, now)?;
        let lock_str = if unlock_at > now {
            format!("unlocks in {} days", (unlock_at - now) / 86_400)
        } else {
            "matured, ready to unfreeze".to_string()
        };
        let level_str = if leveling::can_increase_level(&p, self.params, now)? {
            format!("level {} (can advance)", p.level)
        } else {
            format!("level {}", p.level)
        };

        Ok(format!(
            "Participant {} | {} locked (+{} pending) | {} | {} | referral {}% | {} claimable",
            id,
            format_tokens(p.deposited),
            format_tokens(pending),
            level_str,
            lock_str,
            referral_pct,
            format_tokens(rewards)
        ))
    }
}
