use serde::{Deserialize, Serialize};

use crate::constants::{
    BPS_DENOMINATOR, DEFAULT_BASE_REWARD_RATE, DEFAULT_LEVEL_RATE_BPS,
    DEFAULT_LEVEL_THRESHOLDS_TOKENS, DEFAULT_LOCK_DURATION_SECS, DEFAULT_REFERRAL_PERCENTAGES,
    PERCENT_DENOMINATOR, UNITS_PER_TOKEN,
};
use crate::error::FreezerError;
use crate::types::{Balance, Level};

/// Tunable ledger policy, loaded from JSON by the node.
///
/// Level `n` (1-based) is reached once the balance passes
/// `level_thresholds[n - 1]`; `level_rate_bps` and `referral_percentages`
/// have one entry per level including level 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezerParams {
    pub lock_duration_secs: i64,
    /// Base units accrued per whole token per second at 10_000 bps.
    pub base_reward_rate: Balance,
    pub level_thresholds: Vec<Balance>,
    pub level_rate_bps: Vec<u128>,
    pub referral_percentages: Vec<u128>,
}

impl Default for FreezerParams {
    fn default() -> Self {
        Self {
            lock_duration_secs: DEFAULT_LOCK_DURATION_SECS,
            base_reward_rate: DEFAULT_BASE_REWARD_RATE,
            level_thresholds: DEFAULT_LEVEL_THRESHOLDS_TOKENS
                .iter()
                .map(|t| t * UNITS_PER_TOKEN)
                .collect(),
            level_rate_bps: DEFAULT_LEVEL_RATE_BPS.to_vec(),
            referral_percentages: DEFAULT_REFERRAL_PERCENTAGES.to_vec(),
        }
    }
}

impl FreezerParams {
    pub fn from_json(json: &str) -> Result<Self, FreezerError> {
        let params: FreezerParams =
            serde_json::from_str(json).map_err(|e| FreezerError::Serialization(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Highest reachable level.
    pub fn max_level(&self) -> Level {
        self.level_thresholds.len() as Level
    }

    /// Threshold that must be passed to reach `level`. `None` for level 0 or
    /// levels past the top.
    pub fn threshold_for(&self, level: Level) -> Option<Balance> {
        if level == 0 {
            return None;
        }
        self.level_thresholds.get(level as usize - 1).copied()
    }

    /// Accrual multiplier for `level`, clamped to the top tier.
    pub fn rate_bps(&self, level: Level) -> u128 {
        let idx = (level as usize).min(self.level_rate_bps.len() - 1);
        self.level_rate_bps[idx]
    }

    /// Referral percentage for `tier`, clamped to the top tier.
    pub fn referral_percentage(&self, tier: Level) -> u128 {
        let idx = (tier as usize).min(self.referral_percentages.len() - 1);
        self.referral_percentages[idx]
    }

    pub fn validate(&self) -> Result<(), FreezerError> {
        if self.lock_duration_secs <= 0 {
            return Err(FreezerError::InvalidParams(
                "lock_duration_secs must be positive".into(),
            ));
        }
        if self.level_thresholds.is_empty() {
            return Err(FreezerError::InvalidParams(
                "at least one level threshold is required".into(),
            ));
        }
        if self.level_thresholds.len() > Level::MAX as usize {
            return Err(FreezerError::InvalidParams("too many levels".into()));
        }
        FreezerError::check_lengths(
            "level_rate_bps",
            self.level_rate_bps.len(),
            "levels",
            self.level_thresholds.len() + 1,
        )?;
        FreezerError::check_lengths(
            "referral_percentages",
            self.referral_percentages.len(),
            "levels",
            self.level_thresholds.len() + 1,
        )?;
        if self.level_thresholds.windows(2).any(|w| w[0] >= w[1]) || self.level_thresholds[0] == 0 {
            return Err(FreezerError::InvalidParams(
                "level thresholds must be positive and strictly increasing".into(),
            ));
        }
        if self.level_rate_bps.iter().any(|bps| *bps == 0 || *bps > 10 * BPS_DENOMINATOR) {
            return Err(FreezerError::InvalidParams(
                "level rate multipliers must be within (0, 100000] bps".into(),
            ));
        }
        if self.referral_percentages.windows(2).any(|w| w[0] > w[1])
            || self.referral_percentages.iter().any(|p| *p > PERCENT_DENOMINATOR)
        {
            return Err(FreezerError::InvalidParams(
                "referral percentages must be non-decreasing and at most 100".into(),
            ));
        }
        Ok(())
    }
}
