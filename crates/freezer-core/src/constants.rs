/// ─── Freezer Ledger Constants ───────────────────────────────────────────────
///
/// Base unit: 1 token = 10^18 base units (18 fractional decimal digits).
/// All balances are carried as `u128` base units.

// ── Units ────────────────────────────────────────────────────────────────────

/// Number of fractional decimal digits of the staked token.
pub const TOKEN_DECIMALS: u32 = 18;

/// 1 whole token expressed in base units.
pub const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Denominator for basis-point multipliers.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Denominator for referral percentages.
pub const PERCENT_DENOMINATOR: u128 = 100;

// ── Lock window ──────────────────────────────────────────────────────────────

/// Maturity window (seconds). 182.5 days, half of a 365-day year.
pub const DEFAULT_LOCK_DURATION_SECS: i64 = 15_768_000;

// ── Accrual ──────────────────────────────────────────────────────────────────

/// Base units accrued per whole locked token per second at the base tier.
/// ≈ 98.1% simple yearly yield before per-level multipliers.
pub const DEFAULT_BASE_REWARD_RATE: u128 = 31_121_900_000;

/// Per-level accrual multiplier in basis points (index = level).
pub const DEFAULT_LEVEL_RATE_BPS: [u128; 5] = [10_000, 10_500, 11_000, 11_500, 12_500];

// ── Levels & referrals ───────────────────────────────────────────────────────

/// Deposit thresholds for levels 1..=4 (whole tokens).
pub const DEFAULT_LEVEL_THRESHOLDS_TOKENS: [u128; 4] = [10, 100, 1_000, 10_000];

/// Referral percentage paid to a referrer at each tier (index = tier).
pub const DEFAULT_REFERRAL_PERCENTAGES: [u128; 5] = [1, 2, 5, 7, 10];

// ── Storage ──────────────────────────────────────────────────────────────────

/// Schema version written by this build. See `freezer_state::migrate`.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;
