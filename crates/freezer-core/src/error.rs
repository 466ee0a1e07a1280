use thiserror::Error;

use crate::types::{Balance, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FreezerError {
    // ── Freeze / unfreeze ────────────────────────────────────────────────────
    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("ledger is not approved to pull {need} base units (allowance {have})")]
    InsufficientAllowance { need: Balance, have: Balance },

    #[error("referral and beneficiary must be different")]
    SelfReferral,

    #[error("no deposit found")]
    NoDeposit,

    #[error("freezing period not over (unlocks at {unlock_at})")]
    LockNotMatured { unlock_at: Timestamp },

    // ── Access / pause ───────────────────────────────────────────────────────
    #[error("caller is not the ledger owner")]
    Unauthorized,

    #[error("ledger is paused")]
    Paused,

    #[error("re-entrant call rejected")]
    Reentrant,

    // ── Batches / parameters ─────────────────────────────────────────────────
    #[error("length mismatch: {left} has {left_len} entries, {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("invalid ledger parameters: {0}")]
    InvalidParams(String),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    // ── Token custody ────────────────────────────────────────────────────────
    #[error("insufficient token balance: need {need}, have {have}")]
    InsufficientBalance { need: Balance, have: Balance },

    #[error("ledger does not hold the token's minting capability")]
    MissingMintCapability,

    // ── Username registry ────────────────────────────────────────────────────
    #[error("no empty username")]
    EmptyUsername,

    #[error("username already taken")]
    UsernameTaken,

    #[error("username already defined for this account")]
    UsernameAlreadyDefined,

    // ── Collectibles ─────────────────────────────────────────────────────────
    #[error("not eligible to mint")]
    NotEligibleToMint,

    #[error("unknown collectible tier: {0}")]
    UnknownTier(u64),

    #[error("tier {tier} supply exceeded: max {max}, requested total {requested}")]
    TierSupplyExceeded { tier: u64, max: u64, requested: u64 },

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("unsupported schema version {found} (this build supports up to {supported})")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl FreezerError {
    /// Stable machine-readable name of the error kind (used on the RPC wire).
    pub fn kind(&self) -> &'static str {
        match self {
            FreezerError::InvalidAmount => "InvalidAmount",
            FreezerError::InsufficientAllowance { .. } => "InsufficientAllowance",
            FreezerError::SelfReferral => "SelfReferral",
            FreezerError::NoDeposit => "NoDeposit",
            FreezerError::LockNotMatured { .. } => "LockNotMatured",
            FreezerError::Unauthorized => "Unauthorized",
            FreezerError::Paused => "Paused",
            FreezerError::Reentrant => "Reentrant",
            FreezerError::LengthMismatch { .. } => "LengthMismatch",
            FreezerError::InvalidParams(_) => "InvalidParams",
            FreezerError::ArithmeticOverflow => "ArithmeticOverflow",
            FreezerError::InsufficientBalance { .. } => "InsufficientBalance",
            FreezerError::MissingMintCapability => "MissingMintCapability",
            FreezerError::EmptyUsername => "EmptyUsername",
            FreezerError::UsernameTaken => "UsernameTaken",
            FreezerError::UsernameAlreadyDefined => "UsernameAlreadyDefined",
            FreezerError::NotEligibleToMint => "NotEligibleToMint",
            FreezerError::UnknownTier(_) => "UnknownTier",
            FreezerError::TierSupplyExceeded { .. } => "TierSupplyExceeded",
            FreezerError::UnsupportedSchemaVersion { .. } => "UnsupportedSchemaVersion",
            FreezerError::Serialization(_) => "Serialization",
            FreezerError::Storage(_) => "Storage",
        }
    }

    /// Build a `LengthMismatch` if the two lengths differ.
    pub fn check_lengths(
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    ) -> Result<(), FreezerError> {
        if left_len != right_len {
            return Err(FreezerError::LengthMismatch { left, left_len, right, right_len });
        }
        Ok(())
    }
}
