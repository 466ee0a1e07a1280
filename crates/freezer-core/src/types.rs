use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{TOKEN_DECIMALS, UNITS_PER_TOKEN};

/// Token amount in base units (1 token = 10^18 base units).
pub type Balance = u128;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Participant level tier (0 = base tier).
pub type Level = u8;

// ── AccountId ────────────────────────────────────────────────────────────────

/// 32-byte participant / owner identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The all-zero account. Never a valid participant; used as "no referral".
    pub const ZERO: AccountId = AccountId([0u8; 32]);

    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Decode a store key back into an id. `None` if the key is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, AccountIdParseError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AccountIdParseError(e.to_string()))?;
        Self::from_slice(&bytes)
            .ok_or_else(|| AccountIdParseError(format!("expected 32 bytes, got {}", bytes.len())))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b58 = self.to_b58();
        write!(f, "AccountId({})", &b58[..b58.len().min(8)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid account id: {0}")]
pub struct AccountIdParseError(pub String);

// ── Token amounts ────────────────────────────────────────────────────────────

/// Whole tokens → base units.
pub const fn tokens(whole: u128) -> Balance {
    whole * UNITS_PER_TOKEN
}

/// Render base units as a decimal token string, e.g. `1.5` or `0.02`.
pub fn format_tokens(amount: Balance) -> String {
    let whole = amount / UNITS_PER_TOKEN;
    let frac = amount % UNITS_PER_TOKEN;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Parse a decimal token string (`"9.999999999999999"`) into base units.
/// Returns `None` on malformed input, more than 18 fractional digits, or overflow.
pub fn parse_tokens(s: &str) -> Option<Balance> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > TOKEN_DECIMALS as usize
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_units: u128 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    for _ in frac.len()..TOKEN_DECIMALS as usize {
        frac_units *= 10;
    }
    whole.checked_mul(UNITS_PER_TOKEN)?.checked_add(frac_units)
}
