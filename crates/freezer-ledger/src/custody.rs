//! Token custody: the capability surface the ledger needs from the staked
//! token. The ledger never touches balances directly; it pulls deposits,
//! pays principal out of its own holdings and mints rewards through this
//! trait, so the backend can be swapped for a test double or another chain.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use freezer_core::error::FreezerError;
use freezer_core::types::{AccountId, Balance};
use tracing::debug;

pub trait TokenCustody: Send + Sync {
    /// Account under which the ledger holds deposited principal.
    fn custody_account(&self) -> AccountId;

    /// Pull `amount` from `from` into custody. Requires a prior allowance.
    fn transfer_in(&self, from: &AccountId, amount: Balance) -> Result<(), FreezerError>;

    /// Pay `amount` of held principal out of custody.
    fn transfer_out(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError>;

    /// Mint fresh reward tokens to `to`. Requires the minting capability.
    fn mint_reward(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError>;

    fn balance_of(&self, account: &AccountId) -> Balance;

    /// Allowance `owner` has granted to the custody account.
    fn allowance(&self, owner: &AccountId) -> Balance;
}

// ── MemoryToken ───────────────────────────────────────────────────────────────

/// Snapshot of a `MemoryToken`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenBook {
    pub balances: BTreeMap<AccountId, Balance>,
    /// (owner, spender) → remaining allowance.
    pub allowances: BTreeMap<(AccountId, AccountId), Balance>,
    pub minters: BTreeSet<AccountId>,
    pub total_supply: Balance,
}

/// Thread-safe in-process fungible token with allowances and a minter role.
#[derive(Debug, Default)]
pub struct MemoryToken {
    book: Mutex<TokenBook>,
}

impl MemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_book(book: TokenBook) -> Self {
        Self { book: Mutex::new(book) }
    }

    fn book(&self) -> MutexGuard<'_, TokenBook> {
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> TokenBook {
        self.book().clone()
    }

    /// Create `amount` out of thin air for `account` (genesis / test seeding).
    pub fn credit(&self, account: &AccountId, amount: Balance) -> Result<(), FreezerError> {
        let mut book = self.book();
        book.total_supply = book
            .total_supply
            .checked_add(amount)
            .ok_or(FreezerError::ArithmeticOverflow)?;
        let bal = book.balances.entry(*account).or_insert(0);
        *bal = bal.checked_add(amount).ok_or(FreezerError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Balance) {
        let mut book = self.book();
        if amount == 0 {
            book.allowances.remove(&(*owner, *spender));
        } else {
            book.allowances.insert((*owner, *spender), amount);
        }
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Balance {
        self.book().allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    pub fn balance_of(&self, account: &AccountId) -> Balance {
        self.book().balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Balance {
        self.book().total_supply
    }

    pub fn grant_minter(&self, account: &AccountId) {
        self.book().minters.insert(*account);
    }

    pub fn revoke_minter(&self, account: &AccountId) {
        self.book().minters.remove(account);
    }

    pub fn is_minter(&self, account: &AccountId) -> bool {
        self.book().minters.contains(account)
    }

    pub fn transfer(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
        let mut book = self.book();
        Self::move_balance(&mut book, from, to, amount)
    }

    /// `spender` moves `amount` from `from` to `to`, consuming allowance.
    pub fn transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
    ) -> Result<(), FreezerError> {
        let mut book = self.book();
        let key = (*from, *spender);
        let allowed = book.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(FreezerError::InsufficientAllowance { need: amount, have: allowed });
        }
        Self::move_balance(&mut book, from, to, amount)?;
        let remaining = allowed - amount;
        if remaining == 0 {
            book.allowances.remove(&key);
        } else {
            book.allowances.insert(key, remaining);
        }
        Ok(())
    }

    pub fn mint(&self, minter: &AccountId, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
        let mut book = self.book();
        if !book.minters.contains(minter) {
            return Err(FreezerError::MissingMintCapability);
        }
        book.total_supply = book
            .total_supply
            .checked_add(amount)
            .ok_or(FreezerError::ArithmeticOverflow)?;
        let bal = book.balances.entry(*to).or_insert(0);
        *bal = bal.checked_add(amount).ok_or(FreezerError::ArithmeticOverflow)?;
        Ok(())
    }

    fn move_balance(
        book: &mut TokenBook,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
    ) -> Result<(), FreezerError> {
        let have = book.balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(FreezerError::InsufficientBalance { need: amount, have });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let remaining = have - amount;
        if remaining == 0 {
            book.balances.remove(from);
        } else {
            book.balances.insert(*from, remaining);
        }
        let bal = book.balances.entry(*to).or_insert(0);
        *bal = bal.checked_add(amount).ok_or(FreezerError::ArithmeticOverflow)?;
        Ok(())
    }
}

// ── MemoryCustody ─────────────────────────────────────────────────────────────

/// The ledger's view of a `MemoryToken`: acts as `custody` on the token.
#[derive(Clone, Debug)]
pub struct MemoryCustody {
    token: Arc<MemoryToken>,
    custody: AccountId,
}

impl MemoryCustody {
    pub fn new(token: Arc<MemoryToken>, custody: AccountId) -> Self {
        Self { token, custody }
    }

    pub fn token(&self) -> &Arc<MemoryToken> {
        &self.token
    }
}

impl TokenCustody for MemoryCustody {
    fn custody_account(&self) -> AccountId {
        self.custody
    }

    fn transfer_in(&self, from: &AccountId, amount: Balance) -> Result<(), FreezerError> {
        debug!(from = %from, amount, "custody: transfer in");
        self.token.transfer_from(&self.custody, from, &self.custody, amount)
    }

    fn transfer_out(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
        debug!(to = %to, amount, "custody: transfer out");
        self.token.transfer(&self.custody, to, amount)
    }

    fn mint_reward(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
        debug!(to = %to, amount, "custody: mint reward");
        self.token.mint(&self.custody, to, amount)
    }

    fn balance_of(&self, account: &AccountId) -> Balance {
        self.token.balance_of(account)
    }

    fn allowance(&self, owner: &AccountId) -> Balance {
        self.token.allowance(owner, &self.custody)
    }
}
