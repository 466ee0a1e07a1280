//! Persistence for the node's in-process token.
//!
//! The ledger state lives in sled; the local token's book is written next to
//! it as JSON after every applied command so balances survive a restart.
//! The sled store is always flushed first, so the snapshot never records a
//! token movement whose ledger write is not yet on disk.
//! Accounts are base-58, amounts are base-unit strings.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use freezer_core::types::{parse_tokens, AccountId, Balance};
use freezer_ledger::custody::TokenBook;
use freezer_ledger::MemoryToken;
use freezer_state::FreezerDb;

/// Initial balances, in whole or decimal tokens: `{"balances":[{"account":"…","amount":"100"}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenGenesis {
    pub balances: Vec<GenesisBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub account: String,
    pub amount: String,
}

impl TokenGenesis {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading token genesis from {}", path.display()))?;
        serde_json::from_str(&json).context("parsing token genesis JSON")
    }

    pub fn apply(&self, token: &MemoryToken) -> anyhow::Result<Balance> {
        let mut total: Balance = 0;
        for entry in &self.balances {
            let account = AccountId::from_b58(&entry.account)
                .with_context(|| format!("genesis account {}", entry.account))?;
            let amount = parse_tokens(&entry.amount)
                .ok_or_else(|| anyhow!("invalid genesis amount {:?} for {}", entry.amount, entry.account))?;
            token.credit(&account, amount)?;
            total = total.saturating_add(amount);
        }
        Ok(total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TokenSnapshot {
    balances: Vec<(String, String)>,
    /// (owner, spender, amount)
    allowances: Vec<(String, String, String)>,
    minters: Vec<String>,
    total_supply: String,
}

impl TokenSnapshot {
    fn from_book(book: &TokenBook) -> Self {
        Self {
            balances: book
                .balances
                .iter()
                .map(|(id, amount)| (id.to_b58(), amount.to_string()))
                .collect(),
            allowances: book
                .allowances
                .iter()
                .map(|((owner, spender), amount)| (owner.to_b58(), spender.to_b58(), amount.to_string()))
                .collect(),
            minters: book.minters.iter().map(|id| id.to_b58()).collect(),
            total_supply: book.total_supply.to_string(),
        }
    }

    fn into_book(self) -> anyhow::Result<TokenBook> {
        let account = |s: &str| AccountId::from_b58(s).with_context(|| format!("token snapshot account {s}"));
        let amount = |s: &str| s.parse::<Balance>().with_context(|| format!("token snapshot amount {s}"));

        let mut book = TokenBook::default();
        for (id, value) in &self.balances {
            book.balances.insert(account(id)?, amount(value)?);
        }
        for (owner, spender, value) in &self.allowances {
            book.allowances.insert((account(owner)?, account(spender)?), amount(value)?);
        }
        for id in &self.minters {
            book.minters.insert(account(id)?);
        }
        book.total_supply = amount(&self.total_supply)?;
        Ok(book)
    }
}

/// JSON file holding the token book.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("token.json") }
    }

    /// Load the saved token, if a snapshot exists.
    pub fn load(&self) -> anyhow::Result<Option<MemoryToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let snapshot: TokenSnapshot = serde_json::from_str(&json).context("parsing token snapshot")?;
        Ok(Some(MemoryToken::from_book(snapshot.into_book()?)))
    }

    /// Write the snapshot to a temp file and rename it into place.
    pub fn save(&self, token: &MemoryToken) -> anyhow::Result<()> {
        let snapshot = TokenSnapshot::from_book(&token.snapshot());
        let json = serde_json::to_string_pretty(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    /// Flush the ledger database, then save the token snapshot.
    pub fn checkpoint(&self, db: &FreezerDb, token: &MemoryToken) -> anyhow::Result<()> {
        db.flush().context("flushing state database")?;
        self.save(token)
    }
}
