use std::sync::Arc;

use freezer_core::error::FreezerError;
use freezer_core::types::AccountId;
use freezer_state::FreezerDb;
use tracing::info;

/// One-to-one binding between accounts and human-readable usernames.
///
/// Names are arbitrary non-empty UTF-8, compared byte-for-byte. A binding is
/// permanent: an account names itself once and a name is never reassigned.
#[derive(Clone)]
pub struct UsernameRegistry {
    db: Arc<FreezerDb>,
}

impl UsernameRegistry {
    pub fn new(db: Arc<FreezerDb>) -> Self {
        Self { db }
    }

    pub fn register(&self, caller: &AccountId, name: &str) -> Result<(), FreezerError> {
        if name.is_empty() {
            return Err(FreezerError::EmptyUsername);
        }
        if self.db.get_username_owner(name)?.is_some() {
            return Err(FreezerError::UsernameTaken);
        }
        if self.db.get_username(caller)?.is_some() {
            return Err(FreezerError::UsernameAlreadyDefined);
        }
        self.db.put_username(caller, name)?;
        info!(account = %caller, username = name, "username registered");
        Ok(())
    }

    pub fn username_of(&self, account: &AccountId) -> Result<Option<String>, FreezerError> {
        self.db.get_username(account)
    }

    pub fn account_of(&self, name: &str) -> Result<Option<AccountId>, FreezerError> {
        self.db.get_username_owner(name)
    }
}
