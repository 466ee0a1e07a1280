//! Admission checks shared by every ledger operation.

use std::sync::atomic::{AtomicBool, Ordering};

use freezer_core::error::FreezerError;
use freezer_core::participant::LedgerState;
use freezer_core::types::AccountId;

pub fn ensure_active(state: &LedgerState) -> Result<(), FreezerError> {
    if state.active {
        Ok(())
    } else {
        Err(FreezerError::Paused)
    }
}

pub fn ensure_owner(state: &LedgerState, caller: &AccountId) -> Result<(), FreezerError> {
    if state.owner == *caller {
        Ok(())
    } else {
        Err(FreezerError::Unauthorized)
    }
}

/// Non-reentrancy flag. A second `enter` while a `Entered` token is alive
/// fails with `Reentrant` instead of blocking.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

#[must_use]
pub struct Entered<'a> {
    flag: &'a AtomicBool,
}

impl ReentrancyGuard {
    pub fn enter(&self) -> Result<Entered<'_>, FreezerError> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FreezerError::Reentrant)?;
        Ok(Entered { flag: &self.entered })
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
