//! Explicit, versioned schema migrations.
//!
//! `migrate` runs once at startup, before the engine is built. It walks the
//! stored `schema_version` forward one step at a time; each step rewrites the
//! affected records and bumps the version inside the same atomic commit.
//!
//! Version history:
//!   1: participants without an accrual checkpoint; ledger state without
//!       `total_reward_mask`. Accrual ran from `start_time`.
//!   2: `Participant::last_accrual`, `LedgerState::total_reward_mask`.
//!       Each referrer's history stored as one `Vec<ReferralRecord>`.
//!   3: current layout. One `referral_history` key per record
//!       (referrer id ++ sequence number).

use freezer_core::constants::CURRENT_SCHEMA_VERSION;
use freezer_core::error::FreezerError;
use freezer_core::participant::{LedgerState, Participant, ReferralRecord};
use freezer_core::types::{AccountId, Balance, Level, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{Changeset, FreezerDb};

/// Participant layout written by schema version 1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantV1 {
    pub deposited: Balance,
    pub start_time: Timestamp,
    pub reward_mask: Balance,
    pub level: Level,
}

/// Ledger state layout written by schema version 1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerStateV1 {
    pub owner: AccountId,
    pub total_locked: Balance,
    pub active: bool,
}

/// Bring the database up to `CURRENT_SCHEMA_VERSION`. Returns the version
/// the database is at afterwards.
pub fn migrate(db: &FreezerDb) -> Result<u32, FreezerError> {
    let mut version = match db.schema_version()? {
        Some(v) => v,
        // Unversioned data predates version tracking; an empty DB is simply new.
        None if db.is_fresh()? => {
            db.commit(&Changeset {
                schema_version: Some(CURRENT_SCHEMA_VERSION),
                ..Default::default()
            })?;
            info!(version = CURRENT_SCHEMA_VERSION, "fresh database stamped with schema version");
            return Ok(CURRENT_SCHEMA_VERSION);
        }
        None => 1,
    };

    if version > CURRENT_SCHEMA_VERSION {
        return Err(FreezerError::UnsupportedSchemaVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    while version < CURRENT_SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(db)?,
            2 => migrate_v2_to_v3(db)?,
            other => {
                return Err(FreezerError::UnsupportedSchemaVersion {
                    found: other,
                    supported: CURRENT_SCHEMA_VERSION,
                })
            }
        }
        version += 1;
        info!(version, "schema migrated");
    }
    Ok(version)
}

fn migrate_v1_to_v2(db: &FreezerDb) -> Result<(), FreezerError> {
    let mut changes = Changeset {
        schema_version: Some(2),
        ..Default::default()
    };

    let mut total_locked: Balance = 0;
    let mut total_reward_mask: Balance = 0;
    for (id, bytes) in db.iter_raw_participants()? {
        let old: ParticipantV1 = bincode::deserialize(&bytes)
            .map_err(|e| FreezerError::Serialization(e.to_string()))?;
        total_locked = total_locked
            .checked_add(old.deposited)
            .ok_or(FreezerError::ArithmeticOverflow)?;
        total_reward_mask = total_reward_mask
            .checked_add(old.reward_mask)
            .ok_or(FreezerError::ArithmeticOverflow)?;
        changes.participants.push((
            id,
            Participant {
                deposited: old.deposited,
                start_time: old.start_time,
                reward_mask: old.reward_mask,
                level: old.level,
                last_accrual: old.start_time,
            },
        ));
    }

    if let Some(bytes) = db.get_meta("ledger_state")? {
        let old: LedgerStateV1 = bincode::deserialize(&bytes)
            .map_err(|e| FreezerError::Serialization(e.to_string()))?;
        changes.ledger_state = Some(LedgerState {
            owner: old.owner,
            total_locked,
            total_reward_mask,
            active: old.active,
        });
    }

    info!(
        participants = changes.participants.len(),
        total_locked,
        total_reward_mask,
        "migrating schema v1 → v2"
    );
    db.commit(&changes)
}

fn migrate_v2_to_v3(db: &FreezerDb) -> Result<(), FreezerError> {
    let mut removed = Vec::new();
    let mut records = Vec::new();
    for (key, bytes) in db.iter_raw_referral_history()? {
        let Some(referrer) = AccountId::from_slice(&key) else {
            continue;
        };
        let history: Vec<ReferralRecord> = bincode::deserialize(&bytes)
            .map_err(|e| FreezerError::Serialization(e.to_string()))?;
        for (seq, record) in (0u64..).zip(history) {
            records.push((referrer, seq, record));
        }
        removed.push(key);
    }

    info!(
        referrers = removed.len(),
        records = records.len(),
        "migrating schema v2 → v3"
    );
    db.rewrite_referral_history(&removed, &records, 3)
}
