use freezer_core::error::FreezerError;
use freezer_core::participant::{LedgerState, Participant, ReferralRecord};
use freezer_core::types::{AccountId, Balance};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionResult;
use sled::Transactional;
use std::path::Path;

const LEDGER_STATE_KEY: &str = "ledger_state";
const SCHEMA_VERSION_KEY: &str = "schema_version";

fn storage_err(e: impl std::fmt::Display) -> FreezerError {
    FreezerError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, FreezerError> {
    bincode::serialize(value).map_err(|e| FreezerError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FreezerError> {
    bincode::deserialize(bytes).map_err(|e| FreezerError::Serialization(e.to_string()))
}

// ── Changeset ─────────────────────────────────────────────────────────────────

/// Every write produced by one ledger operation, committed atomically.
///
/// Zero-valued records (empty participant, zero reward) are removed rather
/// than stored, so the implicit all-zero record and a stored one are
/// indistinguishable. A referral record entry of `None` removes that record.
#[derive(Clone, Debug, Default)]
pub struct Changeset {
    pub participants: Vec<(AccountId, Participant)>,
    pub referral_rewards: Vec<(AccountId, Balance)>,
    pub referral_records: Vec<(AccountId, u64, Option<ReferralRecord>)>,
    pub ledger_state: Option<LedgerState>,
    pub schema_version: Option<u32>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
            && self.referral_rewards.is_empty()
            && self.referral_records.is_empty()
            && self.ledger_state.is_none()
            && self.schema_version.is_none()
    }
}

/// Pre-encoded key/value writes; `None` value = remove.
type Writes = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// `referral_history` key: referrer id followed by the big-endian sequence
/// number, so a prefix scan yields one referrer's records oldest first.
fn referral_key(referrer: &AccountId, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(referrer.as_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn referral_seq(key: &[u8]) -> Option<u64> {
    let tail: [u8; 8] = key.get(32..)?.try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}

// ── FreezerDb ─────────────────────────────────────────────────────────────────

/// Persistent ledger database backed by sled.
///
/// Named trees:
///   participants       AccountId bytes → bincode(Participant)
///   referral_rewards   AccountId bytes → bincode(u128) claimable balance
///   referral_history   AccountId bytes ++ u64 BE seq → bincode(ReferralRecord)
///   usernames          AccountId bytes → utf8 username
///   username_owners    utf8 username   → AccountId bytes
///   meta               utf8 key bytes  → raw bytes
pub struct FreezerDb {
    _db: sled::Db,
    participants: sled::Tree,
    referral_rewards: sled::Tree,
    referral_history: sled::Tree,
    usernames: sled::Tree,
    username_owners: sled::Tree,
    meta: sled::Tree,
}

impl FreezerDb {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FreezerError> {
        let db = sled::open(path).map_err(storage_err)?;
        let participants     = db.open_tree("participants").map_err(storage_err)?;
        let referral_rewards = db.open_tree("referral_rewards").map_err(storage_err)?;
        let referral_history = db.open_tree("referral_history").map_err(storage_err)?;
        let usernames        = db.open_tree("usernames").map_err(storage_err)?;
        let username_owners  = db.open_tree("username_owners").map_err(storage_err)?;
        let meta             = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            participants,
            referral_rewards,
            referral_history,
            usernames,
            username_owners,
            meta,
        })
    }

    // ── Participants ──────────────────────────────────────────────────────────

    /// Participant record; the all-zero record if never stored.
    pub fn get_participant(&self, id: &AccountId) -> Result<Participant, FreezerError> {
        match self.participants.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => decode(&bytes),
            None => Ok(Participant::default()),
        }
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn iter_participants(&self) -> Result<Vec<(AccountId, Participant)>, FreezerError> {
        let mut out = Vec::new();
        for item in self.participants.iter() {
            let (key, value) = item.map_err(storage_err)?;
            let id = AccountId::from_slice(&key)
                .ok_or_else(|| FreezerError::Storage("malformed participant key".into()))?;
            out.push((id, decode(&value)?));
        }
        Ok(out)
    }

    /// Raw participant values, for migrations that decode older layouts.
    pub(crate) fn iter_raw_participants(&self) -> Result<Vec<(AccountId, Vec<u8>)>, FreezerError> {
        let mut out = Vec::new();
        for item in self.participants.iter() {
            let (key, value) = item.map_err(storage_err)?;
            let id = AccountId::from_slice(&key)
                .ok_or_else(|| FreezerError::Storage("malformed participant key".into()))?;
            out.push((id, value.to_vec()));
        }
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn put_raw_participant(&self, id: &AccountId, bytes: &[u8]) -> Result<(), FreezerError> {
        self.participants.insert(id.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    // ── Referrals ─────────────────────────────────────────────────────────────

    pub fn get_referral_rewards(&self, id: &AccountId) -> Result<Balance, FreezerError> {
        match self.referral_rewards.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => decode(&bytes),
            None => Ok(0),
        }
    }

    /// Referral records credited to `id`, oldest first.
    pub fn get_referral_history(&self, id: &AccountId) -> Result<Vec<ReferralRecord>, FreezerError> {
        let mut out = Vec::new();
        for item in self.referral_history.scan_prefix(id.as_bytes()) {
            let (_, value) = item.map_err(storage_err)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Sequence number the next referral record for `id` is stored under.
    pub fn next_referral_seq(&self, id: &AccountId) -> Result<u64, FreezerError> {
        match self.referral_history.scan_prefix(id.as_bytes()).keys().next_back() {
            Some(key) => {
                let key = key.map_err(storage_err)?;
                let seq = referral_seq(&key)
                    .ok_or_else(|| FreezerError::Storage("malformed referral key".into()))?;
                seq.checked_add(1).ok_or(FreezerError::ArithmeticOverflow)
            }
            None => Ok(0),
        }
    }

    /// Raw `referral_history` entries, for migrations that decode older layouts.
    pub(crate) fn iter_raw_referral_history(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, FreezerError> {
        let mut out = Vec::new();
        for item in self.referral_history.iter() {
            let (key, value) = item.map_err(storage_err)?;
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    /// Swap whole-history entries for per-record keys and stamp `version`,
    /// in one transaction.
    pub(crate) fn rewrite_referral_history(
        &self,
        removed: &[Vec<u8>],
        records: &[(AccountId, u64, ReferralRecord)],
        version: u32,
    ) -> Result<(), FreezerError> {
        let mut inserts: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(records.len());
        for (id, seq, record) in records {
            inserts.push((referral_key(id, *seq), encode(record)?));
        }
        let res: TransactionResult<(), ()> = (&self.referral_history, &self.meta)
            .transaction(|(history_tx, meta_tx)| {
                for key in removed {
                    history_tx.remove(key.clone())?;
                }
                for (key, value) in &inserts {
                    history_tx.insert(key.clone(), value.clone())?;
                }
                meta_tx.insert(SCHEMA_VERSION_KEY.as_bytes(), version.to_be_bytes().to_vec())?;
                Ok(())
            });
        res.map_err(|e| FreezerError::Storage(format!("{e:?}")))
    }

    #[cfg(test)]
    pub(crate) fn put_raw_referral_history(&self, key: &[u8], bytes: &[u8]) -> Result<(), FreezerError> {
        self.referral_history.insert(key, bytes).map_err(storage_err)?;
        Ok(())
    }

    // ── Ledger state / meta ───────────────────────────────────────────────────

    pub fn get_ledger_state(&self) -> Result<Option<LedgerState>, FreezerError> {
        match self.get_meta(LEDGER_STATE_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn schema_version(&self) -> Result<Option<u32>, FreezerError> {
        match self.get_meta(SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| FreezerError::Storage("malformed schema version".into()))?;
                Ok(Some(u32::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), FreezerError> {
        self.meta.insert(key.as_bytes(), value).map_err(storage_err)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, FreezerError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage_err)
    }

    /// True if nothing ledger-related has ever been written.
    pub fn is_fresh(&self) -> Result<bool, FreezerError> {
        Ok(self.participants.is_empty()
            && self.referral_rewards.is_empty()
            && self.referral_history.is_empty()
            && self.get_meta(LEDGER_STATE_KEY)?.is_none())
    }

    // ── Usernames ─────────────────────────────────────────────────────────────

    pub fn get_username(&self, id: &AccountId) -> Result<Option<String>, FreezerError> {
        match self.usernames.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| FreezerError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn get_username_owner(&self, name: &str) -> Result<Option<AccountId>, FreezerError> {
        match self.username_owners.get(name.as_bytes()).map_err(storage_err)? {
            Some(bytes) => AccountId::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| FreezerError::Storage("malformed username owner".into())),
            None => Ok(None),
        }
    }

    /// Write both directions of a username binding in one transaction.
    pub fn put_username(&self, id: &AccountId, name: &str) -> Result<(), FreezerError> {
        let res: TransactionResult<(), ()> = (&self.usernames, &self.username_owners)
            .transaction(|(usernames, owners)| {
                usernames.insert(id.as_bytes().to_vec(), name.as_bytes().to_vec())?;
                owners.insert(name.as_bytes().to_vec(), id.as_bytes().to_vec())?;
                Ok(())
            });
        res.map_err(|e| FreezerError::Storage(format!("{e:?}")))
    }

    // ── Commit ────────────────────────────────────────────────────────────────

    /// Apply a changeset atomically across all ledger trees.
    pub fn commit(&self, changes: &Changeset) -> Result<(), FreezerError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut participants: Writes = Vec::with_capacity(changes.participants.len());
        for (id, p) in &changes.participants {
            let value = if p.is_empty() { None } else { Some(encode(p)?) };
            participants.push((id.as_bytes().to_vec(), value));
        }

        let mut rewards: Writes = Vec::with_capacity(changes.referral_rewards.len());
        for (id, amount) in &changes.referral_rewards {
            let value = if *amount == 0 { None } else { Some(encode(amount)?) };
            rewards.push((id.as_bytes().to_vec(), value));
        }

        let mut histories: Writes = Vec::with_capacity(changes.referral_records.len());
        for (id, seq, record) in &changes.referral_records {
            let value = match record {
                Some(r) => Some(encode(r)?),
                None => None,
            };
            histories.push((referral_key(id, *seq), value));
        }

        let mut meta: Writes = Vec::new();
        if let Some(state) = &changes.ledger_state {
            meta.push((LEDGER_STATE_KEY.as_bytes().to_vec(), Some(encode(state)?)));
        }
        if let Some(version) = changes.schema_version {
            meta.push((SCHEMA_VERSION_KEY.as_bytes().to_vec(), Some(version.to_be_bytes().to_vec())));
        }

        let res: TransactionResult<(), ()> = (
            &self.participants,
            &self.referral_rewards,
            &self.referral_history,
            &self.meta,
        )
            .transaction(|(participants_tx, rewards_tx, history_tx, meta_tx)| {
                for (tree, writes) in [
                    (participants_tx, &participants),
                    (rewards_tx, &rewards),
                    (history_tx, &histories),
                    (meta_tx, &meta),
                ] {
                    for (key, value) in writes {
                        match value {
                            Some(v) => {
                                tree.insert(key.clone(), v.clone())?;
                            }
                            None => {
                                tree.remove(key.clone())?;
                            }
                        }
                    }
                }
                Ok(())
            });
        res.map_err(|e| FreezerError::Storage(format!("{e:?}")))
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), FreezerError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freezer_core::types::tokens;

    fn temp_db(name: &str) -> FreezerDb {
        let dir = std::env::temp_dir().join(format!("freezer_db_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        FreezerDb::open(&dir).expect("open temp db")
    }

    fn id(b: u8) -> AccountId {
        AccountId::from_bytes([b; 32])
    }

    #[test]
    fn missing_participant_reads_as_zero() {
        let db = temp_db("missing");
        assert_eq!(db.get_participant(&id(1)).unwrap(), Participant::default());
        assert_eq!(db.get_referral_rewards(&id(1)).unwrap(), 0);
        assert!(db.get_referral_history(&id(1)).unwrap().is_empty());
        assert!(db.is_fresh().unwrap());
    }

    #[test]
    fn commit_writes_all_trees_together() {
        let db = temp_db("commit");
        let p = Participant {
            deposited: tokens(1),
            start_time: 10,
            reward_mask: 0,
            level: 0,
            last_accrual: 10,
        };
        let record = ReferralRecord {
            depositor: id(1),
            reward: 10,
            deposit_amount: 1_000,
            referred_at: 10,
        };
        let mut state = LedgerState::new(id(9));
        state.total_locked = tokens(1);

        db.commit(&Changeset {
            participants: vec![(id(1), p.clone())],
            referral_rewards: vec![(id(2), 10)],
            referral_records: vec![(id(2), 0, Some(record.clone()))],
            ledger_state: Some(state.clone()),
            schema_version: Some(2),
        })
        .unwrap();

        assert_eq!(db.get_participant(&id(1)).unwrap(), p);
        assert_eq!(db.get_referral_rewards(&id(2)).unwrap(), 10);
        assert_eq!(db.get_referral_history(&id(2)).unwrap(), vec![record]);
        assert_eq!(db.get_ledger_state().unwrap(), Some(state));
        assert_eq!(db.schema_version().unwrap(), Some(2));
        assert_eq!(db.participant_count(), 1);
    }

    #[test]
    fn zero_records_are_removed() {
        let db = temp_db("remove");
        let p = Participant { deposited: 5, start_time: 1, reward_mask: 0, level: 0, last_accrual: 1 };
        db.commit(&Changeset {
            participants: vec![(id(1), p)],
            referral_rewards: vec![(id(1), 7)],
            ..Default::default()
        })
        .unwrap();
        db.commit(&Changeset {
            participants: vec![(id(1), Participant::default())],
            referral_rewards: vec![(id(1), 0)],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(db.participant_count(), 0);
        assert_eq!(db.get_referral_rewards(&id(1)).unwrap(), 0);
    }

    #[test]
    fn referral_records_are_keyed_per_entry() {
        let db = temp_db("referral_keys");
        let record = |depositor: u8, reward: Balance| ReferralRecord {
            depositor: id(depositor),
            reward,
            deposit_amount: reward * 100,
            referred_at: 10,
        };
        assert_eq!(db.next_referral_seq(&id(2)).unwrap(), 0);

        db.commit(&Changeset {
            referral_records: vec![(id(2), 0, Some(record(1, 10))), (id(3), 0, Some(record(9, 1)))],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(db.next_referral_seq(&id(2)).unwrap(), 1);
        db.commit(&Changeset {
            referral_records: vec![(id(2), 1, Some(record(4, 20)))],
            ..Default::default()
        })
        .unwrap();

        // Prefix scan returns only this referrer's records, in order.
        assert_eq!(db.get_referral_history(&id(2)).unwrap(), vec![record(1, 10), record(4, 20)]);
        assert_eq!(db.get_referral_history(&id(3)).unwrap(), vec![record(9, 1)]);
        assert_eq!(db.next_referral_seq(&id(2)).unwrap(), 2);

        db.commit(&Changeset {
            referral_records: vec![(id(2), 1, None)],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(db.get_referral_history(&id(2)).unwrap(), vec![record(1, 10)]);
        assert_eq!(db.next_referral_seq(&id(2)).unwrap(), 1);
    }

    #[test]
    fn username_binding_both_directions() {
        let db = temp_db("usernames");
        db.put_username(&id(3), "Aa").unwrap();
        assert_eq!(db.get_username(&id(3)).unwrap().as_deref(), Some("Aa"));
        assert_eq!(db.get_username_owner("Aa").unwrap(), Some(id(3)));
        assert_eq!(db.get_username_owner("Bb").unwrap(), None);
    }
}
