use std::sync::Arc;

use freezer_core::call::{CallOutcome, LedgerCall, LevelUpOutcome};
use freezer_core::error::FreezerError;
use freezer_core::params::FreezerParams;
use freezer_core::participant::{LedgerState, Participant, ReferralRecord};
use freezer_core::types::{AccountId, Balance, Timestamp};
use freezer_state::{Changeset, FreezerDb};
use tracing::{info, warn};

use crate::custody::TokenCustody;
use crate::guard::{self, ReentrancyGuard};
use crate::{accrual, leveling, referral};

// ── Staged mutations ──────────────────────────────────────────────────────────

/// Writes staged by one operation, paired with the pre-images needed to put
/// the store back if the token interaction that follows the commit fails.
#[derive(Default)]
struct StagedMutations {
    changes: Changeset,
    undo: Changeset,
}

impl StagedMutations {
    fn participant(&mut self, id: AccountId, before: Participant, after: Participant) {
        self.undo.participants.push((id, before));
        self.changes.participants.push((id, after));
    }

    fn referral_rewards(&mut self, id: AccountId, before: Balance, after: Balance) {
        self.undo.referral_rewards.push((id, before));
        self.changes.referral_rewards.push((id, after));
    }

    fn append_referral(&mut self, id: AccountId, seq: u64, record: ReferralRecord) {
        self.undo.referral_records.push((id, seq, None));
        self.changes.referral_records.push((id, seq, Some(record)));
    }

    fn ledger_state(&mut self, before: LedgerState, after: LedgerState) {
        self.undo.ledger_state = Some(before);
        self.changes.ledger_state = Some(after);
    }
}

fn add(a: Balance, b: Balance) -> Result<Balance, FreezerError> {
    a.checked_add(b).ok_or(FreezerError::ArithmeticOverflow)
}

fn sub(a: Balance, b: Balance) -> Result<Balance, FreezerError> {
    a.checked_sub(b).ok_or(FreezerError::ArithmeticOverflow)
}

// ── FreezerEngine ─────────────────────────────────────────────────────────────

/// The ledger state machine.
///
/// Every mutating operation runs under the non-reentrancy guard, stages its
/// writes, commits them atomically and only then talks to token custody. A
/// failed custody call re-commits the staged pre-images, so an operation
/// either fully happens or leaves no trace.
///
/// Calls are expected to be serialized by the caller; a concurrent call is
/// rejected with `Reentrant` rather than queued.
pub struct FreezerEngine<C> {
    pub db: Arc<FreezerDb>,
    custody: C,
    params: FreezerParams,
    guard: ReentrancyGuard,
}

impl<C: TokenCustody> FreezerEngine<C> {
    /// Open the ledger over `db`. `owner` is only used when the store has no
    /// ledger state yet; an existing owner is kept.
    pub fn new(
        db: Arc<FreezerDb>,
        custody: C,
        params: FreezerParams,
        owner: AccountId,
    ) -> Result<Self, FreezerError> {
        params.validate()?;
        match db.get_ledger_state()? {
            Some(state) => {
                if state.owner != owner {
                    warn!(stored = %state.owner, requested = %owner, "keeping stored ledger owner");
                }
            }
            None => {
                db.commit(&Changeset {
                    ledger_state: Some(LedgerState::new(owner)),
                    ..Default::default()
                })?;
                info!(owner = %owner, "ledger state initialised");
            }
        }
        Ok(Self {
            db,
            custody,
            params,
            guard: ReentrancyGuard::default(),
        })
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn params(&self) -> &FreezerParams {
        &self.params
    }

    fn state(&self) -> Result<LedgerState, FreezerError> {
        self.db
            .get_ledger_state()?
            .ok_or_else(|| FreezerError::Storage("ledger state missing".into()))
    }

    /// Commit, then run the custody interaction; revert the commit if it fails.
    fn execute<F>(&self, staged: StagedMutations, interact: F) -> Result<(), FreezerError>
    where
        F: FnOnce(&C) -> Result<(), FreezerError>,
    {
        self.db.commit(&staged.changes)?;
        if let Err(e) = interact(&self.custody) {
            warn!(error = %e, "token custody call failed; reverting ledger writes");
            self.db.commit(&staged.undo)?;
            return Err(e);
        }
        Ok(())
    }

    /// Dispatch a `LedgerCall` made by `caller`.
    pub fn apply(
        &self,
        caller: &AccountId,
        call: &LedgerCall,
        now: Timestamp,
    ) -> Result<CallOutcome, FreezerError> {
        let outcome = match call {
            LedgerCall::Freeze { beneficiary, amount, referral } => {
                self.freeze(caller, beneficiary, *amount, referral.as_ref(), now)?
            }
            LedgerCall::Unfreeze => self.unfreeze(caller, now)?,
            LedgerCall::Compound => self.compound(caller, now)?,
            LedgerCall::TriggerLevelUp => CallOutcome::LevelUp(self.trigger_level_up(caller, now)?),
            LedgerCall::ClaimReferralRewards => self.claim_referral_rewards(caller)?,
            LedgerCall::ToggleContractActive => self.toggle_contract_active(caller)?,
            LedgerCall::WithdrawStrayBalance => self.withdraw_stray_balance(caller)?,
            LedgerCall::TransferOwnership { new_owner } => self.transfer_ownership(caller, new_owner)?,
        };
        info!(caller = %caller, call = call.name(), "applied ledger call");
        Ok(outcome)
    }

    // ── Participant operations ────────────────────────────────────────────────

    /// Lock `amount` for `beneficiary`, paid from `caller`'s allowance.
    pub fn freeze(
        &self,
        caller: &AccountId,
        beneficiary: &AccountId,
        amount: Balance,
        referral: Option<&AccountId>,
        now: Timestamp,
    ) -> Result<CallOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        let state_before = self.state()?;
        guard::ensure_active(&state_before)?;
        if amount == 0 {
            return Err(FreezerError::InvalidAmount);
        }
        let referral = referral.filter(|r| !r.is_zero());
        if referral == Some(beneficiary) {
            return Err(FreezerError::SelfReferral);
        }
        let allowance = self.custody.allowance(caller);
        if allowance < amount {
            return Err(FreezerError::InsufficientAllowance { need: amount, have: allowance });
        }

        let before = self.db.get_participant(beneficiary)?;
        let mut p = before.clone();
        let settled = accrual::settle(&mut p, &self.params, now)?;
        if !p.is_active() {
            p.start_time = now;
            p.last_accrual = now;
        }
        p.deposited = add(p.deposited, amount)?;

        let mut state = state_before.clone();
        state.total_locked = add(state.total_locked, add(settled, amount)?)?;
        state.total_reward_mask = add(state.total_reward_mask, settled)?;

        let mut staged = StagedMutations::default();
        let deposited = p.deposited;
        staged.participant(*beneficiary, before, p);

        let mut referral_reward = None;
        if let Some(referrer) = referral {
            let referrer_position = self.db.get_participant(referrer)?;
            let record = referral::referral_credit(&referrer_position, &self.params, *beneficiary, amount, now)?;
            let rewards_before = self.db.get_referral_rewards(referrer)?;
            let seq = self.db.next_referral_seq(referrer)?;
            referral_reward = Some(record.reward);
            staged.referral_rewards(*referrer, rewards_before, add(rewards_before, record.reward)?);
            staged.append_referral(*referrer, seq, record);
        }
        staged.ledger_state(state_before, state);

        self.execute(staged, |custody| custody.transfer_in(caller, amount))?;
        info!(
            beneficiary = %beneficiary,
            amount,
            settled,
            referral = ?referral,
            "freeze"
        );
        Ok(CallOutcome::Frozen {
            deposited,
            settled_reward: settled,
            referral_reward,
        })
    }

    /// Withdraw a matured position: reward minted into custody, then principal
/// and reward transferred out together.
    pub fn unfreeze(&self, caller: &AccountId, now: Timestamp) -> Result<CallOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        let state_before = self.state()?;
        guard::ensure_active(&state_before)?;

        let before = self.db.get_participant(caller)?;
        let Some(unlock_at) = before.unlock_at(self.params.lock_duration_secs) else {
            return Err(FreezerError::NoDeposit);
        };
        if now < unlock_at {
            return Err(FreezerError::LockNotMatured { unlock_at });
        }

        let mut p = before.clone();
        let settled = accrual::settle(&mut p, &self.params, now)?;
        let principal = p.principal();
        let reward = p.reward_mask;

        let held = self.custody.balance_of(&self.custody.custody_account());
        if held < principal {
            return Err(FreezerError::InsufficientBalance { need: principal, have: held });
        }

        let mut state = state_before.clone();
        state.total_locked = sub(add(state.total_locked, settled)?, p.deposited)?;
        state.total_reward_mask = sub(add(state.total_reward_mask, settled)?, reward)?;

        let mut staged = StagedMutations::default();
        staged.participant(*caller, before, Participant::default());
        staged.ledger_state(state_before, state);

        // Single payout transfer; reward minted into custody first.
        self.execute(staged, |custody| {
            if reward > 0 {
                custody.mint_reward(&custody.custody_account(), reward)?;
            }
            custody.transfer_out(caller, add(principal, reward)?)
        })?;
        info!(participant = %caller, principal, reward, "unfreeze");
        Ok(CallOutcome::Unfrozen { principal, reward })
    }

    /// Settle accrued reward into the position without touching the lock.
    pub fn compound(&self, caller: &AccountId, now: Timestamp) -> Result<CallOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        let state_before = self.state()?;
        guard::ensure_active(&state_before)?;

        let before = self.db.get_participant(caller)?;
        let mut p = before.clone();
        let reward = accrual::settle(&mut p, &self.params, now)?;
        if p == before {
            return Ok(CallOutcome::Compounded { reward: 0 });
        }

        let mut state = state_before.clone();
        state.total_locked = add(state.total_locked, reward)?;
        state.total_reward_mask = add(state.total_reward_mask, reward)?;

        let mut staged = StagedMutations::default();
        staged.participant(*caller, before, p);
        staged.ledger_state(state_before, state);
        self.execute(staged, |_| Ok(()))?;
        info!(participant = %caller, reward, "compound");
        Ok(CallOutcome::Compounded { reward })
    }

    /// Raise the caller one level if their balance passes the next threshold.
    /// Leaves all state untouched otherwise.
    pub fn trigger_level_up(&self, caller: &AccountId, now: Timestamp) -> Result<LevelUpOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        let state_before = self.state()?;
        guard::ensure_active(&state_before)?;

        let before = self.db.get_participant(caller)?;
        if !leveling::can_increase_level(&before, &self.params, now)? {
            return Ok(LevelUpOutcome::Unchanged);
        }

        let mut p = before.clone();
        let settled = accrual::settle(&mut p, &self.params, now)?;
        let folded = leveling::advance(&mut p, now)?;
        let level = p.level;

        let mut state = state_before.clone();
        state.total_locked = add(state.total_locked, settled)?;
        state.total_reward_mask = sub(add(state.total_reward_mask, settled)?, folded)?;

        let mut staged = StagedMutations::default();
        staged.participant(*caller, before, p);
        staged.ledger_state(state_before, state);

        // The folded reward becomes principal, so custody must now hold it.
        self.execute(staged, |custody| {
            if folded > 0 {
                custody.mint_reward(&custody.custody_account(), folded)?;
            }
            Ok(())
        })?;
        info!(participant = %caller, level, folded, "level up");
        Ok(LevelUpOutcome::Advanced { level, folded_reward: folded })
    }

    /// Mint the caller's accumulated referral rewards to them.
    pub fn claim_referral_rewards(&self, caller: &AccountId) -> Result<CallOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        guard::ensure_active(&self.state()?)?;

        let amount = self.db.get_referral_rewards(caller)?;
        if amount == 0 {
            return Ok(CallOutcome::ReferralRewardsClaimed { amount: 0 });
        }
        let mut staged = StagedMutations::default();
        staged.referral_rewards(*caller, amount, 0);
        self.execute(staged, |custody| custody.mint_reward(caller, amount))?;
        info!(referrer = %caller, amount, "referral rewards claimed");
        Ok(CallOutcome::ReferralRewardsClaimed { amount })
    }

    // ── Owner operations ──────────────────────────────────────────────────────

    pub fn toggle_contract_active(&self, caller: &AccountId) -> Result<CallOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        let state_before = self.state()?;
        guard::ensure_owner(&state_before, caller)?;

        let mut state = state_before.clone();
        state.active = !state.active;
        let active = state.active;
        let mut staged = StagedMutations::default();
        staged.ledger_state(state_before, state);
        self.execute(staged, |_| Ok(()))?;
        if active {
            info!("ledger resumed");
        } else {
            warn!("ledger paused");
        }
        Ok(CallOutcome::ActiveToggled { active })
    }

    /// Send custody holdings beyond the backed principal to the owner.
    pub fn withdraw_stray_balance(&self, caller: &AccountId) -> Result<CallOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        let state = self.state()?;
        guard::ensure_owner(&state, caller)?;

        let held = self.custody.balance_of(&self.custody.custody_account());
        let amount = held.saturating_sub(state.backed_principal());
        if amount > 0 {
            self.custody.transfer_out(caller, amount)?;
            info!(owner = %caller, amount, "stray balance withdrawn");
        }
        Ok(CallOutcome::StrayBalanceWithdrawn { amount })
    }

    pub fn transfer_ownership(
        &self,
        caller: &AccountId,
        new_owner: &AccountId,
    ) -> Result<CallOutcome, FreezerError> {
        let _entered = self.guard.enter()?;
        let state_before = self.state()?;
        guard::ensure_owner(&state_before, caller)?;
        if new_owner.is_zero() {
            return Err(FreezerError::InvalidParams("new owner must not be the zero account".into()));
        }

        let mut state = state_before.clone();
        state.owner = *new_owner;
        let mut staged = StagedMutations::default();
        staged.ledger_state(state_before, state);
        self.execute(staged, |_| Ok(()))?;
        info!(from = %caller, to = %new_owner, "ownership transferred");
        Ok(CallOutcome::OwnershipTransferred { new_owner: *new_owner })
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    pub fn participant_data(&self, id: &AccountId) -> Result<Participant, FreezerError> {
        self.db.get_participant(id)
    }

    pub fn total_locked(&self) -> Result<Balance, FreezerError> {
        Ok(self.state()?.total_locked)
    }

    pub fn referral_rewards(&self, id: &AccountId) -> Result<Balance, FreezerError> {
        self.db.get_referral_rewards(id)
    }

    pub fn referral_history(&self, id: &AccountId) -> Result<Vec<ReferralRecord>, FreezerError> {
        self.db.get_referral_history(id)
    }

    pub fn can_increase_level(&self, id: &AccountId, now: Timestamp) -> Result<bool, FreezerError> {
        leveling::can_increase_level(&self.db.get_participant(id)?, &self.params, now)
    }

    pub fn referral_percentage(&self, id: &AccountId) -> Result<u128, FreezerError> {
        Ok(referral::referral_percentage(&self.db.get_participant(id)?, &self.params))
    }

    pub fn pending_reward(&self, id: &AccountId, now: Timestamp) -> Result<Balance, FreezerError> {
        accrual::pending_reward(&self.db.get_participant(id)?, &self.params, now)
    }

    pub fn unlock_at(&self, id: &AccountId) -> Result<Option<Timestamp>, FreezerError> {
        Ok(self.db.get_participant(id)?.unlock_at(self.params.lock_duration_secs))
    }

    pub fn ledger_state(&self) -> Result<LedgerState, FreezerError> {
        self.state()
    }

    pub fn is_active(&self) -> Result<bool, FreezerError> {
        Ok(self.state()?.active)
    }

    pub fn owner(&self) -> Result<AccountId, FreezerError> {
        Ok(self.state()?.owner)
    }

    pub fn participant_count(&self) -> usize {
        self.db.participant_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{MemoryCustody, MemoryToken};
    use freezer_core::types::tokens;
    use freezer_crypto::account_id_from_seed;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, OnceLock, Weak};

    const NOW: Timestamp = 1_700_000_000;
    const LOCK: i64 = freezer_core::constants::DEFAULT_LOCK_DURATION_SECS;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn temp_db(name: &str) -> FreezerDb {
        let dir = std::env::temp_dir().join(format!("freezer_engine_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        FreezerDb::open(&dir).expect("open temp db")
    }

    fn acct(name: &str) -> AccountId {
        account_id_from_seed(name.as_bytes())
    }

    struct Fixture {
        engine: FreezerEngine<MemoryCustody>,
        token: Arc<MemoryToken>,
        owner: AccountId,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let token = Arc::new(MemoryToken::new());
            let custody_id = acct("custody");
            token.grant_minter(&custody_id);
            let owner = acct("owner");
            let engine = FreezerEngine::new(
                Arc::new(temp_db(name)),
                MemoryCustody::new(Arc::clone(&token), custody_id),
                FreezerParams::default(),
                owner,
            )
            .unwrap();
            Self { engine, token, owner }
        }

        /// Give `who` `amount` tokens and approve all of them to custody.
        fn fund(&self, who: &AccountId, amount: Balance) {
            self.token.credit(who, amount).unwrap();
            let custody = self.engine.custody().custody_account();
            let current = self.token.allowance(who, &custody);
            self.token.approve(who, &custody, current + amount);
        }

        fn freeze(&self, who: &AccountId, amount: Balance, referral: Option<&AccountId>, now: Timestamp) -> CallOutcome {
            self.engine.freeze(who, who, amount, referral, now).unwrap()
        }

        fn custody_balance(&self) -> Balance {
            self.token.balance_of(&self.engine.custody().custody_account())
        }
    }

    // ── Freeze ────────────────────────────────────────────────────────────────

    #[test]
    fn first_freeze_opens_position() {
        let f = Fixture::new("freeze_first");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        f.freeze(&alice, tokens(1), None, NOW);

        let p = f.engine.participant_data(&alice).unwrap();
        assert_eq!(p.deposited, tokens(1));
        assert_eq!(p.start_time, NOW);
        assert_eq!(p.last_accrual, NOW);
        assert_eq!(p.reward_mask, 0);
        assert_eq!(p.level, 0);
        assert_eq!(f.engine.total_locked().unwrap(), tokens(1));
        assert_eq!(f.custody_balance(), tokens(1));
        assert_eq!(f.token.balance_of(&alice), 0);
    }

    #[test]
    fn second_freeze_compounds_before_adding() {
        let f = Fixture::new("freeze_twice");
        let alice = acct("alice");
        f.fund(&alice, tokens(2));
        f.freeze(&alice, tokens(1), None, NOW);
        let outcome = f.freeze(&alice, tokens(1), None, NOW + 2);

        let p = f.engine.participant_data(&alice).unwrap();
        assert_eq!(p.deposited, 2_000_000_062_243_800_000);
        assert_eq!(p.reward_mask, 62_243_800_000);
        assert_eq!(p.start_time, NOW);
        assert_eq!(p.last_accrual, NOW + 2);
        assert_eq!(
            outcome,
            CallOutcome::Frozen {
                deposited: 2_000_000_062_243_800_000,
                settled_reward: 62_243_800_000,
                referral_reward: None,
            }
        );
        let state = f.engine.ledger_state().unwrap();
        assert_eq!(state.total_locked, p.deposited);
        assert_eq!(state.total_reward_mask, p.reward_mask);
        assert_eq!(f.custody_balance(), tokens(2));
    }

    #[test]
    fn freeze_for_another_beneficiary() {
        let f = Fixture::new("freeze_gift");
        let (payer, friend) = (acct("payer"), acct("friend"));
        f.fund(&payer, tokens(3));
        f.engine.freeze(&payer, &friend, tokens(3), None, NOW).unwrap();
        assert_eq!(f.engine.participant_data(&friend).unwrap().deposited, tokens(3));
        assert!(f.engine.participant_data(&payer).unwrap().is_empty());
        assert_eq!(f.token.balance_of(&payer), 0);
    }

    #[test]
    fn freeze_zero_rejected() {
        let f = Fixture::new("freeze_zero");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        assert!(matches!(
            f.engine.freeze(&alice, &alice, 0, None, NOW).unwrap_err(),
            FreezerError::InvalidAmount
        ));
    }

    #[test]
    fn freeze_without_allowance_rejected() {
        let f = Fixture::new("freeze_allowance");
        let alice = acct("alice");
        f.token.credit(&alice, tokens(5)).unwrap();
        assert!(matches!(
            f.engine.freeze(&alice, &alice, tokens(1), None, NOW).unwrap_err(),
            FreezerError::InsufficientAllowance { .. }
        ));
        assert!(f.engine.participant_data(&alice).unwrap().is_empty());
        assert_eq!(f.engine.total_locked().unwrap(), 0);
    }

    #[test]
    fn self_referral_rejected() {
        let f = Fixture::new("freeze_self_ref");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        assert!(matches!(
            f.engine.freeze(&alice, &alice, tokens(1), Some(&alice), NOW).unwrap_err(),
            FreezerError::SelfReferral
        ));
    }

    #[test]
    fn zero_referral_means_none() {
        let f = Fixture::new("freeze_zero_ref");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        let outcome = f.freeze(&alice, tokens(1), Some(&AccountId::ZERO), NOW);
        assert!(matches!(outcome, CallOutcome::Frozen { referral_reward: None, .. }));
        assert_eq!(f.engine.referral_rewards(&AccountId::ZERO).unwrap(), 0);
    }

    #[test]
    fn failed_transfer_leaves_no_trace() {
        let f = Fixture::new("freeze_rollback");
        let (alice, bob) = (acct("alice"), acct("bob"));
        // Approved but never funded: the pull fails after the commit.
        let custody = f.engine.custody().custody_account();
        f.token.approve(&alice, &custody, tokens(1));

        assert!(matches!(
            f.engine.freeze(&alice, &alice, tokens(1), Some(&bob), NOW).unwrap_err(),
            FreezerError::InsufficientBalance { .. }
        ));
        assert!(f.engine.participant_data(&alice).unwrap().is_empty());
        assert_eq!(f.engine.referral_rewards(&bob).unwrap(), 0);
        assert!(f.engine.referral_history(&bob).unwrap().is_empty());
        assert_eq!(f.engine.ledger_state().unwrap(), LedgerState::new(f.owner));
    }

    // ── Referrals ─────────────────────────────────────────────────────────────

    #[test]
    fn referral_without_deposit_earns_one_percent() {
        let f = Fixture::new("ref_base");
        let (alice, bob) = (acct("alice"), acct("bob"));
        f.fund(&alice, tokens(1));
        f.freeze(&alice, tokens(1), Some(&bob), NOW);

        assert_eq!(f.engine.referral_rewards(&bob).unwrap(), tokens(1) / 100);
        let history = f.engine.referral_history(&bob).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].depositor, alice);
        assert_eq!(history[0].deposit_amount, tokens(1));
        assert_eq!(history[0].reward, tokens(1) / 100);
        assert_eq!(history[0].referred_at, NOW);
    }

    #[test]
    fn referral_percentage_tracks_referrer_balance() {
        let cases = [(11u128, 2u128), (101, 5), (1_001, 7), (10_001, 10)];
        for (whole, pct) in cases {
            let f = Fixture::new(&format!("ref_tier_{whole}"));
            let (alice, bob) = (acct("alice"), acct("bob"));
            f.fund(&bob, tokens(whole));
            f.freeze(&bob, tokens(whole), None, NOW);
            assert_eq!(f.engine.referral_percentage(&bob).unwrap(), pct);

            f.fund(&alice, tokens(1));
            f.freeze(&alice, tokens(1), Some(&bob), NOW + 10);
            assert_eq!(
                f.engine.referral_rewards(&bob).unwrap(),
                tokens(1) * pct / 100,
                "referrer with {whole} tokens"
            );
        }
    }

    #[test]
    fn referral_history_appends_in_order() {
        let f = Fixture::new("ref_history");
        let (alice, carol, bob) = (acct("alice"), acct("carol"), acct("bob"));
        f.fund(&alice, tokens(2));
        f.fund(&carol, tokens(4));
        f.freeze(&alice, tokens(2), Some(&bob), NOW);
        f.freeze(&carol, tokens(4), Some(&bob), NOW + 5);

        let history = f.engine.referral_history(&bob).unwrap();
        assert_eq!(history.iter().map(|r| r.depositor).collect::<Vec<_>>(), vec![alice, carol]);
        assert_eq!(f.engine.referral_rewards(&bob).unwrap(), tokens(6) / 100);
    }

    #[test]
    fn claim_referral_rewards_mints_and_resets() {
        let f = Fixture::new("ref_claim");
        let (alice, bob) = (acct("alice"), acct("bob"));
        f.fund(&alice, tokens(10));
        f.freeze(&alice, tokens(10), Some(&bob), NOW);

        let outcome = f.engine.claim_referral_rewards(&bob).unwrap();
        assert_eq!(outcome, CallOutcome::ReferralRewardsClaimed { amount: tokens(1) / 10 });
        assert_eq!(f.token.balance_of(&bob), tokens(1) / 10);
        assert_eq!(f.engine.referral_rewards(&bob).unwrap(), 0);
        // History is an audit log and survives the claim.
        assert_eq!(f.engine.referral_history(&bob).unwrap().len(), 1);

        // A second claim pays nothing and does not fail.
        assert_eq!(
            f.engine.claim_referral_rewards(&bob).unwrap(),
            CallOutcome::ReferralRewardsClaimed { amount: 0 }
        );
    }

    #[test]
    fn claim_without_mint_capability_keeps_balance() {
        let f = Fixture::new("ref_claim_no_mint");
        let (alice, bob) = (acct("alice"), acct("bob"));
        f.fund(&alice, tokens(10));
        f.freeze(&alice, tokens(10), Some(&bob), NOW);
        f.token.revoke_minter(&f.engine.custody().custody_account());

        assert_eq!(
            f.engine.claim_referral_rewards(&bob).unwrap_err(),
            FreezerError::MissingMintCapability
        );
        assert_eq!(f.engine.referral_rewards(&bob).unwrap(), tokens(1) / 10);
    }

    // ── Unfreeze ──────────────────────────────────────────────────────────────

    #[test]
    fn unfreeze_before_maturity_rejected() {
        let f = Fixture::new("unfreeze_early");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        f.freeze(&alice, tokens(1), None, NOW);
        assert_eq!(
            f.engine.unfreeze(&alice, NOW + LOCK - 1).unwrap_err(),
            FreezerError::LockNotMatured { unlock_at: NOW + LOCK }
        );
    }

    #[test]
    fn unfreeze_without_deposit_rejected() {
        let f = Fixture::new("unfreeze_none");
        assert_eq!(
            f.engine.unfreeze(&acct("nobody"), NOW).unwrap_err(),
            FreezerError::NoDeposit
        );
    }

    #[test]
    fn unfreeze_pays_principal_and_reward() {
        let f = Fixture::new("unfreeze_ok");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        f.freeze(&alice, tokens(1), None, NOW);

        let outcome = f.engine.unfreeze(&alice, NOW + LOCK).unwrap();
        let reward = 31_121_900_000u128 * LOCK as u128;
        assert_eq!(outcome, CallOutcome::Unfrozen { principal: tokens(1), reward });
        assert_eq!(f.token.balance_of(&alice), tokens(1) + reward);
        assert!(f.engine.participant_data(&alice).unwrap().is_empty());
        let state = f.engine.ledger_state().unwrap();
        assert_eq!(state.total_locked, 0);
        assert_eq!(state.total_reward_mask, 0);
        assert_eq!(f.custody_balance(), 0);
    }

    #[test]
    fn unfreeze_without_mint_capability_rolls_back() {
        let f = Fixture::new("unfreeze_rollback");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        f.freeze(&alice, tokens(1), None, NOW);
        f.token.revoke_minter(&f.engine.custody().custody_account());

        assert_eq!(
            f.engine.unfreeze(&alice, NOW + LOCK).unwrap_err(),
            FreezerError::MissingMintCapability
        );
        let p = f.engine.participant_data(&alice).unwrap();
        assert_eq!(p.deposited, tokens(1));
        assert_eq!(p.last_accrual, NOW);
        assert_eq!(f.engine.total_locked().unwrap(), tokens(1));
        assert_eq!(f.custody_balance(), tokens(1));
    }

    // ── Compound ──────────────────────────────────────────────────────────────

    #[test]
    fn compound_settles_without_restarting_lock() {
        let f = Fixture::new("compound");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        f.freeze(&alice, tokens(1), None, NOW);

        let outcome = f.engine.compound(&alice, NOW + 100).unwrap();
        let reward = 31_121_900_000u128 * 100;
        assert_eq!(outcome, CallOutcome::Compounded { reward });
        let p = f.engine.participant_data(&alice).unwrap();
        assert_eq!(p.deposited, tokens(1) + reward);
        assert_eq!(p.start_time, NOW);
        assert_eq!(f.engine.pending_reward(&alice, NOW + 100).unwrap(), 0);
        assert_eq!(f.engine.total_locked().unwrap(), p.deposited);
    }

    #[test]
    fn compound_without_position_is_noop() {
        let f = Fixture::new("compound_empty");
        assert_eq!(
            f.engine.compound(&acct("nobody"), NOW).unwrap(),
            CallOutcome::Compounded { reward: 0 }
        );
        assert_eq!(f.engine.participant_count(), 0);
    }

    // ── Level up ──────────────────────────────────────────────────────────────

    #[test]
    fn level_up_after_accrual_crosses_threshold() {
        let f = Fixture::new("level_up");
        let alice = acct("alice");
        let amount = tokens(10) - 1_000;
        f.fund(&alice, amount);
        f.freeze(&alice, amount, None, NOW);
        assert!(!f.engine.can_increase_level(&alice, NOW).unwrap());

        f.engine.compound(&alice, NOW + 3_600).unwrap();
        assert!(f.engine.can_increase_level(&alice, NOW + 3_600).unwrap());

        let outcome = f.engine.trigger_level_up(&alice, NOW + 3_600).unwrap();
        let p = f.engine.participant_data(&alice).unwrap();
        assert!(matches!(outcome, LevelUpOutcome::Advanced { level: 1, .. }));
        assert_eq!(p.level, 1);
        assert_eq!(p.start_time, NOW + 3_600);
        assert_eq!(p.reward_mask, 0);
        assert!(!f.engine.can_increase_level(&alice, NOW + 3_600).unwrap());

        // The folded reward was minted into custody and now backs principal.
        assert_eq!(f.custody_balance(), p.deposited);
        assert_eq!(f.engine.ledger_state().unwrap().total_reward_mask, 0);
    }

    #[test]
    fn level_up_below_threshold_changes_nothing() {
        let f = Fixture::new("level_up_noop");
        let alice = acct("alice");
        f.fund(&alice, tokens(5));
        f.freeze(&alice, tokens(5), None, NOW);
        let before = f.engine.participant_data(&alice).unwrap();
        assert_eq!(f.engine.trigger_level_up(&alice, NOW + 60).unwrap(), LevelUpOutcome::Unchanged);
        assert_eq!(f.engine.participant_data(&alice).unwrap(), before);
    }

    #[test]
    fn level_up_moves_one_tier_per_call() {
        let f = Fixture::new("level_up_step");
        let alice = acct("alice");
        f.fund(&alice, tokens(20_000));
        f.freeze(&alice, tokens(20_000), None, NOW);
        for expected in 1..=4u8 {
            let outcome = f.engine.trigger_level_up(&alice, NOW).unwrap();
            assert!(matches!(outcome, LevelUpOutcome::Advanced { level, .. } if level == expected));
        }
        assert_eq!(f.engine.trigger_level_up(&alice, NOW).unwrap(), LevelUpOutcome::Unchanged);
        assert_eq!(f.engine.participant_data(&alice).unwrap().level, 4);
    }

    #[test]
    fn freeze_never_raises_level() {
        let f = Fixture::new("freeze_no_level");
        let alice = acct("alice");
        f.fund(&alice, tokens(500));
        f.freeze(&alice, tokens(500), None, NOW);
        assert_eq!(f.engine.participant_data(&alice).unwrap().level, 0);
        assert_eq!(f.engine.referral_percentage(&alice).unwrap(), 5);
    }

    // ── Pause / owner ─────────────────────────────────────────────────────────

    #[test]
    fn paused_ledger_rejects_user_operations() {
        let f = Fixture::new("paused");
        let (alice, bob) = (acct("alice"), acct("bob"));
        f.fund(&alice, tokens(2));
        f.freeze(&alice, tokens(1), Some(&bob), NOW);

        assert_eq!(
            f.engine.toggle_contract_active(&f.owner).unwrap(),
            CallOutcome::ActiveToggled { active: false }
        );
        assert_eq!(f.engine.freeze(&alice, &alice, tokens(1), None, NOW).unwrap_err(), FreezerError::Paused);
        assert_eq!(f.engine.unfreeze(&alice, NOW + LOCK).unwrap_err(), FreezerError::Paused);
        assert_eq!(f.engine.compound(&alice, NOW + 1).unwrap_err(), FreezerError::Paused);
        assert_eq!(f.engine.trigger_level_up(&alice, NOW + 1).unwrap_err(), FreezerError::Paused);
        assert_eq!(f.engine.claim_referral_rewards(&bob).unwrap_err(), FreezerError::Paused);

        // Views keep working while paused.
        assert_eq!(f.engine.participant_data(&alice).unwrap().deposited, tokens(1));
        assert!(!f.engine.is_active().unwrap());

        f.engine.toggle_contract_active(&f.owner).unwrap();
        f.engine.compound(&alice, NOW + 1).unwrap();
    }

    #[test]
    fn only_owner_toggles() {
        let f = Fixture::new("toggle_auth");
        assert_eq!(
            f.engine.toggle_contract_active(&acct("mallory")).unwrap_err(),
            FreezerError::Unauthorized
        );
        assert!(f.engine.is_active().unwrap());
    }

    #[test]
    fn stray_balance_goes_to_owner() {
        let f = Fixture::new("stray");
        let alice = acct("alice");
        f.fund(&alice, tokens(3));
        f.freeze(&alice, tokens(3), None, NOW);
        // Someone sends tokens straight to custody.
        let custody = f.engine.custody().custody_account();
        f.token.credit(&custody, tokens(2)).unwrap();

        assert_eq!(
            f.engine.withdraw_stray_balance(&acct("mallory")).unwrap_err(),
            FreezerError::Unauthorized
        );
        assert_eq!(
            f.engine.withdraw_stray_balance(&f.owner).unwrap(),
            CallOutcome::StrayBalanceWithdrawn { amount: tokens(2) }
        );
        assert_eq!(f.token.balance_of(&f.owner), tokens(2));
        assert_eq!(f.custody_balance(), tokens(3));
    }

    #[test]
    fn ownership_transfer() {
        let f = Fixture::new("ownership");
        let heir = acct("heir");
        f.engine.transfer_ownership(&f.owner, &heir).unwrap();
        assert_eq!(f.engine.owner().unwrap(), heir);
        assert_eq!(f.engine.toggle_contract_active(&f.owner).unwrap_err(), FreezerError::Unauthorized);
        assert!(matches!(
            f.engine.transfer_ownership(&heir, &AccountId::ZERO).unwrap_err(),
            FreezerError::InvalidParams(_)
        ));
    }

    #[test]
    fn apply_dispatches_calls() {
        let f = Fixture::new("apply");
        let alice = acct("alice");
        f.fund(&alice, tokens(1));
        let call = LedgerCall::Freeze { beneficiary: alice, amount: tokens(1), referral: None };
        assert!(matches!(f.engine.apply(&alice, &call, NOW).unwrap(), CallOutcome::Frozen { .. }));
        assert!(matches!(
            f.engine.apply(&alice, &LedgerCall::TriggerLevelUp, NOW).unwrap(),
            CallOutcome::LevelUp(LevelUpOutcome::Unchanged)
        ));
        assert!(matches!(
            f.engine.apply(&alice, &LedgerCall::ToggleContractActive, NOW).unwrap_err(),
            FreezerError::Unauthorized
        ));
    }

    #[test]
    fn existing_owner_survives_reopen() {
        let dir = std::env::temp_dir().join("freezer_engine_test_reopen");
        let _ = std::fs::remove_dir_all(&dir);
        let token = Arc::new(MemoryToken::new());
        let custody = MemoryCustody::new(Arc::clone(&token), acct("custody"));
        {
            let db = Arc::new(FreezerDb::open(&dir).unwrap());
            FreezerEngine::new(db, custody.clone(), FreezerParams::default(), acct("first")).unwrap();
        }
        let db = Arc::new(FreezerDb::open(&dir).unwrap());
        let engine = FreezerEngine::new(db, custody, FreezerParams::default(), acct("second")).unwrap();
        assert_eq!(engine.owner().unwrap(), acct("first"));
    }

    #[test]
    fn totals_track_every_position() {
        let f = Fixture::new("totals_many");
        let (alice, bob, carol) = (acct("alice"), acct("bob"), acct("carol"));
        let everyone = [alice, bob, carol];
        let check = |step: &str| {
            let state = f.engine.ledger_state().unwrap();
            let positions: Vec<Participant> =
                everyone.iter().map(|id| f.engine.participant_data(id).unwrap()).collect();
            let deposited: Balance = positions.iter().map(|p| p.deposited).sum();
            let masks: Balance = positions.iter().map(|p| p.reward_mask).sum();
            assert_eq!(state.total_locked, deposited, "total locked after {step}");
            assert_eq!(state.total_reward_mask, masks, "total mask after {step}");
            assert_eq!(f.custody_balance(), state.backed_principal(), "custody after {step}");
        };

        f.fund(&alice, tokens(20));
        f.fund(&bob, tokens(7));
        f.fund(&carol, tokens(1));

        f.freeze(&alice, tokens(20), None, NOW);
        check("alice freeze");
        f.freeze(&bob, tokens(5), Some(&alice), NOW + 10);
        check("bob freeze");
        f.freeze(&carol, tokens(1), Some(&bob), NOW + 20);
        check("carol freeze");
        f.engine.compound(&alice, NOW + 100).unwrap();
        check("alice compound");
        assert!(matches!(
            f.engine.trigger_level_up(&alice, NOW + 200).unwrap(),
            LevelUpOutcome::Advanced { level: 1, .. }
        ));
        check("alice level up");
        f.freeze(&bob, tokens(2), None, NOW + 300);
        check("bob second freeze");
        f.engine.unfreeze(&carol, NOW + 20 + LOCK).unwrap();
        check("carol unfreeze");
        f.engine.compound(&bob, NOW + LOCK + 50).unwrap();
        check("bob compound");
        f.engine.unfreeze(&bob, NOW + 10 + LOCK + 60).unwrap();
        check("bob unfreeze");
        assert_eq!(f.engine.participant_count(), 1);
    }

    // ── Failing payout ────────────────────────────────────────────────────────

    /// Custody whose outgoing transfers can be switched off.
    struct StalledPayoutCustody {
        inner: MemoryCustody,
        stalled: AtomicBool,
    }

    impl TokenCustody for StalledPayoutCustody {
        fn custody_account(&self) -> AccountId {
            self.inner.custody_account()
        }
        fn transfer_in(&self, from: &AccountId, amount: Balance) -> Result<(), FreezerError> {
            self.inner.transfer_in(from, amount)
        }
        fn transfer_out(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
            if self.stalled.load(Ordering::SeqCst) {
                return Err(FreezerError::InsufficientBalance { need: amount, have: 0 });
            }
            self.inner.transfer_out(to, amount)
        }
        fn mint_reward(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
            self.inner.mint_reward(to, amount)
        }
        fn balance_of(&self, account: &AccountId) -> Balance {
            self.inner.balance_of(account)
        }
        fn allowance(&self, owner: &AccountId) -> Balance {
            self.inner.allowance(owner)
        }
    }

    #[test]
    fn failed_payout_never_pays_reward_twice() {
        let token = Arc::new(MemoryToken::new());
        let custody_id = acct("custody");
        token.grant_minter(&custody_id);
        let owner = acct("owner");
        let engine = FreezerEngine::new(
            Arc::new(temp_db("stalled_payout")),
            StalledPayoutCustody {
                inner: MemoryCustody::new(Arc::clone(&token), custody_id),
                stalled: AtomicBool::new(false),
            },
            FreezerParams::default(),
            owner,
        )
        .unwrap();

        let alice = acct("alice");
        token.credit(&alice, tokens(1)).unwrap();
        token.approve(&alice, &custody_id, tokens(1));
        engine.freeze(&alice, &alice, tokens(1), None, NOW).unwrap();
        let reward = 31_121_900_000u128 * LOCK as u128;

        engine.custody().stalled.store(true, Ordering::SeqCst);
        assert!(matches!(
            engine.unfreeze(&alice, NOW + LOCK).unwrap_err(),
            FreezerError::InsufficientBalance { .. }
        ));
        // Nothing reached alice and her position is intact.
        assert_eq!(token.balance_of(&alice), 0);
        let p = engine.participant_data(&alice).unwrap();
        assert_eq!(p.deposited, tokens(1));
        assert_eq!(p.last_accrual, NOW);
        assert_eq!(engine.total_locked().unwrap(), tokens(1));

        engine.custody().stalled.store(false, Ordering::SeqCst);
        assert_eq!(
            engine.unfreeze(&alice, NOW + LOCK).unwrap(),
            CallOutcome::Unfrozen { principal: tokens(1), reward }
        );
        assert_eq!(token.balance_of(&alice), tokens(1) + reward);

        // The reward minted by the failed attempt is left over as stray balance.
        assert_eq!(
            engine.withdraw_stray_balance(&owner).unwrap(),
            CallOutcome::StrayBalanceWithdrawn { amount: reward }
        );
        assert_eq!(token.balance_of(&custody_id), 0);
    }

    // ── Reentrancy ────────────────────────────────────────────────────────────

    /// Custody that calls back into the engine from inside `transfer_in`.
    struct ReenteringCustody {
        inner: MemoryCustody,
        engine: OnceLock<Weak<FreezerEngine<ReenteringCustody>>>,
        nested: Mutex<Option<Result<CallOutcome, FreezerError>>>,
    }

    impl TokenCustody for ReenteringCustody {
        fn custody_account(&self) -> AccountId {
            self.inner.custody_account()
        }
        fn transfer_in(&self, from: &AccountId, amount: Balance) -> Result<(), FreezerError> {
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                *self.nested.lock().unwrap() = Some(engine.compound(from, NOW + 1));
            }
            self.inner.transfer_in(from, amount)
        }
        fn transfer_out(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
            self.inner.transfer_out(to, amount)
        }
        fn mint_reward(&self, to: &AccountId, amount: Balance) -> Result<(), FreezerError> {
            self.inner.mint_reward(to, amount)
        }
        fn balance_of(&self, account: &AccountId) -> Balance {
            self.inner.balance_of(account)
        }
        fn allowance(&self, owner: &AccountId) -> Balance {
            self.inner.allowance(owner)
        }
    }

    #[test]
    fn reentrant_call_rejected() {
        let token = Arc::new(MemoryToken::new());
        let custody_id = acct("custody");
        let custody = ReenteringCustody {
            inner: MemoryCustody::new(Arc::clone(&token), custody_id),
            engine: OnceLock::new(),
            nested: Mutex::new(None),
        };
        let engine = Arc::new(
            FreezerEngine::new(Arc::new(temp_db("reentrant")), custody, FreezerParams::default(), acct("owner"))
                .unwrap(),
        );
        engine.custody().engine.set(Arc::downgrade(&engine)).ok();

        let alice = acct("alice");
        token.credit(&alice, tokens(1)).unwrap();
        token.approve(&alice, &custody_id, tokens(1));
        engine.freeze(&alice, &alice, tokens(1), None, NOW).unwrap();

        let nested = engine.custody().nested.lock().unwrap().take();
        assert_eq!(nested, Some(Err(FreezerError::Reentrant)));
        assert_eq!(engine.participant_data(&alice).unwrap().deposited, tokens(1));
    }
}
