use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcCallOutcome, RpcLedgerState, RpcParams, RpcParticipant, RpcReferralRecord};

/// Freezer JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "freezer_" via `namespace = "freezer"`.
/// Accounts are base-58 strings; amounts are base-unit decimal strings.
#[rpc(server, namespace = "freezer")]
pub trait FreezerApi {
    // ── Views ─────────────────────────────────────────────────────────────────

    /// Stored position for an account; the zero record if it never locked.
    #[method(name = "getParticipant")]
    async fn get_participant(&self, account_id: String) -> RpcResult<RpcParticipant>;

    #[method(name = "getTotalLocked")]
    async fn get_total_locked(&self) -> RpcResult<String>;

    #[method(name = "getReferralRewards")]
    async fn get_referral_rewards(&self, account_id: String) -> RpcResult<String>;

    /// Referred deposits credited to `account_id`, oldest first.
    #[method(name = "getReferralHistory")]
    async fn get_referral_history(&self, account_id: String) -> RpcResult<Vec<RpcReferralRecord>>;

    #[method(name = "canIncreaseLevel")]
    async fn can_increase_level(&self, account_id: String) -> RpcResult<bool>;

    /// Percentage of a deposit that `account_id` would earn as referrer.
    #[method(name = "getReferralPercentage")]
    async fn get_referral_percentage(&self, account_id: String) -> RpcResult<u32>;

    #[method(name = "getPendingReward")]
    async fn get_pending_reward(&self, account_id: String) -> RpcResult<String>;

    #[method(name = "describeParticipant")]
    async fn describe_participant(&self, account_id: String) -> RpcResult<String>;

    #[method(name = "getLedgerState")]
    async fn get_ledger_state(&self) -> RpcResult<RpcLedgerState>;

    #[method(name = "getParams")]
    async fn get_params(&self) -> RpcResult<RpcParams>;

    /// Balance of the local token (not the locked position).
    #[method(name = "getTokenBalance")]
    async fn get_token_balance(&self, account_id: String) -> RpcResult<String>;

    #[method(name = "getUsername")]
    async fn get_username(&self, account_id: String) -> RpcResult<Option<String>>;

    /// Account bound to `username`, as base-58.
    #[method(name = "resolveUsername")]
    async fn resolve_username(&self, username: String) -> RpcResult<Option<String>>;

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Lock `amount` for `beneficiary` (default: the caller), paid by the caller.
    #[method(name = "freeze")]
    async fn freeze(
        &self,
        caller: String,
        amount: String,
        beneficiary: Option<String>,
        referral: Option<String>,
    ) -> RpcResult<RpcCallOutcome>;

    #[method(name = "unfreeze")]
    async fn unfreeze(&self, caller: String) -> RpcResult<RpcCallOutcome>;

    #[method(name = "compound")]
    async fn compound(&self, caller: String) -> RpcResult<RpcCallOutcome>;

    #[method(name = "triggerLevelUp")]
    async fn trigger_level_up(&self, caller: String) -> RpcResult<RpcCallOutcome>;

    #[method(name = "claimReferralRewards")]
    async fn claim_referral_rewards(&self, caller: String) -> RpcResult<RpcCallOutcome>;

    #[method(name = "toggleContractActive")]
    async fn toggle_contract_active(&self, caller: String) -> RpcResult<RpcCallOutcome>;

    #[method(name = "withdrawStrayBalance")]
    async fn withdraw_stray_balance(&self, caller: String) -> RpcResult<RpcCallOutcome>;

    #[method(name = "transferOwnership")]
    async fn transfer_ownership(&self, caller: String, new_owner: String) -> RpcResult<RpcCallOutcome>;

    /// Set the caller's allowance towards ledger custody. Returns it.
    #[method(name = "approve")]
    async fn approve(&self, owner: String, amount: String) -> RpcResult<String>;

    #[method(name = "registerUsername")]
    async fn register_username(&self, caller: String, username: String) -> RpcResult<bool>;
}
