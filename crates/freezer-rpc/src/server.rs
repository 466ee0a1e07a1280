use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use freezer_core::call::LedgerCall;
use freezer_core::error::FreezerError;
use freezer_core::types::{AccountId, Balance, Timestamp};
use freezer_ledger::{LedgerQuery, MemoryToken, TokenCustody};
use freezer_periphery::UsernameRegistry;

use crate::api::FreezerApiServer;
use crate::command::{NodeCommand, NodeEngine};
use crate::types::{RpcCallOutcome, RpcLedgerState, RpcParams, RpcParticipant, RpcReferralRecord};

/// Application error code; `data` carries `FreezerError::kind()`.
pub const LEDGER_ERROR_CODE: i32 = -32000;

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn ledger_err(e: FreezerError) -> ErrorObject<'static> {
    match e {
        FreezerError::Storage(_) | FreezerError::Serialization(_) => rpc_err(-32603, e.to_string()),
        _ => ErrorObject::owned(LEDGER_ERROR_CODE, e.to_string(), Some(e.kind())),
    }
}

fn parse_account(field: &str, s: &str) -> Result<AccountId, ErrorObject<'static>> {
    AccountId::from_b58(s).map_err(|e| rpc_err(-32602, format!("invalid {field}: {e}")))
}

fn parse_amount(s: &str) -> Result<Balance, ErrorObject<'static>> {
    s.trim()
        .parse::<Balance>()
        .map_err(|e| rpc_err(-32602, format!("invalid amount {s:?}: {e}")))
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub engine: Arc<NodeEngine>,
    pub registry: UsernameRegistry,
    pub token: Arc<MemoryToken>,
    /// Sender into the node's writer task. Without it the server is read-only.
    pub commands: Option<mpsc::Sender<NodeCommand>>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr`. Returns the bound address and a
    /// handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<(SocketAddr, ServerHandle)> {
        let middleware = tower::ServiceBuilder::new().layer(CorsLayer::permissive());
        let server = Server::builder()
            .set_http_middleware(middleware)
            .build(addr)
            .await?;
        let bound = server.local_addr()?;
        let module = self.into_rpc();
        let handle = server.start(module);
        info!(addr = %bound, "RPC server started");
        Ok((bound, handle))
    }

    async fn submit<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, FreezerError>>) -> NodeCommand,
    ) -> RpcResult<T> {
        let Some(sender) = &self.state.commands else {
            warn!("RPC: mutation called but no writer task configured");
            return Err(rpc_err(-32603, "node writer not connected"));
        };
        let (reply, rx) = oneshot::channel();
        sender
            .send(build(reply))
            .await
            .map_err(|_| rpc_err(-32603, "node writer stopped"))?;
        let result = rx
            .await
            .map_err(|_| rpc_err(-32603, "node writer dropped the request"))?;
        result.map_err(ledger_err)
    }

    async fn ledger_call(&self, caller: &str, call: LedgerCall) -> RpcResult<RpcCallOutcome> {
        let caller = parse_account("caller", caller)?;
        let outcome = self
            .submit(|reply| NodeCommand::Ledger { caller, call, reply })
            .await?;
        Ok(RpcCallOutcome::from(&outcome))
    }
}

#[async_trait]
impl FreezerApiServer for RpcServer {
    async fn get_participant(&self, account_id: String) -> RpcResult<RpcParticipant> {
        let id = parse_account("account id", &account_id)?;
        let engine = &self.state.engine;
        let p = engine.participant_data(&id).map_err(ledger_err)?;
        let pending = engine.pending_reward(&id, now()).map_err(ledger_err)?;
        let unlock_at = p.unlock_at(engine.params().lock_duration_secs);
        Ok(RpcParticipant::new(&id, &p, unlock_at, pending))
    }

    async fn get_total_locked(&self) -> RpcResult<String> {
        let total = self.state.engine.total_locked().map_err(ledger_err)?;
        Ok(total.to_string())
    }

    async fn get_referral_rewards(&self, account_id: String) -> RpcResult<String> {
        let id = parse_account("account id", &account_id)?;
        let rewards = self.state.engine.referral_rewards(&id).map_err(ledger_err)?;
        Ok(rewards.to_string())
    }

    async fn get_referral_history(&self, account_id: String) -> RpcResult<Vec<RpcReferralRecord>> {
        let id = parse_account("account id", &account_id)?;
        let history = self.state.engine.referral_history(&id).map_err(ledger_err)?;
        Ok(history.iter().map(RpcReferralRecord::from).collect())
    }

    async fn can_increase_level(&self, account_id: String) -> RpcResult<bool> {
        let id = parse_account("account id", &account_id)?;
        self.state.engine.can_increase_level(&id, now()).map_err(ledger_err)
    }

    async fn get_referral_percentage(&self, account_id: String) -> RpcResult<u32> {
        let id = parse_account("account id", &account_id)?;
        let pct = self.state.engine.referral_percentage(&id).map_err(ledger_err)?;
        u32::try_from(pct).map_err(|_| rpc_err(-32603, "referral percentage out of range"))
    }

    async fn get_pending_reward(&self, account_id: String) -> RpcResult<String> {
        let id = parse_account("account id", &account_id)?;
        let pending = self.state.engine.pending_reward(&id, now()).map_err(ledger_err)?;
        Ok(pending.to_string())
    }

    async fn describe_participant(&self, account_id: String) -> RpcResult<String> {
        let id = parse_account("account id", &account_id)?;
        let engine = &self.state.engine;
        LedgerQuery::new(&engine.db, engine.params())
            .describe(&id, now())
            .map_err(ledger_err)
    }

    async fn get_ledger_state(&self) -> RpcResult<RpcLedgerState> {
        let engine = &self.state.engine;
        let state = engine.ledger_state().map_err(ledger_err)?;
        let custody = engine.custody();
        let held = custody.balance_of(&custody.custody_account());
        Ok(RpcLedgerState::new(&state, engine.participant_count() as u64, held))
    }

    async fn get_params(&self) -> RpcResult<RpcParams> {
        let engine = &self.state.engine;
        Ok(RpcParams::new(engine.params(), &engine.custody().custody_account()))
    }

    async fn get_token_balance(&self, account_id: String) -> RpcResult<String> {
        let id = parse_account("account id", &account_id)?;
        Ok(self.state.token.balance_of(&id).to_string())
    }

    async fn get_username(&self, account_id: String) -> RpcResult<Option<String>> {
        let id = parse_account("account id", &account_id)?;
        self.state.registry.username_of(&id).map_err(ledger_err)
    }

    async fn resolve_username(&self, username: String) -> RpcResult<Option<String>> {
        let owner = self.state.registry.account_of(&username).map_err(ledger_err)?;
        Ok(owner.map(|id| id.to_b58()))
    }

    async fn freeze(
        &self,
        caller: String,
        amount: String,
        beneficiary: Option<String>,
        referral: Option<String>,
    ) -> RpcResult<RpcCallOutcome> {
        let amount = parse_amount(&amount)?;
        let beneficiary = match beneficiary.as_deref() {
            Some(b) => parse_account("beneficiary", b)?,
            None => parse_account("caller", &caller)?,
        };
        let referral = referral
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(|r| parse_account("referral", r))
            .transpose()?;
        self.ledger_call(&caller, LedgerCall::Freeze { beneficiary, amount, referral })
            .await
    }

    async fn unfreeze(&self, caller: String) -> RpcResult<RpcCallOutcome> {
        self.ledger_call(&caller, LedgerCall::Unfreeze).await
    }

    async fn compound(&self, caller: String) -> RpcResult<RpcCallOutcome> {
        self.ledger_call(&caller, LedgerCall::Compound).await
    }

    async fn trigger_level_up(&self, caller: String) -> RpcResult<RpcCallOutcome> {
        self.ledger_call(&caller, LedgerCall::TriggerLevelUp).await
    }

    async fn claim_referral_rewards(&self, caller: String) -> RpcResult<RpcCallOutcome> {
        self.ledger_call(&caller, LedgerCall::ClaimReferralRewards).await
    }

    async fn toggle_contract_active(&self, caller: String) -> RpcResult<RpcCallOutcome> {
        self.ledger_call(&caller, LedgerCall::ToggleContractActive).await
    }

    async fn withdraw_stray_balance(&self, caller: String) -> RpcResult<RpcCallOutcome> {
        self.ledger_call(&caller, LedgerCall::WithdrawStrayBalance).await
    }

    async fn transfer_ownership(&self, caller: String, new_owner: String) -> RpcResult<RpcCallOutcome> {
        let new_owner = parse_account("new owner", &new_owner)?;
        self.ledger_call(&caller, LedgerCall::TransferOwnership { new_owner }).await
    }

    async fn approve(&self, owner: String, amount: String) -> RpcResult<String> {
        let owner = parse_account("owner", &owner)?;
        let amount = parse_amount(&amount)?;
        let allowance = self
            .submit(|reply| NodeCommand::Approve { owner, amount, reply })
            .await?;
        Ok(allowance.to_string())
    }

    async fn register_username(&self, caller: String, username: String) -> RpcResult<bool> {
        let caller = parse_account("caller", &caller)?;
        self.submit(|reply| NodeCommand::RegisterUsername { caller, name: username, reply })
            .await?;
        Ok(true)
    }
}
