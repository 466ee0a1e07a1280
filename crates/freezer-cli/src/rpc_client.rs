use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde_json::json;

use freezer_rpc::{RpcCallOutcome, RpcLedgerState, RpcParticipant, RpcReferralRecord};

/// JSON-RPC 2.0 client used by the CLI to talk to a running node.
///
/// Raw HTTP POST with serde_json; ledger errors surface as
/// `"<kind>: <message>"` so scripts can match on the kind.
pub struct FreezerRpcClient {
    url: String,
    client: reqwest::Client,
}

impl FreezerRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and decode the `result` field.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to node at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error") {
            let message = err["message"].as_str().unwrap_or("unknown error");
            match err["data"].as_str() {
                Some(kind) => bail!("{kind}: {message}"),
                None => bail!("RPC error: {err}"),
            }
        }

        serde_json::from_value(json["result"].clone())
            .with_context(|| format!("decoding result of {method}"))
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    pub async fn get_participant(&self, account: &str) -> anyhow::Result<RpcParticipant> {
        self.call("freezer_getParticipant", json!([account])).await
    }

    pub async fn get_referral_rewards(&self, account: &str) -> anyhow::Result<u128> {
        let s: String = self.call("freezer_getReferralRewards", json!([account])).await?;
        s.parse().context("parsing referral rewards")
    }

    pub async fn get_referral_history(&self, account: &str) -> anyhow::Result<Vec<RpcReferralRecord>> {
        self.call("freezer_getReferralHistory", json!([account])).await
    }

    pub async fn get_referral_percentage(&self, account: &str) -> anyhow::Result<u32> {
        self.call("freezer_getReferralPercentage", json!([account])).await
    }

    pub async fn can_increase_level(&self, account: &str) -> anyhow::Result<bool> {
        self.call("freezer_canIncreaseLevel", json!([account])).await
    }

    pub async fn describe_participant(&self, account: &str) -> anyhow::Result<String> {
        self.call("freezer_describeParticipant", json!([account])).await
    }

    pub async fn get_ledger_state(&self) -> anyhow::Result<RpcLedgerState> {
        self.call("freezer_getLedgerState", json!([])).await
    }

    pub async fn get_token_balance(&self, account: &str) -> anyhow::Result<u128> {
        let s: String = self.call("freezer_getTokenBalance", json!([account])).await?;
        s.parse().context("parsing token balance")
    }

    pub async fn get_username(&self, account: &str) -> anyhow::Result<Option<String>> {
        self.call("freezer_getUsername", json!([account])).await
    }

    pub async fn resolve_username(&self, username: &str) -> anyhow::Result<Option<String>> {
        self.call("freezer_resolveUsername", json!([username])).await
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    pub async fn freeze(
        &self,
        caller: &str,
        amount: u128,
        beneficiary: Option<&str>,
        referral: Option<&str>,
    ) -> anyhow::Result<RpcCallOutcome> {
        self.call(
            "freezer_freeze",
            json!([caller, amount.to_string(), beneficiary, referral]),
        )
        .await
    }

    /// Call a mutation that takes only the caller.
    pub async fn caller_only(&self, method: &str, caller: &str) -> anyhow::Result<RpcCallOutcome> {
        self.call(method, json!([caller])).await
    }

    pub async fn transfer_ownership(&self, caller: &str, new_owner: &str) -> anyhow::Result<RpcCallOutcome> {
        self.call("freezer_transferOwnership", json!([caller, new_owner])).await
    }

    pub async fn approve(&self, owner: &str, amount: u128) -> anyhow::Result<u128> {
        let s: String = self.call("freezer_approve", json!([owner, amount.to_string()])).await?;
        s.parse().context("parsing allowance")
    }

    pub async fn register_username(&self, caller: &str, username: &str) -> anyhow::Result<bool> {
        self.call("freezer_registerUsername", json!([caller, username])).await
    }
}
