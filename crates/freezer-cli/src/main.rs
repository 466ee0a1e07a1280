//! freezer-cli
//!
//! Command-line client for a Freezer node. Keeps the caller's account id in a
//! small JSON file and submits ledger calls via JSON-RPC.
//!
//! Usage:
//!   freezer-cli new-account  [--account-file <path>]
//!   freezer-cli approve      --amount <tokens>
//!   freezer-cli freeze       --amount <tokens> [--beneficiary <b58>] [--referral <b58|@username>]
//!   freezer-cli unfreeze | compound | level-up | claim
//!   freezer-cli participant  [--account <b58>]
//!   freezer-cli referrals    [--account <b58>]
//!   freezer-cli state
//!   freezer-cli pause | withdraw-stray | transfer-ownership --to <b58>
//!   freezer-cli register     --username <name>
//!   freezer-cli merkle-root  --allowlist <file>
//!   freezer-cli merkle-proof --allowlist <file> --account <b58>

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use freezer_core::types::{format_tokens, parse_tokens, AccountId};
use freezer_crypto::{allowlist_leaf, merkle_proof, merkle_root, random_account_id, MerkleHash};
use freezer_rpc::RpcCallOutcome;

mod rpc_client;
use rpc_client::FreezerRpcClient;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "freezer-cli",
    version,
    about = "Freezer client: lock tokens, manage levels and referrals"
)]
struct Args {
    /// File holding the default caller account.
    #[arg(long, global = true, default_value = "~/.freezer/account.json")]
    account_file: PathBuf,

    /// Act as this account (base-58) instead of the account file.
    #[arg(long, global = true)]
    caller: Option<String>,

    /// Node JSON-RPC URL.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8645")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh account id and write it to the account file.
    NewAccount,

    /// Allow the ledger to pull up to `amount` tokens from the caller.
    Approve {
        /// Amount in tokens (decimal, e.g. 12.5).
        #[arg(long)]
        amount: String,
    },

    /// Lock tokens. The caller pays; the beneficiary owns the position.
    Freeze {
        #[arg(long)]
        amount: String,
        /// Position owner (base-58). Defaults to the caller.
        #[arg(long)]
        beneficiary: Option<String>,
        /// Referrer: base-58 account or `@username`.
        #[arg(long)]
        referral: Option<String>,
    },

    /// Withdraw a matured position.
    Unfreeze,

    /// Settle accrued reward into the position.
    Compound,

    /// Advance one level if the next threshold is passed.
    LevelUp,

    /// Mint accumulated referral rewards to the caller.
    Claim,

    /// Show a position.
    Participant {
        #[arg(long)]
        account: Option<String>,
    },

    /// Show referral rewards and history.
    Referrals {
        #[arg(long)]
        account: Option<String>,
    },

    /// Show ledger totals and admin state.
    State,

    /// Owner: pause or resume the ledger.
    Pause,

    /// Owner: recover tokens sent to custody outside of `freeze`.
    WithdrawStray,

    /// Owner: hand the ledger to a new owner.
    TransferOwnership {
        #[arg(long)]
        to: String,
    },

    /// Bind a username to the caller.
    Register {
        #[arg(long)]
        username: String,
    },

    /// Print the allow-list Merkle root for a file of base-58 accounts.
    MerkleRoot {
        #[arg(long)]
        allowlist: PathBuf,
    },

    /// Print the Merkle proof for one account of an allow-list file.
    MerkleProof {
        #[arg(long)]
        allowlist: PathBuf,
        #[arg(long)]
        account: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountFile {
    account_id: String,
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,freezer_cli=info")
        .init();

    let args = Args::parse();
    let account_file = expand_tilde(&args.account_file);
    let client = FreezerRpcClient::new(&args.rpc);
    let caller = || resolve_caller(args.caller.as_deref(), &account_file);

    match args.command {
        Command::NewAccount => cmd_new_account(&account_file),

        Command::Approve { amount } => {
            let caller = caller()?;
            let units = tokens_arg(&amount)?;
            let allowance = client.approve(&caller, units).await?;
            println!("Allowance set: {} tokens", format_tokens(allowance));
            Ok(())
        }

        Command::Freeze { amount, beneficiary, referral } => {
            let caller = caller()?;
            let units = tokens_arg(&amount)?;
            let referral = match referral {
                Some(r) => Some(resolve_referral(&client, &r).await?),
                None => None,
            };
            let outcome = client
                .freeze(&caller, units, beneficiary.as_deref(), referral.as_deref())
                .await?;
            info!(amount = %amount, "freeze submitted");
            print_outcome(&outcome);
            Ok(())
        }

        Command::Unfreeze => caller_call(&client, "freezer_unfreeze", &caller()?).await,
        Command::Compound => caller_call(&client, "freezer_compound", &caller()?).await,
        Command::LevelUp => caller_call(&client, "freezer_triggerLevelUp", &caller()?).await,
        Command::Claim => caller_call(&client, "freezer_claimReferralRewards", &caller()?).await,
        Command::Pause => caller_call(&client, "freezer_toggleContractActive", &caller()?).await,
        Command::WithdrawStray => caller_call(&client, "freezer_withdrawStrayBalance", &caller()?).await,

        Command::TransferOwnership { to } => {
            let outcome = client.transfer_ownership(&caller()?, &to).await?;
            print_outcome(&outcome);
            Ok(())
        }

        Command::Participant { account } => {
            let account = match account {
                Some(a) => a,
                None => caller()?,
            };
            let p = client.get_participant(&account).await?;
            let balance = client.get_token_balance(&account).await?;
            println!("{}", client.describe_participant(&account).await?);
            println!("Account:        {}", p.account_id);
            if let Some(name) = client.get_username(&account).await? {
                println!("Username:       {}", name);
            }
            println!("Locked:         {} tokens", p.deposited_tokens);
            println!("Unminted:       {} base units", p.reward_mask);
            println!("Pending:        {} base units", p.pending_reward);
            println!("Level:          {}", p.level);
            println!("Can level up:   {}", client.can_increase_level(&account).await?);
            match p.unlock_at {
                Some(at) => println!("Unlocks at:     {}", format_timestamp(at)),
                None => println!("Unlocks at:     (no active lock)"),
            }
            println!("Wallet balance: {} tokens", format_tokens(balance));
            Ok(())
        }

        Command::Referrals { account } => {
            let account = match account {
                Some(a) => a,
                None => caller()?,
            };
            let rewards = client.get_referral_rewards(&account).await?;
            let pct = client.get_referral_percentage(&account).await?;
            let history = client.get_referral_history(&account).await?;
            println!("Claimable:      {} tokens", format_tokens(rewards));
            println!("Referral rate:  {}%", pct);
            println!("Referred deposits: {}", history.len());
            for r in history {
                let reward: u128 = r.reward.parse().unwrap_or_default();
                let deposit: u128 = r.deposit_amount.parse().unwrap_or_default();
                println!(
                    "  {}  {}  deposit {}  reward {}",
                    format_timestamp(r.referred_at),
                    r.depositor,
                    format_tokens(deposit),
                    format_tokens(reward)
                );
            }
            Ok(())
        }

        Command::State => {
            let s = client.get_ledger_state().await?;
            let parse = |v: &str| v.parse::<u128>().unwrap_or_default();
            println!("Owner:          {}", s.owner);
            println!("Active:         {}", s.active);
            println!("Participants:   {}", s.participant_count);
            println!("Total locked:   {} tokens", format_tokens(parse(&s.total_locked)));
            println!("Unminted:       {} tokens", format_tokens(parse(&s.total_reward_mask)));
            println!("Custody holds:  {} tokens", format_tokens(parse(&s.custody_balance)));
            Ok(())
        }

        Command::Register { username } => {
            let caller = caller()?;
            client.register_username(&caller, &username).await?;
            println!("Registered {:?} for {}", username, caller);
            Ok(())
        }

        Command::MerkleRoot { allowlist } => {
            let leaves = load_allowlist(&allowlist)?;
            println!("0x{}", hex::encode(merkle_root(&leaves)));
            Ok(())
        }

        Command::MerkleProof { allowlist, account } => {
            let leaves = load_allowlist(&allowlist)?;
            let id = AccountId::from_b58(&account).context("parsing --account")?;
            let leaf = allowlist_leaf(&id);
            let index = leaves
                .iter()
                .position(|l| *l == leaf)
                .ok_or_else(|| anyhow!("{} is not on the allow-list", account))?;
            let proof = merkle_proof(&leaves, index)
                .ok_or_else(|| anyhow!("no proof for leaf {index}"))?;
            let hexes: Vec<String> = proof.iter().map(|h| format!("0x{}", hex::encode(h))).collect();
            println!("{}", serde_json::to_string_pretty(&hexes)?);
            Ok(())
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn caller_call(client: &FreezerRpcClient, method: &str, caller: &str) -> anyhow::Result<()> {
    let outcome = client.caller_only(method, caller).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &RpcCallOutcome) {
    let tokens = |v: &Option<String>| {
        v.as_deref()
            .and_then(|s| s.parse::<u128>().ok())
            .map(format_tokens)
    };
    println!("Result:         {}", outcome.kind);
    if let Some(v) = tokens(&outcome.deposited) {
        println!("Locked:         {} tokens", v);
    }
    if let Some(v) = tokens(&outcome.principal) {
        println!("Principal:      {} tokens", v);
    }
    if let Some(v) = tokens(&outcome.reward) {
        println!("Reward:         {} tokens", v);
    }
    if let Some(v) = tokens(&outcome.referral_reward) {
        println!("Referral:       {} tokens", v);
    }
    if let Some(v) = tokens(&outcome.amount) {
        println!("Amount:         {} tokens", v);
    }
    if let Some(level) = outcome.level {
        println!("Level:          {}", level);
    }
    if let Some(active) = outcome.active {
        println!("Active:         {}", active);
    }
    if let Some(owner) = &outcome.owner {
        println!("Owner:          {}", owner);
    }
}

fn cmd_new_account(account_file: &Path) -> anyhow::Result<()> {
    if account_file.exists() {
        bail!(
            "Account file {} already exists. Delete it first to generate a new account.",
            account_file.display()
        );
    }
    if let Some(parent) = account_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let id = random_account_id();
    let json = serde_json::to_string_pretty(&AccountFile { account_id: id.to_b58() })?;
    std::fs::write(account_file, json)
        .with_context(|| format!("writing account file to {}", account_file.display()))?;

    println!("Generated new account.");
    println!("Account ID:   {}", id);
    println!("Account file: {}", account_file.display());
    Ok(())
}

fn resolve_caller(explicit: Option<&str>, account_file: &Path) -> anyhow::Result<String> {
    if let Some(c) = explicit {
        AccountId::from_b58(c).context("parsing --caller")?;
        return Ok(c.to_string());
    }
    let json = std::fs::read_to_string(account_file).with_context(|| {
        format!(
            "reading account file {} (run `freezer-cli new-account` or pass --caller)",
            account_file.display()
        )
    })?;
    let file: AccountFile = serde_json::from_str(&json).context("parsing account file")?;
    Ok(file.account_id)
}

/// `@name` is looked up in the username registry; anything else is base-58.
async fn resolve_referral(client: &FreezerRpcClient, referral: &str) -> anyhow::Result<String> {
    match referral.strip_prefix('@') {
        Some(name) => client
            .resolve_username(name)
            .await?
            .ok_or_else(|| anyhow!("unknown username {name:?}")),
        None => Ok(referral.to_string()),
    }
}

fn tokens_arg(amount: &str) -> anyhow::Result<u128> {
    parse_tokens(amount).ok_or_else(|| anyhow!("invalid token amount {amount:?}"))
}

/// One base-58 account per line; blank lines and `#` comments are skipped.
fn load_allowlist(path: &Path) -> anyhow::Result<Vec<MerkleHash>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading allow-list {}", path.display()))?;
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            AccountId::from_b58(l)
                .map(|id| allowlist_leaf(&id))
                .with_context(|| format!("allow-list entry {l:?}"))
        })
        .collect()
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
