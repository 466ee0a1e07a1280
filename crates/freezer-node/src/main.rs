//! freezer-node: runs the Freezer ledger behind a JSON-RPC server.
//!
//! Startup sequence:
//!   1. Open (or initialise) the state database and run schema migrations
//!   2. Load ledger parameters and the local token (snapshot or genesis)
//!   3. Build the ledger engine and the username registry
//!   4. Start the JSON-RPC 2.0 server
//!   5. Run the writer loop: every mutation is applied here, one at a time

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use freezer_core::params::FreezerParams;
use freezer_core::types::{format_tokens, AccountId};
use freezer_crypto::{account_id_from_seed, random_account_id};
use freezer_ledger::{FreezerEngine, MemoryCustody, MemoryToken};
use freezer_periphery::UsernameRegistry;
use freezer_rpc::{NodeCommand, NodeEngine, RpcServer, RpcServerState};
use freezer_state::{migrate, FreezerDb};

mod token_store;
use token_store::{TokenGenesis, TokenStore};

/// Seed of the account under which the ledger holds custody.
const CUSTODY_SEED: &[u8] = b"freezer-ledger-custody";

#[derive(Parser, Debug)]
#[command(
    name = "freezer-node",
    version,
    about = "Freezer node: time-locked staking ledger with levels and referrals"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.freezer/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8645")]
    rpc_addr: SocketAddr,

    /// Path to ledger params JSON. Defaults apply when omitted.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Ledger owner (base-58). Only used when the ledger is created.
    #[arg(long)]
    owner: Option<String>,

    /// Initial local token balances (JSON). Only used on first run.
    #[arg(long)]
    token_genesis: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,freezer=debug")),
        )
        .init();

    let args = Args::parse();
    info!("Freezer node starting");

    // ── State database ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db = Arc::new(FreezerDb::open(data_dir.join("state")).context("opening state database")?);
    let version = migrate(&db).context("migrating state database")?;
    info!(schema_version = version, "state database ready");

    // ── Parameters ────────────────────────────────────────────────────────────
    let params = load_params(args.params.as_deref())?;
    info!(
        lock_duration_secs = params.lock_duration_secs,
        base_reward_rate = %params.base_reward_rate,
        levels = params.max_level(),
        "ledger parameters loaded"
    );

    // ── Local token ───────────────────────────────────────────────────────────
    let custody_id = account_id_from_seed(CUSTODY_SEED);
    let token_store = TokenStore::new(&data_dir);
    let token = match token_store.load()? {
        Some(token) => {
            if args.token_genesis.is_some() {
                warn!("token snapshot found, ignoring --token-genesis");
            }
            Arc::new(token)
        }
        None => {
            let token = MemoryToken::new();
            if let Some(path) = args.token_genesis.as_deref() {
                let minted = TokenGenesis::load(path)?.apply(&token)?;
                info!(total = %format_tokens(minted), "token genesis applied");
            }
            Arc::new(token)
        }
    };
    token.grant_minter(&custody_id);
    token_store.save(&token).context("saving token snapshot")?;

    // ── Ledger engine ─────────────────────────────────────────────────────────
    let owner = resolve_owner(args.owner.as_deref())?;
    let custody = MemoryCustody::new(Arc::clone(&token), custody_id);
    let engine: Arc<NodeEngine> = Arc::new(
        FreezerEngine::new(Arc::clone(&db), custody, params, owner).context("initialising ledger")?,
    );
    let state = engine.ledger_state()?;
    info!(
        owner = %state.owner,
        custody = %custody_id,
        total_locked = %format_tokens(state.total_locked),
        participants = engine.participant_count(),
        active = state.active,
        "ledger ready"
    );
    let registry = UsernameRegistry::new(Arc::clone(&db));

    // ── Writer queue ──────────────────────────────────────────────────────────
    let (command_sender, mut command_receiver) = mpsc::channel::<NodeCommand>(512);

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        engine: Arc::clone(&engine),
        registry: registry.clone(),
        token: Arc::clone(&token),
        commands: Some(command_sender),
    });
    let (rpc_addr, rpc_handle) = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    // ── Main loop: apply mutations in arrival order ───────────────────────────
    info!(rpc = %rpc_addr, "node ready");
    loop {
        let command = tokio::select! {
            command = command_receiver.recv() => match command {
                Some(command) => command,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        };

        let now = chrono::Utc::now().timestamp();
        match command {
            NodeCommand::Ledger { caller, call, reply } => {
                let result = engine.apply(&caller, &call, now);
                if let Err(e) = &result {
                    warn!(caller = %caller, call = call.name(), error = %e, "ledger call rejected");
                }
                let _ = reply.send(result);
            }
            NodeCommand::Approve { owner, amount, reply } => {
                token.approve(&owner, &custody_id, amount);
                info!(owner = %owner, amount = %format_tokens(amount), "custody allowance set");
                let _ = reply.send(Ok(amount));
            }
            NodeCommand::RegisterUsername { caller, name, reply } => {
                let result = registry.register(&caller, &name);
                if let Err(e) = &result {
                    warn!(caller = %caller, error = %e, "username registration rejected");
                }
                let _ = reply.send(result);
            }
        }

        if let Err(e) = token_store.checkpoint(&db, &token) {
            warn!(error = %e, "failed to checkpoint ledger and token");
        }
    }

    let _ = rpc_handle.stop();
    db.flush().context("flushing state database")?;
    info!("node stopped");
    Ok(())
}

fn load_params(path: Option<&Path>) -> anyhow::Result<FreezerParams> {
    let Some(p) = path else {
        return Ok(FreezerParams::default());
    };
    let json = std::fs::read_to_string(p)
        .with_context(|| format!("reading ledger params from {}", p.display()))?;
    FreezerParams::from_json(&json).context("parsing ledger params JSON")
}

/// Parse `--owner`, or generate an ephemeral owner if none is given.
///
/// # Warning
/// An ephemeral owner is printed once and never stored anywhere else. Only use
/// this for local development.
fn resolve_owner(owner: Option<&str>) -> anyhow::Result<AccountId> {
    if let Some(s) = owner {
        return AccountId::from_b58(s).context("parsing --owner");
    }
    let id = random_account_id();
    warn!(owner = %id, "No --owner provided. Generated an ephemeral owner. DO NOT USE IN PRODUCTION.");
    Ok(id)
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
