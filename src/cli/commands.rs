//! CLI commands for the wallet client
//!
//! Implements all command handlers for the CLI interface.

use crate::amount;
use crate::client::{LocalCoordinator, Network, WalletClient};
use crate::config::Config;
use crate::quorum::{parse_batch, BatchOutcome};
use crate::registry::{CreateArgs, WalletRegistry};
use crate::wallet::{
    CreateWalletArgs, ImportArgs, Payment, SignRequest, SignResult, WalletService, WalletTarget,
};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Builds the client every command runs against
pub type ClientBuilder = fn() -> LocalCoordinator;

/// Application state
pub struct AppState {
    pub service: WalletService<ClientBuilder>,
    pub target: WalletTarget,
}

impl AppState {
    pub fn new(config: Config, file: Option<PathBuf>, password: Option<String>) -> Self {
        Self {
            service: WalletService::new(LocalCoordinator::new as ClientBuilder, config),
            target: WalletTarget::new(file, password),
        }
    }

    fn config(&self) -> &Config {
        self.service.loader().config()
    }

    fn wallet_path(&self) -> PathBuf {
        self.service.loader().path_for(self.target.file.as_deref())
    }
}

/// Create a new wallet
pub async fn cmd_create(
    state: &AppState,
    name: &str,
    copayer: &str,
    m: u8,
    n: u8,
    testnet: bool,
) -> CliResult<()> {
    let network = if testnet {
        Network::Testnet
    } else {
        Network::Livenet
    };
    let secret = state
        .service
        .create_wallet(
            &state.target,
            CreateWalletArgs {
                name: name.to_string(),
                copayer_name: copayer.to_string(),
                m,
                n,
                network,
            },
        )
        .await?;

    println!("🔐 Wallet created: {} ({}-of-{})", name, m, n);
    println!("   📁 File: {}", state.wallet_path().display());
    match secret {
        Some(secret) => {
            println!("   🤝 Secret: {}", secret);
            println!("\n   Share this secret with the other copayers to let them join.");
        }
        None => println!("   ✅ Wallet is complete."),
    }
    if state.target.password.is_none() {
        println!("\n   ⚠️  The wallet file is not encrypted. Use --password to protect it.");
    }

    Ok(())
}

/// Import a wallet from an export file
pub async fn cmd_import(
    state: &AppState,
    input: &Path,
    export_password: Option<String>,
    read_only: bool,
) -> CliResult<()> {
    let can_sign = state
        .service
        .import_wallet(
            &state.target,
            input,
            ImportArgs {
                export_password,
                read_only,
            },
        )
        .await?;

    let access = if can_sign {
        "with signing capability"
    } else {
        "without signing capability"
    };
    println!("📥 Wallet Imported {}.", access);
    println!("   📁 File: {}", state.wallet_path().display());

    Ok(())
}

/// Show wallet status
pub async fn cmd_status(state: &AppState) -> CliResult<()> {
    let session = state.service.get_wallet(&state.target).await?;
    let addresses = session.client.get_main_addresses().await?;
    let balance = session.client.get_balance().await?;
    let proposals = session.client.get_tx_proposals().await?;
    let unit = state.config().unit;

    println!("👛 Wallet {}", session.path.display());
    println!("   ├─ Addresses: {}", addresses.len());
    println!("   ├─ Balance: {}", amount::render(balance.total_amount, unit));
    println!("   ├─ Locked: {}", amount::render(balance.locked_amount, unit));
    println!("   ├─ Pending proposals: {}", proposals.len());
    println!(
        "   └─ Signing: {}",
        if session.client.can_sign().await {
            "yes"
        } else {
            "watch-only"
        }
    );

    Ok(())
}

/// Create a new receiving address
pub async fn cmd_address(state: &AppState) -> CliResult<()> {
    let address = state.service.create_address(&state.target).await?;
    println!("📍 New address: {}", address);
    Ok(())
}

/// List the wallet's addresses
pub async fn cmd_addresses(state: &AppState) -> CliResult<()> {
    let addresses = state.service.get_addresses(&state.target).await?;

    if addresses.is_empty() {
        println!("📭 No addresses yet. Create one with: qwallet address");
        return Ok(());
    }

    println!("📋 Addresses:");
    for address in &addresses {
        println!("   {}", address);
    }

    Ok(())
}

/// Show wallet balance
pub async fn cmd_balance(state: &AppState) -> CliResult<()> {
    let line = state.service.get_balance(&state.target).await?;
    println!("{}", line);
    Ok(())
}

/// Propose a payment
pub async fn cmd_send(
    state: &AppState,
    to: &str,
    value: u64,
    note: Option<String>,
    fee_per_kb: Option<u64>,
) -> CliResult<()> {
    let proposal = state
        .service
        .generate_transaction(
            &state.target,
            Payment {
                to: to.to_string(),
                amount: value,
                note,
                fee_per_kb,
            },
        )
        .await?;

    let unit = state.config().unit;
    println!(
        " * Tx created: ID {} [{:?}] RequiredSignatures: {}",
        proposal.short_id(),
        proposal.status,
        proposal.required_signatures
    );
    println!("   ├─ To: {}", to);
    println!("   ├─ Amount: {}", amount::render(proposal.amount, unit));
    println!("   └─ Fee: {}", amount::render(proposal.fee, unit));

    Ok(())
}

/// List pending transaction proposals
pub async fn cmd_proposals(state: &AppState) -> CliResult<()> {
    let lines = state.service.list_proposals(&state.target).await?;

    if lines.is_empty() {
        println!("📭 No pending transaction proposals.");
        return Ok(());
    }

    println!("* TX Proposals:");
    for line in &lines {
        println!("{}", line);
    }

    Ok(())
}

/// Sign one proposal, or apply a batch of collected signatures
pub async fn cmd_sign(state: &AppState, txpid: Option<&str>, input: Option<&Path>) -> CliResult<()> {
    let request = match (input, txpid) {
        (Some(input), filter) => {
            let text = fs::read_to_string(input).await?;
            SignRequest::Batch {
                entries: parse_batch(&text)?,
                filter: filter.map(str::to_string),
            }
        }
        (None, Some(txpid)) => SignRequest::Single(txpid.to_string()),
        (None, None) => return Err("Provide a transaction proposal id or --input".into()),
    };

    match state.service.sign_transaction(&state.target, request).await? {
        SignResult::Single(proposal) => {
            println!("✍️  Transaction signed by you.");
            if proposal.is_ready() {
                println!("   ✅ Ready to broadcast: qwallet broadcast {}", proposal.short_id());
            } else {
                println!("   Missing signatures: {}", proposal.missing_signatures());
            }
        }
        SignResult::Batch(outcomes) => print_batch(&outcomes)?,
    }

    Ok(())
}

fn print_batch(outcomes: &[BatchOutcome]) -> CliResult<()> {
    if outcomes.is_empty() {
        println!("📭 No proposal matched the signature file.");
        return Ok(());
    }

    for outcome in outcomes {
        match outcome {
            BatchOutcome::Signed(_) => println!("   ✅ {}", outcome),
            BatchOutcome::SignFailed { .. } => println!("   ❌ {}", outcome),
        }
    }

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.is_signed())
        .map(BatchOutcome::id)
        .collect();
    if !failed.is_empty() {
        return Err(format!(
            "{} of {} signature(s) failed: {}",
            failed.len(),
            outcomes.len(),
            failed.join(", ")
        )
        .into());
    }
    Ok(())
}

/// Reject a proposal
pub async fn cmd_reject(state: &AppState, txpid: &str, comment: Option<&str>) -> CliResult<()> {
    let proposal = state
        .service
        .reject_transaction(&state.target, txpid, comment)
        .await?;
    println!("🚫 Transaction {} rejected by you.", proposal.short_id());
    Ok(())
}

/// Broadcast a fully signed proposal
pub async fn cmd_broadcast(state: &AppState, txpid: &str) -> CliResult<()> {
    let txid = state
        .service
        .broadcast_transaction(&state.target, txpid)
        .await?;
    println!("📡 Transaction Broadcasted: TXID: {}", txid);
    Ok(())
}

/// Export the wallet to a file or stdout
pub async fn cmd_export(
    state: &AppState,
    output: Option<&Path>,
    export_password: Option<&str>,
) -> CliResult<()> {
    match output {
        Some(output) => {
            state
                .service
                .export_wallet_to(&state.target, output, export_password)
                .await?;
            println!("💾 Wallet exported to {}", output.display());
        }
        None => {
            let text = state
                .service
                .export_wallet(&state.target, export_password)
                .await?;
            println!("{}", text);
        }
    }
    Ok(())
}

/// Delete the wallet file
pub async fn cmd_delete(state: &AppState) -> CliResult<()> {
    let path = state.service.delete_wallet(&state.target).await?;
    println!("🗑️  Deleted wallet file {}", path.display());
    Ok(())
}

/// Create a named wallet in the registry unless it already exists
pub async fn cmd_registry_create(
    dir: &Path,
    password: Option<String>,
    name: &str,
    args: CreateArgs,
) -> CliResult<()> {
    let mut registry =
        WalletRegistry::load_all(LocalCoordinator::new as ClientBuilder, dir, password).await?;
    let (m, n) = (args.m, args.n);

    if registry.create_if_absent(name, args).await? {
        println!("🔐 Wallet {} created ({}-of-{})", name, m, n);
        println!("   📁 Directory: {}", registry.dir().display());
    } else {
        println!("⚠️  Wallet {} already exists, nothing to do.", name);
    }

    Ok(())
}

/// List registry wallets
pub async fn cmd_registry_list(config: &Config, dir: &Path, password: Option<String>) -> CliResult<()> {
    let registry =
        WalletRegistry::load_all(LocalCoordinator::new as ClientBuilder, dir, password).await?;

    if registry.is_empty() {
        println!("📭 No wallets in {}", registry.dir().display());
        return Ok(());
    }

    println!("📋 Wallets in {}:", registry.dir().display());
    for name in registry.names() {
        let client = registry.get(name)?;
        let balance = client.get_balance().await?;
        println!(
            "   {} - {}",
            name,
            amount::render(balance.total_amount, config.unit)
        );
    }

    Ok(())
}
