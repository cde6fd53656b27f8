//! Multisig wallet CLI application
//!
//! A command-line interface for M-of-N shared wallets.

use clap::{Parser, Subcommand};
use quorum_wallet::cli::{self, AppState};
use quorum_wallet::config::Config;
use quorum_wallet::registry::CreateArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qwallet")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Multisig wallet client with encrypted wallet files", long_about = None)]
struct Cli {
    /// Wallet file (defaults to $WALLET_FILE, then ~/.walletsrc/.wallet.dat)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Password for the wallet file
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet
    Create {
        /// Wallet name
        name: String,

        /// Your copayer name
        #[arg(short, long, default_value = "me")]
        copayer: String,

        /// Required signatures
        #[arg(short, default_value = "1")]
        m: u8,

        /// Total copayers
        #[arg(short, default_value = "1")]
        n: u8,

        /// Use testnet
        #[arg(short, long)]
        testnet: bool,
    },

    /// Import a wallet from an export file
    Import {
        /// Export file
        input: PathBuf,

        /// Password the export was encrypted with
        #[arg(short, long)]
        export_password: Option<String>,

        /// Import without signing keys
        #[arg(short, long)]
        read_only: bool,
    },

    /// Show wallet status
    Status,

    /// Create a new address
    Address,

    /// List wallet addresses
    Addresses,

    /// Show wallet balance
    Balance,

    /// Propose a payment
    Send {
        /// Destination address
        to: String,

        /// Amount in the smallest unit
        amount: u64,

        /// Note attached to the proposal
        #[arg(short, long)]
        note: Option<String>,

        /// Fee rate per kB
        #[arg(long)]
        fee_per_kb: Option<u64>,
    },

    /// List pending transaction proposals
    Proposals,

    /// Sign a transaction proposal
    Sign {
        /// Transaction proposal id (short id accepted)
        txpid: Option<String>,

        /// Signature batch file
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Reject a transaction proposal
    Reject {
        /// Transaction proposal id (short id accepted)
        txpid: String,

        /// Reason shown to the other copayers
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Broadcast a fully signed transaction proposal
    Broadcast {
        /// Transaction proposal id (short id accepted)
        txpid: String,
    },

    /// Export the wallet
    Export {
        /// Output file (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Encrypt the export with this password
        #[arg(short, long)]
        export_password: Option<String>,
    },

    /// Delete the wallet file
    Delete,

    /// Named wallets kept in one directory
    Registry {
        /// Registry directory (defaults to $WALLET_REGISTRY_DIR, then ~/.walletsrc/wallets)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        #[command(subcommand)]
        action: RegistryCommands,
    },
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// Create a wallet unless one with this name exists
    Create {
        /// Wallet name
        name: String,

        /// Your copayer name
        #[arg(short, long, default_value = "me")]
        copayer: String,

        /// Required signatures
        #[arg(short, default_value = "1")]
        m: u8,

        /// Total copayers
        #[arg(short, default_value = "1")]
        n: u8,
    },

    /// List wallets
    List,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match Config::from_env() {
        Ok(config) => run(cli, config),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: Config) -> cli::CliResult<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let state = AppState::new(config.clone(), cli.file, cli.password.clone());

        match cli.command {
            Commands::Registry { dir, action } => {
                let dir = dir.unwrap_or_else(|| config.registry_dir.clone());
                match action {
                    RegistryCommands::Create {
                        name,
                        copayer,
                        m,
                        n,
                    } => {
                        cli::cmd_registry_create(
                            &dir,
                            cli.password,
                            &name,
                            CreateArgs::new(&copayer, m, n),
                        )
                        .await
                    }
                    RegistryCommands::List => {
                        cli::cmd_registry_list(&config, &dir, cli.password).await
                    }
                }
            }

            Commands::Create {
                name,
                copayer,
                m,
                n,
                testnet,
            } => cli::cmd_create(&state, &name, &copayer, m, n, testnet).await,

            Commands::Import {
                input,
                export_password,
                read_only,
            } => cli::cmd_import(&state, &input, export_password, read_only).await,

            Commands::Status => cli::cmd_status(&state).await,
            Commands::Address => cli::cmd_address(&state).await,
            Commands::Addresses => cli::cmd_addresses(&state).await,
            Commands::Balance => cli::cmd_balance(&state).await,

            Commands::Send {
                to,
                amount,
                note,
                fee_per_kb,
            } => cli::cmd_send(&state, &to, amount, note, fee_per_kb).await,

            Commands::Proposals => cli::cmd_proposals(&state).await,

            Commands::Sign { txpid, input } => {
                cli::cmd_sign(&state, txpid.as_deref(), input.as_deref()).await
            }

            Commands::Reject { txpid, comment } => {
                cli::cmd_reject(&state, &txpid, comment.as_deref()).await
            }

            Commands::Broadcast { txpid } => cli::cmd_broadcast(&state, &txpid).await,

            Commands::Export {
                output,
                export_password,
            } => cli::cmd_export(&state, output.as_deref(), export_password.as_deref()).await,

            Commands::Delete => cli::cmd_delete(&state).await,
        }
    })
}
