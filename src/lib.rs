//! Quorum-Wallet: a multisig wallet client in Rust
//!
//! This crate provides the client side of M-of-N shared wallets featuring:
//! - Wallet files stored as plaintext or passphrase envelopes (Argon2id + AES-256-GCM)
//! - Atomic wallet file writes
//! - Session loading with one-time completion handling
//! - Transaction proposal lookup by short id, listing and batch signing
//! - A directory-backed registry of named wallets
//! - Amount rendering in sat, bit or btc
//!
//! # Example
//!
//! ```rust
//! use quorum_wallet::amount::{render, Unit};
//! use quorum_wallet::client::{LocalCoordinator, WalletClient, WalletOptions};
//! use quorum_wallet::quorum::render_proposals;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! // A 2-of-2 wallet with a second copayer joining
//! let client = LocalCoordinator::new();
//! let secret = client
//!     .create_wallet("Shared", "Drew", 2, 2, WalletOptions::default())
//!     .await
//!     .unwrap();
//! assert!(secret.is_some());
//! client.join_copayer("Ana").await.unwrap();
//!
//! let address = client.create_address().await.unwrap();
//! println!("Address: {}", address);
//!
//! // Nothing pending yet
//! let proposals = client.get_tx_proposals().await.unwrap();
//! assert!(render_proposals(&proposals, Unit::Bit).is_empty());
//! # });
//!
//! assert_eq!(render(123456789, Unit::Btc), "1.23456789 btc");
//! ```

pub mod amount;
pub mod cli;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod quorum;
pub mod registry;
pub mod session;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use amount::Unit;
pub use client::{LocalCoordinator, TxProposal, WalletClient};
pub use config::Config;
pub use error::{Result, WalletError};
pub use quorum::{BatchOutcome, ProposalEngine, SignatureBatchEntry};
pub use registry::WalletRegistry;
pub use session::{ResolveOptions, Session, SessionLoader};
pub use storage::{EncryptedStore, WalletRecord};
pub use wallet::WalletService;
