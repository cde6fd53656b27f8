//! Wallet registry for multi-wallet mode

pub mod manager;

pub use manager::{CreateArgs, WalletRegistry, WALLET_EXTENSION};
