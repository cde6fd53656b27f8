//! Wallet module for the high-level wallet operations

pub mod service;

pub use service::{
    CreateWalletArgs, ImportArgs, Payment, SignRequest, SignResult, WalletService, WalletTarget,
};
