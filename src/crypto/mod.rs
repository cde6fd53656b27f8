//! Cryptographic utilities for the wallet client
//!
//! This module provides:
//! - SHA-256 / HASH160 hashing and Base58Check addresses
//! - Copayer signing keys (secp256k1)
//! - The passphrase envelope used for encrypted wallet files

pub mod envelope;
pub mod hash;
pub mod keys;

pub use envelope::{Envelope, EnvelopeError};
pub use hash::{base58check, double_sha256, hash160, sha256, sha256_hex};
pub use keys::{CopayerKey, KeyError};
