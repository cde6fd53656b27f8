//! Storage module for wallet persistence

pub mod record;
pub mod store;

pub use record::WalletRecord;
pub use store::{temp_path_for, EncryptedStore, StoreError, StoredRecord, TEMP_SUFFIX};
