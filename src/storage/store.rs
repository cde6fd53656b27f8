//! Wallet file persistence
//!
//! Each wallet lives in one UTF-8 JSON file holding either the plaintext
//! export or an [`Envelope`]. Writes go to a sibling temp file which is synced
//! and then renamed over the target, so a crash never leaves a half-written
//! wallet behind. Nothing is cached between calls.

use super::record::WalletRecord;
use crate::crypto::{Envelope, EnvelopeError};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Suffix of the in-flight file used by atomic writes
pub const TEMP_SUFFIX: &str = "tmp";

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("corrupt wallet file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// What a wallet file contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    Plain(WalletRecord),
    Encrypted(Envelope),
}

impl StoredRecord {
    /// Recover the plaintext record, opening the envelope if needed
    pub fn decrypt(self, passphrase: Option<&str>) -> Result<WalletRecord, EnvelopeError> {
        match self {
            StoredRecord::Plain(record) => Ok(record),
            StoredRecord::Encrypted(envelope) => {
                let passphrase = passphrase.ok_or(EnvelopeError::WrongPassword)?;
                let text = envelope.open(passphrase)?;
                WalletRecord::parse(text).map_err(EnvelopeError::Malformed)
            }
        }
    }

    /// Parse file contents; the `ct` marker alone decides plaintext vs envelope
    pub fn from_json(text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let Value::Object(object) = value else {
            return Err("wallet file is not a JSON object".to_string());
        };

        if Envelope::is_tagged(&object) {
            Envelope::from_object(object)
                .map(StoredRecord::Encrypted)
                .map_err(|e| e.to_string())
        } else {
            Ok(StoredRecord::Plain(WalletRecord::from_object(object)))
        }
    }
}

/// Reads and writes wallet files
#[derive(Debug, Clone, Default)]
pub struct EncryptedStore;

impl EncryptedStore {
    pub fn new() -> Self {
        Self
    }

    /// Persist `record`, sealing it first when a passphrase is given
    pub async fn save(
        &self,
        path: &Path,
        record: &WalletRecord,
        passphrase: Option<&str>,
    ) -> Result<(), StoreError> {
        let contents = match passphrase {
            Some(passphrase) => Envelope::seal(record.as_str(), passphrase)?.to_json()?,
            None => record.as_str().to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(path);
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        // Atomic rename
        fs::rename(&temp_path, path).await?;

        log::debug!(
            "Saved wallet file {} ({})",
            path.display(),
            if passphrase.is_some() { "encrypted" } else { "plaintext" }
        );
        Ok(())
    }

    /// Read a wallet file. A missing file is `NotFound`; unparsable bytes are
    /// always `Corrupt`.
    pub async fn load(&self, path: &Path) -> Result<StoredRecord, StoreError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        let text = String::from_utf8(bytes).map_err(|_| corrupt("not UTF-8".to_string()))?;
        StoredRecord::from_json(&text).map_err(corrupt)
    }

    /// Load and open in one step
    pub async fn load_decrypted(
        &self,
        path: &Path,
        passphrase: Option<&str>,
    ) -> Result<WalletRecord, StoreError> {
        let stored = self.load(path).await?;
        stored.decrypt(passphrase).map_err(|e| match e {
            EnvelopeError::Malformed(reason) => StoreError::Corrupt {
                path: path.to_path_buf(),
                reason,
            },
            other => other.into(),
        })
    }

    pub async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(fs::try_exists(path).await?)
    }

    /// Remove a wallet file; removing a missing one is `NotFound`
    pub async fn delete(&self, path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => {
                log::info!("Deleted wallet file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// `<file>.tmp` next to the target, so the rename never crosses filesystems
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> WalletRecord {
        WalletRecord::parse(r#"{"wallet":{"name":"Sample","m":1,"n":1}}"#).unwrap()
    }

    #[tokio::test]
    async fn test_save_load_plaintext() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".wallet.dat");
        let store = EncryptedStore::new();

        store.save(&path, &record(), None).await.unwrap();
        let loaded = store.load(&path).await.unwrap();

        assert!(matches!(loaded, StoredRecord::Plain(_)));
        let loaded = loaded.decrypt(None).unwrap();
        let expected: Value = serde_json::from_str(record().as_str()).unwrap();
        let actual: Value = serde_json::from_str(loaded.as_str()).unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_save_load_encrypted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".wallet.dat");
        let store = EncryptedStore::new();

        store.save(&path, &record(), Some("s3cret")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"ct\""));
        assert!(!raw.contains("Sample"));

        let loaded = store.load_decrypted(&path, Some("s3cret")).await.unwrap();
        assert_eq!(loaded, record());

        assert!(matches!(
            store.load_decrypted(&path, Some("guess")).await,
            Err(StoreError::Envelope(EnvelopeError::WrongPassword))
        ));
        assert!(matches!(
            store.load_decrypted(&path, None).await,
            Err(StoreError::Envelope(EnvelopeError::WrongPassword))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("absent.dat");
        let store = EncryptedStore::new();

        assert!(matches!(
            store.load(&path).await,
            Err(StoreError::NotFound(p)) if p == path
        ));
        assert!(!store.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt_not_absent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EncryptedStore::new();

        for (name, contents) in [
            ("truncated.dat", &b"{\"wallet\":{\"na"[..]),
            ("array.dat", &b"[1,2,3]"[..]),
            ("binary.dat", &[0xff, 0xfe, 0x00][..]),
            ("envelope.dat", &b"{\"ct\":\"abcd\"}"[..]),
        ] {
            let path = temp_dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            assert!(
                matches!(store.load(&path).await, Err(StoreError::Corrupt { .. })),
                "{} should be corrupt",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_leaves_no_temp_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".walletsrc").join(".wallet.dat");
        let store = EncryptedStore::new();

        store.save(&path, &record(), None).await.unwrap();
        assert!(path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_contents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".wallet.dat");
        let store = EncryptedStore::new();

        store.save(&path, &record(), None).await.unwrap();
        let updated = WalletRecord::parse(r#"{"wallet":{"name":"Renamed"}}"#).unwrap();
        store.save(&path, &updated, None).await.unwrap();

        let loaded = store.load_decrypted(&path, None).await.unwrap();
        assert_eq!(loaded, updated);
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".wallet.dat");
        let store = EncryptedStore::new();

        store.save(&path, &record(), None).await.unwrap();
        store.delete(&path).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(
            store.delete(&path).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path_for(Path::new("/data/alice.dat")),
            PathBuf::from("/data/alice.dat.tmp")
        );
    }
}
