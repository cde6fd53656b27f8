//! Named wallets kept side by side in one directory
//!
//! Every wallet is a `<name>.dat` file. The directory is the source of truth:
//! the in-memory map is rebuilt from it by [`WalletRegistry::load_all`] and a
//! wallet is only registered after its file has been written.

use crate::client::{ClientError, ClientFactory, ImportOptions, WalletClient, WalletOptions};
use crate::error::{Result, WalletError};
use crate::storage::EncryptedStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File extension of registry wallets
pub const WALLET_EXTENSION: &str = "dat";

/// Parameters for a registry wallet
#[derive(Clone, Debug)]
pub struct CreateArgs {
    pub copayer_name: String,
    pub m: u8,
    pub n: u8,
    pub options: WalletOptions,
}

impl CreateArgs {
    pub fn new(copayer_name: &str, m: u8, n: u8) -> Self {
        Self {
            copayer_name: copayer_name.to_string(),
            m,
            n,
            options: WalletOptions::default(),
        }
    }
}

/// Loaded clients by wallet name
pub struct WalletRegistry<F: ClientFactory> {
    dir: PathBuf,
    factory: F,
    store: EncryptedStore,
    passphrase: Option<String>,
    wallets: BTreeMap<String, F::Client>,
}

impl<F: ClientFactory> WalletRegistry<F> {
    /// Import every wallet in `dir`, creating the directory if needed.
    ///
    /// A single unreadable wallet fails the whole load.
    pub async fn load_all(factory: F, dir: &Path, passphrase: Option<String>) -> Result<Self> {
        fs::create_dir_all(dir).await?;

        let mut registry = Self {
            dir: dir.to_path_buf(),
            factory,
            store: EncryptedStore::new(),
            passphrase,
            wallets: BTreeMap::new(),
        };

        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_file = entry.file_type().await?.is_file();
            let name = match wallet_name(&path) {
                Some(name) if is_file => name,
                _ => {
                    log::debug!("Skipping {} in wallet registry", path.display());
                    continue;
                }
            };

            let client = registry.import(&path).await?;
            registry.wallets.insert(name, client);
        }

        log::info!(
            "Loaded {} wallet(s) from {}",
            registry.wallets.len(),
            dir.display()
        );
        Ok(registry)
    }

    async fn import(&self, path: &Path) -> Result<F::Client> {
        let record = self
            .store
            .load_decrypted(path, self.passphrase.as_deref())
            .await?;
        let client = self.factory.new_client();
        client
            .import(&record, ImportOptions::default())
            .await
            .map_err(|e| match e {
                ClientError::ConnectionRefused(_) => e.into(),
                other => WalletError::Corrupt(format!("{}: {}", path.display(), other)),
            })?;
        Ok(client)
    }

    /// Create and register `name` unless it is already registered.
    ///
    /// Returns `false` without touching anything when the name is taken. A
    /// file for `name` that was not loaded is never overwritten.
    pub async fn create_if_absent(&mut self, name: &str, args: CreateArgs) -> Result<bool> {
        validate_name(name)?;
        if self.wallets.contains_key(name) {
            log::debug!("Wallet {} already registered", name);
            return Ok(false);
        }

        let path = self.path_for(name);
        if self.store.exists(&path).await? {
            return Err(WalletError::AlreadyExists(format!("File \"{}\"", path.display())));
        }

        let client = self.factory.new_client();
        client
            .create_wallet(name, &args.copayer_name, args.m, args.n, args.options)
            .await?;
        let record = client.export().await?;
        self.store
            .save(&path, &record, self.passphrase.as_deref())
            .await?;

        self.wallets.insert(name.to_string(), client);
        log::info!("Created {}-of-{} wallet {}", args.m, args.n, name);
        Ok(true)
    }

    /// Persist the current state of a registered wallet
    pub async fn save(&self, name: &str) -> Result<()> {
        let client = self.get(name)?;
        let record = client.export().await?;
        self.store
            .save(&self.path_for(name), &record, self.passphrase.as_deref())
            .await?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&F::Client> {
        self.wallets
            .get(name)
            .ok_or_else(|| WalletError::NotFound(format!("Wallet \"{}\"", name)))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.wallets.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, WALLET_EXTENSION))
    }
}

fn wallet_name(path: &Path) -> Option<String> {
    if path.extension()? != WALLET_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
    {
        return Err(WalletError::InvalidInput(format!(
            "invalid wallet name \"{}\"",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocalCoordinator;
    use crate::storage::temp_path_for;

    type Registry = WalletRegistry<fn() -> LocalCoordinator>;

    async fn open(dir: &Path) -> Registry {
        WalletRegistry::load_all(LocalCoordinator::new as fn() -> LocalCoordinator, dir, None)
            .await
            .unwrap()
    }

    fn dat_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".dat"))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_create_if_absent_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open(temp_dir.path()).await;

        assert!(registry
            .create_if_absent("alice", CreateArgs::new("Alice", 1, 1))
            .await
            .unwrap());
        assert!(!registry
            .create_if_absent("alice", CreateArgs::new("Alice", 1, 1))
            .await
            .unwrap());

        assert_eq!(registry.len(), 1);
        assert_eq!(dat_files(temp_dir.path()), vec!["alice.dat"]);
    }

    #[tokio::test]
    async fn test_load_all_restores_wallets() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let mut registry = open(temp_dir.path()).await;
            registry
                .create_if_absent("bob", CreateArgs::new("Bob", 1, 1))
                .await
                .unwrap();
            registry
                .create_if_absent("alice", CreateArgs::new("Alice", 2, 3))
                .await
                .unwrap();
        }

        let registry = open(temp_dir.path()).await;
        assert_eq!(registry.names(), vec!["alice", "bob"]);
        assert!(registry.get("bob").unwrap().can_sign().await);
        assert!(matches!(registry.get("carol"), Err(WalletError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_all_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("wallets");
        let registry = open(&dir).await;
        assert!(dir.is_dir());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_fails_whole_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let mut registry = open(temp_dir.path()).await;
            registry
                .create_if_absent("alice", CreateArgs::new("Alice", 1, 1))
                .await
                .unwrap();
        }
        std::fs::write(temp_dir.path().join("broken.dat"), "{\"wallet\":").unwrap();

        let result =
            WalletRegistry::load_all(LocalCoordinator::new as fn() -> LocalCoordinator, temp_dir.path(), None)
                .await;
        assert!(matches!(result, Err(WalletError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_leftover_temp_file_is_ignored() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let mut registry = open(temp_dir.path()).await;
            registry
                .create_if_absent("alice", CreateArgs::new("Alice", 1, 1))
                .await
                .unwrap();
        }
        let leftover = temp_path_for(&temp_dir.path().join("bob.dat"));
        std::fs::write(&leftover, "{\"wallet\":").unwrap();

        let registry = open(temp_dir.path()).await;
        assert_eq!(registry.names(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_unloaded_file_is_never_overwritten() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open(temp_dir.path()).await;
        std::fs::write(temp_dir.path().join("alice.dat"), "{}").unwrap();

        let result = registry
            .create_if_absent("alice", CreateArgs::new("Alice", 1, 1))
            .await;
        assert!(matches!(result, Err(WalletError::AlreadyExists(_))));
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("alice.dat")).unwrap(),
            "{}"
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open(temp_dir.path()).await;
        for name in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                registry.create_if_absent(name, CreateArgs::new("Alice", 1, 1)).await,
                Err(WalletError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_failed_creation_registers_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open(temp_dir.path()).await;

        let result = registry
            .create_if_absent("bad", CreateArgs::new("Alice", 3, 2))
            .await;
        assert!(matches!(result, Err(WalletError::Remote { .. })));
        assert!(registry.is_empty());
        assert!(dat_files(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_save_persists_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = open(temp_dir.path()).await;
        registry
            .create_if_absent("alice", CreateArgs::new("Alice", 1, 1))
            .await
            .unwrap();

        let address = registry.get("alice").unwrap().create_address().await.unwrap();
        registry.save("alice").await.unwrap();

        let reloaded = open(temp_dir.path()).await;
        let addresses = reloaded
            .get("alice")
            .unwrap()
            .get_main_addresses()
            .await
            .unwrap();
        assert_eq!(addresses, vec![address]);
    }
}
