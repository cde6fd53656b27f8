//! Turns a wallet file into a ready-to-use client session

use crate::client::{ClientError, ClientFactory, Completion, ImportOptions, WalletClient};
use crate::config::Config;
use crate::crypto::EnvelopeError;
use crate::error::{Result, WalletError};
use crate::storage::{EncryptedStore, StoreError};
use std::path::{Path, PathBuf};

/// How a session should treat the wallet file
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    /// Fail with `NotFound` when the file is missing
    pub must_exist: bool,
    /// Fail with `AlreadyExists` when the file is present
    pub must_be_new: bool,
    /// Skip the open/complete step after import
    pub do_not_complete: bool,
    pub passphrase: Option<String>,
}

impl ResolveOptions {
    pub fn existing(passphrase: Option<String>) -> Self {
        Self {
            must_exist: true,
            passphrase,
            ..Self::default()
        }
    }

    pub fn new_wallet(passphrase: Option<String>) -> Self {
        Self {
            must_be_new: true,
            passphrase,
            ..Self::default()
        }
    }
}

/// A client bound to the file it was loaded from
pub struct Session<C> {
    pub client: C,
    pub path: PathBuf,
    /// Reused for every save so the file keeps its protection
    pub passphrase: Option<String>,
    /// Set when loading this session completed the copayer set
    pub just_completed: bool,
}

impl<C> Session<C> {
    /// Backup reminder for a wallet that was completed by this load
    pub fn completion_notice(&self) -> Option<String> {
        self.just_completed.then(|| {
            format!(
                "Your wallet has just been completed. Please backup your wallet file {} or use the export command.",
                self.path.display()
            )
        })
    }
}

/// Resolves wallet files into sessions
pub struct SessionLoader<F> {
    factory: F,
    store: EncryptedStore,
    config: Config,
}

impl<F: ClientFactory> SessionLoader<F> {
    pub fn new(factory: F, config: Config) -> Self {
        Self {
            factory,
            store: EncryptedStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where a session for `explicit` would be stored
    pub fn path_for(&self, explicit: Option<&Path>) -> PathBuf {
        self.config.wallet_path(explicit)
    }

    /// Load the wallet at the resolved path into a fresh client.
    ///
    /// A missing file yields an empty client unless `must_exist` is set. After
    /// import the wallet is opened, and if that completes its copayer set for
    /// the first time the completed state is written back immediately.
    pub async fn resolve(
        &self,
        explicit: Option<&Path>,
        options: &ResolveOptions,
    ) -> Result<Session<F::Client>> {
        let path = self.path_for(explicit);
        let client = self.factory.new_client();
        let passphrase = options.passphrase.clone();

        // Presence alone decides must_be_new, readable or not
        if options.must_be_new && self.store.exists(&path).await? {
            return Err(WalletError::AlreadyExists(format!(
                "File \"{}\"",
                path.display()
            )));
        }

        let stored = match self.store.load(&path).await {
            Ok(stored) => stored,
            Err(StoreError::NotFound(_)) if !options.must_exist => {
                log::debug!("No wallet at {}, starting empty", path.display());
                return Ok(Session {
                    client,
                    path,
                    passphrase,
                    just_completed: false,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let record = stored
            .decrypt(passphrase.as_deref())
            .map_err(|e| match e {
                EnvelopeError::Malformed(reason) => {
                    WalletError::Corrupt(format!("{}: {}", path.display(), reason))
                }
                other => other.into(),
            })?;

        client
            .import(&record, ImportOptions::default())
            .await
            .map_err(|e| match e {
                ClientError::ConnectionRefused(_) => e.into(),
                other => WalletError::Corrupt(format!("{}: {}", path.display(), other)),
            })?;
        log::debug!("Loaded wallet from {}", path.display());

        let mut session = Session {
            client,
            path,
            passphrase,
            just_completed: false,
        };

        if !options.do_not_complete {
            let completion = session.client.open_wallet().await?;
            if completion == Completion::JustCompleted {
                self.save(&session).await?;
                session.just_completed = true;
            }
        }
        if let Some(notice) = session.completion_notice() {
            log::warn!("{}", notice);
        }

        Ok(session)
    }

    /// Write the session's current wallet state back to its file
    pub async fn save(&self, session: &Session<F::Client>) -> Result<()> {
        let record = session.client.export().await?;
        self.store
            .save(&session.path, &record, session.passphrase.as_deref())
            .await?;
        Ok(())
    }

    /// Remove the wallet file at the resolved path
    pub async fn delete(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        let path = self.path_for(explicit);
        self.store.delete(&path).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LocalCoordinator, WalletOptions};
    use tempfile::TempDir;

    fn loader(home: &TempDir) -> SessionLoader<fn() -> LocalCoordinator> {
        SessionLoader::new(
            LocalCoordinator::new as fn() -> LocalCoordinator,
            Config::with_home(home.path()),
        )
    }

    async fn created(
        loader: &SessionLoader<fn() -> LocalCoordinator>,
        m: u8,
        n: u8,
        passphrase: Option<&str>,
    ) -> Session<LocalCoordinator> {
        let session = loader
            .resolve(None, &ResolveOptions::new_wallet(passphrase.map(String::from)))
            .await
            .unwrap();
        session
            .client
            .create_wallet("Sample", "Drew", m, n, WalletOptions::default())
            .await
            .unwrap();
        loader.save(&session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_missing_file() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);

        let err = loader
            .resolve(None, &ResolveOptions::existing(None))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WalletError::NotFound(ref what) if what.contains(".wallet.dat")));

        // Without must_exist an empty client comes back
        let session = loader.resolve(None, &ResolveOptions::default()).await.unwrap();
        assert!(session.client.export().await.is_err());
        assert_eq!(session.path, home.path().join(".walletsrc").join(".wallet.dat"));
    }

    #[tokio::test]
    async fn test_must_be_new_refuses_existing_file() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        created(&loader, 1, 1, None).await;

        let result = loader.resolve(None, &ResolveOptions::new_wallet(None)).await;
        assert!(matches!(result, Err(WalletError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_must_be_new_refuses_unreadable_file() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        let path = loader.path_for(None);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json at all").unwrap();

        let result = loader.resolve(None, &ResolveOptions::new_wallet(None)).await;
        assert!(matches!(result, Err(WalletError::AlreadyExists(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json at all");
    }

    #[tokio::test]
    async fn test_explicit_path_wins() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        let explicit = home.path().join("other.dat");

        let session = loader.resolve(Some(&explicit), &ResolveOptions::default()).await.unwrap();
        assert_eq!(session.path, explicit);
    }

    #[tokio::test]
    async fn test_encrypted_wallet_needs_right_passphrase() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        created(&loader, 1, 1, Some("s3cret")).await;

        for passphrase in [None, Some("guess".to_string())] {
            let result = loader.resolve(None, &ResolveOptions::existing(passphrase)).await;
            assert!(matches!(result, Err(WalletError::WrongPassword)));
        }

        let session = loader
            .resolve(None, &ResolveOptions::existing(Some("s3cret".to_string())))
            .await
            .unwrap();
        assert!(session.client.can_sign().await);
    }

    #[tokio::test]
    async fn test_tampered_kdf_cost_is_corrupt() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        created(&loader, 1, 1, Some("s3cret")).await;

        let path = loader.path_for(None);
        let mut envelope: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        envelope["mem"] = serde_json::json!(4_000_000_000u32);
        std::fs::write(&path, envelope.to_string()).unwrap();

        let result = loader
            .resolve(None, &ResolveOptions::existing(Some("s3cret".to_string())))
            .await;
        assert!(matches!(result, Err(WalletError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_unimportable_file_is_corrupt() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        let path = loader.path_for(None);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        std::fs::write(&path, r#"{"hello":"world"}"#).unwrap();
        let result = loader.resolve(None, &ResolveOptions::existing(None)).await;
        assert!(matches!(result, Err(WalletError::Corrupt(_))));

        std::fs::write(&path, "not json at all").unwrap();
        let result = loader.resolve(None, &ResolveOptions::existing(None)).await;
        assert!(matches!(result, Err(WalletError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_completion_is_persisted_once() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        let session = created(&loader, 2, 2, None).await;
        session.client.join_copayer("Ana").await.unwrap();
        loader.save(&session).await.unwrap();

        let path = loader.path_for(None);
        let before = std::fs::read_to_string(&path).unwrap();
        assert!(before.contains("\"completionReported\":false"));

        // do_not_complete leaves the file alone
        let options = ResolveOptions {
            must_exist: true,
            do_not_complete: true,
            ..ResolveOptions::default()
        };
        let session = loader.resolve(None, &options).await.unwrap();
        assert!(session.completion_notice().is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        let session = loader.resolve(None, &ResolveOptions::existing(None)).await.unwrap();
        assert!(session.just_completed);
        let notice = session.completion_notice().unwrap();
        assert!(notice.contains("just been completed"));
        assert!(notice.contains(".wallet.dat"));
        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.contains("\"completionReported\":true"));

        // Already complete: nothing more to write
        let session = loader.resolve(None, &ResolveOptions::existing(None)).await.unwrap();
        assert!(!session.just_completed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), after);
    }

    #[tokio::test]
    async fn test_completion_keeps_encryption() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        let session = created(&loader, 2, 2, Some("s3cret")).await;
        session.client.join_copayer("Ana").await.unwrap();
        loader.save(&session).await.unwrap();

        loader
            .resolve(None, &ResolveOptions::existing(Some("s3cret".to_string())))
            .await
            .unwrap();
        let raw = std::fs::read_to_string(loader.path_for(None)).unwrap();
        assert!(raw.contains("\"ct\""));
        assert!(!raw.contains("completionReported"));
    }

    #[tokio::test]
    async fn test_delete() {
        let home = tempfile::tempdir().unwrap();
        let loader = loader(&home);
        created(&loader, 1, 1, None).await;

        let path = loader.delete(None).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(
            loader.delete(None).await,
            Err(WalletError::NotFound(_))
        ));
    }
}
