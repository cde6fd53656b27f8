//! Wallet operations behind the CLI
//!
//! Each operation loads the session for its target, talks to the client and,
//! if anything changed, writes the wallet back before returning.

use crate::amount;
use crate::client::{
    ClientFactory, ImportOptions, Network, ProposalOutput, ProposalRequest, ProposalStatus,
    TxProposal, WalletClient, WalletOptions,
};
use crate::config::Config;
use crate::crypto::Envelope;
use crate::error::{Result, WalletError};
use crate::quorum::{BatchOutcome, ProposalEngine, SignatureBatchEntry};
use crate::session::{ResolveOptions, Session, SessionLoader};
use crate::storage::{EncryptedStore, WalletRecord};
use std::path::{Path, PathBuf};

/// Which wallet file to use and how to open it
#[derive(Clone, Debug, Default)]
pub struct WalletTarget {
    pub file: Option<PathBuf>,
    pub password: Option<String>,
}

impl WalletTarget {
    pub fn new(file: Option<PathBuf>, password: Option<String>) -> Self {
        Self { file, password }
    }

    fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct CreateWalletArgs {
    pub name: String,
    pub copayer_name: String,
    pub m: u8,
    pub n: u8,
    pub network: Network,
}

#[derive(Clone, Debug, Default)]
pub struct ImportArgs {
    /// Password the export was sealed with
    pub export_password: Option<String>,
    pub read_only: bool,
}

/// A payment to propose
#[derive(Clone, Debug)]
pub struct Payment {
    pub to: String,
    /// Smallest unit
    pub amount: u64,
    pub note: Option<String>,
    pub fee_per_kb: Option<u64>,
}

pub enum SignRequest {
    /// Sign one proposal with this copayer's key
    Single(String),
    /// Apply signatures collected elsewhere
    Batch {
        entries: Vec<SignatureBatchEntry>,
        filter: Option<String>,
    },
}

pub enum SignResult {
    Single(TxProposal),
    Batch(Vec<BatchOutcome>),
}

/// High-level wallet operations over one wallet file per call
pub struct WalletService<F: ClientFactory> {
    loader: SessionLoader<F>,
    store: EncryptedStore,
}

impl<F: ClientFactory> WalletService<F> {
    pub fn new(factory: F, config: Config) -> Self {
        Self {
            loader: SessionLoader::new(factory, config),
            store: EncryptedStore::new(),
        }
    }

    pub fn loader(&self) -> &SessionLoader<F> {
        &self.loader
    }

    fn config(&self) -> &Config {
        self.loader.config()
    }

    async fn open(&self, target: &WalletTarget) -> Result<Session<F::Client>> {
        self.loader
            .resolve(target.file(), &ResolveOptions::existing(target.password.clone()))
            .await
    }

    /// Create a wallet in a new file. Returns the join secret for the other
    /// copayers, if any are expected.
    pub async fn create_wallet(
        &self,
        target: &WalletTarget,
        args: CreateWalletArgs,
    ) -> Result<Option<String>> {
        let options = ResolveOptions {
            must_be_new: true,
            do_not_complete: true,
            passphrase: target.password.clone(),
            ..ResolveOptions::default()
        };
        let session = self.loader.resolve(target.file(), &options).await?;

        let secret = session
            .client
            .create_wallet(
                &args.name,
                &args.copayer_name,
                args.m,
                args.n,
                WalletOptions {
                    network: args.network,
                },
            )
            .await?;
        self.loader.save(&session).await?;

        log::info!(
            "Wallet {} created ({}-of-{}) at {}",
            args.name,
            args.m,
            args.n,
            session.path.display()
        );
        Ok(secret)
    }

    pub async fn get_wallet(&self, target: &WalletTarget) -> Result<Session<F::Client>> {
        self.open(target).await
    }

    /// Import an exported wallet into a new file. Returns whether the imported
    /// wallet can sign.
    pub async fn import_wallet(
        &self,
        target: &WalletTarget,
        import_file: &Path,
        args: ImportArgs,
    ) -> Result<bool> {
        let session = self
            .loader
            .resolve(target.file(), &ResolveOptions::new_wallet(target.password.clone()))
            .await?;

        let record = self
            .store
            .load_decrypted(import_file, args.export_password.as_deref())
            .await?;
        session
            .client
            .import(
                &record,
                ImportOptions {
                    read_only: args.read_only,
                },
            )
            .await
            .map_err(|e| WalletError::from(e).tagged("Import"))?;
        self.loader.save(&session).await?;

        let can_sign = session.client.can_sign().await;
        log::info!(
            "Imported {} into {}",
            import_file.display(),
            session.path.display()
        );
        Ok(can_sign)
    }

    pub async fn create_address(&self, target: &WalletTarget) -> Result<String> {
        let session = self.open(target).await?;
        let address = session.client.create_address().await?;
        self.loader.save(&session).await?;
        Ok(address)
    }

    pub async fn get_addresses(&self, target: &WalletTarget) -> Result<Vec<String>> {
        let session = self.open(target).await?;
        Ok(session.client.get_main_addresses().await?)
    }

    /// `* Wallet balance <total> (Locked <locked>)`
    pub async fn get_balance(&self, target: &WalletTarget) -> Result<String> {
        let session = self.open(target).await?;
        let balance = session.client.get_balance().await?;
        let unit = self.config().unit;
        Ok(format!(
            "* Wallet balance {} (Locked {})",
            amount::render(balance.total_amount, unit),
            amount::render(balance.locked_amount, unit)
        ))
    }

    /// Create and publish a proposal for `payment`
    pub async fn generate_transaction(
        &self,
        target: &WalletTarget,
        payment: Payment,
    ) -> Result<TxProposal> {
        if payment.to.trim().is_empty() {
            return Err(WalletError::InvalidInput("destination address is empty".to_string()));
        }
        if payment.amount == 0 {
            return Err(WalletError::InvalidInput("amount must be positive".to_string()));
        }

        let session = self.open(target).await?;
        let request = ProposalRequest {
            outputs: vec![ProposalOutput {
                to_address: payment.to,
                amount: payment.amount,
            }],
            message: Some(
                payment
                    .note
                    .unwrap_or_else(|| self.config().default_note.clone()),
            ),
            fee_per_kb: payment.fee_per_kb.unwrap_or(self.config().fee_per_kb),
        };

        let mut proposal = session.client.create_tx_proposal(request).await?;
        session.client.publish_tx_proposal(&proposal).await?;
        proposal.status = ProposalStatus::Pending;
        self.loader.save(&session).await?;

        log::info!("Created transaction proposal {}", proposal.id);
        Ok(proposal)
    }

    pub async fn list_proposals(&self, target: &WalletTarget) -> Result<Vec<String>> {
        let session = self.open(target).await?;
        ProposalEngine::new(&session.client, self.config().unit)
            .list()
            .await
    }

    pub async fn sign_transaction(
        &self,
        target: &WalletTarget,
        request: SignRequest,
    ) -> Result<SignResult> {
        let session = self.open(target).await?;
        let engine = ProposalEngine::new(&session.client, self.config().unit);

        let result = match request {
            SignRequest::Single(short_id) => SignResult::Single(engine.sign(&short_id).await?),
            SignRequest::Batch { entries, filter } => {
                SignResult::Batch(engine.apply_batch(&entries, filter.as_deref()).await?)
            }
        };
        self.loader.save(&session).await?;
        Ok(result)
    }

    pub async fn reject_transaction(
        &self,
        target: &WalletTarget,
        short_id: &str,
        comment: Option<&str>,
    ) -> Result<TxProposal> {
        let session = self.open(target).await?;
        let rejected = ProposalEngine::new(&session.client, self.config().unit)
            .reject(short_id, comment)
            .await?;
        self.loader.save(&session).await?;
        Ok(rejected)
    }

    /// Broadcast a fully signed proposal; returns the txid
    pub async fn broadcast_transaction(
        &self,
        target: &WalletTarget,
        short_id: &str,
    ) -> Result<String> {
        let session = self.open(target).await?;
        let txid = ProposalEngine::new(&session.client, self.config().unit)
            .broadcast(short_id)
            .await?;
        self.loader.save(&session).await?;
        Ok(txid)
    }

    /// The wallet export as JSON text, sealed when `export_password` is given
    pub async fn export_wallet(
        &self,
        target: &WalletTarget,
        export_password: Option<&str>,
    ) -> Result<String> {
        let record = self.export_record(target).await?;
        match export_password {
            Some(password) => Ok(Envelope::seal(record.as_str(), password)?.to_json()?),
            None => Ok(record.into_string()),
        }
    }

    /// Write the wallet export to `output`
    pub async fn export_wallet_to(
        &self,
        target: &WalletTarget,
        output: &Path,
        export_password: Option<&str>,
    ) -> Result<()> {
        let record = self.export_record(target).await?;
        self.store.save(output, &record, export_password).await?;
        log::info!("Exported wallet to {}", output.display());
        Ok(())
    }

    async fn export_record(&self, target: &WalletTarget) -> Result<WalletRecord> {
        let session = self.open(target).await?;
        Ok(session.client.export().await?)
    }

    /// Remove the wallet file; returns the path that was deleted
    pub async fn delete_wallet(&self, target: &WalletTarget) -> Result<PathBuf> {
        self.loader.delete(target.file()).await
    }
}
