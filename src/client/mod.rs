//! Boundary to the wallet coordination service
//!
//! The service owns address derivation, proposal lifecycle and broadcast. This
//! crate only consumes it through [`WalletClient`]. [`LocalCoordinator`] is the
//! in-process implementation used by the CLI and the tests.

pub mod local;
pub mod types;

pub use local::LocalCoordinator;
pub use types::{
    short_id, ActionType, Balance, BroadcastReceipt, Completion, ImportOptions, Network,
    ProposalAction, ProposalOutput, ProposalRequest, ProposalStatus, TxProposal,
    WalletOptions, SHORT_ID_LEN,
};

use crate::storage::WalletRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by the coordination service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("connection refused by {0}")]
    ConnectionRefused(String),
    #[error("{0}")]
    Remote(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Operations the coordination service offers a copayer
#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Register a new m-of-n wallet with this client as its first copayer.
    /// Returns the join secret when other copayers are still expected.
    async fn create_wallet(
        &self,
        name: &str,
        copayer_name: &str,
        m: u8,
        n: u8,
        options: WalletOptions,
    ) -> ClientResult<Option<String>>;

    /// Load credentials previously produced by [`WalletClient::export`]
    async fn import(&self, record: &WalletRecord, options: ImportOptions) -> ClientResult<()>;

    async fn export(&self) -> ClientResult<WalletRecord>;

    /// Join the wallet's remaining setup and report whether the quorum is complete
    async fn open_wallet(&self) -> ClientResult<Completion>;

    async fn create_address(&self) -> ClientResult<String>;

    async fn get_main_addresses(&self) -> ClientResult<Vec<String>>;

    async fn get_balance(&self) -> ClientResult<Balance>;

    /// Proposals still collecting signatures or waiting for broadcast
    async fn get_tx_proposals(&self) -> ClientResult<Vec<TxProposal>>;

    async fn create_tx_proposal(&self, request: ProposalRequest) -> ClientResult<TxProposal>;

    /// Make a freshly created proposal visible to the other copayers
    async fn publish_tx_proposal(&self, proposal: &TxProposal) -> ClientResult<()>;

    /// Accept a proposal. Signatures attached to `proposal` are used when
    /// present; otherwise the client signs with its own key.
    async fn sign_tx_proposal(&self, proposal: &TxProposal) -> ClientResult<TxProposal>;

    async fn reject_tx_proposal(
        &self,
        proposal: &TxProposal,
        reason: Option<&str>,
    ) -> ClientResult<TxProposal>;

    async fn broadcast(&self, proposal: &TxProposal) -> ClientResult<BroadcastReceipt>;

    async fn can_sign(&self) -> bool;
}

/// Builds fresh, empty clients
pub trait ClientFactory: Send + Sync {
    type Client: WalletClient;

    fn new_client(&self) -> Self::Client;
}

impl<C, F> ClientFactory for F
where
    C: WalletClient,
    F: Fn() -> C + Send + Sync,
{
    type Client = C;

    fn new_client(&self) -> C {
        self()
    }
}
