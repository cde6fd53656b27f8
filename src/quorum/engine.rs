//! Proposal operations against a live client

use super::batch::{sign_all, BatchOutcome, SignatureBatchEntry};
use super::lookup::find_by_short_id;
use super::render::render_proposals;
use crate::amount::Unit;
use crate::client::{TxProposal, WalletClient};
use crate::error::{Result, WalletError};

/// Resolves short ids against the client's pending proposals and acts on them
pub struct ProposalEngine<'a, C: ?Sized> {
    client: &'a C,
    unit: Unit,
}

impl<'a, C> ProposalEngine<'a, C>
where
    C: WalletClient + ?Sized,
{
    pub fn new(client: &'a C, unit: Unit) -> Self {
        Self { client, unit }
    }

    /// Fetch pending proposals, refusing any the engine cannot interpret
    pub async fn pending(&self) -> Result<Vec<TxProposal>> {
        let proposals = self.client.get_tx_proposals().await?;
        for proposal in &proposals {
            proposal
                .validate()
                .map_err(|message| WalletError::Remote {
                    context: "Coordination service".to_string(),
                    message,
                })?;
        }
        log::debug!("Fetched {} pending proposal(s)", proposals.len());
        Ok(proposals)
    }

    /// Rendered listing of the pending proposals
    pub async fn list(&self) -> Result<Vec<String>> {
        let proposals = self.pending().await?;
        Ok(render_proposals(&proposals, self.unit))
    }

    pub async fn find(&self, short_id: &str) -> Result<TxProposal> {
        let proposals = self.pending().await?;
        find_by_short_id(&proposals, short_id, self.unit).cloned()
    }

    /// Accept the proposal matching `short_id` with this copayer's key
    pub async fn sign(&self, short_id: &str) -> Result<TxProposal> {
        let proposal = self.find(short_id).await?;
        let signed = self
            .client
            .sign_tx_proposal(&proposal)
            .await
            .map_err(|e| WalletError::from(e).tagged(proposal.short_id()))?;
        log::info!("Transaction {} signed", proposal.id);
        Ok(signed)
    }

    /// Broadcast the proposal matching `short_id`; returns the txid
    pub async fn broadcast(&self, short_id: &str) -> Result<String> {
        let proposal = self.find(short_id).await?;
        let receipt = self
            .client
            .broadcast(&proposal)
            .await
            .map_err(|e| WalletError::from(e).tagged(proposal.short_id()))?;
        log::info!("Transaction {} broadcasted as {}", proposal.id, receipt.txid);
        Ok(receipt.txid)
    }

    pub async fn reject(&self, short_id: &str, comment: Option<&str>) -> Result<TxProposal> {
        let proposal = self.find(short_id).await?;
        let rejected = self
            .client
            .reject_tx_proposal(&proposal, comment)
            .await
            .map_err(|e| WalletError::from(e).tagged(proposal.short_id()))?;
        log::info!("Transaction {} rejected", proposal.id);
        Ok(rejected)
    }

    /// Sign pending proposals with signatures collected in `batch`.
    ///
    /// With `filter` only the proposal it names is considered. Without it every
    /// pending proposal is, and having none at all is `NoPendingWork`. One
    /// outcome is returned per proposal that had a batch entry.
    pub async fn apply_batch(
        &self,
        batch: &[SignatureBatchEntry],
        filter: Option<&str>,
    ) -> Result<Vec<BatchOutcome>> {
        let proposals = self.pending().await?;
        apply_batch(self.client, &proposals, batch, filter, self.unit).await
    }
}

/// Batch signing over an already fetched proposal list
pub async fn apply_batch<C>(
    client: &C,
    proposals: &[TxProposal],
    batch: &[SignatureBatchEntry],
    filter: Option<&str>,
    unit: Unit,
) -> Result<Vec<BatchOutcome>>
where
    C: WalletClient + ?Sized,
{
    let selected: Vec<&TxProposal> = match filter {
        Some(short_id) => vec![find_by_short_id(proposals, short_id, unit)?],
        None => {
            let pending: Vec<&TxProposal> = proposals.iter().filter(|p| p.is_pending()).collect();
            if pending.is_empty() {
                return Err(WalletError::NoPendingWork(
                    "There are no pending transaction proposals.".to_string(),
                ));
            }
            pending
        }
    };

    let outcomes = sign_all(client, &selected, batch).await;
    let failed = outcomes.iter().filter(|o| !o.is_signed()).count();
    log::debug!(
        "Batch signing: {} selected, {} submitted, {} failed",
        selected.len(),
        outcomes.len(),
        failed
    );
    Ok(outcomes)
}
