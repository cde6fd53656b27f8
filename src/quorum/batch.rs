//! Batch signing from externally collected signatures

use crate::client::{TxProposal, WalletClient};
use crate::error::{Result, WalletError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signatures gathered elsewhere for one proposal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBatchEntry {
    #[serde(rename = "txpId")]
    pub txp_id: String,
    pub signatures: Vec<String>,
}

/// Parse a batch file: a JSON array of `{"txpId": …, "signatures": […]}`
pub fn parse_batch(text: &str) -> Result<Vec<SignatureBatchEntry>> {
    serde_json::from_str(text)
        .map_err(|e| WalletError::InvalidInput(format!("signature batch: {}", e)))
}

/// What happened to one proposal of a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    Signed(String),
    SignFailed { id: String, reason: String },
}

impl BatchOutcome {
    pub fn id(&self) -> &str {
        match self {
            BatchOutcome::Signed(id) => id,
            BatchOutcome::SignFailed { id, .. } => id,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, BatchOutcome::Signed(_))
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOutcome::Signed(id) => write!(f, "Transaction {} signed by you.", id),
            BatchOutcome::SignFailed { id, reason } => {
                write!(f, "Transaction {} could not be signed: {}", id, reason)
            }
        }
    }
}

/// Attach each entry's signatures to its proposal and submit all of them
/// concurrently. Proposals without an entry are left alone. Every submission
/// is awaited; outcomes come back in the order of `selected`.
pub async fn sign_all<C>(
    client: &C,
    selected: &[&TxProposal],
    batch: &[SignatureBatchEntry],
) -> Vec<BatchOutcome>
where
    C: WalletClient + ?Sized,
{
    let calls = selected.iter().filter_map(|proposal| {
        let signatures = signatures_for(batch, &proposal.id)?;
        let mut proposal = (*proposal).clone();
        proposal.signatures = Some(signatures);

        Some(async move {
            match client.sign_tx_proposal(&proposal).await {
                Ok(_) => BatchOutcome::Signed(proposal.id),
                Err(e) => BatchOutcome::SignFailed {
                    id: proposal.id,
                    reason: e.to_string(),
                },
            }
        })
    });

    join_all(calls).await
}

/// Signatures of every entry for `txp_id`, in batch order and without
/// repeats. `None` when the batch has no entry for it.
fn signatures_for(batch: &[SignatureBatchEntry], txp_id: &str) -> Option<Vec<String>> {
    let entries: Vec<&SignatureBatchEntry> =
        batch.iter().filter(|e| e.txp_id == txp_id).collect();
    if entries.is_empty() {
        return None;
    }
    if entries.len() > 1 {
        log::debug!("Merging {} batch entries for {}", entries.len(), txp_id);
    }

    let mut signatures: Vec<String> = Vec::new();
    for signature in entries.iter().flat_map(|e| &e.signatures) {
        if !signatures.contains(signature) {
            signatures.push(signature.clone());
        }
    }
    Some(signatures)
}
