//! Short-id resolution

use super::render::render_proposals;
use crate::amount::Unit;
use crate::client::TxProposal;
use crate::error::{Result, WalletError};

/// The single proposal whose id ends with `short_id`.
///
/// No match is `NotFound`; several matches are `Ambiguous` and carry the
/// rendered candidates so the user can pick a longer id.
pub fn find_by_short_id<'a>(
    proposals: &'a [TxProposal],
    short_id: &str,
    unit: Unit,
) -> Result<&'a TxProposal> {
    let short_id = short_id.trim();
    if short_id.is_empty() {
        return Err(WalletError::InvalidInput(
            "transaction proposal id is empty".to_string(),
        ));
    }

    let matches: Vec<&TxProposal> = proposals
        .iter()
        .filter(|p| p.id.ends_with(short_id))
        .collect();

    match matches.as_slice() {
        [] => Err(WalletError::NotFound(format!("TX Proposal {}", short_id))),
        [only] => Ok(*only),
        _ => {
            let candidates: Vec<TxProposal> = matches.iter().map(|p| (*p).clone()).collect();
            Err(WalletError::Ambiguous {
                short_id: short_id.to_string(),
                candidates: render_proposals(&candidates, unit),
            })
        }
    }
}
