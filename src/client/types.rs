//! Data exchanged with the coordination service
//!
//! Field names follow the service's camelCase wire format. Everything that
//! arrives from the service is checked with [`TxProposal::validate`] before the
//! quorum engine looks at it.

use serde::{Deserialize, Serialize};

/// Number of trailing id characters used as the human-friendly handle
pub const SHORT_ID_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Livenet,
    Testnet,
}

/// Extra options for wallet creation
#[derive(Clone, Debug, Default)]
pub struct WalletOptions {
    pub network: Network,
}

#[derive(Clone, Debug, Default)]
pub struct ImportOptions {
    /// Drop the signing key, keeping a watch-only copy
    pub read_only: bool,
}

/// Result of opening a wallet against the service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Still waiting for copayers to join
    Pending,
    AlreadyComplete,
    /// The last copayer joined since the wallet was last opened. Reported once.
    JustCompleted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub total_amount: u64,
    pub locked_amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalOutput {
    pub to_address: String,
    pub amount: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Accept,
    Reject,
}

/// A copayer's vote on a proposal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAction {
    pub copayer_id: String,
    pub copayer_name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Signatures that came with an accept
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Created but not yet published to the other copayers
    Temporary,
    Pending,
    Accepted,
    Rejected,
    Broadcasted,
}

/// A partially signed transaction waiting for its quorum
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxProposal {
    pub id: String,
    pub creator_name: String,
    #[serde(default)]
    pub message: Option<String>,
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
    pub outputs: Vec<ProposalOutput>,
    pub required_signatures: u32,
    #[serde(default)]
    pub actions: Vec<ProposalAction>,
    pub status: ProposalStatus,
    /// Signatures produced elsewhere, attached before a sign request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    pub created_on: i64,
}

impl TxProposal {
    /// Last four characters of the id
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    pub fn accept_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == ActionType::Accept)
            .count()
    }

    pub fn reject_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == ActionType::Reject)
            .count()
    }

    /// Accepts still needed before broadcast; never negative
    pub fn missing_signatures(&self) -> u32 {
        (self.required_signatures as usize).saturating_sub(self.accept_count()) as u32
    }

    pub fn is_ready(&self) -> bool {
        self.missing_signatures() == 0
    }

    /// Whether the proposal can still collect signatures or be broadcast
    pub fn is_pending(&self) -> bool {
        matches!(
            self.status,
            ProposalStatus::Pending | ProposalStatus::Accepted
        )
    }

    pub fn has_acted(&self, copayer_id: &str) -> bool {
        self.actions.iter().any(|a| a.copayer_id == copayer_id)
    }

    /// Reject shapes the quorum engine cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("transaction proposal without id".to_string());
        }
        if self.required_signatures == 0 {
            return Err(format!(
                "transaction proposal {} requires zero signatures",
                self.id
            ));
        }
        if self.outputs.is_empty() {
            return Err(format!("transaction proposal {} has no outputs", self.id));
        }
        Ok(())
    }
}

/// Last [`SHORT_ID_LEN`] characters of an id, or the whole id when shorter
pub fn short_id(id: &str) -> &str {
    match id.char_indices().rev().nth(SHORT_ID_LEN - 1) {
        Some((idx, _)) => &id[idx..],
        None => id,
    }
}

/// What the caller wants to pay
#[derive(Clone, Debug)]
pub struct ProposalRequest {
    pub outputs: Vec<ProposalOutput>,
    pub message: Option<String>,
    pub fee_per_kb: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub txid: String,
}


#[cfg(test)]
mod tests {
    use super::fixtures::proposal;
    use super::*;

    #[test]
    fn test_missing_signatures() {
        assert_eq!(proposal("p", 2, 0).missing_signatures(), 2);
        assert_eq!(proposal("p", 2, 1).missing_signatures(), 1);
        assert!(proposal("p", 2, 2).is_ready());
        // Extra accepts saturate at zero
        assert_eq!(proposal("p", 1, 3).missing_signatures(), 0);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("5f2a9c01beef"), "beef");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(proposal("0000aaaa", 1, 0).short_id(), "aaaa");
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::to_value(proposal("0000aaaa", 2, 1)).unwrap();
        assert_eq!(json["requiredSignatures"], 2);
        assert_eq!(json["actions"][0]["type"], "accept");
        assert_eq!(json["outputs"][0]["toAddress"], "1BoatSLRHtKNngkdXEeobR76b53LETtpyT");
        assert!(json.get("signatures").is_none());
    }

    #[test]
    fn test_unexpected_shape_is_rejected() {
        let bad = r#"{"id":"x","creatorName":"a","amount":"lots","outputs":[],
            "requiredSignatures":1,"status":"pending","createdOn":0}"#;
        assert!(serde_json::from_str::<TxProposal>(bad).is_err());

        let unknown_status = r#"{"id":"x","creatorName":"a","amount":1,"outputs":[],
            "requiredSignatures":1,"status":"limbo","createdOn":0}"#;
        assert!(serde_json::from_str::<TxProposal>(unknown_status).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(proposal("abcd", 1, 0).validate().is_ok());

        let mut p = proposal("abcd", 1, 0);
        p.outputs.clear();
        assert!(p.validate().is_err());

        let p = proposal("abcd", 0, 0);
        assert!(p.validate().is_err());
    }
}
