//! In-process coordination service
//!
//! Holds the service-side view of one M-of-N wallet (copayers, addresses,
//! funds and pending proposals) inside the client itself, so a wallet export
//! carries it between runs. Other copayers can be simulated with
//! [`LocalCoordinator::join_copayer`] and [`LocalCoordinator::sign_as`].

use super::types::{
    ActionType, Balance, BroadcastReceipt, Completion, ImportOptions, Network, ProposalAction,
    ProposalRequest, ProposalStatus, TxProposal, WalletOptions,
};
use super::{ClientError, ClientResult, WalletClient};
use crate::crypto::{base58check, double_sha256, hash160, sha256, sha256_hex, CopayerKey};
use crate::storage::WalletRecord;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Largest copayer set a wallet may have
pub const MAX_COPAYERS: u8 = 15;

// Size estimate for fee calculation (bytes)
const BASE_TX_SIZE: u64 = 10;
const INPUT_SIZE: u64 = 180;
const OUTPUT_SIZE: u64 = 34;
const SIGNATURE_SIZE: u64 = 73;
const PUBKEY_SIZE: u64 = 33;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Copayer {
    id: String,
    name: String,
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
}

impl Copayer {
    fn generate(name: &str) -> Self {
        let key = CopayerKey::generate();
        let public_key = key.public_key_hex();
        Self {
            id: sha256_hex(public_key.as_bytes())[..16].to_string(),
            name: name.to_string(),
            public_key,
            private_key: key.private_key_hex(),
        }
    }

    fn key(&self) -> ClientResult<CopayerKey> {
        let key = match &self.private_key {
            Some(secret) => CopayerKey::from_private_key_hex(secret),
            None => CopayerKey::from_public_key_hex(&self.public_key),
        };
        key.map_err(|e| ClientError::InvalidResponse(format!("copayer {}: {}", self.name, e)))
    }

    fn sign(&self, digest: &[u8]) -> ClientResult<String> {
        self.key()?
            .sign(digest)
            .map_err(|e| ClientError::Remote(format!("{} cannot sign: {}", self.name, e)))
    }

    fn accept(&self, signatures: Vec<String>) -> ProposalAction {
        ProposalAction {
            copayer_id: self.id.clone(),
            copayer_name: self.name.clone(),
            action_type: ActionType::Accept,
            comment: None,
            signatures,
        }
    }

    fn reject(&self, comment: Option<&str>) -> ProposalAction {
        ProposalAction {
            copayer_id: self.id.clone(),
            copayer_name: self.name.clone(),
            action_type: ActionType::Reject,
            comment: comment.map(str::to_string),
            signatures: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletState {
    wallet_id: String,
    name: String,
    m: u8,
    n: u8,
    network: Network,
    /// The copayer this client acts as
    copayer_id: String,
    copayers: Vec<Copayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    #[serde(default)]
    completion_reported: bool,
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    balance: u64,
    #[serde(default)]
    proposals: Vec<TxProposal>,
}

impl WalletState {
    fn is_complete(&self) -> bool {
        self.copayers.len() == self.n as usize
    }

    fn ensure_complete(&self) -> ClientResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(ClientError::Remote(format!(
                "Wallet is not complete: {} of {} copayers joined",
                self.copayers.len(),
                self.n
            )))
        }
    }

    fn own_copayer(&self) -> ClientResult<&Copayer> {
        self.copayers
            .iter()
            .find(|c| c.id == self.copayer_id)
            .ok_or_else(|| ClientError::InvalidResponse("own copayer missing".to_string()))
    }

    fn copayer_named(&self, name: &str) -> ClientResult<&Copayer> {
        self.copayers
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ClientError::Remote(format!("Copayer not found: {}", name)))
    }

    fn locked_amount(&self) -> ClientResult<u64> {
        self.proposals
            .iter()
            .filter(|p| p.is_pending())
            .try_fold(0u64, |total, p| {
                total.checked_add(p.amount)?.checked_add(p.fee)
            })
            .ok_or_else(invalid_amount)
    }

    fn proposal_mut(&mut self, id: &str) -> ClientResult<&mut TxProposal> {
        self.proposals
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ClientError::Remote(format!("Transaction proposal not found: {}", id)))
    }

    fn pending_proposal_mut(&mut self, id: &str) -> ClientResult<&mut TxProposal> {
        let proposal = self.proposal_mut(id)?;
        if !proposal.is_pending() {
            return Err(ClientError::Remote(format!(
                "Transaction proposal {} is not pending",
                id
            )));
        }
        Ok(proposal)
    }

    /// Record `action` and move the proposal to its resulting status
    fn vote(&mut self, id: &str, action: ProposalAction) -> ClientResult<TxProposal> {
        let (m, n) = (self.m as usize, self.n as usize);
        let proposal = self.pending_proposal_mut(id)?;
        if proposal.has_acted(&action.copayer_id) {
            return Err(ClientError::Remote(format!(
                "Copayer {} already voted on this transaction proposal",
                action.copayer_name
            )));
        }

        proposal.actions.push(action);
        if proposal.is_ready() {
            proposal.status = ProposalStatus::Accepted;
        } else if proposal.reject_count() > n - m {
            proposal.status = ProposalStatus::Rejected;
        }
        Ok(proposal.clone())
    }

    fn fee_for(&self, fee_per_kb: u64, outputs: usize) -> ClientResult<u64> {
        let script = 1 + self.m as u64 * SIGNATURE_SIZE + 1 + self.n as u64 * PUBKEY_SIZE + 2;
        // One change output on top of the requested ones
        let size = BASE_TX_SIZE + INPUT_SIZE + script + (outputs as u64 + 1) * OUTPUT_SIZE;
        let cost = fee_per_kb.checked_mul(size).ok_or_else(invalid_amount)?;
        Ok(cost.div_ceil(1000))
    }

    fn next_id(&self) -> String {
        let seed = format!(
            "{}{}{}",
            self.wallet_id,
            self.proposals.len(),
            Utc::now().timestamp_nanos_opt().unwrap_or(0)
        );
        hex::encode(&sha256(seed.as_bytes())[..16])
    }
}

/// The bytes every copayer signs for a proposal
pub fn signing_digest(proposal: &TxProposal) -> Vec<u8> {
    let outputs: Vec<String> = proposal
        .outputs
        .iter()
        .map(|o| format!("{}:{}", o.to_address, o.amount))
        .collect();
    let data = format!(
        "{}|{}|{}|{}",
        proposal.id,
        outputs.join(","),
        proposal.fee,
        proposal.required_signatures
    );
    sha256(data.as_bytes())
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Export {
    wallet: WalletState,
}

/// In-process implementation of [`WalletClient`]
#[derive(Debug)]
pub struct LocalCoordinator {
    state: RwLock<Option<WalletState>>,
    online: AtomicBool,
}

impl Default for LocalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCoordinator {
    /// A client with no wallet loaded
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            online: AtomicBool::new(true),
        }
    }

    /// Make every later service call fail as if the service refused the connection
    pub fn disconnect(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    fn check_online(&self) -> ClientResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::ConnectionRefused("local coordinator".to_string()))
        }
    }

    /// Register another copayer, as if they joined with the wallet secret
    pub async fn join_copayer(&self, name: &str) -> ClientResult<()> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;

        if wallet.is_complete() {
            return Err(ClientError::Remote("Wallet is already complete".to_string()));
        }
        if wallet.copayers.iter().any(|c| c.name == name) {
            return Err(ClientError::Remote(format!("Copayer {} already joined", name)));
        }
        wallet.copayers.push(Copayer::generate(name));
        Ok(())
    }

    /// Add confirmed funds to the wallet
    pub async fn credit(&self, amount: u64) -> ClientResult<()> {
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        wallet.balance = wallet
            .balance
            .checked_add(amount)
            .ok_or_else(invalid_amount)?;
        Ok(())
    }

    /// Produce the signature `copayer_name` would hand over for `proposal`
    pub async fn signature_for(&self, copayer_name: &str, proposal: &TxProposal) -> ClientResult<String> {
        let guard = self.state.read().await;
        let wallet = guard.as_ref().ok_or_else(no_wallet)?;
        wallet.copayer_named(copayer_name)?.sign(&signing_digest(proposal))
    }

    /// Accept `proposal` on behalf of another copayer
    pub async fn sign_as(&self, copayer_name: &str, proposal: &TxProposal) -> ClientResult<TxProposal> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        let stored = wallet.pending_proposal_mut(&proposal.id)?.clone();
        let copayer = wallet.copayer_named(copayer_name)?;
        let action = copayer.accept(vec![copayer.sign(&signing_digest(&stored))?]);
        wallet.vote(&proposal.id, action)
    }
}

fn no_wallet() -> ClientError {
    ClientError::Remote("Wallet not found".to_string())
}

fn invalid_amount() -> ClientError {
    ClientError::Remote("Invalid amount".to_string())
}

#[async_trait]
impl WalletClient for LocalCoordinator {
    async fn create_wallet(
        &self,
        name: &str,
        copayer_name: &str,
        m: u8,
        n: u8,
        options: WalletOptions,
    ) -> ClientResult<Option<String>> {
        self.check_online()?;
        if m == 0 || m > n {
            return Err(ClientError::Remote(format!(
                "Invalid m-of-n: {}-of-{}",
                m, n
            )));
        }
        if n > MAX_COPAYERS {
            return Err(ClientError::Remote(format!(
                "Too many copayers: {} (maximum {})",
                n, MAX_COPAYERS
            )));
        }

        let mut guard = self.state.write().await;
        if guard.is_some() {
            return Err(ClientError::Remote("Wallet already created".to_string()));
        }

        let copayer = Copayer::generate(copayer_name);
        let wallet_id = sha256_hex(format!("{}{}", name, copayer.public_key).as_bytes())[..32].to_string();
        let secret = (n > 1).then(|| {
            let tag = match options.network {
                Network::Livenet => 'L',
                Network::Testnet => 'T',
            };
            format!("{}{}", wallet_id, tag)
        });

        log::debug!("Created {}-of-{} wallet {} ({})", m, n, name, wallet_id);
        *guard = Some(WalletState {
            wallet_id,
            name: name.to_string(),
            m,
            n,
            network: options.network,
            copayer_id: copayer.id.clone(),
            copayers: vec![copayer],
            secret: secret.clone(),
            completion_reported: n == 1,
            addresses: Vec::new(),
            balance: 0,
            proposals: Vec::new(),
        });
        Ok(secret)
    }

    async fn import(&self, record: &WalletRecord, options: ImportOptions) -> ClientResult<()> {
        let Export { mut wallet } = serde_json::from_str(record.as_str())
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if wallet.m == 0 || wallet.m > wallet.n || wallet.copayers.len() > wallet.n as usize {
            return Err(ClientError::InvalidResponse(format!(
                "inconsistent quorum {}-of-{} with {} copayers",
                wallet.m,
                wallet.n,
                wallet.copayers.len()
            )));
        }
        wallet.own_copayer()?;
        for copayer in &wallet.copayers {
            copayer.key()?;
        }
        for proposal in &wallet.proposals {
            proposal.validate().map_err(ClientError::InvalidResponse)?;
        }

        if options.read_only {
            for copayer in &mut wallet.copayers {
                copayer.private_key = None;
            }
        }

        *self.state.write().await = Some(wallet);
        Ok(())
    }

    async fn export(&self) -> ClientResult<WalletRecord> {
        let guard = self.state.read().await;
        let wallet = guard.as_ref().ok_or_else(no_wallet)?;
        let value = serde_json::to_value(Export {
            wallet: wallet.clone(),
        })
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        match value {
            serde_json::Value::Object(object) => Ok(WalletRecord::from_object(object)),
            _ => Err(ClientError::InvalidResponse("export is not an object".to_string())),
        }
    }

    async fn open_wallet(&self) -> ClientResult<Completion> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;

        if !wallet.is_complete() {
            return Ok(Completion::Pending);
        }
        if wallet.completion_reported {
            return Ok(Completion::AlreadyComplete);
        }
        wallet.completion_reported = true;
        wallet.secret = None;
        Ok(Completion::JustCompleted)
    }

    async fn create_address(&self) -> ClientResult<String> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        wallet.ensure_complete()?;

        // P2SH over the sorted copayer keys and the address index
        let mut keys: Vec<&str> = wallet.copayers.iter().map(|c| c.public_key.as_str()).collect();
        keys.sort_unstable();
        let script = format!("{}|{}|{}", wallet.m, keys.join(","), wallet.addresses.len());
        let version = match wallet.network {
            Network::Livenet => 0x05,
            Network::Testnet => 0xc4,
        };
        let address = base58check(version, &hash160(script.as_bytes()));

        wallet.addresses.push(address.clone());
        Ok(address)
    }

    async fn get_main_addresses(&self) -> ClientResult<Vec<String>> {
        self.check_online()?;
        let guard = self.state.read().await;
        let wallet = guard.as_ref().ok_or_else(no_wallet)?;
        Ok(wallet.addresses.clone())
    }

    async fn get_balance(&self) -> ClientResult<Balance> {
        self.check_online()?;
        let guard = self.state.read().await;
        let wallet = guard.as_ref().ok_or_else(no_wallet)?;
        Ok(Balance {
            total_amount: wallet.balance,
            locked_amount: wallet.locked_amount()?,
        })
    }

    async fn get_tx_proposals(&self) -> ClientResult<Vec<TxProposal>> {
        self.check_online()?;
        let guard = self.state.read().await;
        let wallet = guard.as_ref().ok_or_else(no_wallet)?;
        Ok(wallet
            .proposals
            .iter()
            .filter(|p| p.is_pending())
            .cloned()
            .collect())
    }

    async fn create_tx_proposal(&self, request: ProposalRequest) -> ClientResult<TxProposal> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        wallet.ensure_complete()?;

        if request.outputs.is_empty() {
            return Err(ClientError::Remote("No outputs specified".to_string()));
        }
        if let Some(bad) = request
            .outputs
            .iter()
            .find(|o| o.amount == 0 || o.to_address.is_empty())
        {
            return Err(ClientError::Remote(format!(
                "Invalid output: {} to \"{}\"",
                bad.amount, bad.to_address
            )));
        }

        let amount = request
            .outputs
            .iter()
            .try_fold(0u64, |total, o| total.checked_add(o.amount))
            .ok_or_else(invalid_amount)?;
        let fee = wallet.fee_for(request.fee_per_kb, request.outputs.len())?;
        let needed = amount.checked_add(fee).ok_or_else(invalid_amount)?;
        let available = wallet.balance.saturating_sub(wallet.locked_amount()?);
        if needed > available {
            return Err(ClientError::Remote(format!(
                "Insufficient funds: have {}, need {}",
                available, needed
            )));
        }

        let proposal = TxProposal {
            id: wallet.next_id(),
            creator_name: wallet.own_copayer()?.name.clone(),
            message: request.message,
            amount,
            fee,
            outputs: request.outputs,
            required_signatures: wallet.m as u32,
            actions: Vec::new(),
            status: ProposalStatus::Temporary,
            signatures: None,
            txid: None,
            created_on: Utc::now().timestamp(),
        };
        wallet.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn publish_tx_proposal(&self, proposal: &TxProposal) -> ClientResult<()> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        let stored = wallet.proposal_mut(&proposal.id)?;
        if stored.status != ProposalStatus::Temporary {
            return Err(ClientError::Remote(format!(
                "Transaction proposal {} was already published",
                proposal.id
            )));
        }
        stored.status = ProposalStatus::Pending;
        Ok(())
    }

    async fn sign_tx_proposal(&self, proposal: &TxProposal) -> ClientResult<TxProposal> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        let stored = wallet.pending_proposal_mut(&proposal.id)?.clone();
        let digest = signing_digest(&stored);

        let action = match proposal.signatures.as_deref() {
            Some(signatures) if !signatures.is_empty() => {
                let mut matched = None;
                for copayer in &wallet.copayers {
                    let key = copayer.key()?;
                    let mut all_valid = true;
                    for signature in signatures {
                        let valid = key.verify(&digest, signature).map_err(|e| {
                            ClientError::Remote(format!("Bad signature: {}", e))
                        })?;
                        all_valid &= valid;
                    }
                    if all_valid {
                        matched = Some(copayer);
                        break;
                    }
                }
                matched
                    .ok_or_else(|| {
                        ClientError::Remote("Signatures do not match any copayer".to_string())
                    })?
                    .accept(signatures.to_vec())
            }
            _ => {
                let own = wallet.own_copayer()?;
                if own.private_key.is_none() {
                    return Err(ClientError::Remote(
                        "Wallet has no signing capability".to_string(),
                    ));
                }
                own.accept(vec![own.sign(&digest)?])
            }
        };

        wallet.vote(&proposal.id, action)
    }

    async fn reject_tx_proposal(
        &self,
        proposal: &TxProposal,
        reason: Option<&str>,
    ) -> ClientResult<TxProposal> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        let action = wallet.own_copayer()?.reject(reason);
        wallet.vote(&proposal.id, action)
    }

    async fn broadcast(&self, proposal: &TxProposal) -> ClientResult<BroadcastReceipt> {
        self.check_online()?;
        let mut guard = self.state.write().await;
        let wallet = guard.as_mut().ok_or_else(no_wallet)?;
        let stored = wallet.proposal_mut(&proposal.id)?;
        if stored.status != ProposalStatus::Accepted {
            return Err(ClientError::Remote(format!(
                "Transaction proposal not accepted: {} signature(s) missing",
                stored.missing_signatures()
            )));
        }

        let mut raw = signing_digest(stored);
        for action in stored.actions.iter().filter(|a| a.action_type == ActionType::Accept) {
            raw.extend_from_slice(action.copayer_id.as_bytes());
            for signature in &action.signatures {
                raw.extend_from_slice(signature.as_bytes());
            }
        }
        let mut txid = double_sha256(&raw);
        txid.reverse();
        let txid = hex::encode(txid);

        stored.status = ProposalStatus::Broadcasted;
        stored.txid = Some(txid.clone());
        let spent = stored.amount.saturating_add(stored.fee);
        wallet.balance = wallet.balance.saturating_sub(spent);

        Ok(BroadcastReceipt { txid })
    }

    async fn can_sign(&self) -> bool {
        let guard = self.state.read().await;
        guard
            .as_ref()
            .and_then(|w| w.own_copayer().ok())
            .map(|c| c.private_key.is_some())
            .unwrap_or(false)
    }
}
