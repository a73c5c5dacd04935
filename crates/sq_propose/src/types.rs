//! values passed across the ledger boundary and the reports surfaced to callers
use {
    serde::{Deserialize, Serialize},
    solana_sdk::{hash::Hash, transaction::TransactionError},
};

/// Recent blockhash a transaction references, and the last block height it is valid for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub skip_preflight: bool,
}

/// Outcome of a transaction that reached the requested commitment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Success,
    Failed(TransactionError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingReport {
    pub recipient: String,
    pub strategy: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub multisig: String,
    pub vault: String,
    /// false when the multisig already existed
    pub created: bool,
    pub signature: Option<String>,
    pub threshold: u16,
    pub members: Vec<String>,
    pub transaction_index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalReport {
    pub multisig: String,
    pub vault: String,
    pub transaction_index: u64,
    /// None when a pending vault transaction from an earlier run was reused
    pub vault_transaction_signature: Option<String>,
    pub proposal_signature: String,
    pub proposal_status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub funding: Vec<FundingReport>,
    pub provision: ProvisionReport,
    pub proposal: ProposalReport,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveReport {
    pub program_config: String,
    pub multisig: String,
    pub vault_index: u8,
    pub vault: String,
    /// pdas of the given transaction index, when one was requested
    pub transaction: Option<String>,
    pub proposal: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReport {
    pub address: String,
    pub permissions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub multisig: String,
    pub vault: String,
    pub threshold: u16,
    pub time_lock: u32,
    pub transaction_index: u64,
    pub stale_transaction_index: u64,
    pub members: Vec<MemberReport>,
    /// status of the proposal at `transaction_index`, if one was raised
    pub latest_proposal: Option<String>,
}
