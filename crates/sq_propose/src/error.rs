use {
    crate::programs::squads::error::{self as program_error, ProgramFailure},
    solana_client::client_error::ClientError,
    solana_sdk::{
        message::CompileError, pubkey::Pubkey, signature::Signature, signer::SignerError,
        transaction::TransactionError,
    },
    std::time::Duration,
    thiserror::Error,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid identity: {0}")]
    Identity(String),
    #[error("no viable bump for seeds under program {program_id}")]
    AddressDerivation { program_id: Pubkey },
    #[error("invalid multisig: {0}")]
    InvalidMultisig(String),
    #[error("all funding strategies failed for {recipient}: {reasons}")]
    Funding { recipient: Pubkey, reasons: String },
    #[error("account {address} already exists")]
    AlreadyExists { address: Pubkey },
    #[error("transaction index {submitted} is stale")]
    StaleIndex { submitted: u64 },
    #[error("transaction index overflow (current {current})")]
    IndexOverflow { current: u64 },
    #[error("vault transaction {index} for multisig {multisig} has not been confirmed")]
    MissingVaultTransaction { multisig: Pubkey, index: u64 },
    #[error(
        "transaction {} failed: {error} (program error {program_error:?})",
        display_signature(.signature)
    )]
    TransactionFailed {
        /// None when the node rejected the transaction during preflight
        signature: Option<Signature>,
        error: TransactionError,
        program_error: Option<ProgramFailure>,
    },
    #[error("transaction {signature} not confirmed within {elapsed:?}")]
    ConfirmationTimeout { signature: Signature, elapsed: Duration },
    #[error("blockhash expired before transaction {signature} was confirmed")]
    BlockhashExpired { signature: Signature },
    #[error("account {address} not found")]
    AccountNotFound { address: Pubkey },
    #[error("failed to decode {kind} account {address}: {reason}")]
    Decode {
        kind: &'static str,
        address: Pubkey,
        reason: String,
    },
    #[error("failed to encode instruction data {0}")]
    Encode(#[from] std::io::Error),
    #[error("failed to compile message {0}")]
    Compile(#[from] CompileError),
    #[error("failed to sign transaction {0}")]
    Signing(#[from] SignerError),
    #[error("rpc transport error {0}")]
    Transport(Box<ClientError>),
}

fn display_signature(signature: &Option<Signature>) -> String {
    match signature {
        Some(signature) => signature.to_string(),
        None => "<preflight>".to_string(),
    }
}

impl Error {
    pub fn transaction_failed(signature: Option<Signature>, error: TransactionError) -> Self {
        let program_error = program_error::decode(&error).map(|(_, failure)| failure);
        Self::TransactionFailed {
            signature,
            error,
            program_error,
        }
    }
    /// Returns the decoded program error for failed transactions
    pub fn program_failure(&self) -> Option<ProgramFailure> {
        match self {
            Self::TransactionFailed { program_error, .. } => *program_error,
            _ => None,
        }
    }
    pub fn is_stale_index(&self) -> bool {
        matches!(self, Self::StaleIndex { .. })
    }
}

impl From<ClientError> for Error {
    /// preflight rejections carry a transaction error and are reported as such, everything
    /// else is a transport failure
    fn from(err: ClientError) -> Self {
        match err.get_transaction_error() {
            Some(tx_err) => Self::transaction_failed(None, tx_err),
            None => Self::Transport(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::programs::squads::error::MultisigErrorCode,
        solana_sdk::instruction::InstructionError,
    };
    #[test]
    fn test_transaction_failed_decodes_program_error() {
        let err = Error::transaction_failed(
            Some(Signature::default()),
            TransactionError::InstructionError(0, InstructionError::Custom(6003)),
        );
        assert_eq!(
            err.program_failure(),
            Some(ProgramFailure::Multisig(MultisigErrorCode::InvalidThreshold))
        );
        assert!(!err.is_stale_index());
        assert!(Error::StaleIndex { submitted: 3 }.is_stale_index());

        let err = Error::transaction_failed(None, TransactionError::AccountNotFound);
        assert_eq!(err.program_failure(), None);
        assert!(err.to_string().contains("<preflight>"));
    }
}
