//! decodes the custom error codes surfaced by a failed squads transaction
//!
//! codes below 100 come from the system program (propagated through cpi when an `init`
//! target already exists), 100..6000 are anchor framework errors, and 6000+ map onto the
//! v4 program's `MultisigError` enum in declaration order
use solana_sdk::{instruction::InstructionError, transaction::TransactionError};

/// anchor offsets user defined errors by this amount
pub const ANCHOR_ERROR_OFFSET: u32 = 6000;
/// `SystemError::AccountAlreadyInUse`
pub const SYSTEM_ACCOUNT_ALREADY_IN_USE: u32 = 0;
/// `ErrorCode::ConstraintSeeds`, raised when a passed pda does not match its seeds
pub const ANCHOR_CONSTRAINT_SEEDS: u32 = 2006;
/// `ErrorCode::AccountNotInitialized`
pub const ANCHOR_ACCOUNT_NOT_INITIALIZED: u32 = 3012;
/// `ErrorCode::AccountDiscriminatorMismatch`
pub const ANCHOR_ACCOUNT_DISCRIMINATOR_MISMATCH: u32 = 3002;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MultisigErrorCode {
    DuplicateMember,
    EmptyMembers,
    TooManyMembers,
    InvalidThreshold,
    Unauthorized,
    NotAMember,
    InvalidTransactionMessage,
    StaleProposal,
    InvalidProposalStatus,
    InvalidTransactionIndex,
    AlreadyApproved,
    AlreadyRejected,
    AlreadyCancelled,
    InvalidNumberOfAccounts,
    InvalidAccount,
    RemoveLastMember,
    NoVoters,
    NoProposers,
    NoExecutors,
    InvalidStaleTransactionIndex,
    NotSupportedForControlled,
    TimeLockNotReleased,
    NoActions,
    MissingAccount,
    InvalidMint,
    InvalidDestination,
    SpendingLimitExceeded,
    DecimalsMismatch,
    UnknownPermission,
    ProtectedAccount,
    TimeLockExceedsMaxAllowed,
    IllegalAccountOwner,
    RentReclamationDisabled,
    InvalidRentCollector,
}

const MULTISIG_ERROR_CODES: [MultisigErrorCode; 34] = [
    MultisigErrorCode::DuplicateMember,
    MultisigErrorCode::EmptyMembers,
    MultisigErrorCode::TooManyMembers,
    MultisigErrorCode::InvalidThreshold,
    MultisigErrorCode::Unauthorized,
    MultisigErrorCode::NotAMember,
    MultisigErrorCode::InvalidTransactionMessage,
    MultisigErrorCode::StaleProposal,
    MultisigErrorCode::InvalidProposalStatus,
    MultisigErrorCode::InvalidTransactionIndex,
    MultisigErrorCode::AlreadyApproved,
    MultisigErrorCode::AlreadyRejected,
    MultisigErrorCode::AlreadyCancelled,
    MultisigErrorCode::InvalidNumberOfAccounts,
    MultisigErrorCode::InvalidAccount,
    MultisigErrorCode::RemoveLastMember,
    MultisigErrorCode::NoVoters,
    MultisigErrorCode::NoProposers,
    MultisigErrorCode::NoExecutors,
    MultisigErrorCode::InvalidStaleTransactionIndex,
    MultisigErrorCode::NotSupportedForControlled,
    MultisigErrorCode::TimeLockNotReleased,
    MultisigErrorCode::NoActions,
    MultisigErrorCode::MissingAccount,
    MultisigErrorCode::InvalidMint,
    MultisigErrorCode::InvalidDestination,
    MultisigErrorCode::SpendingLimitExceeded,
    MultisigErrorCode::DecimalsMismatch,
    MultisigErrorCode::UnknownPermission,
    MultisigErrorCode::ProtectedAccount,
    MultisigErrorCode::TimeLockExceedsMaxAllowed,
    MultisigErrorCode::IllegalAccountOwner,
    MultisigErrorCode::RentReclamationDisabled,
    MultisigErrorCode::InvalidRentCollector,
];

impl MultisigErrorCode {
    pub fn from_code(code: u32) -> Option<Self> {
        let offset = code.checked_sub(ANCHOR_ERROR_OFFSET)?;
        MULTISIG_ERROR_CODES.get(offset as usize).copied()
    }
    pub fn code(self) -> u32 {
        ANCHOR_ERROR_OFFSET + self as u32
    }
}

/// Program level reason for a failed transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramFailure {
    /// the account being initialized already exists
    AccountAlreadyInUse,
    ConstraintSeeds,
    AccountNotInitialized,
    AccountDiscriminatorMismatch,
    Multisig(MultisigErrorCode),
    /// custom code this module does not know about
    Other(u32),
}

impl ProgramFailure {
    pub fn from_code(code: u32) -> Self {
        match code {
            SYSTEM_ACCOUNT_ALREADY_IN_USE => Self::AccountAlreadyInUse,
            ANCHOR_CONSTRAINT_SEEDS => Self::ConstraintSeeds,
            ANCHOR_ACCOUNT_NOT_INITIALIZED => Self::AccountNotInitialized,
            ANCHOR_ACCOUNT_DISCRIMINATOR_MISMATCH => Self::AccountDiscriminatorMismatch,
            code => match MultisigErrorCode::from_code(code) {
                Some(ms_err) => Self::Multisig(ms_err),
                None => Self::Other(code),
            },
        }
    }
    pub fn code(self) -> u32 {
        match self {
            Self::AccountAlreadyInUse => SYSTEM_ACCOUNT_ALREADY_IN_USE,
            Self::ConstraintSeeds => ANCHOR_CONSTRAINT_SEEDS,
            Self::AccountNotInitialized => ANCHOR_ACCOUNT_NOT_INITIALIZED,
            Self::AccountDiscriminatorMismatch => ANCHOR_ACCOUNT_DISCRIMINATOR_MISMATCH,
            Self::Multisig(ms_err) => ms_err.code(),
            Self::Other(code) => code,
        }
    }
    /// builds the transaction error the runtime reports for this failure at `instruction`
    pub fn to_transaction_error(self, instruction: u8) -> TransactionError {
        TransactionError::InstructionError(instruction, InstructionError::Custom(self.code()))
    }
}

/// Extracts the custom program error from a transaction error, if it carries one
pub fn decode(err: &TransactionError) -> Option<(u8, ProgramFailure)> {
    match err {
        TransactionError::InstructionError(idx, InstructionError::Custom(code)) => {
            Some((*idx, ProgramFailure::from_code(*code)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_decode_codes() {
        assert_eq!(
            MultisigErrorCode::from_code(6009),
            Some(MultisigErrorCode::InvalidTransactionIndex)
        );
        assert_eq!(MultisigErrorCode::InvalidThreshold.code(), 6003);
        assert_eq!(MultisigErrorCode::from_code(5999), None);
        assert_eq!(MultisigErrorCode::from_code(9000), None);

        let err = TransactionError::InstructionError(0, InstructionError::Custom(0));
        assert_eq!(decode(&err), Some((0, ProgramFailure::AccountAlreadyInUse)));
        let err = ProgramFailure::ConstraintSeeds.to_transaction_error(1);
        assert_eq!(decode(&err), Some((1, ProgramFailure::ConstraintSeeds)));
        assert_eq!(ProgramFailure::from_code(42), ProgramFailure::Other(42));
        assert_eq!(decode(&TransactionError::BlockhashNotFound), None);
        assert_eq!(
            decode(&TransactionError::InstructionError(
                0,
                InstructionError::InsufficientFunds
            )),
            None
        );
    }
}
