//! builders for the three squads v4 instructions this crate submits
use {
    super::{message::TransactionMessage, pda, v4::{Member, ID}},
    crate::error::Result,
    borsh::{BorshDeserialize, BorshSerialize},
    solana_sdk::{
        instruction::{AccountMeta, Instruction},
        pubkey::Pubkey,
        system_program,
    },
};

/// sha256("global:multisig_create_v2")[..8]
pub const MULTISIG_CREATE_V2: [u8; 8] = [50, 221, 199, 93, 40, 245, 139, 233];
/// sha256("global:vault_transaction_create")[..8]
pub const VAULT_TRANSACTION_CREATE: [u8; 8] = [48, 250, 78, 168, 208, 226, 218, 211];
/// sha256("global:proposal_create")[..8]
pub const PROPOSAL_CREATE: [u8; 8] = [220, 60, 73, 224, 30, 108, 79, 159];

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct MultisigCreateArgsV2 {
    /// `None` makes the multisig autonomous
    pub config_authority: Option<Pubkey>,
    pub threshold: u16,
    pub members: Vec<Member>,
    pub time_lock: u32,
    pub rent_collector: Option<Pubkey>,
    pub memo: Option<String>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct VaultTransactionCreateArgs {
    pub vault_index: u8,
    /// number of single use signer pdas the message needs
    pub ephemeral_signers: u8,
    /// borsh encoded [`TransactionMessage`]
    pub transaction_message: Vec<u8>,
    pub memo: Option<String>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct ProposalCreateArgs {
    pub transaction_index: u64,
    /// draft proposals must be activated before members can vote
    pub draft: bool,
}

fn instruction_data<T: BorshSerialize>(discriminator: &[u8; 8], args: &T) -> Result<Vec<u8>> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}

/// `create_key` doubles as the creator and rent payer
pub fn multisig_create_v2(
    create_key: &Pubkey,
    treasury: &Pubkey,
    args: &MultisigCreateArgsV2,
) -> Result<Instruction> {
    let (program_config, _) = pda::program_config_pda()?;
    let (multisig, _) = pda::multisig_pda(create_key)?;
    Ok(Instruction {
        program_id: ID,
        accounts: vec![
            AccountMeta::new_readonly(program_config, false),
            AccountMeta::new(*treasury, false),
            AccountMeta::new(multisig, false),
            AccountMeta::new_readonly(*create_key, true),
            AccountMeta::new(*create_key, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: instruction_data(&MULTISIG_CREATE_V2, args)?,
    })
}

pub fn vault_transaction_create(
    multisig: &Pubkey,
    transaction_index: u64,
    creator: &Pubkey,
    rent_payer: &Pubkey,
    vault_index: u8,
    message: &TransactionMessage,
    memo: Option<String>,
) -> Result<Instruction> {
    let (transaction, _) = pda::transaction_pda(multisig, transaction_index)?;
    let args = VaultTransactionCreateArgs {
        vault_index,
        ephemeral_signers: 0,
        transaction_message: message.to_bytes()?,
        memo,
    };
    Ok(Instruction {
        program_id: ID,
        accounts: vec![
            AccountMeta::new(*multisig, false),
            AccountMeta::new(transaction, false),
            AccountMeta::new_readonly(*creator, true),
            AccountMeta::new(*rent_payer, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: instruction_data(&VAULT_TRANSACTION_CREATE, &args)?,
    })
}

pub fn proposal_create(
    multisig: &Pubkey,
    transaction_index: u64,
    creator: &Pubkey,
    rent_payer: &Pubkey,
) -> Result<Instruction> {
    let (proposal, _) = pda::proposal_pda(multisig, transaction_index)?;
    let args = ProposalCreateArgs {
        transaction_index,
        draft: false,
    };
    Ok(Instruction {
        program_id: ID,
        accounts: vec![
            AccountMeta::new_readonly(*multisig, false),
            AccountMeta::new(proposal, false),
            AccountMeta::new_readonly(*creator, true),
            AccountMeta::new(*rent_payer, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: instruction_data(&PROPOSAL_CREATE, &args)?,
    })
}
