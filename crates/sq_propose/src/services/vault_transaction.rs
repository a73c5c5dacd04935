use {
    super::{
        ledger::{signed_transaction, submit_and_confirm, LedgerGateway},
        sequencer::fetch_multisig,
    },
    crate::{
        error::{Error, Result},
        identity::Identity,
        programs::squads::{
            error::ProgramFailure, instructions, message::TransactionMessage, pda,
            v4::VaultTransaction,
        },
        types::SubmitOptions,
    },
    solana_sdk::{
        commitment_config::CommitmentConfig, instruction::Instruction, pubkey::Pubkey,
        signature::Signature, system_instruction,
    },
    std::sync::Arc,
};

/// A single system transfer out of `vault`
pub fn transfer_instructions(
    vault: &Pubkey,
    recipient: &Pubkey,
    lamports: u64,
) -> Vec<Instruction> {
    vec![system_instruction::transfer(vault, recipient, lamports)]
}

/// Instructions to be executed by a vault once the proposal is approved
#[derive(Clone, Debug)]
pub struct VaultTransactionRequest {
    pub multisig: Pubkey,
    pub vault_index: u8,
    pub instructions: Vec<Instruction>,
    pub memo: Option<String>,
}

impl VaultTransactionRequest {
    pub fn transfer(
        multisig: Pubkey,
        vault_index: u8,
        recipient: &Pubkey,
        lamports: u64,
        memo: Option<String>,
    ) -> Result<Self> {
        let (vault, _) = pda::vault_pda(&multisig, vault_index)?;
        Ok(Self {
            multisig,
            vault_index,
            instructions: transfer_instructions(&vault, recipient, lamports),
            memo,
        })
    }
    pub fn vault(&self) -> Result<Pubkey> {
        Ok(pda::vault_pda(&self.multisig, self.vault_index)?.0)
    }
    /// the vault is the payer of the inner message
    pub fn message(&self) -> Result<TransactionMessage> {
        TransactionMessage::try_compile(&self.vault()?, &self.instructions)
    }
}

pub struct VaultTransactionBuilder<L> {
    ledger: Arc<L>,
    commitment: CommitmentConfig,
    opts: SubmitOptions,
}

impl<L: LedgerGateway> VaultTransactionBuilder<L> {
    pub fn new(ledger: Arc<L>, commitment: CommitmentConfig, opts: SubmitOptions) -> Self {
        Self {
            ledger,
            commitment,
            opts,
        }
    }

    /// Creates the vault transaction at `index`, the creator signs as creator and rent payer
    ///
    /// a rejection caused by `index` no longer being the next one is reported as
    /// [`Error::StaleIndex`]
    pub async fn create(
        &self,
        creator: &Identity,
        request: &VaultTransactionRequest,
        index: u64,
    ) -> Result<Signature> {
        let message = request.message()?;
        let ix = instructions::vault_transaction_create(
            &request.multisig,
            index,
            &creator.pubkey(),
            &creator.pubkey(),
            request.vault_index,
            &message,
            request.memo.clone(),
        )?;
        let checkpoint = self.ledger.latest_checkpoint(self.commitment).await?;
        let tx = signed_transaction(creator, &[ix], &checkpoint)?;
        log::info!(
            "creating vault transaction {index} for {} (vault {})",
            request.multisig,
            request.vault_index
        );
        submit_and_confirm(self.ledger.as_ref(), &tx, &checkpoint, self.opts, self.commitment)
            .await
            .map_err(|err| match err.program_failure() {
                Some(ProgramFailure::ConstraintSeeds | ProgramFailure::AccountAlreadyInUse) => {
                    Error::StaleIndex { submitted: index }
                }
                _ => err,
            })
    }

    pub async fn fetch(&self, multisig: &Pubkey, index: u64) -> Result<Option<VaultTransaction>> {
        let (address, _) = pda::transaction_pda(multisig, index)?;
        match self.ledger.get_account(&address).await? {
            Some(data) if !data.is_empty() => {
                Ok(Some(VaultTransaction::from_account_data(&address, &data)?))
            }
            _ => Ok(None),
        }
    }

    /// Index of a confirmed vault transaction at the current counter that `creator` made with
    /// the same message and vault, and that has no proposal yet
    ///
    /// a run that failed between the two steps resumes from here instead of creating a
    /// second transfer
    pub async fn find_pending(
        &self,
        creator: &Pubkey,
        request: &VaultTransactionRequest,
    ) -> Result<Option<u64>> {
        let multisig = fetch_multisig(self.ledger.as_ref(), &request.multisig).await?;
        let index = multisig.transaction_index;
        if index == 0 || index <= multisig.stale_transaction_index {
            return Ok(None);
        }
        let Some(existing) = self.fetch(&request.multisig, index).await? else {
            return Ok(None);
        };
        if existing.creator != *creator
            || existing.vault_index != request.vault_index
            || existing.message != request.message()?.to_vault_transaction_message()
        {
            return Ok(None);
        }
        let (proposal, _) = pda::proposal_pda(&request.multisig, index)?;
        match self.ledger.get_account(&proposal).await? {
            Some(data) if !data.is_empty() => Ok(None),
            _ => Ok(Some(index)),
        }
    }
}
