use {
    super::ledger::{signed_transaction, submit_and_confirm, LedgerGateway},
    crate::{
        error::{Error, Result},
        identity::Identity,
        programs::squads::{instructions, pda, v4::Proposal},
        types::SubmitOptions,
    },
    solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature},
    std::sync::Arc,
};

pub struct ProposalPublisher<L> {
    ledger: Arc<L>,
    commitment: CommitmentConfig,
    opts: SubmitOptions,
}

impl<L: LedgerGateway> ProposalPublisher<L> {
    pub fn new(ledger: Arc<L>, commitment: CommitmentConfig, opts: SubmitOptions) -> Self {
        Self {
            ledger,
            commitment,
            opts,
        }
    }

    /// Raises an active proposal for the vault transaction at `index`
    ///
    /// nothing is submitted unless the vault transaction exists and no proposal has been
    /// raised for it yet
    pub async fn create(
        &self,
        multisig: &Pubkey,
        index: u64,
        proposer: &Identity,
    ) -> Result<Signature> {
        let (transaction, _) = pda::transaction_pda(multisig, index)?;
        if !self.exists(&transaction).await? {
            return Err(Error::MissingVaultTransaction {
                multisig: *multisig,
                index,
            });
        }
        let (proposal, _) = pda::proposal_pda(multisig, index)?;
        if self.exists(&proposal).await? {
            return Err(Error::AlreadyExists { address: proposal });
        }
        let ix =
            instructions::proposal_create(multisig, index, &proposer.pubkey(), &proposer.pubkey())?;
        let checkpoint = self.ledger.latest_checkpoint(self.commitment).await?;
        let tx = signed_transaction(proposer, &[ix], &checkpoint)?;
        log::info!("creating proposal {index} for {multisig}");
        submit_and_confirm(
            self.ledger.as_ref(),
            &tx,
            &checkpoint,
            self.opts,
            self.commitment,
        )
        .await
    }

    pub async fn fetch(&self, multisig: &Pubkey, index: u64) -> Result<Option<Proposal>> {
        let (address, _) = pda::proposal_pda(multisig, index)?;
        match self.ledger.get_account(&address).await? {
            Some(data) if !data.is_empty() => {
                Ok(Some(Proposal::from_account_data(&address, &data)?))
            }
            _ => Ok(None),
        }
    }

    async fn exists(&self, address: &Pubkey) -> Result<bool> {
        Ok(self
            .ledger
            .get_account(address)
            .await?
            .map(|data| !data.is_empty())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            programs::squads::v4::{Member, MultisigV4, Permissions, ProposalStatus},
            services::vault_transaction::{VaultTransactionBuilder, VaultTransactionRequest},
            test_utils::{InstructionKind, MockLedger},
        },
    };

    #[tokio::test]
    async fn test_proposal_follows_vault_transaction() {
        let ledger = Arc::new(MockLedger::new());
        let creator = Identity::generate();
        let (multisig, bump) = pda::multisig_pda(&creator.pubkey()).unwrap();
        let account = MultisigV4::new(
            creator.pubkey(),
            None,
            1,
            0,
            None,
            bump,
            vec![Member {
                key: creator.pubkey(),
                permissions: Permissions::all(),
            }],
        );
        ledger.set_account_data(&multisig, borsh::to_vec(&account).unwrap());
        let publisher = ProposalPublisher::new(
            ledger.clone(),
            CommitmentConfig::confirmed(),
            SubmitOptions::default(),
        );

        let err = publisher.create(&multisig, 1, &creator).await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingVaultTransaction { index: 1, .. }
        ));
        assert_eq!(ledger.attempts_of(InstructionKind::ProposalCreate), 0);
        assert!(publisher.fetch(&multisig, 1).await.unwrap().is_none());

        let recipient = Pubkey::new_unique();
        let request = VaultTransactionRequest::transfer(multisig, 0, &recipient, 10, None).unwrap();
        VaultTransactionBuilder::new(
            ledger.clone(),
            CommitmentConfig::confirmed(),
            SubmitOptions::default(),
        )
        .create(&creator, &request, 1)
        .await
        .unwrap();

        publisher.create(&multisig, 1, &creator).await.unwrap();
        let proposal = publisher.fetch(&multisig, 1).await.unwrap().unwrap();
        assert_eq!(proposal.transaction_index, 1);
        assert_eq!(proposal.multisig, multisig);
        assert!(matches!(proposal.status, ProposalStatus::Active { .. }));

        // exactly one proposal per index
        let err = publisher.create(&multisig, 1, &creator).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert_eq!(ledger.attempts_of(InstructionKind::ProposalCreate), 1);
    }
}
