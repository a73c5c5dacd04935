//! drives a full run, each step is confirmed before the next one starts:
//! fund secondary signers, ensure the multisig, sequence and create the vault transaction,
//! then raise its proposal
use {
    super::{
        funding::FundingChain,
        ledger::LedgerGateway,
        proposal::ProposalPublisher,
        provisioner::{MultisigSpec, Provisioned, Provisioner},
        sequencer::Sequencer,
        vault_transaction::{VaultTransactionBuilder, VaultTransactionRequest},
    },
    crate::{
        error::Result,
        identity::Identity,
        types::{FundingReport, ProposalReport, RunReport, SubmitOptions},
    },
    solana_sdk::{
        commitment_config::CommitmentConfig, native_token::lamports_to_sol, pubkey::Pubkey,
    },
    std::sync::Arc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSettings {
    pub commitment: CommitmentConfig,
    pub submit: SubmitOptions,
    /// stale index rejections tolerated before giving up
    pub max_attempts: u32,
    /// reuse a confirmed vault transaction that never got its proposal
    pub resume_pending: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            commitment: CommitmentConfig::confirmed(),
            submit: SubmitOptions::default(),
            max_attempts: 3,
            resume_pending: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPlan {
    pub recipient: Pubkey,
    pub lamports: u64,
    pub vault_index: u8,
    pub memo: Option<String>,
}

impl TransferPlan {
    pub fn request(&self, multisig: Pubkey) -> Result<VaultTransactionRequest> {
        let memo = self.memo.clone().unwrap_or_else(|| {
            format!("Transfer {} SOL to recipient", lamports_to_sol(self.lamports))
        });
        VaultTransactionRequest::transfer(
            multisig,
            self.vault_index,
            &self.recipient,
            self.lamports,
            Some(memo),
        )
    }
}

pub struct RunPlan {
    pub multisig: MultisigSpec,
    /// resolved from the program config when unset
    pub treasury: Option<Pubkey>,
    /// `None` skips funding
    pub funding: Option<FundingChain>,
    pub fund_recipients: Vec<Pubkey>,
    pub transfer: TransferPlan,
}

pub struct Orchestrator<L> {
    ledger: Arc<L>,
    settings: RunSettings,
    provisioner: Provisioner<L>,
    sequencer: Sequencer<L>,
    vault_transactions: VaultTransactionBuilder<L>,
    proposals: ProposalPublisher<L>,
}

impl<L: LedgerGateway> Orchestrator<L> {
    pub fn new(ledger: Arc<L>, settings: RunSettings) -> Self {
        Self {
            provisioner: Provisioner::new(ledger.clone(), settings.commitment, settings.submit),
            sequencer: Sequencer::new(ledger.clone()),
            vault_transactions: VaultTransactionBuilder::new(
                ledger.clone(),
                settings.commitment,
                settings.submit,
            ),
            proposals: ProposalPublisher::new(ledger.clone(), settings.commitment, settings.submit),
            ledger,
            settings,
        }
    }
    pub fn sequencer(&self) -> &Sequencer<L> {
        &self.sequencer
    }
    pub fn vault_transactions(&self) -> &VaultTransactionBuilder<L> {
        &self.vault_transactions
    }
    pub fn proposals(&self) -> &ProposalPublisher<L> {
        &self.proposals
    }

    pub async fn fund_members(
        &self,
        chain: &FundingChain,
        payer: &Identity,
        recipients: &[Pubkey],
    ) -> Result<Vec<FundingReport>> {
        let mut reports = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            reports.push(chain.fund(self.ledger.as_ref(), payer, recipient).await?);
        }
        Ok(reports)
    }

    pub async fn provision(
        &self,
        creator: &Identity,
        spec: &MultisigSpec,
        treasury: Option<Pubkey>,
    ) -> Result<Provisioned> {
        self.provisioner.ensure_multisig(creator, spec, treasury).await
    }

    /// Creates the vault transaction at the next free index, then its proposal
    ///
    /// with `resume_pending` a confirmed vault transaction that matches `request` and still
    /// lacks a proposal is reused and only the proposal is created
    #[tracing::instrument(skip(self, creator, request), fields(multisig = %request.multisig))]
    pub async fn propose(
        &self,
        creator: &Identity,
        request: &VaultTransactionRequest,
    ) -> Result<ProposalReport> {
        let multisig = request.multisig;
        let pending = if self.settings.resume_pending {
            self.vault_transactions
                .find_pending(&creator.pubkey(), request)
                .await?
        } else {
            None
        };
        let (index, vault_transaction_signature) = match pending {
            Some(index) => {
                log::info!(
                    "resuming pending vault transaction {index}, only the proposal is missing"
                );
                (index, None)
            }
            None => {
                let builder = &self.vault_transactions;
                let attempts = self.settings.max_attempts;
                let (index, signature) = self
                    .sequencer
                    .with_next_index(&multisig, attempts, move |index| async move {
                        builder
                            .create(creator, request, index)
                            .await
                            .map(|signature| (index, signature))
                    })
                    .await?;
                log::info!("vault transaction {index} created: {signature}");
                (index, Some(signature))
            }
        };

        let proposal_signature = self.proposals.create(&multisig, index, creator).await?;
        log::info!("proposal {index} created: {proposal_signature}");
        let proposal_status = self
            .proposals
            .fetch(&multisig, index)
            .await?
            .map(|proposal| proposal.status.name().to_string());
        Ok(ProposalReport {
            multisig: multisig.to_string(),
            vault: request.vault()?.to_string(),
            transaction_index: index,
            vault_transaction_signature: vault_transaction_signature.map(|sig| sig.to_string()),
            proposal_signature: proposal_signature.to_string(),
            proposal_status,
        })
    }

    pub async fn propose_transfer(
        &self,
        creator: &Identity,
        multisig: &Pubkey,
        transfer: &TransferPlan,
    ) -> Result<ProposalReport> {
        let request = transfer.request(*multisig)?;
        self.propose(creator, &request).await
    }

    /// the whole flow, any failure aborts the remaining steps
    pub async fn run(&self, creator: &Identity, plan: &RunPlan) -> Result<RunReport> {
        let funding = match &plan.funding {
            Some(chain) => self.fund_members(chain, creator, &plan.fund_recipients).await?,
            None => vec![],
        };
        let provisioned = self.provision(creator, &plan.multisig, plan.treasury).await?;
        let provision = provisioned.report(plan.transfer.vault_index)?;
        let proposal = self
            .propose_transfer(creator, &provisioned.address, &plan.transfer)
            .await?;
        Ok(RunReport {
            funding,
            provision,
            proposal,
        })
    }
}
