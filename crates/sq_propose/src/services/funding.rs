//! funding of secondary signers through an ordered chain of strategies, the first success
//! ends the chain and each failure is logged and skipped
use {
    super::ledger::{signed_transaction, submit_and_confirm, LedgerGateway},
    crate::{
        error::{Error, Result},
        identity::Identity,
        types::{Confirmation, FundingReport, SubmitOptions},
    },
    solana_sdk::{
        commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
        system_instruction,
    },
    std::fmt,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FundingStrategy {
    /// faucet request through the ledger
    Airdrop { lamports: u64 },
    /// system transfer paid for by the creator
    PeerTransfer { lamports: u64 },
}

impl fmt::Display for FundingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Airdrop { .. } => write!(f, "airdrop"),
            Self::PeerTransfer { .. } => write!(f, "peer-transfer"),
        }
    }
}

pub struct FundingChain {
    strategies: Vec<FundingStrategy>,
    commitment: CommitmentConfig,
    opts: SubmitOptions,
}

impl FundingChain {
    pub fn new(
        strategies: Vec<FundingStrategy>,
        commitment: CommitmentConfig,
        opts: SubmitOptions,
    ) -> Self {
        Self {
            strategies,
            commitment,
            opts,
        }
    }
    /// airdrop first, fall back to a transfer from the creator
    pub fn airdrop_then_transfer(
        airdrop_lamports: u64,
        fallback_lamports: u64,
        commitment: CommitmentConfig,
        opts: SubmitOptions,
    ) -> Self {
        Self::new(
            vec![
                FundingStrategy::Airdrop {
                    lamports: airdrop_lamports,
                },
                FundingStrategy::PeerTransfer {
                    lamports: fallback_lamports,
                },
            ],
            commitment,
            opts,
        )
    }

    pub async fn fund<L: LedgerGateway>(
        &self,
        ledger: &L,
        payer: &Identity,
        recipient: &Pubkey,
    ) -> Result<FundingReport> {
        let mut reasons = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match self.try_strategy(ledger, payer, recipient, *strategy).await {
                Ok(signature) => {
                    log::info!("funded {recipient} using {strategy}: {signature}");
                    return Ok(FundingReport {
                        recipient: recipient.to_string(),
                        strategy: strategy.to_string(),
                        signature: signature.to_string(),
                    });
                }
                Err(err) => {
                    log::warn!("funding {recipient} using {strategy} failed {err:#}");
                    reasons.push(format!("{strategy}: {err}"));
                }
            }
        }
        Err(Error::Funding {
            recipient: *recipient,
            reasons: reasons.join("; "),
        })
    }

    async fn try_strategy<L: LedgerGateway>(
        &self,
        ledger: &L,
        payer: &Identity,
        recipient: &Pubkey,
        strategy: FundingStrategy,
    ) -> Result<Signature> {
        match strategy {
            FundingStrategy::Airdrop { lamports } => {
                let checkpoint = ledger.latest_checkpoint(self.commitment).await?;
                let signature = ledger.fund(recipient, lamports).await?;
                match ledger.confirm(&signature, &checkpoint, self.commitment).await? {
                    Confirmation::Success => Ok(signature),
                    Confirmation::Failed(err) => {
                        Err(Error::transaction_failed(Some(signature), err))
                    }
                }
            }
            FundingStrategy::PeerTransfer { lamports } => {
                let checkpoint = ledger.latest_checkpoint(self.commitment).await?;
                let tx = signed_transaction(
                    payer,
                    &[system_instruction::transfer(
                        &payer.pubkey(),
                        recipient,
                        lamports,
                    )],
                    &checkpoint,
                )?;
                submit_and_confirm(ledger, &tx, &checkpoint, self.opts, self.commitment).await
            }
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::test_utils::MockLedger};

    fn chain() -> FundingChain {
        FundingChain::airdrop_then_transfer(
            1_000_000_000,
            1_000_000,
            CommitmentConfig::confirmed(),
            SubmitOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_airdrop_succeeds() {
        let ledger = MockLedger::new();
        let creator = Identity::generate();
        let member = Pubkey::new_unique();
        let report = chain().fund(&ledger, &creator, &member).await.unwrap();
        assert_eq!(report.strategy, "airdrop");
        assert_eq!(ledger.lamports(&member), 1_000_000_000);
    }

    #[tokio::test]
    async fn test_falls_back_to_peer_transfer() {
        let ledger = MockLedger::new();
        ledger.set_airdrops_fail(true);
        let creator = Identity::generate();
        ledger.credit(&creator.pubkey(), 10_000_000);
        let member = Pubkey::new_unique();
        let report = chain().fund(&ledger, &creator, &member).await.unwrap();
        assert_eq!(report.strategy, "peer-transfer");
        assert_eq!(ledger.lamports(&member), 1_000_000);
        assert_eq!(ledger.lamports(&creator.pubkey()), 9_000_000);
    }

    #[tokio::test]
    async fn test_all_strategies_failing_is_fatal() {
        let ledger = MockLedger::new();
        ledger.set_airdrops_fail(true);
        // the creator holds nothing so the transfer fails too
        let creator = Identity::generate();
        let member = Pubkey::new_unique();
        let err = chain().fund(&ledger, &creator, &member).await.unwrap_err();
        match err {
            Error::Funding { recipient, reasons } => {
                assert_eq!(recipient, member);
                assert!(reasons.contains("airdrop"));
                assert!(reasons.contains("peer-transfer"));
            }
            err => panic!("unexpected error {err:#?}"),
        }
        assert_eq!(ledger.lamports(&member), 0);
    }
}
