//! idempotent create-or-fetch of the multisig derived from a creator key
use {
    super::{
        ledger::{signed_transaction, submit_and_confirm, LedgerGateway},
        sequencer::fetch_multisig,
    },
    crate::{
        error::{Error, Result},
        identity::Identity,
        programs::squads::{
            error::ProgramFailure,
            instructions::{self, MultisigCreateArgsV2},
            pda,
            v4::{Member, MultisigV4, Permissions, ProgramConfig, MAX_TIME_LOCK},
        },
        types::{ProvisionReport, SubmitOptions},
    },
    solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature},
    std::{collections::HashSet, sync::Arc},
};

/// Requested membership and settings of a multisig
#[derive(Clone, Debug, PartialEq)]
pub struct MultisigSpec {
    pub members: Vec<Member>,
    pub threshold: u16,
    pub time_lock: u32,
    pub config_authority: Option<Pubkey>,
    pub rent_collector: Option<Pubkey>,
    pub memo: Option<String>,
}

impl MultisigSpec {
    /// `creator` with every permission followed by `others`
    pub fn with_creator(creator: Pubkey, others: Vec<Member>, threshold: u16) -> Self {
        let mut members = vec![Member {
            key: creator,
            permissions: Permissions::all(),
        }];
        members.extend(others);
        Self {
            members,
            threshold,
            time_lock: 0,
            config_authority: None,
            rent_collector: None,
            memo: None,
        }
    }

    /// checks the member set the way the program will, so an invalid set is refused before
    /// anything is submitted
    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(Error::InvalidMultisig("member list is empty".to_string()));
        }
        let mut seen = HashSet::with_capacity(self.members.len());
        for member in &self.members {
            if !seen.insert(member.key) {
                return Err(Error::InvalidMultisig(format!(
                    "duplicate member {}",
                    member.key
                )));
            }
            if member.permissions.mask & !Permissions::ALL_MASK != 0 {
                return Err(Error::InvalidMultisig(format!(
                    "member {} has unknown permission bits {:#05b}",
                    member.key, member.permissions.mask
                )));
            }
        }
        if !self.members.iter().any(|member| member.permissions.is_all()) {
            return Err(Error::InvalidMultisig(
                "at least one member must hold every permission".to_string(),
            ));
        }
        let voters = MultisigV4::num_voters(&self.members);
        if self.threshold == 0 || usize::from(self.threshold) > voters {
            return Err(Error::InvalidMultisig(format!(
                "threshold {} must be between 1 and the number of voters {voters}",
                self.threshold
            )));
        }
        if self.time_lock > MAX_TIME_LOCK {
            return Err(Error::InvalidMultisig(format!(
                "time lock {} exceeds {MAX_TIME_LOCK}",
                self.time_lock
            )));
        }
        Ok(())
    }

    fn create_args(&self) -> MultisigCreateArgsV2 {
        MultisigCreateArgsV2 {
            config_authority: self.config_authority,
            threshold: self.threshold,
            members: self.members.clone(),
            time_lock: self.time_lock,
            rent_collector: self.rent_collector,
            memo: self.memo.clone(),
        }
    }

    fn matches(&self, account: &MultisigV4) -> bool {
        let mut wanted = self.members.clone();
        wanted.sort_by_key(|member| member.key);
        let mut stored = account.members.clone();
        stored.sort_by_key(|member| member.key);
        wanted == stored && account.threshold == self.threshold
    }
}

/// A multisig that exists on the ledger
#[derive(Clone, Debug)]
pub struct Provisioned {
    pub address: Pubkey,
    pub account: MultisigV4,
    /// set when this call created the multisig
    pub signature: Option<Signature>,
    pub created: bool,
}

impl Provisioned {
    pub fn vault(&self, vault_index: u8) -> Result<Pubkey> {
        Ok(pda::vault_pda(&self.address, vault_index)?.0)
    }
    pub fn report(&self, vault_index: u8) -> Result<ProvisionReport> {
        Ok(ProvisionReport {
            multisig: self.address.to_string(),
            vault: self.vault(vault_index)?.to_string(),
            created: self.created,
            signature: self.signature.map(|sig| sig.to_string()),
            threshold: self.account.threshold,
            members: self
                .account
                .members
                .iter()
                .map(|member| member.key.to_string())
                .collect(),
            transaction_index: self.account.transaction_index,
        })
    }
}

pub struct Provisioner<L> {
    ledger: Arc<L>,
    commitment: CommitmentConfig,
    opts: SubmitOptions,
}

impl<L: LedgerGateway> Provisioner<L> {
    pub fn new(ledger: Arc<L>, commitment: CommitmentConfig, opts: SubmitOptions) -> Self {
        Self {
            ledger,
            commitment,
            opts,
        }
    }

    /// treasury configured by the program, multisig creation fees are paid to it
    pub async fn treasury(&self) -> Result<Pubkey> {
        let (address, _) = pda::program_config_pda()?;
        let data = self
            .ledger
            .get_account(&address)
            .await?
            .ok_or(Error::AccountNotFound { address })?;
        Ok(ProgramConfig::from_account_data(&address, &data)?.treasury)
    }

    /// Ensures the multisig seeded by `creator` exists
    ///
    /// creation is attempted once, a rejection because the account is already in use means an
    /// earlier run created it and the stored account is returned instead
    pub async fn ensure_multisig(
        &self,
        creator: &Identity,
        spec: &MultisigSpec,
        treasury: Option<Pubkey>,
    ) -> Result<Provisioned> {
        spec.validate()?;
        let (address, _) = pda::multisig_pda(&creator.pubkey())?;
        let treasury = match treasury {
            Some(treasury) => treasury,
            None => self.treasury().await?,
        };
        let ix =
            instructions::multisig_create_v2(&creator.pubkey(), &treasury, &spec.create_args())?;
        let checkpoint = self.ledger.latest_checkpoint(self.commitment).await?;
        let tx = signed_transaction(creator, &[ix], &checkpoint)?;
        log::info!("creating multisig {address} if it doesn't exist");

        match submit_and_confirm(self.ledger.as_ref(), &tx, &checkpoint, self.opts, self.commitment)
            .await
        {
            Ok(signature) => {
                log::info!("created multisig {address}: {signature}");
                let account = fetch_multisig(self.ledger.as_ref(), &address).await?;
                Ok(Provisioned {
                    address,
                    account,
                    signature: Some(signature),
                    created: true,
                })
            }
            Err(err) if err.program_failure() == Some(ProgramFailure::AccountAlreadyInUse) => {
                log::info!("multisig {address} already exists, fetching it");
                let account = fetch_multisig(self.ledger.as_ref(), &address).await?;
                if !spec.matches(&account) {
                    log::warn!(
                        "existing multisig {address} differs from the requested one \
                         (threshold {} members {})",
                        account.threshold,
                        account.members.len()
                    );
                }
                Ok(Provisioned {
                    address,
                    account,
                    signature: None,
                    created: false,
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            programs::squads::v4::{Permission, DISCRIMINATOR},
            test_utils::{InstructionKind, MockLedger},
        },
        solana_sdk::{instruction::InstructionError, transaction::TransactionError},
    };

    fn vote_member() -> Member {
        Member {
            key: Pubkey::new_unique(),
            permissions: Permissions::from_vec(&[Permission::Vote]),
        }
    }

    fn provisioner(ledger: &Arc<MockLedger>, skip_preflight: bool) -> Provisioner<MockLedger> {
        Provisioner::new(
            ledger.clone(),
            CommitmentConfig::confirmed(),
            SubmitOptions { skip_preflight },
        )
    }

    #[test]
    fn test_spec_validation() {
        let creator = Pubkey::new_unique();
        let spec = MultisigSpec::with_creator(creator, vec![vote_member()], 2);
        spec.validate().unwrap();

        let mut bad = spec.clone();
        bad.threshold = 0;
        assert!(matches!(bad.validate(), Err(Error::InvalidMultisig(_))));
        bad.threshold = 3;
        assert!(bad.validate().is_err());

        let mut bad = spec.clone();
        bad.members.push(bad.members[1]);
        assert!(bad.validate().is_err());

        let mut bad = spec.clone();
        bad.members[0].permissions = Permissions::from_vec(&[Permission::Vote]);
        assert!(bad.validate().is_err());

        let mut bad = spec.clone();
        bad.members[1].permissions.mask = 0b1000;
        assert!(bad.validate().is_err());

        let mut bad = spec;
        bad.members.clear();
        bad.threshold = 1;
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_ensure_multisig_is_idempotent() {
        for skip_preflight in [false, true] {
            let ledger = Arc::new(MockLedger::new());
            let creator = Identity::generate();
            let spec = MultisigSpec::with_creator(creator.pubkey(), vec![vote_member()], 2);
            let provisioner = provisioner(&ledger, skip_preflight);

            let first = provisioner.ensure_multisig(&creator, &spec, None).await.unwrap();
            assert!(first.created);
            assert!(first.signature.is_some());
            assert_eq!(first.account.transaction_index, 0);
            assert_eq!(first.account.threshold, 2);
            assert_eq!(first.account.create_key, creator.pubkey());

            let second = provisioner.ensure_multisig(&creator, &spec, None).await.unwrap();
            assert!(!second.created);
            assert!(second.signature.is_none());
            assert_eq!(second.address, first.address);
            assert_eq!(ledger.count_accounts(&DISCRIMINATOR), 1);
            assert_eq!(ledger.attempts_of(InstructionKind::MultisigCreate), 2);
        }
    }

    #[tokio::test]
    async fn test_invalid_spec_is_never_submitted() {
        let ledger = Arc::new(MockLedger::new());
        let creator = Identity::generate();
        let spec = MultisigSpec::with_creator(creator.pubkey(), vec![], 2);
        let err = provisioner(&ledger, true)
            .ensure_multisig(&creator, &spec, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMultisig(_)));
        assert!(ledger.attempted().is_empty());
    }

    #[tokio::test]
    async fn test_other_failures_are_fatal() {
        let ledger = Arc::new(MockLedger::new());
        let creator = Identity::generate();
        let spec = MultisigSpec::with_creator(creator.pubkey(), vec![vote_member()], 2);
        ledger.fail_next(
            InstructionKind::MultisigCreate,
            TransactionError::InstructionError(0, InstructionError::Custom(6003)),
        );
        let err = provisioner(&ledger, true)
            .ensure_multisig(&creator, &spec, None)
            .await
            .unwrap_err();
        match err {
            Error::TransactionFailed {
                signature,
                program_error,
                ..
            } => {
                // skipped preflight so the failure surfaced at confirmation
                assert!(signature.is_some());
                assert_eq!(
                    program_error,
                    Some(ProgramFailure::Multisig(
                        crate::programs::squads::error::MultisigErrorCode::InvalidThreshold
                    ))
                );
            }
            err => panic!("unexpected error {err:#?}"),
        }
        assert_eq!(ledger.count_accounts(&DISCRIMINATOR), 0);
    }

    #[tokio::test]
    async fn test_treasury_lookup() {
        let ledger = Arc::new(MockLedger::new());
        let provisioner = provisioner(&ledger, true);
        assert_eq!(provisioner.treasury().await.unwrap(), ledger.treasury());

        ledger.remove_account(&pda::program_config_pda().unwrap().0);
        assert!(matches!(
            provisioner.treasury().await,
            Err(Error::AccountNotFound { .. })
        ));
    }
}
