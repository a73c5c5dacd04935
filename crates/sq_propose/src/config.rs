use {
    crate::{
        error::Error,
        identity::Identity,
        programs::squads::v4::{Member, Permission, Permissions},
        services::{
            funding::FundingChain,
            ledger::RpcLedger,
            orchestrator::{RunPlan, RunSettings, TransferPlan},
            provisioner::MultisigSpec,
        },
        types::SubmitOptions,
    },
    anyhow::{Context, Result},
    solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey},
    std::{str::FromStr, time::Duration},
};

pub const RPC_ENV: &str = "RPC";
pub const CREATOR_KEYPAIR_ENV: &str = "CREATOR_KEYPAIR";

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct Config {
    pub rpc: RpcConfig,
    /// base58 encoded secret key of the multisig creator
    pub creator_keypair: String,
    pub multisig: MultisigConfig,
    pub funding: FundingConfig,
    pub transfer: TransferConfig,
    pub sequencer: SequencerConfig,
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub commitment: String,
    pub skip_preflight: bool,
    pub request_timeout_secs: u64,
    pub confirm_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct MultisigConfig {
    pub threshold: u16,
    pub time_lock: u32,
    pub config_authority: Option<String>,
    pub rent_collector: Option<String>,
    /// members besides the creator, who always holds every permission. when empty a fresh
    /// vote-only member is generated for each run
    pub members: Vec<MemberConfig>,
    pub memo: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct MemberConfig {
    pub address: String,
    pub permissions: Vec<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct FundingConfig {
    /// fund every non-creator member before provisioning
    pub enabled: bool,
    pub airdrop_lamports: u64,
    /// sent from the creator when the airdrop fails
    pub fallback_lamports: u64,
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct TransferConfig {
    pub recipient: String,
    pub lamports: u64,
    pub vault_index: u8,
    pub memo: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct SequencerConfig {
    /// attempts at creating a vault transaction when the index goes stale
    pub max_attempts: u32,
    /// reuse a confirmed vault transaction of ours that has no proposal yet
    pub resume_pending: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                url: "https://api.devnet.solana.com".to_string(),
                commitment: "confirmed".to_string(),
                skip_preflight: true,
                request_timeout_secs: 60,
                confirm_timeout_secs: 90,
                poll_interval_ms: 500,
            },
            creator_keypair: String::new(),
            multisig: MultisigConfig {
                threshold: 2,
                time_lock: 0,
                config_authority: None,
                rent_collector: None,
                members: vec![],
                memo: None,
            },
            funding: FundingConfig {
                enabled: true,
                airdrop_lamports: solana_sdk::native_token::LAMPORTS_PER_SOL,
                fallback_lamports: 1_000_000,
            },
            transfer: TransferConfig {
                recipient: "ByzxzJLuH9pfe6pnKBDFfFnEPxiPkvppPr4pjbwte9Sx".to_string(),
                lamports: 3_000_000,
                vault_index: 0,
                memo: None,
            },
            sequencer: SequencerConfig {
                max_attempts: 3,
                resume_pending: true,
            },
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        serde_yaml::from_str(&tokio::fs::read_to_string(path).await?)
            .with_context(|| "failed to deserialize config")
    }
    /// loads the config file when present, then applies the `RPC` and `CREATOR_KEYPAIR`
    /// environment overrides
    pub async fn load_with_env(path: &str) -> Result<Self> {
        let mut cfg = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await?
        } else {
            log::warn!("config file {path} not found, using defaults");
            Self::default()
        };
        cfg.apply_overrides(
            std::env::var(RPC_ENV).ok(),
            std::env::var(CREATOR_KEYPAIR_ENV).ok(),
        );
        Ok(cfg)
    }
    pub fn apply_overrides(&mut self, rpc_url: Option<String>, creator_keypair: Option<String>) {
        if let Some(rpc_url) = rpc_url.filter(|url| !url.is_empty()) {
            self.rpc.url = rpc_url;
        }
        if let Some(keypair) = creator_keypair.filter(|key| !key.is_empty()) {
            self.creator_keypair = keypair;
        }
    }
    pub async fn save(&self, path: &str) -> Result<()> {
        tokio::fs::write(
            path,
            serde_yaml::to_string(self).with_context(|| "failed to serialize config")?,
        )
        .await
        .with_context(|| "failed to write config")
    }
    /// fails when the endpoint or the creator identity is missing, or the rpc settings are unusable
    pub fn validate(&self) -> Result<(), Error> {
        if self.rpc.url.is_empty() {
            return Err(Error::Config(format!(
                "rpc url is not set, use the config file or {RPC_ENV}"
            )));
        }
        if self.creator_keypair.is_empty() {
            return Err(Error::Config(format!(
                "creator keypair is not set, use the config file or {CREATOR_KEYPAIR_ENV}"
            )));
        }
        if self.rpc.poll_interval_ms == 0 {
            return Err(Error::Config(
                "rpc poll interval must be at least one millisecond".to_string(),
            ));
        }
        self.commitment()?;
        Ok(())
    }
    pub fn creator(&self) -> Result<Identity, Error> {
        if self.creator_keypair.is_empty() {
            return Err(Error::Config("creator keypair is not set".to_string()));
        }
        Identity::from_base58(&self.creator_keypair)
    }
    pub fn commitment(&self) -> Result<CommitmentConfig, Error> {
        CommitmentConfig::from_str(&self.rpc.commitment)
            .map_err(|_| Error::Config(format!("invalid commitment {}", self.rpc.commitment)))
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.request_timeout_secs)
    }
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.confirm_timeout_secs)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.rpc.poll_interval_ms)
    }
    pub fn recipient(&self) -> Result<Pubkey, Error> {
        parse_pubkey("transfer recipient", &self.transfer.recipient)
    }
    pub fn config_authority(&self) -> Result<Option<Pubkey>, Error> {
        self.multisig
            .config_authority
            .as_deref()
            .map(|key| parse_pubkey("config authority", key))
            .transpose()
    }
    pub fn rent_collector(&self) -> Result<Option<Pubkey>, Error> {
        self.multisig
            .rent_collector
            .as_deref()
            .map(|key| parse_pubkey("rent collector", key))
            .transpose()
    }
    /// configured members besides the creator
    pub fn extra_members(&self) -> Result<Vec<Member>, Error> {
        self.multisig
            .members
            .iter()
            .map(|member| {
                Ok(Member {
                    key: parse_pubkey("member", &member.address)?,
                    permissions: Permissions::from_names(&member.permissions)?,
                })
            })
            .collect()
    }
    pub fn run_settings(&self) -> Result<RunSettings, Error> {
        Ok(RunSettings {
            commitment: self.commitment()?,
            submit: SubmitOptions {
                skip_preflight: self.rpc.skip_preflight,
            },
            max_attempts: self.sequencer.max_attempts,
            resume_pending: self.sequencer.resume_pending,
        })
    }
    pub fn rpc_ledger(&self) -> Result<RpcLedger, Error> {
        Ok(RpcLedger::new(
            self.rpc.url.clone(),
            self.commitment()?,
            self.request_timeout(),
            self.confirm_timeout(),
            self.poll_interval(),
        ))
    }
    /// `None` when funding is disabled
    pub fn funding_chain(&self) -> Result<Option<FundingChain>, Error> {
        if !self.funding.enabled {
            return Ok(None);
        }
        Ok(Some(FundingChain::airdrop_then_transfer(
            self.funding.airdrop_lamports,
            self.funding.fallback_lamports,
            self.commitment()?,
            SubmitOptions {
                skip_preflight: self.rpc.skip_preflight,
            },
        )))
    }
    pub fn transfer_plan(&self) -> Result<TransferPlan, Error> {
        Ok(TransferPlan {
            recipient: self.recipient()?,
            lamports: self.transfer.lamports,
            vault_index: self.transfer.vault_index,
            memo: self.transfer.memo.clone(),
        })
    }
    /// Multisig seeded by `creator` with the configured members
    ///
    /// without configured members a fresh vote-only member is generated, the returned keys
    /// are the members besides the creator, which are the ones needing funds
    pub fn multisig_spec(&self, creator: &Pubkey) -> Result<(MultisigSpec, Vec<Pubkey>), Error> {
        let mut others = self.extra_members()?;
        if others.is_empty() {
            let member = Identity::generate();
            log::warn!(
                "generated secondary member {member}, its secret key is not kept so it can never \
                 vote. configure multisig.members to control approvals"
            );
            others.push(Member {
                key: member.pubkey(),
                permissions: Permissions::from_vec(&[Permission::Vote]),
            });
        }
        let recipients = others.iter().map(|member| member.key).collect();
        let mut spec = MultisigSpec::with_creator(*creator, others, self.multisig.threshold);
        spec.time_lock = self.multisig.time_lock;
        spec.config_authority = self.config_authority()?;
        spec.rent_collector = self.rent_collector()?;
        spec.memo = self.multisig.memo.clone();
        Ok((spec, recipients))
    }
    pub fn run_plan(&self, creator: &Pubkey) -> Result<RunPlan, Error> {
        let (multisig, fund_recipients) = self.multisig_spec(creator)?;
        Ok(RunPlan {
            multisig,
            treasury: None,
            funding: self.funding_chain()?,
            fund_recipients,
            transfer: self.transfer_plan()?,
        })
    }
}

fn parse_pubkey(what: &str, value: &str) -> Result<Pubkey, Error> {
    value
        .parse()
        .map_err(|err| Error::Config(format!("invalid {what} address {value}: {err}")))
}

#[cfg(test)]
mod test {
    use {super::*, solana_sdk::signature::Keypair};

    #[test]
    fn test_default_config_round_trip_and_validation() {
        let cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        assert_eq!(cfg.commitment().unwrap(), CommitmentConfig::confirmed());
        assert_eq!(cfg.transfer.lamports, 3_000_000);

        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let mut cfg: Config = serde_yaml::from_str(&yaml).unwrap();
        cfg.apply_overrides(
            Some("http://localhost:8899".to_string()),
            Some(Keypair::new().to_base58_string()),
        );
        cfg.validate().unwrap();
        assert_eq!(cfg.rpc.url, "http://localhost:8899");
        assert!(cfg.creator().is_ok());

        cfg.apply_overrides(Some(String::new()), None);
        assert_eq!(cfg.rpc.url, "http://localhost:8899");

        cfg.rpc.commitment = "sorta".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let mut cfg = Config::default();
        cfg.apply_overrides(None, Some(Keypair::new().to_base58_string()));
        cfg.validate().unwrap();

        cfg.rpc.poll_interval_ms = 0;
        match cfg.validate() {
            Err(Error::Config(msg)) => assert!(msg.contains("poll interval")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_members_and_addresses() {
        let mut cfg = Config::default();
        let member = Pubkey::new_unique();
        cfg.multisig.members.push(MemberConfig {
            address: member.to_string(),
            permissions: vec!["vote".to_string(), "execute".to_string()],
        });
        let members = cfg.extra_members().unwrap();
        assert_eq!(members[0].key, member);
        assert!(members[0].permissions.has(Permission::Execute));
        assert!(!members[0].permissions.has(Permission::Initiate));
        assert_eq!(cfg.config_authority().unwrap(), None);

        cfg.multisig.rent_collector = Some("bogus".to_string());
        assert!(cfg.rent_collector().is_err());
        assert!(cfg.recipient().is_ok());
    }

    #[test]
    fn test_run_plan() {
        let mut cfg = Config::default();
        let creator = Pubkey::new_unique();

        // a vote only member is generated when none are configured
        let plan = cfg.run_plan(&creator).unwrap();
        assert_eq!(plan.multisig.members.len(), 2);
        assert_eq!(plan.multisig.members[0].key, creator);
        assert!(plan.multisig.members[0].permissions.is_all());
        assert_eq!(plan.fund_recipients, vec![plan.multisig.members[1].key]);
        assert_eq!(plan.multisig.threshold, 2);
        plan.multisig.validate().unwrap();
        assert!(plan.funding.is_some());
        assert_eq!(plan.transfer.lamports, 3_000_000);
        assert_eq!(plan.transfer.vault_index, 0);

        let member = Pubkey::new_unique();
        cfg.multisig.members.push(MemberConfig {
            address: member.to_string(),
            permissions: vec!["all".to_string()],
        });
        cfg.funding.enabled = false;
        let plan = cfg.run_plan(&creator).unwrap();
        assert_eq!(plan.fund_recipients, vec![member]);
        assert!(plan.funding.is_none());

        let settings = cfg.run_settings().unwrap();
        assert!(settings.submit.skip_preflight);
        assert_eq!(settings.max_attempts, 3);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("sq_propose_cfg_{}.yaml", std::process::id()));
        let path = path.to_str().unwrap();
        let mut cfg = Config::default();
        cfg.transfer.lamports = 42;
        cfg.save(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.transfer.lamports, 42);
        tokio::fs::remove_file(path).await.unwrap();
    }
}
