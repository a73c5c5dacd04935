use {
    super::{config::load_config, utils::print_json},
    anyhow::{anyhow, Context},
    solana_sdk::pubkey::Pubkey,
    sq_propose::{
        config::Config,
        programs::squads::pda,
        services::{
            orchestrator::{Orchestrator, RunPlan},
            proposal::ProposalPublisher,
            sequencer::fetch_multisig,
        },
        types::{DeriveReport, MemberReport, StatusReport},
    },
    std::sync::Arc,
};

pub async fn derive(
    config_path: &str,
    creator: Option<String>,
    vault_index: u8,
    transaction_index: Option<u64>,
) -> anyhow::Result<()> {
    let create_key = match creator {
        Some(creator) => creator
            .parse::<Pubkey>()
            .map_err(|err| anyhow!("invalid creator {creator}: {err}"))?,
        None => Config::load_with_env(config_path).await?.creator()?.pubkey(),
    };
    let (program_config, _) = pda::program_config_pda()?;
    let (multisig, _) = pda::multisig_pda(&create_key)?;
    let (vault, _) = pda::vault_pda(&multisig, vault_index)?;
    let (transaction, proposal) = match transaction_index {
        Some(index) => (
            Some(pda::transaction_pda(&multisig, index)?.0.to_string()),
            Some(pda::proposal_pda(&multisig, index)?.0.to_string()),
        ),
        None => (None, None),
    };
    print_json(&DeriveReport {
        program_config: program_config.to_string(),
        multisig: multisig.to_string(),
        vault_index,
        vault: vault.to_string(),
        transaction,
        proposal,
    })
}

pub async fn status(
    config_path: &str,
    rpc_url: Option<String>,
    multisig: Option<String>,
) -> anyhow::Result<()> {
    let cfg = load_config(config_path, rpc_url).await?;
    let address = match multisig {
        Some(multisig) => multisig
            .parse::<Pubkey>()
            .map_err(|err| anyhow!("invalid multisig {multisig}: {err}"))?,
        None => pda::multisig_pda(&cfg.creator()?.pubkey())?.0,
    };
    let ledger = Arc::new(cfg.rpc_ledger()?);
    let account = fetch_multisig(ledger.as_ref(), &address)
        .await
        .with_context(|| format!("failed to load multisig {address}"))?;
    let latest_proposal = if account.transaction_index > 0 {
        ProposalPublisher::new(ledger.clone(), cfg.commitment()?, Default::default())
            .fetch(&address, account.transaction_index)
            .await?
            .map(|proposal| proposal.status.name().to_string())
    } else {
        None
    };
    print_json(&StatusReport {
        multisig: address.to_string(),
        vault: pda::vault_pda(&address, cfg.transfer.vault_index)?.0.to_string(),
        threshold: account.threshold,
        time_lock: account.time_lock,
        transaction_index: account.transaction_index,
        stale_transaction_index: account.stale_transaction_index,
        members: account
            .members
            .iter()
            .map(|member| MemberReport {
                address: member.key.to_string(),
                permissions: member
                    .permissions
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect(),
        latest_proposal,
    })
}

pub async fn create_multisig(config_path: &str, rpc_url: Option<String>) -> anyhow::Result<()> {
    let cfg = load_config(config_path, rpc_url).await?;
    let creator = cfg.creator()?;
    let RunPlan {
        multisig,
        treasury,
        funding,
        fund_recipients,
        transfer,
    } = cfg.run_plan(&creator.pubkey())?;
    let orchestrator = Orchestrator::new(Arc::new(cfg.rpc_ledger()?), cfg.run_settings()?);
    if let Some(chain) = &funding {
        orchestrator
            .fund_members(chain, &creator, &fund_recipients)
            .await
            .with_context(|| "failed to fund members")?;
    }
    let provisioned = orchestrator
        .provision(&creator, &multisig, treasury)
        .await
        .with_context(|| "failed to create multisig")?;
    print_json(&provisioned.report(transfer.vault_index)?)
}
