use {
    super::{
        config::load_config,
        utils::{apply_transfer_args, print_json},
    },
    crate::cli::TransferArgs,
    anyhow::Context,
    sq_propose::{programs::squads::pda, services::orchestrator::Orchestrator},
    std::sync::Arc,
};

pub async fn propose_transfer(
    config_path: &str,
    rpc_url: Option<String>,
    args: &TransferArgs,
) -> anyhow::Result<()> {
    let mut cfg = load_config(config_path, rpc_url).await?;
    apply_transfer_args(&mut cfg, args);
    let creator = cfg.creator()?;
    let (multisig, _) = pda::multisig_pda(&creator.pubkey())?;
    let orchestrator = Orchestrator::new(Arc::new(cfg.rpc_ledger()?), cfg.run_settings()?);
    let report = orchestrator
        .propose_transfer(&creator, &multisig, &cfg.transfer_plan()?)
        .await
        .with_context(|| format!("failed to propose transfer from {multisig}"))?;
    print_json(&report)
}

pub async fn run(
    config_path: &str,
    rpc_url: Option<String>,
    args: &TransferArgs,
) -> anyhow::Result<()> {
    let mut cfg = load_config(config_path, rpc_url).await?;
    apply_transfer_args(&mut cfg, args);
    let creator = cfg.creator()?;
    log::info!("running as creator {creator}");
    let plan = cfg.run_plan(&creator.pubkey())?;
    let orchestrator = Orchestrator::new(Arc::new(cfg.rpc_ledger()?), cfg.run_settings()?);
    let report = orchestrator
        .run(&creator, &plan)
        .await
        .with_context(|| "run failed")?;
    print_json(&report)
}
