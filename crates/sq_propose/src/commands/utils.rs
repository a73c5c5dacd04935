use {
    crate::cli::TransferArgs,
    anyhow::Context,
    serde::Serialize,
    sq_propose::config::Config,
};

/// reports go to stdout so they can be piped, logs go to stderr
pub fn print_json<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(report).with_context(|| "failed to serialize report")?
    );
    Ok(())
}

pub fn apply_transfer_args(cfg: &mut Config, args: &TransferArgs) {
    if let Some(recipient) = &args.recipient {
        cfg.transfer.recipient = recipient.clone();
    }
    if let Some(lamports) = args.lamports {
        cfg.transfer.lamports = lamports;
    }
    if let Some(vault_index) = args.vault_index {
        cfg.transfer.vault_index = vault_index;
    }
    if let Some(memo) = &args.memo {
        cfg.transfer.memo = Some(memo.clone());
    }
}
