use {anyhow::Context, sq_propose::config::Config};

pub async fn new_config(config_path: &str) -> anyhow::Result<()> {
    let cfg = Config::default();
    cfg.save(config_path).await?;
    log::info!("wrote default config to {config_path}");
    Ok(())
}

/// loads the config with environment and cli overrides applied, then validates it
pub async fn load_config(config_path: &str, rpc_url: Option<String>) -> anyhow::Result<Config> {
    let mut cfg = Config::load_with_env(config_path).await?;
    cfg.apply_overrides(rpc_url, None);
    cfg.validate().with_context(|| "invalid configuration")?;
    Ok(cfg)
}
