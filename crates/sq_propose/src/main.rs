pub mod cli;
pub mod commands;

use {
    clap::Parser,
    cli::{Cli, Commands},
    sq_propose::logger::{init_log, rotate_log_file, LogOpts},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    rotate_log_file(&cli.log_file).await;
    init_log(LogOpts {
        level: cli.log_level.clone(),
        file: cli.log_file.clone(),
    })?;

    process_command(cli).await
}

async fn process_command(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_str();
    match cli.command {
        Commands::NewConfig => commands::config::new_config(config_path).await,
        Commands::Derive {
            creator,
            vault_index,
            transaction_index,
        } => commands::multisig::derive(config_path, creator, vault_index, transaction_index).await,
        Commands::Status { multisig } => {
            commands::multisig::status(config_path, cli.rpc_url, multisig).await
        }
        Commands::CreateMultisig => {
            commands::multisig::create_multisig(config_path, cli.rpc_url).await
        }
        Commands::ProposeTransfer { transfer } => {
            commands::proposal::propose_transfer(config_path, cli.rpc_url, &transfer).await
        }
        Commands::Run { transfer } => {
            commands::proposal::run(config_path, cli.rpc_url, &transfer).await
        }
    }
}
