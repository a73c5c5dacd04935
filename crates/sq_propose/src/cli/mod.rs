use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sq_propose", about = "squads v4 multisig transfer proposer")]
pub struct Cli {
    #[arg(long, default_value = "info", help = "log verbosity to use")]
    pub log_level: String,

    #[arg(long, default_value = "", help = "optionally output logs to this file")]
    pub log_file: String,

    #[arg(long, default_value = "config.yaml")]
    pub config: String,

    #[arg(long, global = true, help = "overrides the configured rpc url")]
    pub rpc_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "initialize a new config file")]
    NewConfig,

    #[command(about = "print the program derived addresses of a multisig")]
    Derive {
        #[arg(long, help = "create key of the multisig, defaults to the configured creator")]
        creator: Option<String>,

        #[arg(long, default_value = "0")]
        vault_index: u8,

        #[arg(long, help = "also derive the transaction and proposal for this index")]
        transaction_index: Option<u64>,
    },

    #[command(about = "show the on-chain state of the creator's multisig")]
    Status {
        #[arg(long, help = "multisig address, defaults to the one derived from the creator")]
        multisig: Option<String>,
    },

    #[command(about = "fund secondary members and create the multisig if it doesn't exist")]
    CreateMultisig,

    #[command(
        about = "create a vault transfer transaction and its proposal",
        long_about = "the multisig must already exist, a confirmed transfer from an earlier \
                      failed run is reused"
    )]
    ProposeTransfer {
        #[command(flatten)]
        transfer: TransferArgs,
    },

    #[command(about = "fund, create the multisig, then propose the configured transfer")]
    Run {
        #[command(flatten)]
        transfer: TransferArgs,
    },
}

/// overrides for the configured transfer
#[derive(Args, Clone, Default)]
pub struct TransferArgs {
    #[arg(long, help = "address receiving the transfer")]
    pub recipient: Option<String>,

    #[arg(long, help = "amount to transfer in lamports")]
    pub lamports: Option<u64>,

    #[arg(long, help = "vault to transfer from")]
    pub vault_index: Option<u8>,

    #[arg(long)]
    pub memo: Option<String>,
}
