pub mod config;
pub mod multisig;
pub mod proposal;
pub mod utils;
