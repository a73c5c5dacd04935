pub mod funding;
pub mod ledger;
pub mod orchestrator;
pub mod proposal;
pub mod provisioner;
pub mod sequencer;
pub mod vault_transaction;
