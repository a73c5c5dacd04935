//! transaction index sequencing for a multisig
//!
//! the program only accepts a vault transaction whose index is the stored counter plus one,
//! so the counter is treated as an optimistic concurrency field: read it, submit with the
//! derived index, and on a stale index rejection read again and retry
use {
    super::ledger::LedgerGateway,
    crate::{
        error::{Error, Result},
        programs::squads::v4::MultisigV4,
    },
    solana_sdk::pubkey::Pubkey,
    std::{future::Future, sync::Arc},
};

/// Fetches and decodes the multisig account at `address`
pub async fn fetch_multisig<L: LedgerGateway>(ledger: &L, address: &Pubkey) -> Result<MultisigV4> {
    match ledger.get_account(address).await? {
        Some(data) if !data.is_empty() => MultisigV4::from_account_data(address, &data),
        _ => Err(Error::AccountNotFound { address: *address }),
    }
}

pub struct Sequencer<L> {
    ledger: Arc<L>,
}

impl<L: LedgerGateway> Sequencer<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    pub async fn current_index(&self, multisig: &Pubkey) -> Result<u64> {
        Ok(fetch_multisig(self.ledger.as_ref(), multisig)
            .await?
            .transaction_index)
    }

    /// index the next vault transaction must declare, read fresh from the ledger
    pub async fn next_index(&self, multisig: &Pubkey) -> Result<u64> {
        let current = self.current_index(multisig).await?;
        current
            .checked_add(1)
            .ok_or(Error::IndexOverflow { current })
    }

    /// Runs `op` with the next index, re-reading the counter and retrying whenever `op`
    /// reports [`Error::StaleIndex`]
    ///
    /// any other error ends the loop immediately, after `max_attempts` stale rejections the
    /// last one is returned
    pub async fn with_next_index<T, F, Fut>(
        &self,
        multisig: &Pubkey,
        max_attempts: u32,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let index = self.next_index(multisig).await?;
            log::debug!("attempt {attempt}/{max_attempts} using transaction index {index}");
            match op(index).await {
                Err(err) if err.is_stale_index() && attempt < max_attempts => {
                    log::warn!("transaction index {index} for {multisig} went stale, resequencing");
                }
                res => return res,
            }
        }
    }
}
