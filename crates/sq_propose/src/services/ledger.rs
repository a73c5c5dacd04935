//! the network boundary: every call is a fresh round trip, nothing is cached and transport
//! failures are never retried here
use {
    crate::{
        error::{Error, Result},
        identity::Identity,
        types::{Checkpoint, Confirmation, SubmitOptions},
    },
    solana_account_decoder::UiAccountEncoding,
    solana_client::{
        nonblocking::rpc_client::RpcClient,
        rpc_config::{RpcAccountInfoConfig, RpcSendTransactionConfig},
    },
    solana_sdk::{
        commitment_config::CommitmentConfig,
        instruction::Instruction,
        message::{v0, VersionedMessage},
        pubkey::Pubkey,
        signature::Signature,
        transaction::VersionedTransaction,
    },
    solana_transaction_status::TransactionStatus,
    std::{future::Future, time::Duration},
};

pub trait LedgerGateway: Send + Sync {
    fn latest_checkpoint(
        &self,
        commitment: CommitmentConfig,
    ) -> impl Future<Output = Result<Checkpoint>> + Send;

    fn submit(
        &self,
        tx: &VersionedTransaction,
        opts: SubmitOptions,
    ) -> impl Future<Output = Result<Signature>> + Send;

    /// waits until `signature` reaches `commitment`, the blockhash of `checkpoint` expires, or
    /// the gateway's deadline passes
    fn confirm(
        &self,
        signature: &Signature,
        checkpoint: &Checkpoint,
        commitment: CommitmentConfig,
    ) -> impl Future<Output = Result<Confirmation>> + Send;

    /// `Ok(None)` means the address holds no account, which is distinct from a failed lookup
    fn get_account(&self, address: &Pubkey) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// best effort faucet request
    fn fund(
        &self,
        address: &Pubkey,
        lamports: u64,
    ) -> impl Future<Output = Result<Signature>> + Send;
}

/// v0 transaction paid for and signed by `payer` alone
pub fn signed_transaction(
    payer: &Identity,
    instructions: &[Instruction],
    checkpoint: &Checkpoint,
) -> Result<VersionedTransaction> {
    let message =
        v0::Message::try_compile(&payer.pubkey(), instructions, &[], checkpoint.blockhash)?;
    Ok(VersionedTransaction::try_new(
        VersionedMessage::V0(message),
        &[payer.keypair()],
    )?)
}

/// Submits `tx` and waits for it, a transaction level failure becomes
/// [`Error::TransactionFailed`] carrying the signature
pub async fn submit_and_confirm<L: LedgerGateway>(
    ledger: &L,
    tx: &VersionedTransaction,
    checkpoint: &Checkpoint,
    opts: SubmitOptions,
    commitment: CommitmentConfig,
) -> Result<Signature> {
    let signature = ledger.submit(tx, opts).await?;
    log::debug!("submitted {signature}, awaiting {:?}", commitment.commitment);
    match ledger.confirm(&signature, checkpoint, commitment).await? {
        Confirmation::Success => Ok(signature),
        Confirmation::Failed(err) => Err(Error::transaction_failed(Some(signature), err)),
    }
}

/// Maps a signature status onto a confirmation once it satisfies `commitment`
pub fn status_outcome(
    status: &TransactionStatus,
    commitment: CommitmentConfig,
) -> Option<Confirmation> {
    if !status.satisfies_commitment(commitment) {
        return None;
    }
    Some(match &status.err {
        Some(err) => Confirmation::Failed(err.clone()),
        None => Confirmation::Success,
    })
}

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct RpcLedger {
    rpc: RpcClient,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(
        url: String,
        commitment: CommitmentConfig,
        request_timeout: Duration,
        confirm_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self::with_client(
            RpcClient::new_with_timeout_and_commitment(url, request_timeout, commitment),
            confirm_timeout,
            poll_interval,
        )
    }
    /// a zero `poll_interval` is raised to one millisecond
    pub fn with_client(rpc: RpcClient, confirm_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            rpc,
            confirm_timeout,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    async fn signature_outcome(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<Option<Confirmation>> {
        let statuses = self.rpc.get_signature_statuses(&[*signature]).await?;
        Ok(match statuses.value.first() {
            Some(Some(status)) => status_outcome(status, commitment),
            _ => None,
        })
    }
}

impl LedgerGateway for RpcLedger {
    async fn latest_checkpoint(&self, commitment: CommitmentConfig) -> Result<Checkpoint> {
        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(commitment)
            .await?;
        Ok(Checkpoint {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn submit(&self, tx: &VersionedTransaction, opts: SubmitOptions) -> Result<Signature> {
        Ok(self
            .rpc
            .send_transaction_with_config(
                tx,
                RpcSendTransactionConfig {
                    skip_preflight: opts.skip_preflight,
                    preflight_commitment: Some(self.rpc.commitment().commitment),
                    // resubmission is driven by the caller re-running a step, never the node
                    max_retries: None,
                    ..Default::default()
                },
            )
            .await?)
    }

    async fn confirm(
        &self,
        signature: &Signature,
        checkpoint: &Checkpoint,
        commitment: CommitmentConfig,
    ) -> Result<Confirmation> {
        let start = chrono::Utc::now();
        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Some(outcome) = self.signature_outcome(signature, commitment).await? {
                log::debug!(
                    "{signature} reached {:?} after {}ms",
                    commitment.commitment,
                    chrono::Utc::now().signed_duration_since(start).num_milliseconds()
                );
                return Ok(outcome);
            }
            let block_height = self
                .rpc
                .get_block_height_with_commitment(commitment)
                .await?;
            if block_height > checkpoint.last_valid_block_height {
                // it may have landed between the status and height reads
                if let Some(outcome) = self.signature_outcome(signature, commitment).await? {
                    return Ok(outcome);
                }
                return Err(Error::BlockhashExpired {
                    signature: *signature,
                });
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::ConfirmationTimeout {
                    signature: *signature,
                    elapsed: self.confirm_timeout,
                });
            }
        }
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let account = self
            .rpc
            .get_account_with_config(
                address,
                RpcAccountInfoConfig {
                    encoding: Some(UiAccountEncoding::Base64),
                    commitment: Some(self.rpc.commitment()),
                    ..Default::default()
                },
            )
            .await?
            .value;
        Ok(account.map(|account| account.data))
    }

    async fn fund(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        Ok(self.rpc.request_airdrop(address, lamports).await?)
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        solana_client::rpc_request::RpcRequest,
        solana_sdk::{hash::Hash, instruction::InstructionError, transaction::TransactionError},
        solana_transaction_status::TransactionConfirmationStatus,
        std::collections::HashMap,
    };

    // the mock client answers block height queries with 1234
    const MOCK_BLOCK_HEIGHT: u64 = 1234;

    fn checkpoint(last_valid_block_height: u64) -> Checkpoint {
        Checkpoint {
            blockhash: Hash::new_unique(),
            last_valid_block_height,
        }
    }

    fn mock_ledger(rpc: RpcClient, confirm_timeout: Duration) -> RpcLedger {
        RpcLedger::with_client(rpc, confirm_timeout, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_confirm_times_out_without_status() {
        let ledger = mock_ledger(
            RpcClient::new_mock("sig_not_found".to_string()),
            Duration::from_millis(20),
        );
        let signature = Signature::new_unique();
        let err = ledger
            .confirm(&signature, &checkpoint(u64::MAX), CommitmentConfig::confirmed())
            .await
            .unwrap_err();
        match err {
            Error::ConfirmationTimeout {
                signature: timed_out,
                elapsed,
            } => {
                assert_eq!(timed_out, signature);
                assert_eq!(elapsed, Duration::from_millis(20));
            }
            err => panic!("unexpected error {err:#?}"),
        }
    }

    #[tokio::test]
    async fn test_confirm_stops_when_blockhash_expires() {
        let ledger = mock_ledger(
            RpcClient::new_mock("sig_not_found".to_string()),
            Duration::from_secs(60),
        );
        let signature = Signature::new_unique();
        let err = ledger
            .confirm(
                &signature,
                &checkpoint(MOCK_BLOCK_HEIGHT - 1),
                CommitmentConfig::confirmed(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BlockhashExpired { signature: expired } if expired == signature
        ));
    }

    #[tokio::test]
    async fn test_confirm_rechecks_status_after_expiry() {
        // the first status read misses, later reads see a finalized success
        let mut mocks = HashMap::new();
        mocks.insert(
            RpcRequest::GetSignatureStatuses,
            serde_json::json!({"context": {"slot": 1}, "value": [null]}),
        );
        let ledger = mock_ledger(
            RpcClient::new_mock_with_mocks("succeeds".to_string(), mocks),
            Duration::from_secs(60),
        );
        let outcome = ledger
            .confirm(
                &Signature::new_unique(),
                &checkpoint(MOCK_BLOCK_HEIGHT - 1),
                CommitmentConfig::confirmed(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Confirmation::Success);
    }

    #[tokio::test]
    async fn test_confirm_reports_landed_transaction() {
        let ledger = mock_ledger(
            RpcClient::new_mock("succeeds".to_string()),
            Duration::from_secs(60),
        );
        let outcome = ledger
            .confirm(
                &Signature::new_unique(),
                &checkpoint(u64::MAX),
                CommitmentConfig::confirmed(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Confirmation::Success);
    }

    fn status(
        confirmation_status: Option<TransactionConfirmationStatus>,
        confirmations: Option<usize>,
        err: Option<TransactionError>,
    ) -> TransactionStatus {
        TransactionStatus {
            slot: 1,
            confirmations,
            status: match &err {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
            err,
            confirmation_status,
        }
    }

    #[test]
    fn test_status_outcome() {
        let processed = status(Some(TransactionConfirmationStatus::Processed), Some(0), None);
        assert_eq!(status_outcome(&processed, CommitmentConfig::confirmed()), None);
        assert_eq!(
            status_outcome(&processed, CommitmentConfig::processed()),
            Some(Confirmation::Success)
        );

        let err = TransactionError::InstructionError(0, InstructionError::Custom(0));
        let failed = status(
            Some(TransactionConfirmationStatus::Confirmed),
            Some(1),
            Some(err.clone()),
        );
        assert_eq!(
            status_outcome(&failed, CommitmentConfig::confirmed()),
            Some(Confirmation::Failed(err))
        );

        let finalized = status(Some(TransactionConfirmationStatus::Finalized), None, None);
        assert_eq!(
            status_outcome(&finalized, CommitmentConfig::finalized()),
            Some(Confirmation::Success)
        );
    }
}
