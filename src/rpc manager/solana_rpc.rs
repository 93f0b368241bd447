//! `LedgerRpc` over the nonblocking Solana JSON-RPC client
//!
//! Every call is bounded by a per-request timeout. Read-only calls are
//! retried on transient failures; `send_transaction` is retried by the
//! submission client, which owns the expiry window.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::client_error::Result as ClientResult;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::TransactionConfirmationStatus;
use tracing::{debug, instrument};

use super::{
    retry_transient, ConfirmationLevel, LedgerRpc, LivenessToken, RetryPolicy, RpcManagerError,
    SignatureStatus,
};
use crate::metrics::metrics;

pub struct SolanaRpc {
    client: Arc<RpcClient>,
    url: String,
    commitment: CommitmentConfig,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("url", &self.url)
            .field("commitment", &self.commitment)
            .field("request_timeout", &self.request_timeout)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl SolanaRpc {
    pub fn new(
        url: impl Into<String>,
        commitment: ConfirmationLevel,
        request_timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        let url = url.into();
        let commitment = commitment.as_commitment();
        let client = Arc::new(RpcClient::new_with_timeout_and_commitment(
            url.clone(),
            request_timeout,
            commitment,
        ));

        Self {
            client,
            url,
            commitment,
            request_timeout,
            retry_policy,
        }
    }

    /// Run one request under the timeout, mapping client errors
    async fn bounded<T, Fut>(&self, fut: Fut) -> Result<T, RpcManagerError>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(RpcManagerError::from_client_error(err, &self.url)),
            Err(_) => Err(RpcManagerError::Timeout {
                endpoint: self.url.clone(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }

    /// Bounded request with transient-failure retries
    async fn read<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, RpcManagerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let timer = std::time::Instant::now();
        let result = retry_transient(
            &self.retry_policy,
            operation,
            || self.bounded(f()),
            |_| metrics().transport_retries_total.inc(),
        )
        .await;
        metrics()
            .rpc_latency
            .observe(timer.elapsed().as_secs_f64());
        result
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, RpcManagerError> {
        self.read("get_minimum_balance_for_rent_exemption", || {
            self.client.get_minimum_balance_for_rent_exemption(data_len)
        })
        .await
    }

    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn get_latest_blockhash(&self) -> Result<LivenessToken, RpcManagerError> {
        let (blockhash, last_valid_block_height) = self
            .read("get_latest_blockhash", || {
                self.client
                    .get_latest_blockhash_with_commitment(self.commitment)
            })
            .await?;

        debug!(%blockhash, last_valid_block_height, "Fetched liveness token");
        Ok(LivenessToken {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_block_height(&self) -> Result<u64, RpcManagerError> {
        self.read("get_block_height", || {
            self.client.get_block_height_with_commitment(self.commitment)
        })
        .await
    }

    #[instrument(skip(self, transaction), fields(endpoint = %self.url))]
    async fn send_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, RpcManagerError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            // Rebroadcast is driven by the submission client
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };

        self.bounded(
            self.client
                .send_transaction_with_config(transaction, config),
        )
        .await
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError> {
        let response = self
            .read("get_signature_statuses", || {
                self.client.get_signature_statuses(std::slice::from_ref(signature))
            })
            .await?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| {
                let confirmation = match status.confirmation_status() {
                    TransactionConfirmationStatus::Processed => ConfirmationLevel::Processed,
                    TransactionConfirmationStatus::Confirmed => ConfirmationLevel::Confirmed,
                    TransactionConfirmationStatus::Finalized => ConfirmationLevel::Finalized,
                };
                SignatureStatus {
                    slot: status.slot,
                    err: status.err,
                    confirmation,
                }
            }))
    }

    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn request_airdrop(
        &self,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, RpcManagerError> {
        self.read("request_airdrop", || self.client.request_airdrop(to, lamports))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_client() {
        let rpc = SolanaRpc::new(
            "http://127.0.0.1:8899",
            ConfirmationLevel::Confirmed,
            Duration::from_secs(5),
            RetryPolicy::default(),
        );
        let rendered = format!("{:?}", rpc);
        assert!(rendered.contains("127.0.0.1:8899"));
        assert_eq!(rpc.endpoint(), "http://127.0.0.1:8899");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        // Port 9 (discard) is closed on test hosts; the failure must be classified
        // as a network problem, not a ledger verdict.
        let rpc = SolanaRpc::new(
            "http://127.0.0.1:9",
            ConfirmationLevel::Confirmed,
            Duration::from_millis(500),
            RetryPolicy::none(),
        );
        let err = rpc
            .get_minimum_balance_for_rent_exemption(82)
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected classification: {err:?}");
    }
}
