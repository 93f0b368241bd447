use std::future::Future;
use std::time::Duration;

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use solana_sdk::transaction::TransactionError;
use thiserror::Error;
use tokio_retry::RetryIf;
use tracing::debug;

/// Errors returned by the ledger RPC layer
#[derive(Debug, Clone, Error)]
pub enum RpcManagerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    /// The transaction references a blockhash the ledger no longer accepts
    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    /// Definitive refusal by the ledger; carries the ledger's own error
    #[error("Transaction rejected: {error} (endpoint: {endpoint})")]
    TransactionRejected {
        endpoint: String,
        error: TransactionError,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcManagerError {
    /// Check if this error is retryable with the same request
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcManagerError::Transport { .. } => true,
            RpcManagerError::Timeout { .. } => true,
            RpcManagerError::RateLimitExceeded { .. } => true,

            // Resending the same signed bytes can never succeed past expiry
            RpcManagerError::BlockhashNotFound { .. } => false,
            RpcManagerError::TransactionRejected { .. } => false,
            RpcManagerError::Validation(_) => false,
            RpcManagerError::Internal(_) => false,

            RpcManagerError::RpcResponse { code, .. } => {
                // Retry on server errors (5xx)
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcManagerError::Transport { endpoint, .. } => Some(endpoint),
            RpcManagerError::Timeout { endpoint, .. } => Some(endpoint),
            RpcManagerError::RpcResponse { endpoint, .. } => Some(endpoint),
            RpcManagerError::RateLimitExceeded { endpoint } => Some(endpoint),
            RpcManagerError::BlockhashNotFound { endpoint } => Some(endpoint),
            RpcManagerError::TransactionRejected { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Classify a ledger-level transaction error
    pub fn from_transaction_error(error: TransactionError, endpoint: &str) -> Self {
        match error {
            TransactionError::BlockhashNotFound => RpcManagerError::BlockhashNotFound {
                endpoint: endpoint.to_string(),
            },
            error => RpcManagerError::TransactionRejected {
                endpoint: endpoint.to_string(),
                error,
            },
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        // Preflight failures carry the ledger's verdict; keep it typed
        if let Some(tx_err) = err.get_transaction_error() {
            return Self::from_transaction_error(tx_err, endpoint);
        }

        match err.kind() {
            ClientErrorKind::Io(io) => {
                return RpcManagerError::Transport {
                    endpoint: endpoint.to_string(),
                    message: io.to_string(),
                };
            }
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                return RpcManagerError::RpcResponse {
                    endpoint: endpoint.to_string(),
                    message: message.clone(),
                    code: Some(*code),
                };
            }
            _ => {}
        }

        let err_str = err.to_string().to_lowercase();

        if err_str.contains("blockhash not found") {
            RpcManagerError::BlockhashNotFound {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("rate limit")
            || err_str.contains("too many requests")
            || err_str.contains("429")
        {
            RpcManagerError::RateLimitExceeded {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            RpcManagerError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: 0,
            }
        } else if err_str.contains("connection")
            || err_str.contains("reset")
            || err_str.contains("error sending request")
        {
            RpcManagerError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        } else {
            RpcManagerError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
                code: None,
            }
        }
    }
}

/// Retry policy for transient RPC failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,

    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        // Add jitter to prevent thundering herd
        let jitter = (fastrand::f64() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay = (delay_ms * (1.0 + jitter)).max(0.0) as u64;

        Some(Duration::from_millis(jittered_delay))
    }

    /// Backoff schedule consumed by `tokio_retry`
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).filter_map(move |attempt| self.calculate_delay(attempt))
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Run `action` and retry it on retryable errors following `policy`.
///
/// Non-retryable errors are returned immediately. `on_retry` is invoked
/// once per retry with the error that caused it.
pub async fn retry_transient<T, A, Fut, H>(
    policy: &RetryPolicy,
    operation: &'static str,
    action: A,
    mut on_retry: H,
) -> Result<T, RpcManagerError>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcManagerError>>,
    H: FnMut(&RpcManagerError),
{
    RetryIf::spawn(policy.delays(), action, |err: &RpcManagerError| {
        let retry = err.is_retryable();
        if retry {
            debug!(operation, error = %err, "Transient RPC failure, backing off");
            on_retry(err);
        }
        retry
    })
    .await
}
