//! Structured logging and pipeline context

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use uuid::Uuid;

use crate::tx_builder::errors::{IssuanceError, Stage};

/// Structured logger for issuance pipeline events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn log_stage(&self, stage: Stage, detail: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            stage = %stage,
            detail = %detail,
            "Pipeline stage"
        );
    }

    pub fn log_addresses(&self, mint: &Pubkey, holding_account: &Pubkey) {
        tracing::info!(
            context_id = %self.context_id,
            mint = %mint,
            holding_account = %holding_account,
            "Derived issuance addresses"
        );
    }

    pub fn log_envelope(&self, instructions: usize, signers: usize, expiry_height: u64) {
        tracing::info!(
            context_id = %self.context_id,
            instructions = %instructions,
            signers = %signers,
            expiry_height = %expiry_height,
            "Envelope assembled"
        );
    }

    pub fn log_confirmed(&self, signature: &Signature, slot: u64, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            signature = %signature,
            slot = %slot,
            latency_ms = %latency_ms,
            "Issuance transaction confirmed"
        );
    }

    pub fn log_failure(&self, error: &IssuanceError) {
        tracing::warn!(
            context_id = %self.context_id,
            stage = %error.stage(),
            category = %error.category(),
            retryable = %error.is_retryable(),
            error = %error,
            "Issuance failed"
        );
    }
}

/// Per-run execution context for correlating log lines
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Unique request ID
    pub request_id: String,

    /// Span ID
    pub span_id: String,

    /// Parent span ID (if any)
    pub parent_span_id: Option<String>,

    /// Operation name
    pub operation: String,

    /// Creation time
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Structured logger instance
    pub logger: StructuredLogger,
}

impl PipelineContext {
    /// Create a new pipeline context
    pub fn new(operation: &str) -> Self {
        let request_id = Uuid::new_v4().to_string();

        Self {
            request_id: request_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            operation: operation.to_string(),
            started_at: chrono::Utc::now(),
            logger: StructuredLogger::new(request_id),
        }
    }

    /// Create a child context sharing the request id
    pub fn child(&self, operation: &str) -> Self {
        Self {
            request_id: self.request_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            started_at: chrono::Utc::now(),
            logger: self.logger.clone(),
        }
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_context_keeps_request_id() {
        let parent = PipelineContext::new("issue");
        let child = parent.child("attempt");

        assert_eq!(child.request_id, parent.request_id);
        assert_eq!(child.parent_span_id.as_deref(), Some(parent.span_id.as_str()));
        assert_ne!(child.span_id, parent.span_id);
        assert_eq!(child.operation, "attempt");
    }
}
