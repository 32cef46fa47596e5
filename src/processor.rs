//! The contract between the worker and a processing backend.

use async_trait::async_trait;
use thiserror::Error;

/// Outcome of processing one item payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorResponse {
    /// The gate at which the item becomes eligible again.
    pub next_gate: i64,
    /// Whether the item has reached its terminal `Complete` state.
    pub complete: bool,
    /// The item's updated payload.
    pub data: Vec<u8>,
}

/// A dispatch failure, classified by whether redispatching can help.
///
/// Anything not explicitly marked non-retryable is retryable; the worker
/// keeps the item available and retries it on a later poll until the retry
/// ceiling is reached.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessError {
    message: String,
    retryable: bool,
}

impl ProcessError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// An error that moves the item straight to `Failed`, regardless of its
    /// retry count.
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A pluggable backend that interprets item payloads.
///
/// Dispatch is at-least-once: the same payload may be processed more than
/// once across retries and lease handoffs, and implementations must tolerate
/// that.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, payload: &[u8]) -> Result<ProcessorResponse, ProcessError>;

    async fn healthcheck(&self) -> anyhow::Result<()>;
}
