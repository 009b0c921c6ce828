//! Error types for the orchestration core.
//!
//! Library code returns [`OrchestratorError`]; the binary edge (config, app
//! wiring, CLI) wraps these in `anyhow` with context.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Ledger or document store unreachable, timed out, or the op failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Queue unreachable or rejected the message at dispatch time
    #[error("Publish error: {0}")]
    Publish(String),

    /// Malformed ack or task payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Missing notify address, meeting, or expected artifact
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the meeting's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Caller-supplied value rejected before touching any store
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl OrchestratorError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<rusqlite::Error> for OrchestratorError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<tokio::task::JoinError> for OrchestratorError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("blocking storage task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Run a storage call under a request-scoped deadline.
///
/// Elapsed deadlines surface as [`OrchestratorError::Storage`] so callers
/// treat a hung store the same as an unreachable one.
pub async fn bounded<T, F>(timeout: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(OrchestratorError::Storage(format!(
            "{} timed out after {}ms",
            op,
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::storage("connection refused");
        assert_eq!(err.to_string(), "Storage error: connection refused");
        assert!(err.is_storage());

        let err = OrchestratorError::not_found("notify address for M1");
        assert_eq!(err.to_string(), "Not found: notify address for M1");
        assert!(!err.is_storage());
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err: OrchestratorError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, OrchestratorError::Decode(_)));
    }

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let value = bounded(Duration::from_millis(100), "get", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out_as_storage_error() {
        let result: Result<()> = bounded(Duration::from_millis(10), "scan", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_storage());
        assert!(err.to_string().contains("scan timed out"));
    }
}
