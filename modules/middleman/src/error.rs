//! Typed errors surfaced by `Middleman::dispatch`.

use std::time::Duration;

use thiserror::Error;

/// Errors that reach the dispatch call that (directly or transitively)
/// triggered them.
#[derive(Debug, Error)]
pub enum MiddlemanError {
    /// A registered observer returned an error
    #[error("observer for {action_type} failed: {source}")]
    Observer {
        action_type: String,
        #[source]
        source: anyhow::Error,
    },

    /// An asynchronous observer outlived the configured timeout
    #[error("async observer for {action_type} timed out after {timeout:?}")]
    ObserverTimeout {
        action_type: String,
        timeout: Duration,
    },
}

impl MiddlemanError {
    pub fn action_type(&self) -> &str {
        match self {
            Self::Observer { action_type, .. } | Self::ObserverTimeout { action_type, .. } => {
                action_type
            }
        }
    }
}

/// Result type alias for dispatch operations.
pub type MiddlemanResult<T> = std::result::Result<T, MiddlemanError>;
