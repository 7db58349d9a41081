use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    /// The source catalog could not deliver the selection; nothing was processed.
    #[error("Source catalog unavailable: {0}")]
    SourceUnavailable(String),

    /// The target catalog rejected a call; fatal to the current collection only.
    #[error("Target catalog unavailable: {0}")]
    TargetUnavailable(String),

    #[error("Rate limited by target catalog")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A transfer is already in progress (run {run_id})")]
    TransferInProgress { run_id: String },

    #[error("No transfer is currently running")]
    NoActiveTransfer,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Collection {collection_id} has transfer history and needs an explicit decision")]
    MissingDecision { collection_id: String },

    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("Transfer history error: {0}")]
    History(String),

    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    #[error("Transfer task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Config(#[from] core_runtime::Error),
}

impl TransferError {
    /// Classify a failure raised by the source catalog.
    pub fn source_unavailable(error: BridgeError) -> Self {
        Self::SourceUnavailable(error.to_string())
    }

    /// Classify a failure raised by the target catalog.
    pub fn target_unavailable(error: BridgeError) -> Self {
        match error {
            BridgeError::RateLimited { .. } => Self::RateLimited,
            other => Self::TargetUnavailable(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(error: sqlx::Error) -> Self {
        Self::History(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
