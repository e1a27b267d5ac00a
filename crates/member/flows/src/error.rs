//! Flow errors

use member_ledger::{IdentityError, NotaryError, VaultError};
use member_types::LinearId;
use thiserror::Error;

/// Result type for flow operations
pub type FlowResult<T> = Result<T, FlowError>;

/// Every way an issue or edit can fail. Nothing is partially applied.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    #[error("Member not found: {0}")]
    NotFound(String),

    #[error("Ambiguous ledger state: {count} unconsumed versions of {linear_id}")]
    AmbiguousState { linear_id: LinearId, count: usize },

    #[error("Verification rejected: {0}")]
    VerificationRejected(String),

    #[error("Counterparty {party} aborted: {reason}")]
    CounterpartyAbort { party: String, reason: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timeout waiting for {0}")]
    Timeout(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Conflicts and timeouts may succeed when retried against fresh state.
    /// Everything else needs the caller to change something first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Conflict(_) | FlowError::Timeout(_))
    }
}

impl From<IdentityError> for FlowError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::NotFound(name) => {
                FlowError::IdentityResolution(format!("unknown party {}", name))
            }
            IdentityError::InvalidName(reason) => FlowError::IdentityResolution(reason),
            IdentityError::Conflict(_) | IdentityError::LockError => {
                FlowError::Internal(value.to_string())
            }
        }
    }
}

impl From<VaultError> for FlowError {
    fn from(value: VaultError) -> Self {
        match value {
            VaultError::NotFound(linear_id) => FlowError::NotFound(linear_id.to_string()),
            VaultError::Ambiguous { linear_id, count } => {
                FlowError::AmbiguousState { linear_id, count }
            }
            VaultError::Backend(msg) => FlowError::Internal(msg),
        }
    }
}

impl From<NotaryError> for FlowError {
    fn from(value: NotaryError) -> Self {
        match value {
            NotaryError::Conflict { .. } => FlowError::Conflict(value.to_string()),
            NotaryError::VerificationRejected(reason) => FlowError::VerificationRejected(reason),
            NotaryError::UnknownInput(_) => FlowError::VerificationRejected(value.to_string()),
            NotaryError::Backend(msg) => FlowError::Internal(msg),
        }
    }
}
