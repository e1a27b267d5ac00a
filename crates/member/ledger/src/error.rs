use member_types::{LinearId, StateRef, TransactionId};
use thiserror::Error;

/// Identity resolution errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("party not found: {0}")]
    NotFound(String),

    #[error("invalid party name: {0}")]
    InvalidName(String),

    #[error("party {0} is already registered with a different key")]
    Conflict(String),

    #[error("identity store lock poisoned")]
    LockError,
}

/// Vault query errors.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no unconsumed member with linear id {0}")]
    NotFound(LinearId),

    #[error("{count} unconsumed versions share linear id {linear_id}")]
    Ambiguous { linear_id: LinearId, count: usize },

    #[error("vault backend error: {0}")]
    Backend(String),
}

/// Notarisation errors.
#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("input {state_ref} was already consumed by transaction {consumed_by}")]
    Conflict {
        state_ref: StateRef,
        consumed_by: TransactionId,
    },

    #[error("transaction verification failed: {0}")]
    VerificationRejected(String),

    #[error("input {0} is not known to the ledger")]
    UnknownInput(StateRef),

    #[error("notary backend error: {0}")]
    Backend(String),
}
