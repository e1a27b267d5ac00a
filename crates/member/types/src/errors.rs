//! Error types for the record model

use crate::PartyKey;

/// Errors raised while building or checking model values
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid party name '{name}': {reason}")]
    InvalidPartyName { name: String, reason: String },

    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Invalid linear id: {0}")]
    InvalidLinearId(String),

    #[error("Invalid signature by {0}")]
    InvalidSignature(PartyKey),

    #[error("Signature by {0} is not required by the command")]
    UnexpectedSigner(PartyKey),

    #[error("Missing signatures from: {}", join_keys(.0))]
    MissingSignatures(Vec<PartyKey>),
}

fn join_keys(keys: &[PartyKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
