use crate::{FinalityReceipt, IdentityError, MemberQuery, NotaryError, VaultError};
use async_trait::async_trait;
use member_types::{LinearId, Party, PartyKey, SignedTransition, StateAndRef, TransactionId};

/// Resolves party names and keys to well-known parties.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolve a party name such as `O=PartyB, L=New York, C=US`.
    async fn resolve(&self, name: &str) -> Result<Party, IdentityError>;

    /// Map an owning key back to its well-known party, if any.
    async fn party_from_key(&self, key: &PartyKey) -> Result<Option<Party>, IdentityError>;
}

/// Read access to member versions.
#[async_trait]
pub trait VaultService: Send + Sync {
    /// The single unconsumed version for `linear_id`.
    async fn find_unconsumed(&self, linear_id: &LinearId) -> Result<StateAndRef, VaultError>;

    /// Unconsumed members matching `query`.
    async fn query(&self, query: &MemberQuery) -> Result<Vec<StateAndRef>, VaultError>;
}

/// Orders and commits fully signed transitions.
#[async_trait]
pub trait NotaryService: Send + Sync {
    /// Verify, check every input is still unconsumed, then atomically consume
    /// inputs and record outputs.
    async fn submit(&self, stx: SignedTransition) -> Result<FinalityReceipt, NotaryError>;

    /// A committed transition by id.
    async fn transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<SignedTransition>, NotaryError>;

    /// The finality receipt of a committed transition.
    async fn receipt(&self, id: &TransactionId) -> Result<Option<FinalityReceipt>, NotaryError>;
}
