//! In-memory reference implementations of the ledger collaborators.
//!
//! These adapters are deterministic and test-friendly. One `InMemoryLedger`
//! is shared by every node in a local network and plays both vault and notary.

use crate::traits::{IdentityService, NotaryService, VaultService};
use crate::{FinalityReceipt, IdentityError, MemberQuery, NotaryError, VaultError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use member_contract::MemberContract;
use member_types::{
    LinearId, Member, Party, PartyKey, PartyName, SignedTransition, StateAndRef, StateRef,
    TransactionId,
};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// In-memory identity registry.
#[derive(Default)]
pub struct InMemoryIdentityService {
    parties: RwLock<HashMap<PartyName, Party>>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a well-known party. Re-registering the same key is a no-op.
    pub fn register(&self, party: Party) -> Result<(), IdentityError> {
        let mut parties = self.parties.write().map_err(|_| IdentityError::LockError)?;
        if let Some(existing) = parties.get(&party.name) {
            if existing.owning_key != party.owning_key {
                return Err(IdentityError::Conflict(party.name.to_string()));
            }
            return Ok(());
        }
        debug!(party = %party.name, key = %party.owning_key, "Party registered");
        parties.insert(party.name.clone(), party);
        Ok(())
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn resolve(&self, name: &str) -> Result<Party, IdentityError> {
        let parsed: PartyName = name
            .parse()
            .map_err(|e: member_types::ModelError| IdentityError::InvalidName(e.to_string()))?;
        let parties = self.parties.read().map_err(|_| IdentityError::LockError)?;
        parties
            .get(&parsed)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(parsed.to_string()))
    }

    async fn party_from_key(&self, key: &PartyKey) -> Result<Option<Party>, IdentityError> {
        let parties = self.parties.read().map_err(|_| IdentityError::LockError)?;
        Ok(parties
            .values()
            .find(|party| party.owning_key == *key)
            .cloned())
    }
}

#[derive(Clone)]
struct CommittedTransition {
    stx: SignedTransition,
    receipt: FinalityReceipt,
}

#[derive(Default)]
struct LedgerState {
    states: HashMap<StateRef, Member>,
    consumed: HashMap<StateRef, TransactionId>,
    transactions: HashMap<TransactionId, CommittedTransition>,
}

impl LedgerState {
    fn unconsumed(&self) -> impl Iterator<Item = StateAndRef> + '_ {
        self.states
            .iter()
            .filter(|(reference, _)| !self.consumed.contains_key(*reference))
            .map(|(reference, state)| StateAndRef {
                state: state.clone(),
                reference: *reference,
            })
    }

    /// Unconsumed versions carrying `linear_id`.
    fn live_versions<'a>(
        &'a self,
        linear_id: &'a LinearId,
    ) -> impl Iterator<Item = &'a StateRef> + 'a {
        self.states
            .iter()
            .filter(move |(reference, state)| {
                state.linear_id == *linear_id && !self.consumed.contains_key(*reference)
            })
            .map(|(reference, _)| reference)
    }
}

/// In-memory vault and notary.
pub struct InMemoryLedger {
    contract: MemberContract,
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            contract: MemberContract::new(),
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Whether `reference` has been consumed.
    pub fn is_consumed(&self, reference: &StateRef) -> Result<bool, VaultError> {
        let state = self.read()?;
        Ok(state.consumed.contains_key(reference))
    }

    /// Number of committed transitions.
    pub fn transaction_count(&self) -> Result<usize, VaultError> {
        Ok(self.read()?.transactions.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, VaultError> {
        self.state
            .read()
            .map_err(|_| VaultError::Backend("ledger lock poisoned".to_string()))
    }

    fn check(&self, stx: &SignedTransition) -> Result<(), NotaryError> {
        self.contract
            .verify(&stx.tx)
            .map_err(|violation| NotaryError::VerificationRejected(violation.to_string()))?;
        stx.verify_required_signatures()
            .map_err(|e| NotaryError::VerificationRejected(e.to_string()))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultService for InMemoryLedger {
    async fn find_unconsumed(&self, linear_id: &LinearId) -> Result<StateAndRef, VaultError> {
        let state = self.read()?;
        let mut matches: Vec<StateAndRef> = state
            .unconsumed()
            .filter(|candidate| candidate.state.linear_id == *linear_id)
            .collect();

        match matches.len() {
            0 => Err(VaultError::NotFound(*linear_id)),
            1 => Ok(matches.remove(0)),
            count => Err(VaultError::Ambiguous {
                linear_id: *linear_id,
                count,
            }),
        }
    }

    async fn query(&self, query: &MemberQuery) -> Result<Vec<StateAndRef>, VaultError> {
        let state = self.read()?;
        let mut results: Vec<StateAndRef> = state
            .unconsumed()
            .filter(|candidate| query.matches(&candidate.state))
            .collect();
        results.sort_by(|a, b| a.state.linear_id.cmp(&b.state.linear_id));
        Ok(results)
    }
}

#[async_trait]
impl NotaryService for InMemoryLedger {
    async fn submit(&self, stx: SignedTransition) -> Result<FinalityReceipt, NotaryError> {
        let tx_id = stx.id();
        self.check(&stx)?;

        let mut state = self
            .state
            .write()
            .map_err(|_| NotaryError::Backend("ledger lock poisoned".to_string()))?;

        if let Some(existing) = state.transactions.get(&tx_id) {
            debug!(%tx_id, "Transaction already notarised");
            return Ok(existing.receipt.clone());
        }

        for input in &stx.tx.inputs {
            if let Some(consumed_by) = state.consumed.get(&input.reference) {
                warn!(
                    %tx_id,
                    state_ref = %input.reference,
                    consumed_by = %consumed_by,
                    "Double-spend rejected"
                );
                return Err(NotaryError::Conflict {
                    state_ref: input.reference,
                    consumed_by: *consumed_by,
                });
            }
            match state.states.get(&input.reference) {
                Some(recorded) if *recorded == input.state => {}
                Some(_) => {
                    return Err(NotaryError::VerificationRejected(format!(
                        "input {} does not match the recorded version",
                        input.reference
                    )))
                }
                None => return Err(NotaryError::UnknownInput(input.reference)),
            }
        }

        let consumed = stx.tx.input_refs();
        for output in &stx.tx.outputs {
            if let Some(live) = state
                .live_versions(&output.linear_id)
                .find(|live| !consumed.contains(*live))
            {
                warn!(
                    %tx_id,
                    linear_id = %output.linear_id,
                    live = %live,
                    "Duplicate live version rejected"
                );
                return Err(NotaryError::VerificationRejected(format!(
                    "linear id {} already has a live version {} that this transaction does not consume",
                    output.linear_id, live
                )));
            }
        }

        let produced: Vec<StateAndRef> = stx.tx.output_refs();
        let committed_at: DateTime<Utc> = Utc::now();

        for reference in &consumed {
            state.consumed.insert(*reference, tx_id);
        }
        for output in &produced {
            state.states.insert(output.reference, output.state.clone());
        }

        let receipt = FinalityReceipt {
            tx_id,
            consumed,
            produced: produced.iter().map(|output| output.reference).collect(),
            committed_at,
        };
        state.transactions.insert(
            tx_id,
            CommittedTransition {
                stx,
                receipt: receipt.clone(),
            },
        );

        info!(
            %tx_id,
            consumed = receipt.consumed.len(),
            produced = receipt.produced.len(),
            "Transaction notarised"
        );
        Ok(receipt)
    }

    async fn transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<SignedTransition>, NotaryError> {
        let state = self
            .state
            .read()
            .map_err(|_| NotaryError::Backend("ledger lock poisoned".to_string()))?;
        Ok(state.transactions.get(id).map(|committed| committed.stx.clone()))
    }

    async fn receipt(&self, id: &TransactionId) -> Result<Option<FinalityReceipt>, NotaryError> {
        let state = self
            .state
            .read()
            .map_err(|_| NotaryError::Backend("ledger lock poisoned".to_string()))?;
        Ok(state
            .transactions
            .get(id)
            .map(|committed| committed.receipt.clone()))
    }
}
