//! Versions, commands and co-signed transitions

use crate::member::digest_str;
use crate::{Member, ModelError, ModelResult, PartyKey};
use ed25519_dalek::{Signature, Verifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Content hash of a transition body
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self)
    }
}

/// Version identity: the output slot of the transition that produced it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub txhash: TransactionId,
    pub index: u32,
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

/// A member version together with its identity on the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: Member,
    pub reference: StateRef,
}

/// Authorising command kind.
///
/// Anything a peer sends that is not a known kind deserializes as
/// `Unrecognised` so the contract can reject it explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Issue,
    Edit,
    #[serde(other)]
    Unrecognised,
}

impl CommandKind {
    fn tag(self) -> u8 {
        match self {
            CommandKind::Issue => 1,
            CommandKind::Edit => 2,
            CommandKind::Unrecognised => u8::MAX,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Issue => write!(f, "Issue"),
            CommandKind::Edit => write!(f, "Edit"),
            CommandKind::Unrecognised => write!(f, "Unrecognised"),
        }
    }
}

/// A command and the keys required to authorise it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub signers: BTreeSet<PartyKey>,
}

impl Command {
    pub fn new(kind: CommandKind, signers: impl IntoIterator<Item = PartyKey>) -> Self {
        Self {
            kind,
            signers: signers.into_iter().collect(),
        }
    }
}

/// A candidate transition: consumed versions, produced versions and the
/// authorising command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<Member>,
    pub command: Command,
    /// Distinguishes otherwise identical transitions.
    pub nonce: Uuid,
}

impl Transition {
    pub fn new(inputs: Vec<StateAndRef>, outputs: Vec<Member>, command: Command) -> Self {
        Self {
            inputs,
            outputs,
            command,
            nonce: Uuid::new_v4(),
        }
    }

    /// BLAKE3 hash over a canonical, length-prefixed encoding of the body.
    pub fn id(&self) -> TransactionId {
        let mut hasher = blake3::Hasher::new();
        digest_str(&mut hasher, "member-transition/v1");
        hasher.update(self.nonce.as_bytes());

        hasher.update(&[self.command.kind.tag()]);
        hasher.update(&(self.command.signers.len() as u64).to_le_bytes());
        for key in &self.command.signers {
            hasher.update(key.as_bytes());
        }

        hasher.update(&(self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.reference.txhash.as_bytes());
            hasher.update(&input.reference.index.to_le_bytes());
            input.state.digest_into(&mut hasher);
        }

        hasher.update(&(self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            output.digest_into(&mut hasher);
        }

        TransactionId(*hasher.finalize().as_bytes())
    }

    /// Ledger identities the outputs will have once this transition commits.
    pub fn output_refs(&self) -> Vec<StateAndRef> {
        let txhash = self.id();
        self.outputs
            .iter()
            .enumerate()
            .map(|(index, state)| StateAndRef {
                state: state.clone(),
                reference: StateRef {
                    txhash,
                    index: index as u32,
                },
            })
            .collect()
    }

    pub fn input_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|input| input.reference).collect()
    }
}

/// An ed25519 signature over a transaction id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PartyKey,
    pub signature: Signature,
}

impl TransactionSignature {
    pub fn verify(&self, id: &TransactionId) -> ModelResult<()> {
        let key = self.by.to_verifying_key()?;
        key.verify(id.as_bytes(), &self.signature)
            .map_err(|_| ModelError::InvalidSignature(self.by))
    }
}

/// A transition plus the signatures collected so far
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransition {
    pub tx: Transition,
    pub sigs: Vec<TransactionSignature>,
}

impl SignedTransition {
    pub fn new(tx: Transition) -> Self {
        Self {
            tx,
            sigs: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tx.id()
    }

    pub fn required_signers(&self) -> &BTreeSet<PartyKey> {
        &self.tx.command.signers
    }

    pub fn signed_by(&self) -> BTreeSet<PartyKey> {
        self.sigs.iter().map(|sig| sig.by).collect()
    }

    pub fn is_signed_by(&self, key: &PartyKey) -> bool {
        self.sigs.iter().any(|sig| sig.by == *key)
    }

    /// Attach a signature, replacing any earlier one by the same key.
    pub fn with_signature(mut self, signature: TransactionSignature) -> Self {
        self.sigs.retain(|existing| existing.by != signature.by);
        self.sigs.push(signature);
        self
    }

    pub fn missing_signers(&self) -> BTreeSet<PartyKey> {
        let signed = self.signed_by();
        self.required_signers()
            .iter()
            .filter(|key| !signed.contains(key))
            .copied()
            .collect()
    }

    /// Every attached signature is valid and comes from a required signer.
    /// Missing signatures are allowed.
    pub fn verify_attached_signatures(&self) -> ModelResult<()> {
        let id = self.id();
        for sig in &self.sigs {
            if !self.required_signers().contains(&sig.by) {
                return Err(ModelError::UnexpectedSigner(sig.by));
            }
            sig.verify(&id)?;
        }
        Ok(())
    }

    /// Attached signatures are valid and every required signer has signed.
    pub fn verify_required_signatures(&self) -> ModelResult<()> {
        self.verify_attached_signatures()?;
        let missing = self.missing_signers();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ModelError::MissingSignatures(missing.into_iter().collect()))
        }
    }
}
