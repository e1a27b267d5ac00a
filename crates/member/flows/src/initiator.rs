//! Initiator side of the issue and edit protocols.
//!
//! Runs strictly in order: INITIALISING → BUILDING → SIGNING → COLLECTING →
//! FINALISING → DONE. Any failure aborts the whole flow; counterparties that
//! already hold a session are told the flow was abandoned.

use crate::network::{FlowSession, SessionMessage};
use crate::node::NodeContext;
use crate::progress::{ProgressStep, ProgressTracker};
use crate::{FlowError, FlowResult};
use futures::future::try_join_all;
use member_ledger::FinalityReceipt;
use member_types::{
    Command, CommandKind, LinearId, Member, MemberModel, Party, PartyKey, SignedTransition,
    StateAndRef, Transition, TransactionSignature,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::watch;
use tracing::{info, warn};

/// Outcome of a successful flow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalisedMember {
    pub member: StateAndRef,
    pub receipt: FinalityReceipt,
    pub transaction: SignedTransition,
}

/// A checked submission payload
#[derive(Debug)]
struct ValidatedModel {
    linear_id: Option<LinearId>,
    viewer: String,
    observer: Option<String>,
    title: String,
    first_name: String,
    last_name: String,
}

/// An issue or edit request waiting to run on a node.
pub struct MemberFlow {
    kind: CommandKind,
    model: MemberModel,
    progress: ProgressTracker,
}

impl MemberFlow {
    pub fn issue(model: MemberModel) -> Self {
        Self::new(CommandKind::Issue, model)
    }

    pub fn edit(model: MemberModel) -> Self {
        Self::new(CommandKind::Edit, model)
    }

    fn new(kind: CommandKind, model: MemberModel) -> Self {
        Self {
            kind,
            model,
            progress: ProgressTracker::new(),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Observe step changes while the flow runs.
    pub fn progress(&self) -> watch::Receiver<ProgressStep> {
        self.progress.subscribe()
    }

    pub(crate) async fn call(self, node: &NodeContext) -> FlowResult<FinalisedMember> {
        let flow = self.kind;
        info!(%flow, model = ?self.model, party = %node.identity.name, "Member flow started");

        // INITIALISING
        self.progress.advance(ProgressStep::Initialising)?;
        let model = validate(flow, &self.model)?;
        let (inputs, output) = self.prepare(node, model).await?;

        // BUILDING
        self.progress.advance(ProgressStep::Building)?;
        let signers: BTreeSet<PartyKey> = inputs
            .iter()
            .flat_map(|input| input.state.participant_keys())
            .chain(output.participant_keys())
            .collect();
        let counterparties = counterparties(&inputs, &output, &node.identity);
        let tx = Transition::new(inputs, vec![output], Command::new(flow, signers));
        node.contract
            .verify(&tx)
            .map_err(|violation| FlowError::VerificationRejected(violation.to_string()))?;
        let tx_id = tx.id();
        info!(%flow, %tx_id, linear_id = %tx.outputs[0].linear_id, "Transition built");

        // SIGNING
        self.progress.advance(ProgressStep::Signing)?;
        if !tx.command.signers.contains(&node.identity.owning_key) {
            return Err(FlowError::VerificationRejected(
                "The initiator must be a required signer.".to_string(),
            ));
        }
        let ptx = SignedTransition::new(tx).with_signature(node.keys.sign(&tx_id));

        // COLLECTING
        self.progress.advance(ProgressStep::Collecting)?;
        let mut sessions = Vec::with_capacity(counterparties.len());
        for party in &counterparties {
            match node
                .network
                .initiate(
                    &node.identity,
                    party,
                    node.config.session_timeout(),
                    node.config.session_buffer,
                )
                .await
            {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    abort_sessions(&sessions, &e).await;
                    return Err(e);
                }
            }
        }

        let stx = match collect_signatures(ptx, &mut sessions).await {
            Ok(stx) => stx,
            Err(e) => {
                warn!(%flow, %tx_id, error = %e, "Signature collection failed");
                abort_sessions(&sessions, &e).await;
                return Err(e);
            }
        };

        // FINALISING
        self.progress.advance(ProgressStep::Finalising)?;
        let receipt = match finalise(node, stx.clone()).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(%flow, %tx_id, error = %e, "Finality refused");
                abort_sessions(&sessions, &e).await;
                return Err(e);
            }
        };

        for session in &sessions {
            if let Err(e) = session
                .send(SessionMessage::Finalised(receipt.clone()))
                .await
            {
                warn!(counterparty = %session.counterparty(), error = %e, "Could not deliver finality receipt");
            }
        }

        self.progress.advance(ProgressStep::Done)?;
        let member = stx
            .tx
            .output_refs()
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::Internal("finalised transition has no output".into()))?;
        info!(%flow, %tx_id, linear_id = %member.state.linear_id, "Member flow finalised");

        Ok(FinalisedMember {
            member,
            receipt,
            transaction: stx,
        })
    }

    /// Resolve parties and, for an edit, load the version being replaced.
    async fn prepare(
        &self,
        node: &NodeContext,
        model: ValidatedModel,
    ) -> FlowResult<(Vec<StateAndRef>, Member)> {
        let viewer = node.services.identity.resolve(&model.viewer).await?;

        match (self.kind, model.linear_id) {
            (CommandKind::Issue, _) => {
                let member = Member {
                    creator: node.identity.clone(),
                    viewer,
                    observer: None,
                    title: model.title,
                    first_name: model.first_name,
                    last_name: model.last_name,
                    linear_id: LinearId::generate(),
                };
                Ok((Vec::new(), member))
            }
            (CommandKind::Edit, Some(linear_id)) => {
                let observer = match &model.observer {
                    Some(name) => Some(node.services.identity.resolve(name).await?),
                    None => None,
                };
                let existing = node.services.vault.find_unconsumed(&linear_id).await?;
                if existing.state.creator != node.identity {
                    return Err(FlowError::VerificationRejected(
                        "Only the creator can edit a member.".to_string(),
                    ));
                }

                let member = Member {
                    creator: existing.state.creator.clone(),
                    viewer,
                    observer,
                    title: model.title,
                    first_name: model.first_name,
                    last_name: model.last_name,
                    linear_id: existing.state.linear_id,
                };
                Ok((vec![existing], member))
            }
            (CommandKind::Edit, None) => {
                Err(FlowError::Validation("Id cannot be empty".to_string()))
            }
            (CommandKind::Unrecognised, _) => Err(FlowError::VerificationRejected(
                member_contract::reasons::UNRECOGNISED_COMMAND.to_string(),
            )),
        }
    }
}

fn validate(kind: CommandKind, model: &MemberModel) -> FlowResult<ValidatedModel> {
    fn required(value: &Option<String>, message: &str) -> FlowResult<String> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(FlowError::Validation(message.to_string())),
        }
    }

    let linear_id = match kind {
        CommandKind::Edit => {
            let raw = required(&model.linear_id, "Id cannot be empty")?;
            Some(
                raw.parse::<LinearId>()
                    .map_err(|e| FlowError::Validation(e.to_string()))?,
            )
        }
        _ => None,
    };

    let title = required(&model.title, "The title cannot be empty")?;
    let first_name = required(&model.first_name, "The first name cannot be empty")?;
    let last_name = required(&model.last_name, "The last name cannot be empty")?;
    let viewer = required(&model.viewer, "The viewer cannot be empty")?;

    let observer = match model.observer.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            if kind != CommandKind::Edit {
                return Err(FlowError::Validation(
                    "An observer can only be named when editing a member".to_string(),
                ));
            }
            Some(name.to_string())
        }
        _ => None,
    };

    Ok(ValidatedModel {
        linear_id,
        viewer,
        observer,
        title,
        first_name,
        last_name,
    })
}

/// Every participant of the old and new versions except ourselves.
fn counterparties(inputs: &[StateAndRef], output: &Member, us: &Party) -> Vec<Party> {
    let mut seen = BTreeSet::new();
    seen.insert(us.owning_key);
    inputs
        .iter()
        .flat_map(|input| input.state.participants())
        .chain(output.participants())
        .filter(|party| seen.insert(party.owning_key))
        .cloned()
        .collect()
}

async fn collect_signatures(
    ptx: SignedTransition,
    sessions: &mut [FlowSession],
) -> FlowResult<SignedTransition> {
    let requests = sessions
        .iter_mut()
        .map(|session| request_signature(session, &ptx));
    let signatures = try_join_all(requests).await?;

    let stx = signatures
        .into_iter()
        .fold(ptx, |stx, signature| stx.with_signature(signature));
    stx.verify_required_signatures()
        .map_err(|e| FlowError::VerificationRejected(e.to_string()))?;
    Ok(stx)
}

async fn request_signature(
    session: &mut FlowSession,
    ptx: &SignedTransition,
) -> FlowResult<TransactionSignature> {
    session.send(SessionMessage::Proposal(ptx.clone())).await?;
    let counterparty = session.counterparty().clone();

    match session.receive().await? {
        SessionMessage::Signature(signature) => {
            if signature.by != counterparty.owning_key {
                return Err(FlowError::CounterpartyAbort {
                    party: counterparty.name.to_string(),
                    reason: format!("returned a signature by {}", signature.by),
                });
            }
            signature
                .verify(&ptx.id())
                .map_err(|e| FlowError::CounterpartyAbort {
                    party: counterparty.name.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(signature)
        }
        SessionMessage::Rejected(reason) => Err(FlowError::CounterpartyAbort {
            party: counterparty.name.to_string(),
            reason,
        }),
        other => Err(FlowError::Session(format!(
            "unexpected reply from {}: {:?}",
            counterparty.name, other
        ))),
    }
}

async fn finalise(node: &NodeContext, stx: SignedTransition) -> FlowResult<FinalityReceipt> {
    match tokio::time::timeout(node.config.notary_timeout(), node.services.notary.submit(stx)).await
    {
        Ok(result) => Ok(result?),
        Err(_) => Err(FlowError::Timeout("notary".to_string())),
    }
}

async fn abort_sessions(sessions: &[FlowSession], cause: &FlowError) {
    for session in sessions {
        // Sessions whose responder already gave up are closed; nothing to tell them.
        let _ = session
            .send(SessionMessage::Aborted(cause.to_string()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> MemberModel {
        MemberModel::new("O=PartyB", "Mr", "John", "Smith")
    }

    #[test]
    fn issue_requires_every_field() {
        assert!(validate(CommandKind::Issue, &model()).is_ok());

        let mut blank_title = model();
        blank_title.title = Some("  ".into());
        assert!(matches!(
            validate(CommandKind::Issue, &blank_title),
            Err(FlowError::Validation(msg)) if msg == "The title cannot be empty"
        ));

        let mut no_first = model();
        no_first.first_name = None;
        assert!(matches!(
            validate(CommandKind::Issue, &no_first),
            Err(FlowError::Validation(msg)) if msg == "The first name cannot be empty"
        ));

        let mut no_viewer = model();
        no_viewer.viewer = None;
        assert!(matches!(
            validate(CommandKind::Issue, &no_viewer),
            Err(FlowError::Validation(msg)) if msg == "The viewer cannot be empty"
        ));
    }

    #[test]
    fn observer_is_edit_only() {
        let with_observer = model().with_observer("O=PartyC");
        assert!(matches!(
            validate(CommandKind::Issue, &with_observer),
            Err(FlowError::Validation(_))
        ));

        let edit = with_observer.with_linear_id(LinearId::generate());
        let validated = validate(CommandKind::Edit, &edit).unwrap();
        assert_eq!(validated.observer.as_deref(), Some("O=PartyC"));
    }

    #[test]
    fn edit_requires_a_parseable_id() {
        assert!(matches!(
            validate(CommandKind::Edit, &model()),
            Err(FlowError::Validation(msg)) if msg == "Id cannot be empty"
        ));
        assert!(matches!(
            validate(CommandKind::Edit, &model().with_linear_id("nope")),
            Err(FlowError::Validation(_))
        ));
    }

    #[test]
    fn counterparties_exclude_us_and_duplicates() {
        let key = |seed: u8| member_types::KeyPair::from_seed([seed; 32]).public_key();
        let a = Party::new("O=PartyA".parse().unwrap(), key(1));
        let b = Party::new("O=PartyB".parse().unwrap(), key(2));
        let c = Party::new("O=PartyC".parse().unwrap(), key(3));

        let old = Member {
            creator: a.clone(),
            viewer: b.clone(),
            observer: None,
            title: "Mr".into(),
            first_name: "John".into(),
            last_name: "Smith".into(),
            linear_id: LinearId::generate(),
        };
        let mut new = old.clone();
        new.viewer = c.clone();
        let input = StateAndRef {
            state: old,
            reference: member_types::StateRef {
                txhash: member_types::TransactionId::from_bytes([0; 32]),
                index: 0,
            },
        };

        assert_eq!(counterparties(&[input], &new, &a), vec![b, c]);
    }
}
