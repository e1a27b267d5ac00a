//! Responder side: independently checks a proposed transition, signs it, and
//! stays in the session until the initiator reports the outcome.

use crate::network::{FlowSession, SessionMessage};
use crate::node::NodeContext;
use crate::{FlowError, FlowResult};
use member_ledger::FinalityReceipt;
use member_types::SignedTransition;
use tracing::{info, warn};

pub(crate) struct MemberResponder<'a> {
    node: &'a NodeContext,
}

impl<'a> MemberResponder<'a> {
    pub(crate) fn new(node: &'a NodeContext) -> Self {
        Self { node }
    }

    pub(crate) async fn call(&self, mut session: FlowSession) -> FlowResult<FinalityReceipt> {
        let initiator = session.counterparty().clone();

        let stx = match session.receive().await? {
            SessionMessage::Proposal(stx) => stx,
            SessionMessage::Aborted(reason) => {
                return Err(FlowError::CounterpartyAbort {
                    party: initiator.name.to_string(),
                    reason,
                })
            }
            other => {
                return Err(FlowError::Session(format!(
                    "expected a proposal from {}, got {:?}",
                    initiator.name, other
                )))
            }
        };
        let tx_id = stx.id();

        if let Err(reason) = self.check_transaction(&session, &stx).await {
            warn!(%tx_id, %initiator, %reason, "Refusing to sign");
            // The initiator may already have given up; the refusal is ours either way.
            let _ = session.send(SessionMessage::Rejected(reason.clone())).await;
            return Err(FlowError::VerificationRejected(reason));
        }

        let signature = self.node.keys.sign(&tx_id);
        session.send(SessionMessage::Signature(signature)).await?;
        info!(%tx_id, %initiator, "Signed proposed transition");

        let outcome = match session.receive_within(self.node.config.finality_wait()).await {
            Ok(message) => message,
            Err(e @ (FlowError::Timeout(_) | FlowError::Session(_))) => {
                return self.settle_from_ledger(&stx, e).await;
            }
            Err(e) => return Err(e),
        };

        match outcome {
            SessionMessage::Finalised(receipt) => {
                if receipt.tx_id != tx_id {
                    return Err(FlowError::Session(format!(
                        "receipt for {} does not match signed transaction {}",
                        receipt.tx_id, tx_id
                    )));
                }
                self.await_ledger_commit(&stx).await?;
                Ok(receipt)
            }
            SessionMessage::Aborted(reason) => Err(FlowError::CounterpartyAbort {
                party: initiator.name.to_string(),
                reason,
            }),
            other => Err(FlowError::Session(format!(
                "expected a finality outcome from {}, got {:?}",
                initiator.name, other
            ))),
        }
    }

    /// Contract rules plus this node's own acceptance policy. Returns the
    /// refusal reason on failure.
    async fn check_transaction(
        &self,
        session: &FlowSession,
        stx: &SignedTransition,
    ) -> Result<(), String> {
        self.node
            .contract
            .verify(&stx.tx)
            .map_err(|violation| violation.to_string())?;

        if !stx.required_signers().contains(&self.node.identity.owning_key) {
            return Err("We are not a required signer of this transaction.".to_string());
        }

        let issuer = &self.node.config.authorised_issuer;
        if stx.tx.outputs.is_empty() {
            return Err("Member in transaction must not be empty.".to_string());
        }
        for member in &stx.tx.outputs {
            let creator = self
                .node
                .services
                .identity
                .party_from_key(&member.creator.owning_key)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| "The creator is not a known party.".to_string())?;

            if creator.name.organisation() != issuer {
                return Err(format!("Only {} can create the member.", issuer));
            }
            if *session.counterparty() != creator {
                return Err("The initiator must be the creator of the state.".to_string());
            }
        }

        stx.verify_attached_signatures()
            .map_err(|e| e.to_string())?;
        if !stx.is_signed_by(&session.counterparty().owning_key) {
            return Err("The initiator has not signed the transaction.".to_string());
        }
        Ok(())
    }

    /// The initiator went quiet after we signed. The ledger decides whether
    /// the transition finalised anyway.
    async fn settle_from_ledger(
        &self,
        stx: &SignedTransition,
        cause: FlowError,
    ) -> FlowResult<FinalityReceipt> {
        let tx_id = stx.id();
        match self.node.services.notary.receipt(&tx_id).await? {
            Some(receipt) => {
                self.await_ledger_commit(stx).await?;
                info!(%tx_id, error = %cause, "No finality message, but the ledger holds the transaction");
                Ok(receipt)
            }
            None => Err(cause),
        }
    }

    /// Confirm the ledger holds the transaction the receipt refers to.
    async fn await_ledger_commit(&self, stx: &SignedTransition) -> FlowResult<()> {
        let tx_id = stx.id();
        match self.node.services.notary.transaction(&tx_id).await? {
            Some(committed) if committed.tx == stx.tx => Ok(()),
            Some(_) => Err(FlowError::Internal(format!(
                "ledger holds a different transaction under {}",
                tx_id
            ))),
            None => Err(FlowError::Session(format!(
                "receipt names {} but the ledger has no such transaction",
                tx_id
            ))),
        }
    }
}
