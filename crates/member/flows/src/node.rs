//! A node: one party's identity, keys and services, plus the task that
//! accepts inbound sessions and runs a responder for each.

use crate::initiator::{FinalisedMember, MemberFlow};
use crate::network::{FlowSession, InMemoryNetwork};
use crate::responder::MemberResponder;
use crate::{FlowConfig, FlowError, FlowResult};
use member_contract::MemberContract;
use member_ledger::{
    FinalityReceipt, IdentityService, MemberQuery, NotaryService, VaultService,
};
use member_types::{KeyPair, MemberModel, Party, StateAndRef};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// External collaborators a node calls into
#[derive(Clone)]
pub struct ServiceHub {
    pub identity: Arc<dyn IdentityService>,
    pub vault: Arc<dyn VaultService>,
    pub notary: Arc<dyn NotaryService>,
}

/// Everything a flow running on this node can see.
pub(crate) struct NodeContext {
    pub(crate) identity: Party,
    pub(crate) keys: KeyPair,
    pub(crate) services: ServiceHub,
    pub(crate) network: Arc<InMemoryNetwork>,
    pub(crate) config: FlowConfig,
    pub(crate) contract: MemberContract,
}

/// How one inbound session ended
#[derive(Clone, Debug)]
pub struct ResponderOutcome {
    pub counterparty: Party,
    pub result: Result<FinalityReceipt, String>,
}

/// A running node
pub struct MemberNode {
    context: Arc<NodeContext>,
    outcomes: broadcast::Sender<ResponderOutcome>,
    acceptor: JoinHandle<()>,
}

impl MemberNode {
    /// Join `network` as `identity` and start accepting sessions.
    pub async fn start(
        identity: Party,
        keys: KeyPair,
        services: ServiceHub,
        network: Arc<InMemoryNetwork>,
        config: FlowConfig,
    ) -> FlowResult<Self> {
        if keys.public_key() != identity.owning_key {
            return Err(FlowError::Internal(format!(
                "key pair does not match the owning key of {}",
                identity.name
            )));
        }

        let inbox = network.register(&identity, config.session_buffer).await;
        let context = Arc::new(NodeContext {
            identity,
            keys,
            services,
            network,
            config,
            contract: MemberContract::new(),
        });
        let (outcomes, _) = broadcast::channel(64);
        let acceptor = tokio::spawn(accept_sessions(
            Arc::clone(&context),
            inbox,
            outcomes.clone(),
        ));

        info!(party = %context.identity.name, "Member node started");
        Ok(Self {
            context,
            outcomes,
            acceptor,
        })
    }

    pub fn identity(&self) -> &Party {
        &self.context.identity
    }

    pub fn config(&self) -> &FlowConfig {
        &self.context.config
    }

    /// Issue a new member. The caller becomes its creator.
    pub async fn issue(&self, model: MemberModel) -> FlowResult<FinalisedMember> {
        self.run(MemberFlow::issue(model)).await
    }

    /// Replace the current version of member `linear_id`.
    pub async fn edit(
        &self,
        linear_id: impl Into<String>,
        model: MemberModel,
    ) -> FlowResult<FinalisedMember> {
        let model = MemberModel {
            linear_id: Some(linear_id.into()),
            ..model
        };
        self.run(MemberFlow::edit(model)).await
    }

    /// Run a prepared flow, e.g. one whose progress the caller is watching.
    pub async fn run(&self, flow: MemberFlow) -> FlowResult<FinalisedMember> {
        let kind = flow.kind();
        let result = flow.call(&self.context).await;
        if let Err(e) = &result {
            warn!(flow = %kind, party = %self.context.identity.name, error = %e, "Member flow failed");
        }
        result
    }

    /// Unconsumed members matching `query`.
    pub async fn search(&self, query: &MemberQuery) -> FlowResult<Vec<StateAndRef>> {
        Ok(self.context.services.vault.query(query).await?)
    }

    /// Outcomes of responder runs on this node, as they finish.
    pub fn responder_outcomes(&self) -> broadcast::Receiver<ResponderOutcome> {
        self.outcomes.subscribe()
    }

    /// Leave the network and stop accepting sessions.
    pub async fn shutdown(self) {
        self.context
            .network
            .deregister(&self.context.identity.name)
            .await;
        self.acceptor.abort();
        info!(party = %self.context.identity.name, "Member node stopped");
    }
}

impl Drop for MemberNode {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_sessions(
    context: Arc<NodeContext>,
    mut inbox: mpsc::Receiver<FlowSession>,
    outcomes: broadcast::Sender<ResponderOutcome>,
) {
    while let Some(mut session) = inbox.recv().await {
        session.set_timeout(context.config.session_timeout());
        let context = Arc::clone(&context);
        let outcomes = outcomes.clone();

        tokio::spawn(async move {
            let counterparty = session.counterparty().clone();
            let result = MemberResponder::new(&context).call(session).await;
            match &result {
                Ok(receipt) => {
                    info!(party = %context.identity.name, %counterparty, tx_id = %receipt.tx_id, "Responder finished")
                }
                Err(e) => {
                    warn!(party = %context.identity.name, %counterparty, error = %e, "Responder aborted")
                }
            }
            // No subscribers is fine.
            let _ = outcomes.send(ResponderOutcome {
                counterparty,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }
}
