//! Single-process network: one shared ledger, one identity registry, and any
//! number of nodes talking over in-memory sessions.

use crate::network::InMemoryNetwork;
use crate::node::{MemberNode, ServiceHub};
use crate::{FlowConfig, FlowError, FlowResult};
use member_ledger::{InMemoryIdentityService, InMemoryLedger};
use member_types::{KeyPair, Party, PartyName};
use std::sync::Arc;

pub struct LocalNetwork {
    pub network: Arc<InMemoryNetwork>,
    pub identity: Arc<InMemoryIdentityService>,
    pub ledger: Arc<InMemoryLedger>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self {
            network: Arc::new(InMemoryNetwork::new()),
            identity: Arc::new(InMemoryIdentityService::new()),
            ledger: Arc::new(InMemoryLedger::new()),
        }
    }

    pub fn services(&self) -> ServiceHub {
        ServiceHub {
            identity: self.identity.clone(),
            vault: self.ledger.clone(),
            notary: self.ledger.clone(),
        }
    }

    /// Create a party with a fresh key and publish it to the identity registry
    /// without starting a node for it.
    pub fn register_party(&self, name: &str) -> FlowResult<(Party, KeyPair)> {
        let name: PartyName = name
            .parse()
            .map_err(|e: member_types::ModelError| FlowError::Validation(e.to_string()))?;
        let keys = KeyPair::generate();
        let party = Party::new(name, keys.public_key());
        self.identity.register(party.clone())?;
        Ok((party, keys))
    }

    /// Register a party and start a node for it.
    pub async fn start_node(&self, name: &str, config: FlowConfig) -> FlowResult<MemberNode> {
        let (party, keys) = self.register_party(name)?;
        MemberNode::start(party, keys, self.services(), self.network.clone(), config).await
    }
}

impl Default for LocalNetwork {
    fn default() -> Self {
        Self::new()
    }
}
