//! Point-to-point flow sessions between nodes.
//!
//! Each session is a pair of bounded channels. The network, not the sender,
//! stamps the counterparty identity on the responder side, so a responder can
//! trust `FlowSession::counterparty` as the party that opened the session.

use crate::{FlowError, FlowResult};
use member_ledger::FinalityReceipt;
use member_types::{Party, PartyName, SignedTransition, TransactionSignature};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Messages exchanged within one session
#[derive(Clone, Debug)]
pub enum SessionMessage {
    /// Initiator → responder: the partially signed transition.
    Proposal(SignedTransition),
    /// Responder → initiator: the responder's signature.
    Signature(TransactionSignature),
    /// Responder → initiator: the proposal was refused.
    Rejected(String),
    /// Initiator → responder: the transition is final.
    Finalised(FinalityReceipt),
    /// Initiator → responder: the flow was abandoned.
    Aborted(String),
}

impl SessionMessage {
    fn kind(&self) -> &'static str {
        match self {
            SessionMessage::Proposal(_) => "proposal",
            SessionMessage::Signature(_) => "signature",
            SessionMessage::Rejected(_) => "rejected",
            SessionMessage::Finalised(_) => "finalised",
            SessionMessage::Aborted(_) => "aborted",
        }
    }
}

/// One end of a session
#[derive(Debug)]
pub struct FlowSession {
    counterparty: Party,
    outbound: mpsc::Sender<SessionMessage>,
    inbound: mpsc::Receiver<SessionMessage>,
    timeout: Duration,
}

impl FlowSession {
    pub fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub async fn send(&self, message: SessionMessage) -> FlowResult<()> {
        debug!(counterparty = %self.counterparty, kind = message.kind(), "Session send");
        self.outbound.send(message).await.map_err(|_| {
            FlowError::Session(format!("session with {} is closed", self.counterparty))
        })
    }

    /// Wait for the next message using the session timeout.
    pub async fn receive(&mut self) -> FlowResult<SessionMessage> {
        let timeout = self.timeout;
        self.receive_within(timeout).await
    }

    pub async fn receive_within(&mut self, timeout: Duration) -> FlowResult<SessionMessage> {
        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(message)) => {
                debug!(counterparty = %self.counterparty, kind = message.kind(), "Session receive");
                Ok(message)
            }
            Ok(None) => Err(FlowError::Session(format!(
                "session with {} closed before replying",
                self.counterparty
            ))),
            Err(_) => Err(FlowError::Timeout(format!("reply from {}", self.counterparty))),
        }
    }
}

/// In-process message routing between registered nodes.
pub struct InMemoryNetwork {
    inboxes: RwLock<HashMap<PartyName, mpsc::Sender<FlowSession>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self {
            inboxes: RwLock::new(HashMap::new()),
        }
    }

    /// Register `party` and return the receiver of its inbound sessions.
    pub async fn register(&self, party: &Party, buffer: usize) -> mpsc::Receiver<FlowSession> {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        if self
            .inboxes
            .write()
            .await
            .insert(party.name.clone(), sender)
            .is_some()
        {
            warn!(party = %party.name, "Replacing existing network registration");
        }
        debug!(party = %party.name, "Party joined the network");
        receiver
    }

    pub async fn deregister(&self, name: &PartyName) {
        self.inboxes.write().await.remove(name);
        debug!(party = %name, "Party left the network");
    }

    /// Open a session from `from` to `to`.
    pub async fn initiate(
        &self,
        from: &Party,
        to: &Party,
        timeout: Duration,
        buffer: usize,
    ) -> FlowResult<FlowSession> {
        let inbox = self
            .inboxes
            .read()
            .await
            .get(&to.name)
            .cloned()
            .ok_or_else(|| FlowError::Session(format!("{} is not on the network", to.name)))?;

        let (to_responder, responder_inbound) = mpsc::channel(buffer.max(1));
        let (to_initiator, initiator_inbound) = mpsc::channel(buffer.max(1));

        let responder_end = FlowSession {
            counterparty: from.clone(),
            outbound: to_initiator,
            inbound: responder_inbound,
            timeout,
        };
        // A counterparty with a full inbox counts as not replying.
        match tokio::time::timeout(timeout, inbox.send(responder_end)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(FlowError::Session(format!(
                    "{} is not accepting sessions",
                    to.name
                )))
            }
            Err(_) => {
                return Err(FlowError::Timeout(format!(
                    "{} to accept a session",
                    to.name
                )))
            }
        }

        debug!(from = %from.name, to = %to.name, "Session opened");
        Ok(FlowSession {
            counterparty: to.clone(),
            outbound: to_responder,
            inbound: initiator_inbound,
            timeout,
        })
    }
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use member_types::KeyPair;

    fn party(org: &str, seed: u8) -> Party {
        Party::new(
            org.parse().unwrap(),
            KeyPair::from_seed([seed; 32]).public_key(),
        )
    }

    #[tokio::test]
    async fn responder_sees_the_initiator_as_counterparty() {
        let network = InMemoryNetwork::new();
        let a = party("O=PartyA", 1);
        let b = party("O=PartyB", 2);
        let mut inbox = network.register(&b, 4).await;

        let mut initiator = network
            .initiate(&a, &b, Duration::from_secs(1), 4)
            .await
            .unwrap();
        let mut responder = inbox.recv().await.unwrap();
        assert_eq!(responder.counterparty(), &a);
        assert_eq!(initiator.counterparty(), &b);

        responder
            .send(SessionMessage::Rejected("no".into()))
            .await
            .unwrap();
        assert!(matches!(
            initiator.receive().await.unwrap(),
            SessionMessage::Rejected(reason) if reason == "no"
        ));

        initiator
            .send(SessionMessage::Aborted("bye".into()))
            .await
            .unwrap();
        assert!(matches!(
            responder.receive().await.unwrap(),
            SessionMessage::Aborted(_)
        ));
    }

    #[tokio::test]
    async fn unknown_party_is_unreachable() {
        let network = InMemoryNetwork::new();
        let result = network
            .initiate(&party("O=PartyA", 1), &party("O=PartyB", 2), Duration::from_secs(1), 4)
            .await;
        assert!(matches!(result, Err(FlowError::Session(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_counterparty_times_out() {
        let network = InMemoryNetwork::new();
        let a = party("O=PartyA", 1);
        let b = party("O=PartyB", 2);
        let _inbox = network.register(&b, 4).await;

        let mut session = network
            .initiate(&a, &b, Duration::from_secs(5), 4)
            .await
            .unwrap();
        assert!(matches!(
            session.receive().await,
            Err(FlowError::Timeout(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn full_inbox_times_out_instead_of_blocking() {
        let network = InMemoryNetwork::new();
        let a = party("O=PartyA", 1);
        let b = party("O=PartyB", 2);
        let _inbox = network.register(&b, 1).await;

        let _first = network
            .initiate(&a, &b, Duration::from_secs(5), 4)
            .await
            .unwrap();
        let second = network.initiate(&a, &b, Duration::from_secs(5), 4).await;
        assert!(matches!(second, Err(FlowError::Timeout(_))));
    }

    #[tokio::test]
    async fn dropped_counterparty_closes_session() {
        let network = InMemoryNetwork::new();
        let a = party("O=PartyA", 1);
        let b = party("O=PartyB", 2);
        let mut inbox = network.register(&b, 4).await;

        let mut session = network
            .initiate(&a, &b, Duration::from_secs(5), 4)
            .await
            .unwrap();
        drop(inbox.recv().await);
        assert!(matches!(
            session.receive().await,
            Err(FlowError::Session(_))
        ));
    }
}
