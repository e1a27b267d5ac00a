//! Flow configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by the initiator and responder flows of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Organisation allowed to create members
    #[serde(default = "default_authorised_issuer")]
    pub authorised_issuer: String,

    /// How long to wait for a counterparty reply, in seconds
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// How long to wait for the notary, in seconds
    #[serde(default = "default_notary_timeout")]
    pub notary_timeout_secs: u64,

    /// Per-session message buffer
    #[serde(default = "default_session_buffer")]
    pub session_buffer: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            authorised_issuer: default_authorised_issuer(),
            session_timeout_secs: default_session_timeout(),
            notary_timeout_secs: default_notary_timeout(),
            session_buffer: default_session_buffer(),
        }
    }
}

impl FlowConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn notary_timeout(&self) -> Duration {
        Duration::from_secs(self.notary_timeout_secs)
    }

    /// Upper bound a responder waits for the finality outcome after signing.
    pub fn finality_wait(&self) -> Duration {
        self.session_timeout() + self.notary_timeout()
    }
}

fn default_authorised_issuer() -> String {
    "PartyA".to_string()
}

fn default_session_timeout() -> u64 {
    30
}

fn default_notary_timeout() -> u64 {
    60
}

fn default_session_buffer() -> usize {
    16
}
