//! Member flows - multi-party authorisation of member issue and edit.
//!
//! An initiator node builds a candidate transition, verifies it against the
//! member contract, signs it, collects a signature from every other required
//! participant over point-to-point sessions, and hands the fully signed
//! transition to the notary. Each counterparty runs a responder that
//! re-verifies the proposal, applies its own acceptance policy, signs, and
//! waits for the finality outcome.
//!
//! All coordination between concurrent flows happens at the notary. There are
//! no local locks around member versions.

#![deny(unsafe_code)]

mod config;
mod error;
mod initiator;
mod local;
pub mod network;
mod node;
mod progress;
mod responder;

pub use config::FlowConfig;
pub use error::{FlowError, FlowResult};
pub use initiator::{FinalisedMember, MemberFlow};
pub use local::LocalNetwork;
pub use network::{FlowSession, InMemoryNetwork, SessionMessage};
pub use node::{MemberNode, ResponderOutcome, ServiceHub};
pub use progress::{ProgressStep, ProgressTracker};
