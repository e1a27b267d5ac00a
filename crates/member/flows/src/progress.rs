//! Progress tracking for initiator flows.
//!
//! A flow moves strictly forward through its steps. Observers subscribe to a
//! watch channel and see each step as it is entered.

use crate::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// Initiator flow steps, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProgressStep {
    Starting,
    Initialising,
    Building,
    Signing,
    Collecting,
    Finalising,
    Done,
}

impl ProgressStep {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressStep::Starting => "Starting.",
            ProgressStep::Initialising => "Performing initial steps.",
            ProgressStep::Building => "Building and verifying transaction.",
            ProgressStep::Signing => "Signing transaction.",
            ProgressStep::Collecting => "Collecting counterparty signatures.",
            ProgressStep::Finalising => "Finalising transaction.",
            ProgressStep::Done => "Done.",
        }
    }
}

impl fmt::Display for ProgressStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgressStep::Starting => "STARTING",
            ProgressStep::Initialising => "INITIALISING",
            ProgressStep::Building => "BUILDING",
            ProgressStep::Signing => "SIGNING",
            ProgressStep::Collecting => "COLLECTING",
            ProgressStep::Finalising => "FINALISING",
            ProgressStep::Done => "DONE",
        };
        write!(f, "{}", name)
    }
}

/// Forward-only step tracker
#[derive(Debug)]
pub struct ProgressTracker {
    sender: watch::Sender<ProgressStep>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ProgressStep::Starting);
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressStep> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> ProgressStep {
        *self.sender.borrow()
    }

    /// Enter `step`. Steps are never revisited.
    pub fn advance(&self, step: ProgressStep) -> FlowResult<()> {
        let current = self.current();
        if step <= current {
            return Err(FlowError::Internal(format!(
                "cannot move from {} back to {}",
                current, step
            )));
        }
        debug!(from = %current, to = %step, "{}", step.label());
        self.sender.send_replace(step);
        Ok(())
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
