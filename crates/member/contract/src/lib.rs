//! Member contract - decides whether a proposed transition is legal.
//!
//! Verification is pure and deterministic. The initiating flow runs it before
//! signing, every counterparty runs it again on receipt, and the notary runs it
//! once more before committing. A rejection always names the invariant that
//! failed so the refusal can be audited.
//!
//! Rules:
//! - `Issue`: consumes nothing, produces exactly one member, and is signed by
//!   exactly that member's creator and viewer.
//! - `Edit`: consumes exactly one version, produces exactly one, keeps the
//!   linear id and creator, and is signed by exactly the union of the creator
//!   and viewer keys of both versions.
//! - Anything else is rejected.

#![deny(unsafe_code)]

use member_types::{CommandKind, Member, PartyKey, Transition};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Rejection reasons, one per invariant.
pub mod reasons {
    pub const UNRECOGNISED_COMMAND: &str = "Unrecognised command.";

    pub const ISSUE_NO_OUTPUT: &str = "At least one output must be produced when issuing a member.";
    pub const ISSUE_SINGLE_OUTPUT: &str = "Only one member can be issued per transaction.";
    pub const ISSUE_NO_INPUTS: &str = "No inputs should be consumed when issuing a member.";
    pub const ISSUE_SIGNERS: &str =
        "All participants must sign together when issuing a member.";

    pub const EDIT_NO_INPUT: &str = "An edit must consume the previous version of the member.";
    pub const EDIT_SINGLE_INPUT: &str = "Only one member version can be consumed per edit.";
    pub const EDIT_SINGLE_OUTPUT: &str = "An edit must produce exactly one member.";
    pub const EDIT_LINEAR_ID: &str = "The linear id must not change during an edit.";
    pub const EDIT_CREATOR: &str = "The creator must not change during an edit.";
    pub const EDIT_SIGNERS: &str =
        "The existing and new participants must sign together when editing a member.";
}

/// A transition refused by the contract
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{command} rejected: {reason}")]
pub struct ContractViolation {
    pub command: CommandKind,
    pub reason: &'static str,
}

/// The member contract
#[derive(Clone, Copy, Debug, Default)]
pub struct MemberContract;

impl MemberContract {
    pub fn new() -> Self {
        Self
    }

    /// Verify a transition against the rules of its command.
    pub fn verify(&self, tx: &Transition) -> Result<(), ContractViolation> {
        let command = tx.command.kind;
        let result = match command {
            CommandKind::Issue => verify_issue(tx),
            CommandKind::Edit => verify_edit(tx),
            CommandKind::Unrecognised => Err(reasons::UNRECOGNISED_COMMAND),
        };

        result.map_err(|reason| {
            debug!(%command, reason, "Transition rejected by member contract");
            ContractViolation { command, reason }
        })
    }
}

fn verify_issue(tx: &Transition) -> Result<(), &'static str> {
    let output = single_output(&tx.outputs, reasons::ISSUE_NO_OUTPUT, reasons::ISSUE_SINGLE_OUTPUT)?;
    require(tx.inputs.is_empty(), reasons::ISSUE_NO_INPUTS)?;
    require(
        tx.command.signers == output.participant_keys(),
        reasons::ISSUE_SIGNERS,
    )
}

fn verify_edit(tx: &Transition) -> Result<(), &'static str> {
    let input = match tx.inputs.as_slice() {
        [] => return Err(reasons::EDIT_NO_INPUT),
        [input] => &input.state,
        _ => return Err(reasons::EDIT_SINGLE_INPUT),
    };
    let output = single_output(
        &tx.outputs,
        reasons::EDIT_SINGLE_OUTPUT,
        reasons::EDIT_SINGLE_OUTPUT,
    )?;

    require(input.linear_id == output.linear_id, reasons::EDIT_LINEAR_ID)?;
    require(input.creator == output.creator, reasons::EDIT_CREATOR)?;

    let expected: BTreeSet<PartyKey> = input
        .participant_keys()
        .into_iter()
        .chain(output.participant_keys())
        .collect();
    require(tx.command.signers == expected, reasons::EDIT_SIGNERS)
}

fn single_output<'a>(
    outputs: &'a [Member],
    none: &'static str,
    many: &'static str,
) -> Result<&'a Member, &'static str> {
    match outputs {
        [] => Err(none),
        [output] => Ok(output),
        _ => Err(many),
    }
}

fn require(condition: bool, reason: &'static str) -> Result<(), &'static str> {
    if condition {
        Ok(())
    } else {
        Err(reason)
    }
}
