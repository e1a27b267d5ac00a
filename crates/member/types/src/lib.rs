//! Member record model.
//!
//! This crate defines the data shape of everything that moves between the
//! flows, the contract and the ledger:
//!
//! - **Parties**: X.500-style names bound to ed25519 owning keys.
//! - **Member**: the versioned record. Every version shares a stable
//!   [`LinearId`]; a version is addressed by the [`StateRef`] of the
//!   transition that produced it.
//! - **Transitions**: consumed versions, produced versions and a single
//!   [`Command`] naming the keys that must sign.
//! - **Signed transitions**: a transition plus the signatures collected so far.
//!
//! This is a pure types crate. Nothing here performs I/O.

#![deny(unsafe_code)]

mod errors;
mod member;
mod party;
mod transition;

pub use errors::*;
pub use member::*;
pub use party::*;
pub use transition::*;
