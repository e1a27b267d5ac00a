//! Ledger collaborators used by the member flows.
//!
//! The flows never touch ledger state directly. They go through three
//! interfaces:
//! - [`IdentityService`]: party name and key resolution
//! - [`VaultService`]: lookup of the current unconsumed version of a member
//! - [`NotaryService`]: ordering and finality, including the double-spend check
//!
//! The `memory` module provides deterministic in-process implementations. The
//! in-memory ledger is the single arbiter of version consumption: every
//! submission is checked and committed under one write lock, so two
//! transitions consuming the same version can never both finalise.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod traits;

pub use error::{IdentityError, NotaryError, VaultError};
pub use memory::{InMemoryIdentityService, InMemoryLedger};
pub use model::{FinalityReceipt, MemberQuery};
pub use traits::{IdentityService, NotaryService, VaultService};
