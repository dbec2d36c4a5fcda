//! Core types for Istanbul BFT consensus.
//!
//! This crate holds the values every other crate shares:
//!
//! - [`Hash`]: Blake3 digest used for proposal identity
//! - [`View`]: the (sequence, round) pair an agreement attempt runs in
//! - [`Proposal`]: the value agreed on at each sequence
//! - [`ValidatorSet`]: the ordered committee and proposer selection
//! - [`KeyPair`], [`PublicKey`], [`Signature`]: validator keys
//! - [`signing`]: domain-separated signing messages

mod crypto;
mod hash;
mod identifiers;
mod proposal;
pub mod signing;
mod validator_set;
mod view;

pub use crypto::{KeyError, KeyPair, KeyType, PublicKey, Signature};
pub use hash::{Hash, HexError};
pub use identifiers::ValidatorId;
pub use proposal::Proposal;
pub use validator_set::{ProposerPolicy, UnknownPolicy, ValidatorInfo, ValidatorSet};
pub use view::View;
