//! Capabilities the consensus core consumes from its host.
//!
//! The host splits into narrow traits so each can be mocked independently:
//!
//! - [`ProposalVerifier`]: validates proposal content
//! - [`ChainReader`]: read-only queries against the finalized chain
//! - [`MessageValidator`]: sender membership and signature checks
//!
//! Broadcasting is not a capability here; it is expressed through
//! [`crate::Action::Broadcast`] and executed by the runner.

use ibft_messages::SignedMessage;
use ibft_types::{Hash, Proposal, ValidatorId, ValidatorSet};
use std::time::Duration;
use thiserror::Error;

/// Outcome of a failed proposal verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The proposal depends on state that is not available yet.
    ///
    /// The PRE-PREPARE carrying it is retried once after `retry_after`.
    #[error("future block, retry after {retry_after:?}")]
    FutureBlock { retry_after: Duration },

    /// The proposal is invalid; the current round cannot make progress.
    #[error("invalid proposal: {0}")]
    Invalid(String),
}

/// Validates proposal content before the node votes for it.
pub trait ProposalVerifier: Send + Sync {
    /// Verify `proposal`.
    ///
    /// `is_local_proposer` is true when this node built the proposal itself,
    /// letting implementations skip work they already did while building it.
    fn verify(&self, proposal: &Proposal, is_local_proposer: bool) -> Result<(), VerifyError>;
}

/// Read-only view of the finalized chain.
pub trait ChainReader: Send + Sync {
    /// The last finalized proposal and the validator that proposed it.
    ///
    /// The proposer is `None` for genesis.
    fn last_proposal(&self) -> (Proposal, Option<ValidatorId>);

    /// Validator set in charge of the sequence after `proposal`.
    fn validators(&self, proposal: &Proposal) -> ValidatorSet;

    /// Validator set that was in charge when `proposal` was agreed on.
    fn parent_validators(&self, proposal: &Proposal) -> ValidatorSet;

    /// Proposer of the finalized proposal at `number`, if known.
    fn proposer_at(&self, number: u64) -> Option<ValidatorId>;

    /// Whether the proposal `hash` is finalized at height `number`.
    fn has_proposal(&self, hash: &Hash, number: u64) -> bool;
}

/// Errors from sender validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("sender {0} is not in the validator set")]
    UnknownSender(ValidatorId),

    #[error("invalid signature from {0}")]
    InvalidSignature(ValidatorId),
}

/// Provenance check applied to every vote the core ingests, including the
/// votes nested inside a proof of lock.
pub trait MessageValidator: Send + Sync {
    fn validate(
        &self,
        message: &SignedMessage,
        validators: &ValidatorSet,
    ) -> Result<(), ValidationError>;
}

/// Default validator: the sender must be a member of `validators` and the
/// envelope must verify under that member's key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureValidator;

impl MessageValidator for SignatureValidator {
    fn validate(
        &self,
        message: &SignedMessage,
        validators: &ValidatorSet,
    ) -> Result<(), ValidationError> {
        let key = validators
            .public_key(message.sender)
            .ok_or(ValidationError::UnknownSender(message.sender))?;
        if !message.verify(key) {
            return Err(ValidationError::InvalidSignature(message.sender));
        }
        Ok(())
    }
}
