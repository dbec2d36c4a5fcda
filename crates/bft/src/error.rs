//! Consensus error taxonomy.

use ibft_core::ValidationError;
use ibft_types::{Hash, ValidatorId, View};
use std::time::Duration;
use thiserror::Error;

/// Why a message was not acted on.
///
/// None of these are fatal. Most are logged and dropped; the ones for which
/// [`ConsensusError::triggers_round_change`] is true also make the replica
/// vote to leave the current round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("failed to decode message: {0}")]
    Decode(String),

    #[error("message for old view {view}")]
    OldMessage { view: View },

    #[error("message for future view {view}")]
    FutureMessage { view: View },

    #[error("PRE-PREPARE from non-proposer {sender}")]
    NotProposer { sender: ValidatorId },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("subject does not match the current round")]
    InconsistentSubject,

    #[error("sender {0} is not in the validator set")]
    UnauthorizedSender(ValidatorId),

    #[error("invalid signature from {0}")]
    InvalidSignature(ValidatorId),

    #[error("invalid committed seal from {0}")]
    InvalidCommittedSeal(ValidatorId),

    #[error("proposal failed verification: {0}")]
    ProposalInvalid(String),

    #[error("proposal is a future block, retry after {retry_after:?}")]
    FutureBlock { retry_after: Duration },

    #[error("locked on {locked_hash}, proposal {proposal_hash} has no valid proof of lock")]
    LockConflict {
        locked_hash: Hash,
        proposal_hash: Hash,
    },

    #[error("failed to decode proof of lock: {0}")]
    PolDecode(String),

    #[error("invalid vote in proof of lock: {0}")]
    PolInvalidVote(String),

    #[error("proof of lock has {have} votes, needs {need}")]
    PolInsufficientQuorum { have: usize, need: usize },
}

impl ConsensusError {
    /// Whether the replica should vote ROUND-CHANGE after this error.
    pub fn triggers_round_change(&self) -> bool {
        matches!(
            self,
            ConsensusError::ProposalInvalid(_)
                | ConsensusError::LockConflict { .. }
                | ConsensusError::PolDecode(_)
                | ConsensusError::PolInvalidVote(_)
                | ConsensusError::PolInsufficientQuorum { .. }
        )
    }
}

impl From<ValidationError> for ConsensusError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownSender(id) => ConsensusError::UnauthorizedSender(id),
            ValidationError::InvalidSignature(id) => ConsensusError::InvalidSignature(id),
        }
    }
}
