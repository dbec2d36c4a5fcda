//! Wire messages for the consensus protocol.
//!
//! Every message on the wire is a [`SignedMessage`]: a [`ConsensusMessage`]
//! body (PRE-PREPARE, PREPARE, COMMIT or ROUND-CHANGE), the sender's
//! [`ValidatorId`](ibft_types::ValidatorId), and the sender's signature.
//! Bodies are SBOR-encoded, so the variant tag travels with the payload.

mod certificate;
mod consensus;
mod signed;

pub use certificate::{CommittedSeal, PreparedCertificate};
pub use consensus::{CommitVote, ConsensusMessage, MessageCode, Preprepare, Subject};
pub use signed::{SignedMessage, WireError};
