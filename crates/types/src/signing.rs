//! Domain-separated signing for consensus messages.
//!
//! Every signature produced by a validator is taken over a domain tag
//! followed by the content, so a signature made in one context can never be
//! replayed as valid in another.
//!
//! | Tag | Purpose |
//! |-----|---------|
//! | `ibft_message:` | Envelope signature over an encoded consensus message |
//! | `ibft_commit_seal:` | Commit seal handed to the chain with a finalized proposal |

use crate::{Hash, ValidatorId};

/// Domain tag for signed consensus message envelopes.
///
/// Format: `ibft_message:` || sender || encoded_message
pub const DOMAIN_CONSENSUS_MESSAGE: &[u8] = b"ibft_message:";

/// Domain tag for commit seals.
///
/// Format: `ibft_commit_seal:` || sequence || proposal_hash
pub const DOMAIN_COMMIT_SEAL: &[u8] = b"ibft_commit_seal:";

/// Build the signing message for a consensus message envelope.
///
/// The sender id is bound into the signature so a vote cannot be
/// re-attributed to another validator.
pub fn consensus_message_signing_bytes(sender: ValidatorId, encoded_message: &[u8]) -> Vec<u8> {
    let mut message =
        Vec::with_capacity(DOMAIN_CONSENSUS_MESSAGE.len() + 8 + encoded_message.len());
    message.extend_from_slice(DOMAIN_CONSENSUS_MESSAGE);
    message.extend_from_slice(&sender.0.to_le_bytes());
    message.extend_from_slice(encoded_message);
    message
}

/// Build the signing message for a commit seal.
pub fn commit_seal_message(sequence: u64, proposal_hash: &Hash) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_COMMIT_SEAL.len() + 8 + Hash::BYTES);
    message.extend_from_slice(DOMAIN_COMMIT_SEAL);
    message.extend_from_slice(&sequence.to_le_bytes());
    message.extend_from_slice(proposal_hash.as_bytes());
    message
}
