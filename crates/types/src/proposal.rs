//! Proposal: the value a committee agrees on at each sequence.

use crate::Hash;
use sbor::prelude::*;

/// Domain prefix for proposal hashing.
const PROPOSAL_HASH_TAG: &[u8] = b"ibft_proposal:";

/// An immutable proposal for one sequence.
///
/// Consensus never looks inside `payload`; content validity is decided by the
/// proposal verifier. Identity is `(hash(), number)`.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Proposal {
    /// Sequence this proposal is for.
    pub number: u64,
    /// Hash of the proposal at `number - 1`.
    pub parent_hash: Hash,
    /// Proposer's wall-clock time in milliseconds.
    pub timestamp: u64,
    /// Opaque content.
    pub payload: Vec<u8>,
}

impl Proposal {
    pub fn new(number: u64, parent_hash: Hash, timestamp: u64, payload: Vec<u8>) -> Self {
        Self {
            number,
            parent_hash,
            timestamp,
            payload,
        }
    }

    /// The proposal at sequence 0 that every chain starts from.
    pub fn genesis() -> Self {
        Self::new(0, Hash::ZERO, 0, Vec::new())
    }

    /// Build the proposal for the next sequence on top of this one.
    pub fn child(&self, timestamp: u64, payload: Vec<u8>) -> Self {
        Self::new(self.number + 1, self.hash(), timestamp, payload)
    }

    /// Content hash: Blake3 over a domain tag, the little-endian number,
    /// parent hash, little-endian timestamp and the payload's own digest.
    pub fn hash(&self) -> Hash {
        Hash::from_parts(&[
            PROPOSAL_HASH_TAG,
            &self.number.to_le_bytes(),
            self.parent_hash.as_bytes(),
            &self.timestamp.to_le_bytes(),
            Hash::from_bytes(&self.payload).as_bytes(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_covers_every_field() {
        let base = Proposal::new(10, Hash::from_bytes(b"parent"), 1_000, b"x".to_vec());

        let mut other = base.clone();
        other.number = 11;
        assert_ne!(base.hash(), other.hash());

        let mut other = base.clone();
        other.parent_hash = Hash::from_bytes(b"other parent");
        assert_ne!(base.hash(), other.hash());

        let mut other = base.clone();
        other.timestamp = 1_001;
        assert_ne!(base.hash(), other.hash());

        let mut other = base.clone();
        other.payload = b"y".to_vec();
        assert_ne!(base.hash(), other.hash());

        assert_eq!(base.hash(), base.clone().hash());
    }

    #[test]
    fn test_hash_matches_documented_construction() {
        let proposal = Proposal::new(3, Hash::from_bytes(b"p"), 42, b"body".to_vec());
        let expected = Hash::from_parts(&[
            b"ibft_proposal:",
            &3u64.to_le_bytes(),
            Hash::from_bytes(b"p").as_bytes(),
            &42u64.to_le_bytes(),
            Hash::from_bytes(b"body").as_bytes(),
        ]);
        assert_eq!(proposal.hash(), expected);
    }

    #[test]
    fn test_child_links_to_parent() {
        let genesis = Proposal::genesis();
        let child = genesis.child(5, b"block-1".to_vec());

        assert_eq!(child.number, 1);
        assert_eq!(child.parent_hash, genesis.hash());
        assert!(!child.hash().is_zero());
    }
}
