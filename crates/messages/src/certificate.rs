//! Quorum certificates carried inside other messages.

use crate::{SignedMessage, WireError};
use ibft_types::{Signature, ValidatorId};
use sbor::prelude::*;

/// PREPARE votes that justified a lock.
///
/// Travels encoded inside [`crate::Preprepare::locked_prepares`] so a
/// proposer can prove that a quorum prepared the value it re-proposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, BasicSbor)]
pub struct PreparedCertificate {
    pub votes: Vec<SignedMessage>,
}

impl PreparedCertificate {
    pub fn new(votes: Vec<SignedMessage>) -> Self {
        Self { votes }
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        sbor::basic_encode(self).map_err(|e| WireError::Encode(format!("{:?}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        sbor::basic_decode(bytes).map_err(|e| WireError::Decode(format!("{:?}", e)))
    }
}

/// One validator's seal over a finalized proposal.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct CommittedSeal {
    pub validator: ValidatorId,
    pub signature: Signature,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConsensusMessage, Subject};
    use ibft_types::{Hash, KeyPair, View};

    #[test]
    fn test_certificate_keeps_votes_intact() {
        let subject = Subject::new(View::new(5, 1), Hash::from_bytes(b"locked"));
        let votes: Vec<_> = (0..3u8)
            .map(|i| {
                SignedMessage::sign(
                    ConsensusMessage::Prepare(subject),
                    ValidatorId(i as u64),
                    &KeyPair::ed25519_from_seed(&[i + 1; 32]),
                )
                .unwrap()
            })
            .collect();
        let cert = PreparedCertificate::new(votes.clone());

        let decoded = PreparedCertificate::decode(&cert.encode().unwrap()).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.votes, votes);
    }

    #[test]
    fn test_empty_certificate() {
        let cert = PreparedCertificate::default();
        assert!(cert.is_empty());
        assert!(PreparedCertificate::decode(&cert.encode().unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_truncated_certificate_is_rejected() {
        let cert = PreparedCertificate::default();
        let mut bytes = cert.encode().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(PreparedCertificate::decode(&bytes).is_err());
    }
}
