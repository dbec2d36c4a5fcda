//! Per-node in-memory chain for simulation.

use ibft_core::{ChainReader, ProposalVerifier, VerifyError};
use ibft_types::{Hash, Proposal, ValidatorId, ValidatorSet};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Duration;

/// Payload prefix the simulated verifier rejects as invalid content.
pub const INVALID_PAYLOAD: &[u8] = b"invalid";

/// A node's finalized chain plus the verifier rules it applies.
///
/// Each node owns one. The runner keeps its clock in step with simulated
/// time so proposals stamped in the future are reported as future blocks.
pub struct SimChain {
    validators: ValidatorSet,
    proposals: RwLock<BTreeMap<u64, (Proposal, Option<ValidatorId>)>>,
    clock: RwLock<Duration>,
}

impl SimChain {
    /// Chain holding only genesis.
    pub fn new(validators: ValidatorSet) -> Self {
        let mut proposals = BTreeMap::new();
        proposals.insert(0, (Proposal::genesis(), None));
        Self {
            validators,
            proposals: RwLock::new(proposals),
            clock: RwLock::new(Duration::ZERO),
        }
    }

    pub fn set_time(&self, now: Duration) {
        *self.clock.write() = now;
    }

    /// Append a finalized proposal.
    pub fn commit(&self, proposal: Proposal, proposer: ValidatorId) {
        self.proposals
            .write()
            .insert(proposal.number, (proposal, Some(proposer)));
    }

    pub fn height(&self) -> u64 {
        self.proposals
            .read()
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
    }

    pub fn get(&self, number: u64) -> Option<Proposal> {
        self.proposals.read().get(&number).map(|(p, _)| p.clone())
    }
}

impl ChainReader for SimChain {
    fn last_proposal(&self) -> (Proposal, Option<ValidatorId>) {
        self.proposals
            .read()
            .values()
            .next_back()
            .cloned()
            .unwrap_or_else(|| (Proposal::genesis(), None))
    }

    fn validators(&self, _proposal: &Proposal) -> ValidatorSet {
        self.validators.clone()
    }

    fn parent_validators(&self, _proposal: &Proposal) -> ValidatorSet {
        self.validators.clone()
    }

    fn proposer_at(&self, number: u64) -> Option<ValidatorId> {
        self.proposals
            .read()
            .get(&number)
            .and_then(|(_, proposer)| *proposer)
    }

    fn has_proposal(&self, hash: &Hash, number: u64) -> bool {
        self.proposals
            .read()
            .get(&number)
            .is_some_and(|(p, _)| p.hash() == *hash)
    }
}

impl ProposalVerifier for SimChain {
    /// Checks chain linkage, the timestamp against the local clock, and the
    /// invalid-payload marker.
    fn verify(&self, proposal: &Proposal, _is_local_proposer: bool) -> Result<(), VerifyError> {
        let (parent, _) = self.last_proposal();
        if proposal.number != parent.number + 1 {
            return Err(VerifyError::Invalid(format!(
                "proposal {} does not extend head {}",
                proposal.number, parent.number
            )));
        }
        if proposal.parent_hash != parent.hash() {
            return Err(VerifyError::Invalid("unknown parent".to_string()));
        }
        if proposal.payload.starts_with(INVALID_PAYLOAD) {
            return Err(VerifyError::Invalid("rejected payload".to_string()));
        }

        let now = *self.clock.read();
        let stamped = Duration::from_millis(proposal.timestamp);
        if stamped > now {
            return Err(VerifyError::FutureBlock {
                retry_after: stamped - now,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibft_types::{KeyPair, ProposerPolicy, ValidatorInfo};

    fn make_chain() -> SimChain {
        let info = ValidatorInfo {
            validator_id: ValidatorId(0),
            public_key: KeyPair::ed25519_from_seed(&[1; 32]).public_key(),
        };
        SimChain::new(ValidatorSet::new(vec![info], ProposerPolicy::RoundRobin))
    }

    #[test]
    fn test_verify_checks_linkage() {
        let chain = make_chain();
        let next = Proposal::genesis().child(0, vec![]);
        assert_eq!(chain.verify(&next, false), Ok(()));

        let skipped = next.child(0, vec![]);
        assert!(matches!(chain.verify(&skipped, false), Err(VerifyError::Invalid(_))));

        let orphan = Proposal::new(1, Hash::from_bytes(b"elsewhere"), 0, vec![]);
        assert!(matches!(chain.verify(&orphan, false), Err(VerifyError::Invalid(_))));

        chain.commit(next.clone(), ValidatorId(0));
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.verify(&skipped, false), Ok(()));
        assert!(chain.has_proposal(&next.hash(), 1));
        assert_eq!(chain.proposer_at(1), Some(ValidatorId(0)));
    }

    #[test]
    fn test_future_timestamp_is_future_block() {
        let chain = make_chain();
        chain.set_time(Duration::from_millis(100));
        let early = Proposal::genesis().child(300, vec![]);
        assert_eq!(
            chain.verify(&early, false),
            Err(VerifyError::FutureBlock {
                retry_after: Duration::from_millis(200)
            })
        );

        chain.set_time(Duration::from_millis(300));
        assert_eq!(chain.verify(&early, false), Ok(()));
    }

    #[test]
    fn test_invalid_payload_is_rejected() {
        let chain = make_chain();
        let bad = Proposal::genesis().child(0, b"invalid-content".to_vec());
        assert!(matches!(chain.verify(&bad, true), Err(VerifyError::Invalid(_))));
    }
}
