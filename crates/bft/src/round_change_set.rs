//! ROUND-CHANGE votes of the current sequence, grouped by target round.

use crate::{ConsensusError, MessageSet};
use ibft_core::MessageValidator;
use ibft_messages::SignedMessage;
use ibft_types::{ValidatorId, ValidatorSet};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

/// Each validator counts towards one round only: its highest. A vote for a
/// higher round moves the validator's vote there, and a vote for a lower
/// round than its current one is ignored. The set therefore holds at most
/// one message per validator.
#[derive(Debug, Clone)]
pub struct RoundChangeSet {
    validators: Arc<ValidatorSet>,
    rounds: BTreeMap<u64, MessageSet>,
    latest: HashMap<ValidatorId, u64>,
}

impl RoundChangeSet {
    pub fn new(validators: Arc<ValidatorSet>) -> Self {
        Self {
            validators,
            rounds: BTreeMap::new(),
            latest: HashMap::new(),
        }
    }

    /// Add a vote for `round`, returning how many distinct validators voted
    /// for that round so far.
    pub fn add(
        &mut self,
        round: u64,
        message: SignedMessage,
        validator: &dyn MessageValidator,
    ) -> Result<usize, ConsensusError> {
        let sender = message.sender;
        let previous = self.latest.get(&sender).copied();
        if previous.is_some_and(|prev| prev > round) {
            trace!(sender = %sender, round, ?previous, "Ignoring ROUND-CHANGE below sender's latest");
            return Ok(self.votes(round));
        }

        let set = self
            .rounds
            .entry(round)
            .or_insert_with(|| MessageSet::new(self.validators.clone()));
        let added = set.add(message, validator);
        let size = set.size();
        if let Err(e) = added {
            if size == 0 {
                self.rounds.remove(&round);
            }
            return Err(e);
        }

        if let Some(prev) = previous.filter(|&prev| prev < round) {
            if let Some(old) = self.rounds.get_mut(&prev) {
                old.remove(sender);
                if old.is_empty() {
                    self.rounds.remove(&prev);
                }
            }
        }
        self.latest.insert(sender, round);
        Ok(size)
    }

    /// Drop rounds below `round` and rounds without votes.
    pub fn clear(&mut self, round: u64) {
        self.rounds.retain(|&r, set| r >= round && !set.is_empty());
        self.latest.retain(|_, r| *r >= round);
    }

    /// Number of rounds holding at least one vote.
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Highest round with at least `threshold` votes.
    pub fn max_round(&self, threshold: usize) -> Option<u64> {
        self.rounds
            .iter()
            .rev()
            .find(|(_, set)| set.size() >= threshold)
            .map(|(&round, _)| round)
    }

    pub fn votes(&self, round: u64) -> usize {
        self.rounds.get(&round).map_or(0, MessageSet::size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibft_core::SignatureValidator;
    use ibft_test_helpers::TestCommittee;
    use ibft_types::{ValidatorId, View};

    fn make_set() -> (TestCommittee, RoundChangeSet) {
        let committee = TestCommittee::new(4);
        let set = RoundChangeSet::new(Arc::new(committee.validators().clone()));
        (committee, set)
    }

    #[test]
    fn test_counts_distinct_voters_per_round() {
        let (committee, mut set) = make_set();
        let v = |i, r| committee.round_change(ValidatorId(i), View::new(7, r));

        assert_eq!(set.add(1, v(0, 1), &SignatureValidator).unwrap(), 1);
        assert_eq!(set.add(1, v(0, 1), &SignatureValidator).unwrap(), 1);
        assert_eq!(set.add(1, v(1, 1), &SignatureValidator).unwrap(), 2);
        assert_eq!(set.add(2, v(2, 2), &SignatureValidator).unwrap(), 1);
        assert_eq!(set.votes(1), 2);
    }

    #[test]
    fn test_max_round_respects_threshold() {
        let (committee, mut set) = make_set();
        for (i, r) in [(0, 1), (1, 1), (2, 3)] {
            set.add(r, committee.round_change(ValidatorId(i), View::new(7, r)), &SignatureValidator)
                .unwrap();
        }
        assert_eq!(set.max_round(1), Some(3));
        assert_eq!(set.max_round(2), Some(1));
        assert_eq!(set.max_round(3), None);
    }

    #[test]
    fn test_clear_drops_lower_rounds() {
        let (committee, mut set) = make_set();
        for (i, r) in [(0, 1), (1, 2), (2, 4)] {
            set.add(r, committee.round_change(ValidatorId(i), View::new(7, r)), &SignatureValidator)
                .unwrap();
        }
        set.clear(2);
        assert_eq!(set.votes(1), 0);
        assert_eq!(set.votes(2), 1);
        assert_eq!(set.votes(4), 1);

        // V0's vote was cleared, so it may vote for a lower round again.
        set.add(2, committee.round_change(ValidatorId(0), View::new(7, 2)), &SignatureValidator)
            .unwrap();
        assert_eq!(set.votes(2), 2);
    }

    #[test]
    fn test_sender_counts_only_for_its_highest_round() {
        let (committee, mut set) = make_set();
        let v = |i, r| committee.round_change(ValidatorId(i), View::new(7, r));

        set.add(2, v(0, 2), &SignatureValidator).unwrap();
        set.add(2, v(1, 2), &SignatureValidator).unwrap();
        assert_eq!(set.add(5, v(0, 5), &SignatureValidator).unwrap(), 1);
        assert_eq!(set.votes(2), 1);

        // Lower than V0's latest vote: not counted.
        assert_eq!(set.add(3, v(0, 3), &SignatureValidator).unwrap(), 0);
        assert_eq!(set.votes(3), 0);
        assert_eq!(set.round_count(), 2);
    }

    #[test]
    fn test_one_sender_cannot_grow_the_set() {
        let (committee, mut set) = make_set();
        for r in 1..=5_000 {
            set.add(r, committee.round_change(ValidatorId(2), View::new(7, r)), &SignatureValidator)
                .unwrap();
        }
        assert_eq!(set.round_count(), 1);
        assert_eq!(set.votes(5_000), 1);
        assert_eq!(set.max_round(1), Some(5_000));
    }

    #[test]
    fn test_invalid_vote_leaves_no_empty_round() {
        let (committee, mut set) = make_set();
        let mut forged = committee.round_change(ValidatorId(1), View::new(7, 3));
        forged.signature = committee.round_change(ValidatorId(0), View::new(7, 3)).signature;

        assert!(set.add(3, forged, &SignatureValidator).is_err());
        assert_eq!(set.round_count(), 0);
    }
}
