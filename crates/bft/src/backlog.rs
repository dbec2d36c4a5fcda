//! Store for messages whose view is ahead of ours.

use crate::ConsensusError;
use ibft_messages::SignedMessage;
use ibft_types::{ValidatorId, View};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Future-view messages, replayed in view order then arrival order.
///
/// Each sender may hold at most `max_per_sender` entries. When a sender is
/// full, its furthest-future entry gives way to a nearer one; a message
/// further out than everything it already has is dropped.
#[derive(Debug, Clone)]
pub struct Backlog {
    local: ValidatorId,
    max_per_sender: usize,
    entries: BTreeMap<(View, u64), SignedMessage>,
    per_sender: HashMap<ValidatorId, usize>,
    next_arrival: u64,
}

impl Backlog {
    pub fn new(local: ValidatorId, max_per_sender: usize) -> Self {
        Self {
            local,
            max_per_sender,
            entries: BTreeMap::new(),
            per_sender: HashMap::new(),
            next_arrival: 0,
        }
    }

    /// Store a message. Returns false if it was not kept.
    ///
    /// Our own messages are never stored.
    pub fn push(&mut self, message: SignedMessage) -> bool {
        let sender = message.sender;
        if sender == self.local || self.max_per_sender == 0 {
            return false;
        }

        let key = (message.view(), self.next_arrival);
        let count = self.per_sender.get(&sender).copied().unwrap_or(0);
        if count >= self.max_per_sender {
            let furthest = self
                .entries
                .iter()
                .rev()
                .find(|(_, m)| m.sender == sender)
                .map(|(k, _)| *k);
            match furthest {
                Some(furthest) if key.0 < furthest.0 => {
                    trace!(sender = %sender, evicted = %furthest.0, "Backlog full, evicting furthest entry");
                    self.entries.remove(&furthest);
                }
                _ => {
                    trace!(sender = %sender, view = %key.0, "Backlog full, dropping message");
                    return false;
                }
            }
        } else {
            self.per_sender.insert(sender, count + 1);
        }

        self.next_arrival += 1;
        self.entries.insert(key, message);
        true
    }

    /// Remove and return every message `classify` admits as current.
    ///
    /// Messages classified old (or rejected outright) are dropped; messages
    /// still in the future stay.
    pub fn drain<F>(&mut self, mut classify: F) -> Vec<SignedMessage>
    where
        F: FnMut(&SignedMessage) -> Result<(), ConsensusError>,
    {
        let mut ready = Vec::new();
        let mut removed = Vec::new();
        for (key, message) in &self.entries {
            match classify(message) {
                Ok(()) => ready.push(*key),
                Err(ConsensusError::FutureMessage { .. }) => {}
                Err(_) => removed.push(*key),
            }
        }

        let mut out = Vec::with_capacity(ready.len());
        for key in removed {
            self.remove(&key);
        }
        for key in ready {
            if let Some(message) = self.remove(&key) {
                out.push(message);
            }
        }
        out
    }

    fn remove(&mut self, key: &(View, u64)) -> Option<SignedMessage> {
        let message = self.entries.remove(key)?;
        if let Some(count) = self.per_sender.get_mut(&message.sender) {
            *count -= 1;
            if *count == 0 {
                self.per_sender.remove(&message.sender);
            }
        }
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len_for(&self, sender: ValidatorId) -> usize {
        self.per_sender.get(&sender).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibft_test_helpers::TestCommittee;
    use ibft_types::Hash;

    fn classify_at(current: View) -> impl FnMut(&SignedMessage) -> Result<(), ConsensusError> {
        move |m| {
            let view = m.view();
            if view > current {
                Err(ConsensusError::FutureMessage { view })
            } else if view < current {
                Err(ConsensusError::OldMessage { view })
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_own_messages_are_not_stored() {
        let committee = TestCommittee::new(4);
        let mut backlog = Backlog::new(ValidatorId(0), 8);
        assert!(!backlog.push(committee.prepare(ValidatorId(0), View::new(2, 0), Hash::ZERO)));
        assert!(backlog.is_empty());
    }

    #[test]
    fn test_drain_returns_current_in_arrival_order() {
        let committee = TestCommittee::new(4);
        let mut backlog = Backlog::new(ValidatorId(0), 8);
        let view = View::new(5, 0);

        let late = committee.prepare(ValidatorId(2), view, Hash::ZERO);
        let early = committee.prepare(ValidatorId(1), view, Hash::ZERO);
        let old = committee.prepare(ValidatorId(3), View::new(4, 0), Hash::ZERO);
        let future = committee.prepare(ValidatorId(3), View::new(6, 0), Hash::ZERO);
        for m in [late.clone(), early.clone(), old, future] {
            assert!(backlog.push(m));
        }

        let drained = backlog.drain(classify_at(view));
        assert_eq!(drained, vec![late, early]);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog.len_for(ValidatorId(3)), 1);
    }

    #[test]
    fn test_full_sender_evicts_furthest_entry() {
        let committee = TestCommittee::new(4);
        let mut backlog = Backlog::new(ValidatorId(0), 2);
        let sender = ValidatorId(1);

        assert!(backlog.push(committee.round_change(sender, View::new(9, 0))));
        assert!(backlog.push(committee.round_change(sender, View::new(20, 0))));

        // Further than anything held: dropped.
        assert!(!backlog.push(committee.round_change(sender, View::new(30, 0))));
        // Nearer than the furthest: replaces it.
        assert!(backlog.push(committee.round_change(sender, View::new(10, 0))));
        assert_eq!(backlog.len_for(sender), 2);

        let drained = backlog.drain(classify_at(View::new(20, 0)));
        assert!(drained.is_empty());
        assert!(backlog.is_empty());
    }
}
