//! One-vote-per-validator message collection.

use crate::ConsensusError;
use ibft_core::MessageValidator;
use ibft_messages::{PreparedCertificate, SignedMessage};
use ibft_types::{ValidatorId, ValidatorSet};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Votes of a single phase and view, at most one per validator.
///
/// A later vote from the same validator replaces the earlier one, so a
/// retransmission (even with a different payload) is never counted twice.
#[derive(Debug, Clone)]
pub struct MessageSet {
    validators: Arc<ValidatorSet>,
    messages: BTreeMap<ValidatorId, SignedMessage>,
}

impl MessageSet {
    pub fn new(validators: Arc<ValidatorSet>) -> Self {
        Self {
            validators,
            messages: BTreeMap::new(),
        }
    }

    /// Rebuild a set from a certificate.
    ///
    /// `check` runs on every vote before its membership and signature are
    /// validated; the first error from either aborts the rebuild.
    pub fn from_certificate<F>(
        certificate: PreparedCertificate,
        validators: Arc<ValidatorSet>,
        validator: &dyn MessageValidator,
        mut check: F,
    ) -> Result<Self, ConsensusError>
    where
        F: FnMut(&SignedMessage) -> Result<(), ConsensusError>,
    {
        let mut set = Self::new(validators);
        for vote in certificate.votes {
            check(&vote)?;
            set.add(vote, validator)?;
        }
        Ok(set)
    }

    /// Insert or replace the sender's vote.
    ///
    /// Fails if the sender is not a member or the signature does not verify.
    pub fn add(
        &mut self,
        message: SignedMessage,
        validator: &dyn MessageValidator,
    ) -> Result<(), ConsensusError> {
        validator.validate(&message, &self.validators)?;
        self.messages.insert(message.sender, message);
        Ok(())
    }

    pub fn remove(&mut self, validator: ValidatorId) -> Option<SignedMessage> {
        self.messages.remove(&validator)
    }

    pub fn size(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Votes ordered by validator id.
    pub fn values(&self) -> impl Iterator<Item = &SignedMessage> {
        self.messages.values()
    }

    pub fn get(&self, validator: ValidatorId) -> Option<&SignedMessage> {
        self.messages.get(&validator)
    }

    pub fn contains(&self, validator: ValidatorId) -> bool {
        self.messages.contains_key(&validator)
    }

    /// Whether the set holds at least N-F votes.
    pub fn has_quorum(&self) -> bool {
        self.size() >= self.validators.quorum_size()
    }

    pub fn validators(&self) -> &Arc<ValidatorSet> {
        &self.validators
    }

    /// Snapshot of the votes for transport inside a PRE-PREPARE.
    pub fn to_certificate(&self) -> PreparedCertificate {
        PreparedCertificate::new(self.messages.values().cloned().collect())
    }
}
