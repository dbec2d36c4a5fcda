//! Validator committee and proposer selection.

use crate::{PublicKey, ValidatorId};
use sbor::prelude::*;
use std::fmt;
use std::str::FromStr;

/// A committee member.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ValidatorInfo {
    /// Validator identifier.
    pub validator_id: ValidatorId,
    /// Key used to verify the validator's messages and commit seals.
    pub public_key: PublicKey,
}

/// How the proposer moves between rounds and sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BasicSbor)]
pub enum ProposerPolicy {
    /// Rotate to the validator after the last proposer on every new sequence.
    #[default]
    RoundRobin,
    /// Keep the last proposer until a round change moves it on.
    Sticky,
}

impl FromStr for ProposerPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" | "round-robin" => Ok(ProposerPolicy::RoundRobin),
            "sticky" => Ok(ProposerPolicy::Sticky),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ProposerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposerPolicy::RoundRobin => write!(f, "round_robin"),
            ProposerPolicy::Sticky => write!(f, "sticky"),
        }
    }
}

/// Unrecognized proposer policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown proposer policy: {0}")]
pub struct UnknownPolicy(pub String);

/// An ordered, immutable committee.
///
/// Members are kept sorted by [`ValidatorId`] with duplicates removed, so
/// every replica derives the same indices from the same membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<ValidatorInfo>,
    policy: ProposerPolicy,
}

impl ValidatorSet {
    pub fn new(mut validators: Vec<ValidatorInfo>, policy: ProposerPolicy) -> Self {
        validators.sort_by_key(|v| v.validator_id);
        validators.dedup_by_key(|v| v.validator_id);
        Self { validators, policy }
    }

    /// Number of validators (N).
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Maximum number of Byzantine validators tolerated: F = ⌊(N−1)/3⌋.
    pub fn f(&self) -> usize {
        self.validators.len().saturating_sub(1) / 3
    }

    /// Votes needed for a quorum certificate: N − F.
    pub fn quorum_size(&self) -> usize {
        self.validators.len() - self.f()
    }

    /// Votes needed for a weak certificate: F + 1.
    pub fn weak_quorum_size(&self) -> usize {
        self.f() + 1
    }

    pub fn policy(&self) -> ProposerPolicy {
        self.policy
    }

    pub fn validators(&self) -> &[ValidatorInfo] {
        &self.validators
    }

    pub fn ids(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.validators.iter().map(|v| v.validator_id)
    }

    pub fn contains(&self, validator_id: ValidatorId) -> bool {
        self.index_of(validator_id).is_some()
    }

    /// Position of a validator in committee order.
    pub fn index_of(&self, validator_id: ValidatorId) -> Option<usize> {
        self.validators
            .binary_search_by_key(&validator_id, |v| v.validator_id)
            .ok()
    }

    pub fn get_by_index(&self, index: usize) -> Option<&ValidatorInfo> {
        self.validators.get(index)
    }

    pub fn public_key(&self, validator_id: ValidatorId) -> Option<&PublicKey> {
        self.index_of(validator_id)
            .map(|idx| &self.validators[idx].public_key)
    }

    /// Proposer for `round`, given the proposer of the previous sequence.
    ///
    /// With no previous proposer both policies start from `round`. Otherwise
    /// the seed is the previous proposer's index plus `round`, and round-robin
    /// adds one more step so a fresh sequence always moves to a new validator.
    /// A previous proposer that is not a member counts as index 0.
    pub fn calc_proposer(&self, last_proposer: Option<ValidatorId>, round: u64) -> Option<ValidatorId> {
        if self.validators.is_empty() {
            return None;
        }

        let seed = match last_proposer {
            None => round,
            Some(last) => {
                let offset = self.index_of(last).unwrap_or(0) as u64;
                let base = offset.wrapping_add(round);
                match self.policy {
                    ProposerPolicy::RoundRobin => base.wrapping_add(1),
                    ProposerPolicy::Sticky => base,
                }
            }
        };

        let index = (seed % self.validators.len() as u64) as usize;
        Some(self.validators[index].validator_id)
    }
}
