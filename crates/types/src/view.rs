//! Consensus view: the (sequence, round) pair an agreement attempt runs in.

use sbor::prelude::*;
use std::fmt;

/// A specific agreement attempt.
///
/// `sequence` is the height being agreed on, `round` the attempt within that
/// height. Field order makes the derived ordering lexicographic: sequence
/// first, then round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BasicSbor)]
pub struct View {
    pub sequence: u64,
    pub round: u64,
}

impl View {
    pub fn new(sequence: u64, round: u64) -> Self {
        Self { sequence, round }
    }

    /// Same sequence, given round.
    pub fn with_round(self, round: u64) -> Self {
        Self {
            sequence: self.sequence,
            round,
        }
    }

    /// Round 0 of the following sequence.
    pub fn next_sequence(self) -> Self {
        Self {
            sequence: self.sequence + 1,
            round: 0,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "View({}/{})", self.sequence, self.round)
    }
}
