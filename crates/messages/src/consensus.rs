//! Phase-specific consensus message bodies.

use ibft_types::{Hash, Proposal, Signature, View};
use sbor::prelude::*;
use std::fmt;

/// Message kind, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MessageCode {
    Preprepare = 0,
    Prepare = 1,
    Commit = 2,
    RoundChange = 3,
}

impl MessageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCode::Preprepare => "PRE-PREPARE",
            MessageCode::Prepare => "PREPARE",
            MessageCode::Commit => "COMMIT",
            MessageCode::RoundChange => "ROUND-CHANGE",
        }
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a PREPARE, COMMIT or ROUND-CHANGE vote is about.
///
/// ROUND-CHANGE votes carry a zero digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub struct Subject {
    pub view: View,
    pub digest: Hash,
}

impl Subject {
    pub fn new(view: View, digest: Hash) -> Self {
        Self { view, digest }
    }

    /// Subject of a ROUND-CHANGE vote for `view`.
    pub fn round_change(view: View) -> Self {
        Self {
            view,
            digest: Hash::ZERO,
        }
    }
}

/// A proposer's PRE-PREPARE.
///
/// When the proposer is locked, `locked_round`, `locked_hash` and
/// `locked_prepares` carry its proof of lock: `locked_prepares` is an encoded
/// [`crate::PreparedCertificate`] of the PREPARE votes that formed the lock.
/// An unlocked proposer sends zeros and an empty certificate.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Preprepare {
    pub view: View,
    pub proposal: Proposal,
    pub locked_round: u64,
    pub locked_hash: Hash,
    pub locked_prepares: Vec<u8>,
}

impl Preprepare {
    /// PRE-PREPARE from a proposer that holds no lock.
    pub fn unlocked(view: View, proposal: Proposal) -> Self {
        Self {
            view,
            proposal,
            locked_round: 0,
            locked_hash: Hash::ZERO,
            locked_prepares: Vec::new(),
        }
    }

    /// Whether a proof of lock is attached.
    pub fn carries_lock(&self) -> bool {
        !self.locked_hash.is_zero()
    }
}

/// A COMMIT vote plus the sender's commit seal over the proposal.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct CommitVote {
    pub subject: Subject,
    pub committed_seal: Signature,
}

/// Tagged union of every consensus message body.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub enum ConsensusMessage {
    Preprepare(Preprepare),
    Prepare(Subject),
    Commit(CommitVote),
    RoundChange(Subject),
}

impl ConsensusMessage {
    pub fn code(&self) -> MessageCode {
        match self {
            ConsensusMessage::Preprepare(_) => MessageCode::Preprepare,
            ConsensusMessage::Prepare(_) => MessageCode::Prepare,
            ConsensusMessage::Commit(_) => MessageCode::Commit,
            ConsensusMessage::RoundChange(_) => MessageCode::RoundChange,
        }
    }

    /// View the message claims to belong to.
    pub fn view(&self) -> View {
        match self {
            ConsensusMessage::Preprepare(preprepare) => preprepare.view,
            ConsensusMessage::Prepare(subject) | ConsensusMessage::RoundChange(subject) => {
                subject.view
            }
            ConsensusMessage::Commit(commit) => commit.subject.view,
        }
    }

    /// Subject of a vote; `None` for PRE-PREPARE.
    pub fn subject(&self) -> Option<&Subject> {
        match self {
            ConsensusMessage::Preprepare(_) => None,
            ConsensusMessage::Prepare(subject) | ConsensusMessage::RoundChange(subject) => {
                Some(subject)
            }
            ConsensusMessage::Commit(commit) => Some(&commit.subject),
        }
    }
}
