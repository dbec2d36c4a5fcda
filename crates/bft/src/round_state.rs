//! State of the current view.

use crate::MessageSet;
use ibft_messages::{PreparedCertificate, Preprepare, Subject};
use ibft_types::{Hash, Proposal, ValidatorSet, View};
use std::fmt;
use std::sync::Arc;

/// Progress within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Waiting for the proposer's PRE-PREPARE.
    AcceptRequest,
    /// PRE-PREPARE accepted, PREPARE sent.
    Preprepared,
    /// PREPARE quorum seen (or lock matched), COMMIT sent.
    Prepared,
    /// COMMIT quorum seen, proposal handed to the chain.
    Committed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::AcceptRequest => "AcceptRequest",
            Phase::Preprepared => "Preprepared",
            Phase::Prepared => "Prepared",
            Phase::Committed => "Committed",
        };
        f.write_str(s)
    }
}

/// A replica's commitment to a proposal it saw a PREPARE quorum for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    /// Round the PREPARE quorum formed in.
    pub round: u64,
    pub proposal: Proposal,
    pub hash: Hash,
    /// The PREPARE quorum, forwarded as proof of lock when re-proposing.
    pub prepares: PreparedCertificate,
}

/// Mutable consensus state for the current view only.
///
/// Replaced wholesale on every new round. A lock survives round changes
/// within a sequence and never crosses a sequence boundary.
#[derive(Debug, Clone)]
pub struct RoundState {
    view: View,
    phase: Phase,
    preprepare: Option<Preprepare>,
    prepares: MessageSet,
    commits: MessageSet,
    lock: Option<Lock>,
    pending_request: Option<Proposal>,
}

impl RoundState {
    /// Fresh state for the first round of a sequence.
    pub fn new(view: View, validators: Arc<ValidatorSet>) -> Self {
        Self::with_carry(view, validators, None, None)
    }

    /// State for a later round, carrying the lock and pending request.
    pub fn with_carry(
        view: View,
        validators: Arc<ValidatorSet>,
        lock: Option<Lock>,
        pending_request: Option<Proposal>,
    ) -> Self {
        Self {
            view,
            phase: Phase::AcceptRequest,
            preprepare: None,
            prepares: MessageSet::new(validators.clone()),
            commits: MessageSet::new(validators),
            lock,
            pending_request,
        }
    }

    /// Successor state for `view` in the same sequence.
    pub fn next_round(&self, view: View, validators: Arc<ValidatorSet>) -> Self {
        debug_assert_eq!(view.sequence, self.view.sequence);
        Self::with_carry(
            view,
            validators,
            self.lock.clone(),
            self.pending_request.clone(),
        )
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn sequence(&self) -> u64 {
        self.view.sequence
    }

    pub fn round(&self) -> u64 {
        self.view.round
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn preprepare(&self) -> Option<&Preprepare> {
        self.preprepare.as_ref()
    }

    pub(crate) fn set_preprepare(&mut self, preprepare: Preprepare) {
        self.preprepare = Some(preprepare);
    }

    /// Proposal of the accepted PRE-PREPARE.
    pub fn proposal(&self) -> Option<&Proposal> {
        self.preprepare.as_ref().map(|p| &p.proposal)
    }

    /// What PREPARE and COMMIT votes of this round must be about.
    pub fn subject(&self) -> Option<Subject> {
        self.proposal()
            .map(|proposal| Subject::new(self.view, proposal.hash()))
    }

    pub fn prepares(&self) -> &MessageSet {
        &self.prepares
    }

    pub(crate) fn prepares_mut(&mut self) -> &mut MessageSet {
        &mut self.prepares
    }

    pub fn commits(&self) -> &MessageSet {
        &self.commits
    }

    pub(crate) fn commits_mut(&mut self) -> &mut MessageSet {
        &mut self.commits
    }

    pub fn lock(&self) -> Option<&Lock> {
        self.lock.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn locked_hash(&self) -> Option<Hash> {
        self.lock.as_ref().map(|l| l.hash)
    }

    /// Lock on the accepted proposal with the current PREPARE votes.
    ///
    /// No-op without an accepted PRE-PREPARE.
    pub(crate) fn lock_current(&mut self) {
        let Some(proposal) = self.proposal().cloned() else {
            return;
        };
        self.lock = Some(Lock {
            round: self.view.round,
            hash: proposal.hash(),
            proposal,
            prepares: self.prepares.to_certificate(),
        });
    }

    pub(crate) fn unlock(&mut self) {
        self.lock = None;
    }

    pub fn pending_request(&self) -> Option<&Proposal> {
        self.pending_request.as_ref()
    }

    pub(crate) fn set_pending_request(&mut self, proposal: Proposal) {
        self.pending_request = Some(proposal);
    }
}
