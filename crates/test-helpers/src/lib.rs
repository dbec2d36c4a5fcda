//! Test helpers for Istanbul BFT.
//!
//! Provides properly-signed fixtures so tests exercise the real signature
//! checks instead of bypassing them:
//!
//! - [`TestCommittee`]: deterministic validator keys plus message builders
//! - [`StaticChain`]: in-memory [`ChainReader`]
//! - [`ScriptedVerifier`]: [`ProposalVerifier`] returning queued outcomes
//! - [`run_until_idle`]: drives a state machine through its internal events

use ibft_core::{Action, ChainReader, Event, ProposalVerifier, StateMachine, VerifyError};
use ibft_messages::{
    CommitVote, ConsensusMessage, PreparedCertificate, Preprepare, SignedMessage, Subject,
};
use ibft_types::signing::commit_seal_message;
use ibft_types::{
    Hash, KeyPair, Proposal, ProposerPolicy, ValidatorId, ValidatorInfo, ValidatorSet, View,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};

// ═══════════════════════════════════════════════════════════════════════════
// Committee fixtures
// ═══════════════════════════════════════════════════════════════════════════

/// A committee of `n` validators with deterministic Ed25519 keys.
///
/// Validator `i` uses the seed `[i + 1; 32]`, so two committees of the same
/// size share keys.
pub struct TestCommittee {
    keys: Vec<KeyPair>,
    validators: ValidatorSet,
}

impl TestCommittee {
    pub fn new(n: usize) -> Self {
        Self::with_policy(n, ProposerPolicy::RoundRobin)
    }

    pub fn with_policy(n: usize, policy: ProposerPolicy) -> Self {
        let keys: Vec<KeyPair> = (0..n)
            .map(|i| KeyPair::ed25519_from_seed(&[(i + 1) as u8; 32]))
            .collect();
        let infos = keys
            .iter()
            .enumerate()
            .map(|(i, k)| ValidatorInfo {
                validator_id: ValidatorId(i as u64),
                public_key: k.public_key(),
            })
            .collect();
        Self {
            keys,
            validators: ValidatorSet::new(infos, policy),
        }
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn key(&self, validator: ValidatorId) -> &KeyPair {
        &self.keys[validator.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sign `message` as `sender`.
    pub fn sign(&self, sender: ValidatorId, message: ConsensusMessage) -> SignedMessage {
        SignedMessage::sign(message, sender, self.key(sender)).expect("sign test message")
    }

    /// PRE-PREPARE from an unlocked proposer.
    pub fn preprepare(&self, sender: ValidatorId, view: View, proposal: &Proposal) -> SignedMessage {
        self.sign(
            sender,
            ConsensusMessage::Preprepare(Preprepare::unlocked(view, proposal.clone())),
        )
    }

    /// PRE-PREPARE carrying a proof of lock.
    pub fn preprepare_with_lock(
        &self,
        sender: ValidatorId,
        view: View,
        proposal: &Proposal,
        locked_round: u64,
        certificate: &PreparedCertificate,
    ) -> SignedMessage {
        let preprepare = Preprepare {
            view,
            proposal: proposal.clone(),
            locked_round,
            locked_hash: proposal.hash(),
            locked_prepares: certificate.encode().expect("encode certificate"),
        };
        self.sign(sender, ConsensusMessage::Preprepare(preprepare))
    }

    pub fn prepare(&self, sender: ValidatorId, view: View, digest: Hash) -> SignedMessage {
        self.sign(sender, ConsensusMessage::Prepare(Subject::new(view, digest)))
    }

    /// COMMIT carrying a valid commit seal from `sender`.
    pub fn commit(&self, sender: ValidatorId, view: View, digest: Hash) -> SignedMessage {
        let seal = self
            .key(sender)
            .sign(&commit_seal_message(view.sequence, &digest));
        self.sign(
            sender,
            ConsensusMessage::Commit(CommitVote {
                subject: Subject::new(view, digest),
                committed_seal: seal,
            }),
        )
    }

    pub fn round_change(&self, sender: ValidatorId, view: View) -> SignedMessage {
        self.sign(
            sender,
            ConsensusMessage::RoundChange(Subject::round_change(view)),
        )
    }

    /// PREPARE votes for `digest` at `view` from each of `senders`.
    pub fn prepared_certificate(
        &self,
        senders: &[ValidatorId],
        view: View,
        digest: Hash,
    ) -> PreparedCertificate {
        PreparedCertificate::new(
            senders
                .iter()
                .map(|&s| self.prepare(s, view, digest))
                .collect(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Backends
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory chain with a fixed validator set.
pub struct StaticChain {
    validators: ValidatorSet,
    inner: RwLock<ChainInner>,
}

struct ChainInner {
    proposals: BTreeMap<u64, (Proposal, Option<ValidatorId>)>,
}

impl StaticChain {
    /// Chain holding only genesis.
    pub fn new(validators: ValidatorSet) -> Self {
        Self::with_history(validators, Proposal::genesis(), None)
    }

    /// Chain whose head is `last`, proposed by `last_proposer`.
    pub fn with_history(
        validators: ValidatorSet,
        last: Proposal,
        last_proposer: Option<ValidatorId>,
    ) -> Self {
        let mut proposals = BTreeMap::new();
        proposals.insert(last.number, (last, last_proposer));
        Self {
            validators,
            inner: RwLock::new(ChainInner { proposals }),
        }
    }

    /// Record `proposal` as finalized.
    pub fn insert(&self, proposal: Proposal, proposer: Option<ValidatorId>) {
        self.inner
            .write()
            .proposals
            .insert(proposal.number, (proposal, proposer));
    }
}

impl ChainReader for StaticChain {
    fn last_proposal(&self) -> (Proposal, Option<ValidatorId>) {
        let inner = self.inner.read();
        inner
            .proposals
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
        self.inner
            .read()
            .proposals
            .get(&number)
            .and_then(|(_, proposer)| *proposer)
    }

    fn has_proposal(&self, hash: &Hash, number: u64) -> bool {
        self.inner
            .read()
            .proposals
            .get(&number)
            .is_some_and(|(p, _)| p.hash() == *hash)
    }
}

/// Verifier that returns queued outcomes in order, then accepts everything.
#[derive(Default)]
pub struct ScriptedVerifier {
    outcomes: Mutex<VecDeque<Result<(), VerifyError>>>,
    calls: Mutex<usize>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next unanswered `verify` call.
    pub fn push(&self, outcome: Result<(), VerifyError>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Number of `verify` calls so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl ProposalVerifier for ScriptedVerifier {
    fn verify(&self, _proposal: &Proposal, _is_local_proposer: bool) -> Result<(), VerifyError> {
        *self.calls.lock() += 1;
        self.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Driving
// ═══════════════════════════════════════════════════════════════════════════

/// Handle `event`, then every internal event it enqueues, depth first in
/// emission order.
///
/// Returns every non-internal action produced along the way.
pub fn run_until_idle<S: StateMachine>(state: &mut S, event: Event) -> Vec<Action> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([event]);
    while let Some(event) = queue.pop_front() {
        let mut internal = Vec::new();
        for action in state.handle(event) {
            match action {
                Action::EnqueueInternal { event } => internal.push(event),
                other => out.push(other),
            }
        }
        // Internal events run before anything already queued.
        for event in internal.into_iter().rev() {
            queue.push_front(event);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committee_keys_are_deterministic() {
        let a = TestCommittee::new(4);
        let b = TestCommittee::new(4);
        assert_eq!(a.validators(), b.validators());
        assert_eq!(a.validators().quorum_size(), 3);
    }

    #[test]
    fn test_static_chain_tracks_head() {
        let committee = TestCommittee::new(4);
        let chain = StaticChain::new(committee.validators().clone());
        let next = Proposal::genesis().child(1, vec![1]);
        chain.insert(next.clone(), Some(ValidatorId(2)));

        let (head, proposer) = chain.last_proposal();
        assert_eq!(head, next);
        assert_eq!(proposer, Some(ValidatorId(2)));
        assert!(chain.has_proposal(&next.hash(), 1));
        assert!(!chain.has_proposal(&next.hash(), 0));
    }

    #[test]
    fn test_scripted_verifier_defaults_to_ok() {
        let verifier = ScriptedVerifier::new();
        verifier.push(Err(VerifyError::Invalid("bad".into())));
        let p = Proposal::genesis();
        assert!(verifier.verify(&p, false).is_err());
        assert!(verifier.verify(&p, false).is_ok());
        assert_eq!(verifier.calls(), 2);
    }
}
