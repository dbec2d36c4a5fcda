//! COMMIT handling and finalization.

use ibft_core::Action;
use ibft_messages::{CommitVote, CommittedSeal, ConsensusMessage, MessageCode, SignedMessage, Subject};
use ibft_types::signing::commit_seal_message;
use ibft_types::{Hash, View};
use tracing::{debug, info, warn};

use crate::error::ConsensusError;
use crate::round_state::Phase;
use crate::state::BftState;

impl BftState {
    /// Vote COMMIT on the accepted proposal of the current view.
    pub(crate) fn send_commit(&mut self, actions: &mut Vec<Action>) {
        let Some(subject) = self.current.subject() else {
            warn!("No accepted PRE-PREPARE to vote COMMIT on");
            return;
        };
        self.send_commit_for(subject.view, subject.digest, actions);
    }

    /// Vote COMMIT on `digest` at `view`, which may be an old view.
    pub(crate) fn send_commit_for(&mut self, view: View, digest: Hash, actions: &mut Vec<Action>) {
        let committed_seal = self
            .signing_key
            .sign(&commit_seal_message(view.sequence, &digest));
        let vote = CommitVote {
            subject: Subject::new(view, digest),
            committed_seal,
        };
        self.broadcast(ConsensusMessage::Commit(vote), actions);
    }

    pub(crate) fn handle_commit(
        &mut self,
        message: &SignedMessage,
        vote: &CommitVote,
        actions: &mut Vec<Action>,
    ) -> Result<(), ConsensusError> {
        self.check_message(MessageCode::Commit, vote.subject.view)?;
        self.verify_subject(&vote.subject)?;
        self.verify_committed_seal(message, vote)?;

        self.current
            .commits_mut()
            .add(message.clone(), self.backend.validator.as_ref())?;

        // A COMMIT quorum finalizes even if we never saw the PREPARE quorum.
        if self.current.commits().has_quorum() && self.current.phase() < Phase::Committed {
            if !self.current.is_locked() {
                self.current.lock_current();
            }
            self.commit(actions);
        }
        Ok(())
    }

    fn verify_committed_seal(
        &self,
        message: &SignedMessage,
        vote: &CommitVote,
    ) -> Result<(), ConsensusError> {
        let key = self
            .validators
            .public_key(message.sender)
            .ok_or(ConsensusError::UnauthorizedSender(message.sender))?;
        let seal = commit_seal_message(vote.subject.view.sequence, &vote.subject.digest);
        if !key.verify(&seal, &vote.committed_seal) {
            return Err(ConsensusError::InvalidCommittedSeal(message.sender));
        }
        Ok(())
    }

    /// Hand the accepted proposal to the chain and move to the next sequence.
    fn commit(&mut self, actions: &mut Vec<Action>) {
        self.set_phase(Phase::Committed, actions);

        let Some(proposal) = self.current.proposal().cloned() else {
            warn!(view = %self.current.view(), "COMMIT quorum without an accepted proposal");
            return;
        };
        let Some(proposer) = self.proposer else {
            warn!(view = %self.current.view(), "COMMIT quorum without a proposer");
            return;
        };

        let committed_seals: Vec<CommittedSeal> = self
            .current
            .commits()
            .values()
            .filter_map(|m| match &m.message {
                ConsensusMessage::Commit(vote) => Some(CommittedSeal {
                    validator: m.sender,
                    signature: vote.committed_seal.clone(),
                }),
                _ => None,
            })
            .collect();

        let view = self.current.view();
        info!(
            sequence = view.sequence,
            round = view.round,
            proposal = %proposal.hash(),
            seals = committed_seals.len(),
            elapsed = ?self.consensus_timestamp.map(|t| self.now.saturating_sub(t)),
            "Committed proposal"
        );
        debug!(proposer = %proposer, "Advancing to next sequence");

        actions.push(Action::CommitProposal {
            proposal: proposal.clone(),
            view,
            proposer,
            committed_seals,
        });
        self.stats.committed_sequences += 1;
        self.last_proposal = proposal;
        self.last_proposer = Some(proposer);
        self.start_new_round(0, actions);
    }
}

#[cfg(test)]
mod tests {
    use crate::{BftBackend, BftConfig, BftState, ConsensusError, Phase};
    use ibft_core::{Action, Event};
    use ibft_messages::{CommitVote, ConsensusMessage, Subject};
    use ibft_test_helpers::{run_until_idle, ScriptedVerifier, StaticChain, TestCommittee};
    use ibft_types::signing::commit_seal_message;
    use ibft_types::{Hash, Proposal, ValidatorId, View};
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn received(message: ibft_messages::SignedMessage) -> Event {
        Event::MessageReceived { message }
    }

    /// Four validators, head at sequence 9 proposed by V3, node under test V1.
    fn make_state() -> (BftState, TestCommittee, Proposal) {
        let committee = TestCommittee::new(4);
        let parent = Proposal::new(9, Hash::from_bytes(b"block-8"), 9_000, vec![]);
        let chain = Arc::new(StaticChain::with_history(
            committee.validators().clone(),
            parent.clone(),
            Some(ValidatorId(3)),
        ));
        let backend = BftBackend::new(Arc::new(ScriptedVerifier::new()), chain);
        let mut state = BftState::new(
            ValidatorId(1),
            committee.key(ValidatorId(1)).clone(),
            backend,
            BftConfig::default(),
        );
        state.start();
        (state, committee, parent)
    }

    #[traced_test]
    #[test]
    fn test_end_to_end_sequence() {
        let (mut state, committee, parent) = make_state();
        let view = View::new(10, 0);
        assert_eq!(state.view(), view);
        assert_eq!(state.proposer(), Some(ValidatorId(0)));

        let x = parent.child(10_000, b"X".to_vec());
        run_until_idle(&mut state, received(committee.preprepare(ValidatorId(0), view, &x)));
        assert_eq!(state.phase(), Phase::Preprepared);

        for i in [0, 2, 3] {
            run_until_idle(&mut state, received(committee.prepare(ValidatorId(i), view, x.hash())));
        }
        assert_eq!(state.phase(), Phase::Prepared);
        assert_eq!(state.round_state().locked_hash(), Some(x.hash()));

        let mut actions = Vec::new();
        for i in [0, 2] {
            actions.extend(run_until_idle(
                &mut state,
                received(committee.commit(ValidatorId(i), view, x.hash())),
            ));
        }

        let (proposal, commit_view, proposer, seals) = actions
            .iter()
            .find_map(|a| match a {
                Action::CommitProposal {
                    proposal,
                    view,
                    proposer,
                    committed_seals,
                } => Some((proposal, *view, *proposer, committed_seals)),
                _ => None,
            })
            .expect("COMMIT quorum should finalize");
        assert_eq!(proposal, &x);
        assert_eq!(commit_view, view);
        assert_eq!(proposer, ValidatorId(0));
        assert_eq!(seals.len(), 3);
        for seal in seals {
            let key = committee.validators().public_key(seal.validator).unwrap();
            assert!(key.verify(&commit_seal_message(10, &x.hash()), &seal.signature));
        }

        assert_eq!(state.view(), View::new(11, 0));
        assert_eq!(state.phase(), Phase::AcceptRequest);
        assert!(!state.round_state().is_locked());
        assert_eq!(state.last_proposal(), &x);
        // V0 proposed sequence 10, so V1 proposes sequence 11.
        assert_eq!(state.proposer(), Some(ValidatorId(1)));
        assert_eq!(state.stats().committed_sequences, 1);

        // Late votes for the finished sequence are old and ignored.
        let late = run_until_idle(&mut state, received(committee.commit(ValidatorId(3), view, x.hash())));
        assert!(late.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_commit_with_forged_seal_is_rejected() {
        let (mut state, committee, parent) = make_state();
        let view = View::new(10, 0);
        let x = parent.child(10_000, b"X".to_vec());
        run_until_idle(&mut state, received(committee.preprepare(ValidatorId(0), view, &x)));

        // V2 signs the envelope but carries V3's seal.
        let forged = committee.sign(
            ValidatorId(2),
            ConsensusMessage::Commit(CommitVote {
                subject: Subject::new(view, x.hash()),
                committed_seal: committee
                    .key(ValidatorId(3))
                    .sign(&commit_seal_message(10, &x.hash())),
            }),
        );
        let ConsensusMessage::Commit(vote) = &forged.message else {
            unreachable!()
        };
        let mut actions = Vec::new();
        assert_eq!(
            state.handle_commit(&forged, vote, &mut actions),
            Err(ConsensusError::InvalidCommittedSeal(ValidatorId(2)))
        );
        assert_eq!(state.round_state().commits().size(), 0);
    }

    #[traced_test]
    #[test]
    fn test_commit_quorum_finalizes_without_prepare_quorum() {
        let (mut state, committee, parent) = make_state();
        let view = View::new(10, 0);
        let x = parent.child(10_000, b"X".to_vec());
        run_until_idle(&mut state, received(committee.preprepare(ValidatorId(0), view, &x)));

        let mut actions = Vec::new();
        for i in [0, 2, 3] {
            actions.extend(run_until_idle(
                &mut state,
                received(committee.commit(ValidatorId(i), view, x.hash())),
            ));
        }
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::CommitProposal { proposal, .. } if *proposal == x)));
        assert_eq!(state.view(), View::new(11, 0));
    }
}
