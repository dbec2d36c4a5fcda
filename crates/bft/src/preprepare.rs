//! PRE-PREPARE handling: proposal verification and lock-aware acceptance.

use ibft_core::{Action, TimerId, VerifyError};
use ibft_messages::{
    ConsensusMessage, MessageCode, PreparedCertificate, Preprepare, SignedMessage, Subject,
};
use ibft_types::{Proposal, View};
use tracing::{debug, info, warn};

use crate::error::ConsensusError;
use crate::message_set::MessageSet;
use crate::round_state::Phase;
use crate::state::BftState;

impl BftState {
    /// Broadcast a PRE-PREPARE for `proposal` if we propose the current view.
    ///
    /// A locked proposer always re-proposes its locked value and attaches the
    /// PREPARE quorum that formed the lock.
    pub(crate) fn send_preprepare(&mut self, proposal: Proposal, actions: &mut Vec<Action>) {
        if proposal.number != self.current.sequence() || !self.is_proposer() {
            return;
        }

        let view = self.current.view();
        let preprepare = match self.current.lock() {
            Some(lock) => {
                let locked_prepares = match lock.prepares.encode() {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode proof of lock");
                        return;
                    }
                };
                Preprepare {
                    view,
                    proposal: lock.proposal.clone(),
                    locked_round: lock.round,
                    locked_hash: lock.hash,
                    locked_prepares,
                }
            }
            None => Preprepare::unlocked(view, proposal),
        };

        debug!(
            view = %view,
            proposal = %preprepare.proposal.hash(),
            locked_round = preprepare.locked_round,
            "Broadcasting PRE-PREPARE"
        );
        self.broadcast(ConsensusMessage::Preprepare(preprepare), actions);
    }

    pub(crate) fn handle_preprepare(
        &mut self,
        message: &SignedMessage,
        preprepare: &Preprepare,
        actions: &mut Vec<Action>,
    ) -> Result<(), ConsensusError> {
        if let Err(err) = self.check_message(MessageCode::Preprepare, preprepare.view) {
            if matches!(err, ConsensusError::OldMessage { .. })
                && self.is_decided_preprepare(message, preprepare)
            {
                debug!(
                    view = %preprepare.view,
                    proposal = %preprepare.proposal.hash(),
                    "Re-sending COMMIT for already decided proposal"
                );
                self.send_commit_for(preprepare.view, preprepare.proposal.hash(), actions);
                return Ok(());
            }
            return Err(err);
        }

        if self.proposer != Some(message.sender) {
            warn!(sender = %message.sender, proposer = ?self.proposer, "Ignoring PRE-PREPARE from non-proposer");
            return Err(ConsensusError::NotProposer {
                sender: message.sender,
            });
        }

        if preprepare.proposal.number != preprepare.view.sequence {
            return Err(ConsensusError::InvalidMessage(format!(
                "proposal number {} does not match sequence {}",
                preprepare.proposal.number, preprepare.view.sequence
            )));
        }

        match self
            .backend
            .verifier
            .verify(&preprepare.proposal, self.is_proposer())
        {
            Ok(()) => {}
            Err(VerifyError::FutureBlock { retry_after }) => {
                // One outstanding retry at most; SetTimer replaces the old one.
                self.future_preprepare = Some(message.clone());
                self.stats.future_block_retries += 1;
                actions.push(Action::SetTimer {
                    id: TimerId::FuturePreprepare,
                    duration: retry_after,
                });
                return Err(ConsensusError::FutureBlock { retry_after });
            }
            Err(VerifyError::Invalid(reason)) => {
                return Err(ConsensusError::ProposalInvalid(reason));
            }
        }

        if self.current.phase() != Phase::AcceptRequest {
            return Ok(());
        }

        let proposal_hash = preprepare.proposal.hash();
        match self.current.locked_hash() {
            None => {
                self.accept_preprepare(preprepare.clone());
                self.set_phase(Phase::Preprepared, actions);
                self.send_prepare(actions);
                Ok(())
            }
            Some(locked_hash) if locked_hash == proposal_hash => {
                // Already convinced: skip straight to COMMIT.
                self.accept_preprepare(preprepare.clone());
                self.set_phase(Phase::Prepared, actions);
                self.send_commit(actions);
                Ok(())
            }
            Some(locked_hash) => {
                let own_locked_round = self.current.lock().map_or(0, |l| l.round);
                let carries_pol = preprepare.locked_round >= own_locked_round
                    && !preprepare.locked_hash.is_zero()
                    && preprepare.locked_hash == proposal_hash;
                if !carries_pol {
                    return Err(ConsensusError::LockConflict {
                        locked_hash,
                        proposal_hash,
                    });
                }
                self.handle_pol_preprepare(preprepare, actions)
            }
        }
    }

    /// Accept a PRE-PREPARE that proves a quorum prepared its proposal.
    fn handle_pol_preprepare(
        &mut self,
        preprepare: &Preprepare,
        actions: &mut Vec<Action>,
    ) -> Result<(), ConsensusError> {
        let certificate = PreparedCertificate::decode(&preprepare.locked_prepares)
            .map_err(|e| ConsensusError::PolDecode(e.to_string()))?;

        let expected = Subject::new(
            View::new(preprepare.view.sequence, preprepare.locked_round),
            preprepare.locked_hash,
        );
        let prepares = MessageSet::from_certificate(
            certificate,
            self.validators.clone(),
            self.backend.validator.as_ref(),
            |vote| match &vote.message {
                ConsensusMessage::Prepare(subject) if *subject == expected => Ok(()),
                _ => Err(ConsensusError::PolInvalidVote(format!(
                    "{} vote from {} is not a PREPARE for {}",
                    vote.code(),
                    vote.sender,
                    expected.view
                ))),
            },
        )
        .map_err(|e| match e {
            ConsensusError::PolInvalidVote(_) => e,
            other => ConsensusError::PolInvalidVote(other.to_string()),
        })?;

        let need = self.validators.quorum_size();
        if prepares.size() < need {
            return Err(ConsensusError::PolInsufficientQuorum {
                have: prepares.size(),
                need,
            });
        }

        info!(
            locked_round = preprepare.locked_round,
            proposal = %preprepare.locked_hash,
            "Valid proof of lock, releasing own lock"
        );
        self.current.unlock();
        self.accept_preprepare(preprepare.clone());
        self.set_phase(Phase::Preprepared, actions);
        self.send_prepare(actions);
        Ok(())
    }

    fn accept_preprepare(&mut self, preprepare: Preprepare) {
        self.consensus_timestamp = Some(self.now);
        self.current.set_preprepare(preprepare);
    }

    /// Whether an old PRE-PREPARE came from that view's proposer and carries
    /// a proposal the chain already finalized.
    fn is_decided_preprepare(&self, message: &SignedMessage, preprepare: &Preprepare) -> bool {
        let proposal = &preprepare.proposal;
        let validators = self.backend.chain.parent_validators(proposal);
        let previous_proposer = proposal
            .number
            .checked_sub(1)
            .and_then(|n| self.backend.chain.proposer_at(n));
        let proposer = validators.calc_proposer(previous_proposer, preprepare.view.round);
        proposer == Some(message.sender)
            && self
                .backend
                .chain
                .has_proposal(&proposal.hash(), proposal.number)
    }
}

#[cfg(test)]
mod tests {
    use crate::{BftBackend, BftConfig, BftState, ConsensusError, Phase};
    use ibft_core::{Action, Event, OutboundMessage, StateMachine, TimerId, VerifyError};
    use ibft_messages::{ConsensusMessage, Preprepare, SignedMessage};
    use ibft_test_helpers::{run_until_idle, ScriptedVerifier, StaticChain, TestCommittee};
    use ibft_types::{Hash, Proposal, ValidatorId, View};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    const LOCAL: ValidatorId = ValidatorId(1);
    const PROPOSER: ValidatorId = ValidatorId(0);

    struct Fixture {
        state: BftState,
        committee: TestCommittee,
        chain: Arc<StaticChain>,
        verifier: Arc<ScriptedVerifier>,
        parent: Proposal,
    }

    /// Node V1 in a committee of four; the chain head is sequence 9 proposed
    /// by V3, so V0 proposes round 0 of sequence 10.
    fn make_fixture() -> Fixture {
        let committee = TestCommittee::new(4);
        let parent = Proposal::new(9, Hash::from_bytes(b"block-8"), 9_000, vec![9]);
        let chain = Arc::new(StaticChain::with_history(
            committee.validators().clone(),
            parent.clone(),
            Some(ValidatorId(3)),
        ));
        let verifier = Arc::new(ScriptedVerifier::new());
        let backend = BftBackend::new(verifier.clone(), chain.clone());
        let mut state = BftState::new(
            LOCAL,
            committee.key(LOCAL).clone(),
            backend,
            BftConfig::default(),
        );
        state.start();
        Fixture {
            state,
            committee,
            chain,
            verifier,
            parent,
        }
    }

    fn received(message: SignedMessage) -> Event {
        Event::MessageReceived { message }
    }

    fn broadcasts(actions: &[Action]) -> Vec<&SignedMessage> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Broadcast { message } => Some(message.signed()),
                _ => None,
            })
            .collect()
    }

    fn count_prepares(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::Broadcast { message: OutboundMessage::Prepare(_) }))
            .count()
    }

    fn has_round_change(actions: &[Action]) -> bool {
        actions
            .iter()
            .any(|a| matches!(a, Action::Broadcast { message: OutboundMessage::RoundChange(_) }))
    }

    /// Lock V1 on `locked` at round 0, then move everyone to round 1.
    fn lock_and_advance(f: &mut Fixture, locked: &Proposal) {
        let view = View::new(10, 0);
        run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(PROPOSER, view, locked)),
        );
        for i in [0, 2] {
            run_until_idle(
                &mut f.state,
                received(f.committee.prepare(ValidatorId(i), view, locked.hash())),
            );
        }
        assert!(f.state.round_state().is_locked());

        for i in [0, 2, 3] {
            run_until_idle(
                &mut f.state,
                received(f.committee.round_change(ValidatorId(i), View::new(10, 1))),
            );
        }
        assert_eq!(f.state.view(), View::new(10, 1));
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));
    }

    /// Round changes from everyone but V1 move the node to `round`.
    fn move_to_round(f: &mut Fixture, round: u64) {
        for i in [0, 2, 3] {
            run_until_idle(
                &mut f.state,
                received(f.committee.round_change(ValidatorId(i), View::new(10, round))),
            );
        }
        assert_eq!(f.state.view(), View::new(10, round));
    }

    fn handle_directly(f: &mut Fixture, message: &SignedMessage) -> Result<(), ConsensusError> {
        let ConsensusMessage::Preprepare(preprepare) = &message.message else {
            unreachable!()
        };
        let mut actions = Vec::new();
        f.state.handle_preprepare(message, preprepare, &mut actions)
    }

    #[traced_test]
    #[test]
    fn test_accepts_valid_preprepare_and_prepares() {
        let mut f = make_fixture();
        let proposal = f.parent.child(10_000, b"X".to_vec());

        let actions = run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(PROPOSER, View::new(10, 0), &proposal)),
        );

        assert_eq!(f.state.phase(), Phase::Preprepared);
        assert_eq!(count_prepares(&actions), 1);
        assert_eq!(f.state.round_state().proposal(), Some(&proposal));
        assert_eq!(f.state.consensus_timestamp(), Some(Duration::ZERO));
    }

    #[traced_test]
    #[test]
    fn test_non_proposer_is_dropped_without_round_change() {
        let mut f = make_fixture();
        let proposal = f.parent.child(10_000, b"X".to_vec());

        let actions = run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(ValidatorId(2), View::new(10, 0), &proposal)),
        );

        assert!(actions.is_empty());
        assert_eq!(f.state.phase(), Phase::AcceptRequest);
        assert_eq!(f.verifier.calls(), 0);
    }

    #[traced_test]
    #[test]
    fn test_invalid_proposal_triggers_round_change() {
        let mut f = make_fixture();
        f.verifier.push(Err(VerifyError::Invalid("bad state root".into())));
        let proposal = f.parent.child(10_000, b"X".to_vec());

        let actions = run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(PROPOSER, View::new(10, 0), &proposal)),
        );

        assert!(has_round_change(&actions));
        assert!(f.state.is_waiting_for_round_change());
        assert_eq!(count_prepares(&actions), 0);
    }

    #[traced_test]
    #[test]
    fn test_mismatched_number_is_rejected() {
        let mut f = make_fixture();
        let wrong = Proposal::new(11, f.parent.hash(), 0, vec![]);
        let message = f.committee.preprepare(PROPOSER, View::new(10, 0), &wrong);
        let ConsensusMessage::Preprepare(preprepare) = &message.message else {
            unreachable!()
        };

        let mut actions = Vec::new();
        let result = f.state.handle_preprepare(&message, preprepare, &mut actions);
        assert!(matches!(result, Err(ConsensusError::InvalidMessage(_))));
        assert!(actions.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_future_block_is_retried_once_after_delay() {
        let mut f = make_fixture();
        let delay = Duration::from_millis(200);
        f.verifier.push(Err(VerifyError::FutureBlock { retry_after: delay }));
        let proposal = f.parent.child(10_000, b"X".to_vec());

        let actions = run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(PROPOSER, View::new(10, 0), &proposal)),
        );
        assert_eq!(count_prepares(&actions), 0);
        assert!(!has_round_change(&actions));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SetTimer { id: TimerId::FuturePreprepare, duration } if *duration == delay
        )));
        assert_eq!(f.state.phase(), Phase::AcceptRequest);

        f.state.set_time(delay);
        let actions = run_until_idle(&mut f.state, Event::FuturePreprepareTimer);
        assert_eq!(count_prepares(&actions), 1);
        assert_eq!(f.state.phase(), Phase::Preprepared);
        assert_eq!(f.state.consensus_timestamp(), Some(delay));

        // The stored message was consumed.
        let actions = run_until_idle(&mut f.state, Event::FuturePreprepareTimer);
        assert!(actions.is_empty());
        assert_eq!(f.verifier.calls(), 2);
    }

    #[traced_test]
    #[test]
    fn test_locked_replica_commits_matching_reproposal() {
        let mut f = make_fixture();
        let locked = f.parent.child(10_000, b"X".to_vec());
        lock_and_advance(&mut f, &locked);

        // V1 itself proposes round 1 and re-proposed X when the round began;
        // a matching PRE-PREPARE from the proposer goes straight to COMMIT.
        assert_eq!(f.state.proposer(), Some(ValidatorId(1)));
        assert_eq!(f.state.phase(), Phase::Prepared);
        assert_eq!(f.state.round_state().proposal(), Some(&locked));
    }

    #[traced_test]
    #[test]
    fn test_pol_transfers_lock_to_quorum_prepared_value() {
        let mut f = make_fixture();
        let locked = f.parent.child(10_000, b"X".to_vec());
        lock_and_advance(&mut f, &locked);

        // Round 2 is proposed by V2 with Y, prepared by a quorum in round 1.
        for i in [0, 2, 3] {
            run_until_idle(
                &mut f.state,
                received(f.committee.round_change(ValidatorId(i), View::new(10, 2))),
            );
        }
        assert_eq!(f.state.view(), View::new(10, 2));
        assert_eq!(f.state.proposer(), Some(ValidatorId(2)));

        let other = f.parent.child(10_001, b"Y".to_vec());
        let cert = f.committee.prepared_certificate(
            &[ValidatorId(0), ValidatorId(2), ValidatorId(3)],
            View::new(10, 1),
            other.hash(),
        );
        let actions = run_until_idle(
            &mut f.state,
            received(f.committee.preprepare_with_lock(
                ValidatorId(2),
                View::new(10, 2),
                &other,
                1,
                &cert,
            )),
        );

        assert!(!f.state.round_state().is_locked());
        assert_eq!(f.state.phase(), Phase::Preprepared);
        assert_eq!(f.state.round_state().proposal(), Some(&other));
        assert_eq!(count_prepares(&actions), 1);
    }

    #[traced_test]
    #[test]
    fn test_pol_with_too_few_votes_is_rejected() {
        let mut f = make_fixture();
        let locked = f.parent.child(10_000, b"X".to_vec());
        lock_and_advance(&mut f, &locked);
        for i in [0, 2, 3] {
            run_until_idle(
                &mut f.state,
                received(f.committee.round_change(ValidatorId(i), View::new(10, 2))),
            );
        }

        let other = f.parent.child(10_001, b"Y".to_vec());
        let cert = f.committee.prepared_certificate(
            &[ValidatorId(0), ValidatorId(2)],
            View::new(10, 1),
            other.hash(),
        );
        let message = f.committee.preprepare_with_lock(
            ValidatorId(2),
            View::new(10, 2),
            &other,
            1,
            &cert,
        );
        let ConsensusMessage::Preprepare(preprepare) = &message.message else {
            unreachable!()
        };
        let mut actions = Vec::new();
        let result = f.state.handle_preprepare(&message, preprepare, &mut actions);

        assert_eq!(
            result,
            Err(ConsensusError::PolInsufficientQuorum { have: 2, need: 3 })
        );
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));

        // Through the event path the failure becomes a ROUND-CHANGE vote.
        let actions = run_until_idle(&mut f.state, received(message));
        assert!(has_round_change(&actions));
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));
    }

    #[traced_test]
    #[test]
    fn test_conflicting_proposal_without_pol_is_lock_conflict() {
        let mut f = make_fixture();
        let locked = f.parent.child(10_000, b"X".to_vec());
        lock_and_advance(&mut f, &locked);
        for i in [0, 2, 3] {
            run_until_idle(
                &mut f.state,
                received(f.committee.round_change(ValidatorId(i), View::new(10, 2))),
            );
        }

        let other = f.parent.child(10_001, b"Y".to_vec());
        let message = f.committee.preprepare(ValidatorId(2), View::new(10, 2), &other);
        let ConsensusMessage::Preprepare(preprepare) = &message.message else {
            unreachable!()
        };
        let mut actions = Vec::new();
        let result = f.state.handle_preprepare(&message, preprepare, &mut actions);
        assert!(matches!(result, Err(ConsensusError::LockConflict { .. })));
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));
    }

    #[traced_test]
    #[test]
    fn test_old_preprepare_for_decided_proposal_replays_commit() {
        let mut f = make_fixture();
        // Sequence 9 was decided in round 0; V3 proposed it after V2
        // proposed sequence 8.
        f.chain.insert(
            Proposal::new(8, Hash::from_bytes(b"block-7"), 8_000, vec![8]),
            Some(ValidatorId(2)),
        );
        let old_view = View::new(9, 0);

        let actions = run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(ValidatorId(3), old_view, &f.parent)),
        );
        let sent = broadcasts(&actions);
        assert_eq!(sent.len(), 1);
        match &sent[0].message {
            ConsensusMessage::Commit(vote) => {
                assert_eq!(vote.subject.view, old_view);
                assert_eq!(vote.subject.digest, f.parent.hash());
            }
            other => panic!("expected COMMIT, got {other:?}"),
        }
        assert_eq!(f.state.view(), View::new(10, 0));

        // Same proposal from someone who was not its proposer: ignored.
        let actions = run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(ValidatorId(0), old_view, &f.parent)),
        );
        assert!(actions.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_pol_with_forged_vote_is_rejected() {
        let mut f = make_fixture();
        let locked = f.parent.child(10_000, b"X".to_vec());
        lock_and_advance(&mut f, &locked);
        move_to_round(&mut f, 2);

        let other = f.parent.child(10_001, b"Y".to_vec());
        let mut cert = f.committee.prepared_certificate(
            &[ValidatorId(0), ValidatorId(2), ValidatorId(3)],
            View::new(10, 1),
            other.hash(),
        );
        // V3's vote carries V0's signature.
        cert.votes[2].signature = cert.votes[0].signature.clone();
        let message =
            f.committee
                .preprepare_with_lock(ValidatorId(2), View::new(10, 2), &other, 1, &cert);

        assert!(matches!(
            handle_directly(&mut f, &message),
            Err(ConsensusError::PolInvalidVote(_))
        ));
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));

        let actions = run_until_idle(&mut f.state, received(message));
        assert!(has_round_change(&actions));
        assert_eq!(count_prepares(&actions), 0);
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));
    }

    #[traced_test]
    #[test]
    fn test_pol_votes_must_match_locked_round_and_hash() {
        let mut f = make_fixture();
        let locked = f.parent.child(10_000, b"X".to_vec());
        lock_and_advance(&mut f, &locked);
        move_to_round(&mut f, 2);
        let other = f.parent.child(10_001, b"Y".to_vec());
        let quorum = [ValidatorId(0), ValidatorId(2), ValidatorId(3)];

        // Prepared at round 0, but claimed as round 1.
        let wrong_round = f
            .committee
            .prepared_certificate(&quorum, View::new(10, 0), other.hash());
        let message = f.committee.preprepare_with_lock(
            ValidatorId(2),
            View::new(10, 2),
            &other,
            1,
            &wrong_round,
        );
        assert!(matches!(
            handle_directly(&mut f, &message),
            Err(ConsensusError::PolInvalidVote(_))
        ));

        // Votes for the old lock do not prove the new proposal.
        let wrong_hash = f
            .committee
            .prepared_certificate(&quorum, View::new(10, 1), locked.hash());
        let message = f.committee.preprepare_with_lock(
            ValidatorId(2),
            View::new(10, 2),
            &other,
            1,
            &wrong_hash,
        );
        assert!(matches!(
            handle_directly(&mut f, &message),
            Err(ConsensusError::PolInvalidVote(_))
        ));
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));
        assert_eq!(f.state.phase(), Phase::AcceptRequest);
    }

    #[traced_test]
    #[test]
    fn test_pol_older_than_own_lock_is_lock_conflict() {
        let mut f = make_fixture();
        move_to_round(&mut f, 2);
        assert_eq!(f.state.proposer(), Some(ValidatorId(2)));

        // V1 locks on X in round 2.
        let locked = f.parent.child(10_000, b"X".to_vec());
        run_until_idle(
            &mut f.state,
            received(f.committee.preprepare(ValidatorId(2), View::new(10, 2), &locked)),
        );
        for i in [0, 2] {
            run_until_idle(
                &mut f.state,
                received(f.committee.prepare(ValidatorId(i), View::new(10, 2), locked.hash())),
            );
        }
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));

        move_to_round(&mut f, 3);
        assert_eq!(f.state.proposer(), Some(ValidatorId(3)));

        // A genuine quorum certificate, but from round 1.
        let other = f.parent.child(10_001, b"Y".to_vec());
        let cert = f.committee.prepared_certificate(
            &[ValidatorId(0), ValidatorId(2), ValidatorId(3)],
            View::new(10, 1),
            other.hash(),
        );
        let message =
            f.committee
                .preprepare_with_lock(ValidatorId(3), View::new(10, 3), &other, 1, &cert);

        assert_eq!(
            handle_directly(&mut f, &message),
            Err(ConsensusError::LockConflict {
                locked_hash: locked.hash(),
                proposal_hash: other.hash(),
            })
        );
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));
    }

    #[traced_test]
    #[test]
    fn test_undecodable_pol_is_rejected() {
        let mut f = make_fixture();
        let locked = f.parent.child(10_000, b"X".to_vec());
        lock_and_advance(&mut f, &locked);
        move_to_round(&mut f, 2);

        let other = f.parent.child(10_001, b"Y".to_vec());
        let message = f.committee.sign(
            ValidatorId(2),
            ConsensusMessage::Preprepare(Preprepare {
                view: View::new(10, 2),
                proposal: other.clone(),
                locked_round: 1,
                locked_hash: other.hash(),
                locked_prepares: vec![0xde, 0xad, 0xbe, 0xef],
            }),
        );

        assert!(matches!(
            handle_directly(&mut f, &message),
            Err(ConsensusError::PolDecode(_))
        ));
        assert_eq!(f.state.round_state().locked_hash(), Some(locked.hash()));
    }
}
