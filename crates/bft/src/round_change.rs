//! ROUND-CHANGE handling for liveness.
//!
//! A replica that gives up on its round votes ROUND-CHANGE for the next one
//! and stops processing other messages until a new round starts. F+1 votes
//! for a higher round form a weak certificate: at least one honest replica
//! is there, so we join it. N-F votes start the round.

use ibft_core::Action;
use ibft_messages::{ConsensusMessage, MessageCode, SignedMessage, Subject};
use tracing::{debug, info, warn};

use crate::error::ConsensusError;
use crate::state::BftState;

impl BftState {
    pub(crate) fn send_next_round_change(&mut self, actions: &mut Vec<Action>) {
        let next = self.current.round() + 1;
        self.send_round_change(next, actions);
    }

    /// Move to `round` while waiting for a quorum and vote for it.
    pub(crate) fn send_round_change(&mut self, round: u64, actions: &mut Vec<Action>) {
        let current = self.current.view();
        if current.round >= round {
            warn!(
                round,
                current_round = current.round,
                "Cannot send ROUND-CHANGE for a round we already reached"
            );
            return;
        }

        let view = current.with_round(round);
        self.catch_up_round(view, actions);

        debug!(view = %view, "Broadcasting ROUND-CHANGE");
        self.broadcast(
            ConsensusMessage::RoundChange(Subject::round_change(view)),
            actions,
        );
    }

    fn catch_up_round(&mut self, view: ibft_types::View, actions: &mut Vec<Action>) {
        self.waiting_for_round_change = true;
        // The lock survives catching up.
        self.update_round_state(view, true);
        self.round_change_set.clear(view.round);
        self.new_round_change_timer(actions);
    }

    pub(crate) fn handle_round_change(
        &mut self,
        message: &SignedMessage,
        subject: &Subject,
        actions: &mut Vec<Action>,
    ) -> Result<(), ConsensusError> {
        self.check_message(MessageCode::RoundChange, subject.view)?;

        let round = subject.view.round;
        let current_round = self.current.round();
        let votes =
            self.round_change_set
                .add(round, message.clone(), self.backend.validator.as_ref())?;

        if votes == self.validators.quorum_size()
            && (self.waiting_for_round_change || current_round < round)
        {
            info!(round, votes, "ROUND-CHANGE quorum, starting round");
            self.start_new_round(round, actions);
        } else if self.waiting_for_round_change
            && votes == self.validators.weak_quorum_size()
            && current_round < round
        {
            info!(round, votes, "Weak ROUND-CHANGE certificate, catching up");
            self.send_round_change(round, actions);
        }
        Ok(())
    }
}
