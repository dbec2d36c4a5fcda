//! PREPARE handling.

use ibft_core::Action;
use ibft_messages::{ConsensusMessage, MessageCode, SignedMessage, Subject};
use tracing::{debug, warn};

use crate::error::ConsensusError;
use crate::round_state::Phase;
use crate::state::BftState;

impl BftState {
    pub(crate) fn send_prepare(&mut self, actions: &mut Vec<Action>) {
        let Some(subject) = self.current.subject() else {
            warn!("No accepted PRE-PREPARE to vote PREPARE on");
            return;
        };
        self.broadcast(ConsensusMessage::Prepare(subject), actions);
    }

    pub(crate) fn handle_prepare(
        &mut self,
        message: &SignedMessage,
        subject: &Subject,
        actions: &mut Vec<Action>,
    ) -> Result<(), ConsensusError> {
        self.check_message(MessageCode::Prepare, subject.view)?;
        self.verify_subject(subject)?;

        self.current
            .prepares_mut()
            .add(message.clone(), self.backend.validator.as_ref())?;

        if self.current.prepares().has_quorum() && self.current.phase() < Phase::Prepared {
            debug!(
                view = %subject.view,
                proposal = %subject.digest,
                votes = self.current.prepares().size(),
                "PREPARE quorum reached, locking"
            );
            self.current.lock_current();
            self.set_phase(Phase::Prepared, actions);
            self.send_commit(actions);
        }
        Ok(())
    }

    /// A vote must be about exactly our view and accepted proposal.
    pub(crate) fn verify_subject(&self, subject: &Subject) -> Result<(), ConsensusError> {
        match self.current.subject() {
            Some(current) if current == *subject => Ok(()),
            _ => Err(ConsensusError::InconsistentSubject),
        }
    }
}
