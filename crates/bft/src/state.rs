//! BFT consensus state machine.
//!
//! This module implements the Istanbul BFT core as a synchronous,
//! event-driven model. Phase handlers live in sibling modules
//! (`preprepare`, `prepare`, `commit`, `round_change`); this module owns the
//! state, message dispatch and the round lifecycle.

use ibft_core::{
    Action, ChainReader, Event, MessageValidator, OutboundMessage, ProposalVerifier,
    SignatureValidator, StateMachine, TimerId,
};
use ibft_messages::{ConsensusMessage, MessageCode, SignedMessage};
use ibft_types::{KeyPair, Proposal, ValidatorId, ValidatorSet, View};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

use crate::backlog::Backlog;
use crate::config::BftConfig;
use crate::error::ConsensusError;
use crate::round_change_set::RoundChangeSet;
use crate::round_state::{Phase, RoundState};

/// BFT statistics for monitoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BftStats {
    /// Rounds started through a ROUND-CHANGE quorum.
    pub round_changes: u64,
    /// Proposals this node saw reach a COMMIT quorum.
    pub committed_sequences: u64,
    /// Current sequence.
    pub current_sequence: u64,
    /// Current round within the current sequence.
    pub current_round: u64,
    /// PRE-PREPAREs deferred because their proposal was a future block.
    pub future_block_retries: u64,
    /// Messages stored in the backlog.
    pub messages_backlogged: u64,
}

/// The host capabilities the state machine consumes.
#[derive(Clone)]
pub struct BftBackend {
    pub verifier: Arc<dyn ProposalVerifier>,
    pub chain: Arc<dyn ChainReader>,
    pub validator: Arc<dyn MessageValidator>,
}

impl BftBackend {
    /// Backend with the default signature-based message validator.
    pub fn new(verifier: Arc<dyn ProposalVerifier>, chain: Arc<dyn ChainReader>) -> Self {
        Self {
            verifier,
            chain,
            validator: Arc::new(SignatureValidator),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn MessageValidator>) -> Self {
        self.validator = validator;
        self
    }
}

/// Classify a message's view against the current one.
///
/// ROUND-CHANGE votes for any later round of the current sequence are
/// current. Everything else must match the current view exactly, and is
/// deferred while a round change is pending or, except for PRE-PREPARE,
/// until a PRE-PREPARE has been accepted.
pub(crate) fn check_view(
    code: MessageCode,
    view: View,
    current: View,
    phase: Phase,
    waiting_for_round_change: bool,
) -> Result<(), ConsensusError> {
    if code == MessageCode::RoundChange {
        if view.sequence > current.sequence {
            return Err(ConsensusError::FutureMessage { view });
        }
        if view < current {
            return Err(ConsensusError::OldMessage { view });
        }
        return Ok(());
    }

    if view > current {
        return Err(ConsensusError::FutureMessage { view });
    }
    if view < current {
        return Err(ConsensusError::OldMessage { view });
    }
    if waiting_for_round_change {
        return Err(ConsensusError::FutureMessage { view });
    }
    if phase == Phase::AcceptRequest && code != MessageCode::Preprepare {
        return Err(ConsensusError::FutureMessage { view });
    }
    Ok(())
}

/// Istanbul BFT consensus state machine.
///
/// # State Machine Flow
///
/// 1. **Proposal Requested** → If proposer, broadcast PRE-PREPARE
/// 2. **PRE-PREPARE** → Verify proposal, check lock, broadcast PREPARE
/// 3. **PREPARE quorum** → Lock, broadcast COMMIT
/// 4. **COMMIT quorum** → Emit `CommitProposal`, start next sequence
/// 5. **Round Change Timer** → Vote ROUND-CHANGE if no progress
pub struct BftState {
    // ═══════════════════════════════════════════════════════════════════════════
    // Identity
    // ═══════════════════════════════════════════════════════════════════════════
    pub(crate) validator_id: ValidatorId,

    /// Signs this node's messages and commit seals.
    pub(crate) signing_key: KeyPair,

    // ═══════════════════════════════════════════════════════════════════════════
    // Host
    // ═══════════════════════════════════════════════════════════════════════════
    pub(crate) backend: BftBackend,

    pub(crate) config: BftConfig,

    // ═══════════════════════════════════════════════════════════════════════════
    // Committee
    // ═══════════════════════════════════════════════════════════════════════════
    /// Validator set of the current sequence.
    pub(crate) validators: Arc<ValidatorSet>,

    /// Proposer of the current view.
    pub(crate) proposer: Option<ValidatorId>,

    // ═══════════════════════════════════════════════════════════════════════════
    // Round State
    // ═══════════════════════════════════════════════════════════════════════════
    pub(crate) current: RoundState,

    pub(crate) round_change_set: RoundChangeSet,

    /// Set once we voted ROUND-CHANGE and until the next round starts.
    pub(crate) waiting_for_round_change: bool,

    // ═══════════════════════════════════════════════════════════════════════════
    // Deferred Work
    // ═══════════════════════════════════════════════════════════════════════════
    pub(crate) backlog: Backlog,

    /// PRE-PREPARE waiting for the future-preprepare timer.
    pub(crate) future_preprepare: Option<SignedMessage>,

    /// Proposal requests for sequences we have not reached yet.
    pub(crate) pending_requests: BTreeMap<u64, Proposal>,

    // ═══════════════════════════════════════════════════════════════════════════
    // Chain State
    // ═══════════════════════════════════════════════════════════════════════════
    pub(crate) last_proposal: Proposal,

    pub(crate) last_proposer: Option<ValidatorId>,

    /// When the current PRE-PREPARE was accepted.
    pub(crate) consensus_timestamp: Option<Duration>,

    pub(crate) started: bool,

    // ═══════════════════════════════════════════════════════════════════════════
    // Time & Statistics
    // ═══════════════════════════════════════════════════════════════════════════
    /// Current time (set by runner before each handle call).
    pub(crate) now: Duration,

    pub(crate) stats: BftStats,
}

impl std::fmt::Debug for BftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BftState")
            .field("validator_id", &self.validator_id)
            .field("view", &self.current.view())
            .field("phase", &self.current.phase())
            .field("proposer", &self.proposer)
            .field("locked", &self.current.locked_hash())
            .field("waiting_for_round_change", &self.waiting_for_round_change)
            .field("backlog", &self.backlog.len())
            .finish()
    }
}

impl BftState {
    /// Create a new BFT state machine positioned after the chain head.
    ///
    /// Nothing happens until [`BftState::start`] is called.
    pub fn new(
        validator_id: ValidatorId,
        signing_key: KeyPair,
        backend: BftBackend,
        config: BftConfig,
    ) -> Self {
        let (last_proposal, last_proposer) = backend.chain.last_proposal();
        let validators = Arc::new(backend.chain.validators(&last_proposal));
        let view = View::new(last_proposal.number + 1, 0);
        let backlog = Backlog::new(validator_id, config.max_backlog_per_sender);

        Self {
            validator_id,
            signing_key,
            proposer: validators.calc_proposer(last_proposer, 0),
            current: RoundState::new(view, validators.clone()),
            round_change_set: RoundChangeSet::new(validators.clone()),
            validators,
            waiting_for_round_change: false,
            backlog,
            future_preprepare: None,
            pending_requests: BTreeMap::new(),
            last_proposal,
            last_proposer,
            consensus_timestamp: None,
            started: false,
            now: Duration::ZERO,
            stats: BftStats::default(),
            backend,
            config,
        }
    }

    /// Enter the first round and arm the round-change timer.
    pub fn start(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.start_new_round(0, &mut actions);
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn validator_id(&self) -> ValidatorId {
        self.validator_id
    }

    pub fn view(&self) -> View {
        self.current.view()
    }

    pub fn phase(&self) -> Phase {
        self.current.phase()
    }

    pub fn round_state(&self) -> &RoundState {
        &self.current
    }

    pub fn proposer(&self) -> Option<ValidatorId> {
        self.proposer
    }

    pub fn is_proposer(&self) -> bool {
        self.proposer == Some(self.validator_id)
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn is_waiting_for_round_change(&self) -> bool {
        self.waiting_for_round_change
    }

    pub fn last_proposal(&self) -> &Proposal {
        &self.last_proposal
    }

    pub fn consensus_timestamp(&self) -> Option<Duration> {
        self.consensus_timestamp
    }

    pub fn backlog(&self) -> &Backlog {
        &self.backlog
    }

    pub fn config(&self) -> &BftConfig {
        &self.config
    }

    pub fn stats(&self) -> BftStats {
        BftStats {
            current_sequence: self.current.sequence(),
            current_round: self.current.round(),
            ..self.stats
        }
    }

    pub(crate) fn check_message(&self, code: MessageCode, view: View) -> Result<(), ConsensusError> {
        check_view(
            code,
            view,
            self.current.view(),
            self.current.phase(),
            self.waiting_for_round_change,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Message Dispatch
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle a consensus message.
    ///
    /// With `validate` set the sender's membership and signature are checked
    /// first; our own loopback messages skip the check.
    #[instrument(skip(self, message, actions), fields(
        sender = %message.sender,
        code = %message.code(),
        view = %message.view()
    ))]
    pub(crate) fn on_message(
        &mut self,
        message: SignedMessage,
        validate: bool,
        actions: &mut Vec<Action>,
    ) {
        if validate {
            if let Err(e) = self.backend.validator.validate(&message, &self.validators) {
                warn!(error = %e, "Dropping message that failed validation");
                return;
            }
        }
        self.handle_checked(message, actions);
    }

    /// Dispatch an authenticated message to its phase handler.
    pub(crate) fn handle_checked(&mut self, message: SignedMessage, actions: &mut Vec<Action>) {
        let result = match &message.message {
            ConsensusMessage::Preprepare(preprepare) => {
                self.handle_preprepare(&message, preprepare, actions)
            }
            ConsensusMessage::Prepare(subject) => self.handle_prepare(&message, subject, actions),
            ConsensusMessage::Commit(vote) => self.handle_commit(&message, vote, actions),
            ConsensusMessage::RoundChange(subject) => {
                self.handle_round_change(&message, subject, actions)
            }
        };

        if let Err(err) = result {
            self.on_handle_error(message, err, actions);
        }
    }

    fn on_handle_error(
        &mut self,
        message: SignedMessage,
        err: ConsensusError,
        actions: &mut Vec<Action>,
    ) {
        match err {
            ConsensusError::FutureMessage { view } => {
                trace!(view = %view, current = %self.current.view(), "Storing future message");
                if self.backlog.push(message) {
                    self.stats.messages_backlogged += 1;
                }
            }
            ConsensusError::OldMessage { view } => {
                trace!(view = %view, current = %self.current.view(), "Dropping old message");
            }
            ConsensusError::FutureBlock { retry_after } => {
                debug!(retry_after = ?retry_after, "Proposal is a future block, retry scheduled");
            }
            err if err.triggers_round_change() => {
                warn!(error = %err, view = %self.current.view(), "Rejected proposal, voting ROUND-CHANGE");
                self.send_next_round_change(actions);
            }
            err => {
                debug!(error = %err, "Message not accepted");
            }
        }
    }

    /// Sign `message`, broadcast it, and loop it back to ourselves.
    pub(crate) fn broadcast(&mut self, message: ConsensusMessage, actions: &mut Vec<Action>) {
        let signed = match SignedMessage::sign(message, self.validator_id, &self.signing_key) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(error = %e, "Failed to sign consensus message");
                return;
            }
        };
        actions.push(Action::Broadcast {
            message: OutboundMessage::from(signed.clone()),
        });
        actions.push(Action::EnqueueInternal {
            event: Event::LocalMessage { message: signed },
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Round Lifecycle
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start `round` of the current sequence, or the next sequence if the
    /// chain has moved past the current one.
    pub(crate) fn start_new_round(&mut self, round: u64, actions: &mut Vec<Action>) {
        let (chain_last, chain_proposer) = self.backend.chain.last_proposal();
        if chain_last.number > self.last_proposal.number {
            self.last_proposal = chain_last;
            self.last_proposer = chain_proposer;
        }

        let round_change;
        if !self.started {
            trace!("Starting initial round");
            self.started = true;
            round_change = false;
        } else if self.last_proposal.number >= self.current.sequence() {
            trace!(
                number = self.last_proposal.number,
                sequence = self.current.sequence(),
                "Catching up to latest proposal"
            );
            round_change = false;
        } else if self.last_proposal.number + 1 == self.current.sequence() {
            if round == 0 {
                return;
            }
            if round < self.current.round() {
                warn!(
                    round,
                    current_round = self.current.round(),
                    "New round should not be smaller than current round"
                );
                return;
            }
            round_change = true;
        } else {
            warn!(
                number = self.last_proposal.number,
                sequence = self.current.sequence(),
                "New sequence should be larger than current sequence"
            );
            return;
        }

        let view = if round_change {
            self.current.view().with_round(round)
        } else {
            self.validators = Arc::new(self.backend.chain.validators(&self.last_proposal));
            View::new(self.last_proposal.number + 1, 0)
        };

        self.round_change_set = RoundChangeSet::new(self.validators.clone());
        self.update_round_state(view, round_change);
        self.proposer = self.validators.calc_proposer(self.last_proposer, view.round);
        self.waiting_for_round_change = false;
        if round_change {
            self.stats.round_changes += 1;
        }

        info!(
            sequence = view.sequence,
            round = view.round,
            proposer = ?self.proposer,
            is_proposer = self.is_proposer(),
            locked = ?self.current.locked_hash(),
            "Starting new round"
        );

        self.set_phase(Phase::AcceptRequest, actions);

        if self.is_proposer() {
            // A locked proposer must re-propose its locked value.
            let proposal = self
                .current
                .lock()
                .map(|lock| lock.proposal.clone())
                .or_else(|| self.current.pending_request().cloned());
            if let Some(proposal) = proposal {
                self.send_preprepare(proposal, actions);
            }
        }

        self.new_round_change_timer(actions);
    }

    /// Replace the round state. Round changes keep the lock and pending
    /// request; a new sequence starts clean.
    pub(crate) fn update_round_state(&mut self, view: View, round_change: bool) {
        self.current = if round_change {
            self.current.next_round(view, self.validators.clone())
        } else {
            RoundState::new(view, self.validators.clone())
        };
        self.consensus_timestamp = None;
    }

    /// Move to `phase`, then replay whatever that unblocked.
    pub(crate) fn set_phase(&mut self, phase: Phase, actions: &mut Vec<Action>) {
        if self.current.phase() != phase {
            trace!(from = %self.current.phase(), to = %phase, "Phase transition");
            self.current.set_phase(phase);
        }
        if phase == Phase::AcceptRequest {
            self.process_pending_requests();
        }
        self.process_backlog(actions);
    }

    /// Pull the queued request for the current sequence, dropping stale ones.
    fn process_pending_requests(&mut self) {
        let sequence = self.current.sequence();
        self.pending_requests = self.pending_requests.split_off(&sequence);
        if let Some(proposal) = self.pending_requests.remove(&sequence) {
            self.current.set_pending_request(proposal);
        }
    }

    fn process_backlog(&mut self, actions: &mut Vec<Action>) {
        let current = self.current.view();
        let phase = self.current.phase();
        let waiting = self.waiting_for_round_change;
        let ready = self
            .backlog
            .drain(|m| check_view(m.code(), m.view(), current, phase, waiting));
        for message in ready {
            trace!(sender = %message.sender, code = %message.code(), "Replaying backlog message");
            actions.push(Action::EnqueueInternal {
                event: Event::BacklogMessage { message },
            });
        }
    }

    /// Re-arm the round-change timer for the current round.
    ///
    /// Also drops any pending future-block PRE-PREPARE, which belongs to a
    /// round we are leaving.
    pub(crate) fn new_round_change_timer(&mut self, actions: &mut Vec<Action>) {
        if self.future_preprepare.take().is_some() {
            actions.push(Action::CancelTimer {
                id: TimerId::FuturePreprepare,
            });
        }
        actions.push(Action::SetTimer {
            id: TimerId::RoundChange,
            duration: self.config.round_change_timeout(self.current.round()),
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle round-change timer expiry.
    pub fn on_round_change_timer(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        // Not yet voting: follow F+1 validators to a higher round if they
        // are ahead of us.
        if !self.waiting_for_round_change {
            let max_round = self
                .round_change_set
                .max_round(self.validators.weak_quorum_size());
            if let Some(max_round) = max_round.filter(|&r| r > self.current.round()) {
                info!(max_round, "Round change timeout, catching up to weak certificate");
                self.send_round_change(max_round, &mut actions);
                return actions;
            }
        }

        let (chain_last, _) = self.backend.chain.last_proposal();
        if chain_last.number >= self.current.sequence() {
            debug!(
                number = chain_last.number,
                "Round change timeout, catching up to latest sequence"
            );
            self.start_new_round(0, &mut actions);
        } else {
            info!(
                sequence = self.current.sequence(),
                round = self.current.round(),
                phase = %self.current.phase(),
                "Round change timeout"
            );
            self.send_next_round_change(&mut actions);
        }
        actions
    }

    /// Replay the PRE-PREPARE deferred by a future-block verdict.
    pub fn on_future_preprepare_timer(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(message) = self.future_preprepare.take() {
            debug!(view = %message.view(), "Retrying future-block PRE-PREPARE");
            self.handle_checked(message, &mut actions);
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Requests & Chain
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle a proposal from the block producer.
    pub fn on_proposal_request(&mut self, proposal: Proposal) -> Vec<Action> {
        let mut actions = Vec::new();
        let sequence = self.current.sequence();

        if proposal.number < sequence {
            trace!(number = proposal.number, sequence, "Dropping old proposal request");
            return actions;
        }
        if proposal.number > sequence {
            trace!(number = proposal.number, sequence, "Queueing future proposal request");
            self.pending_requests.insert(proposal.number, proposal);
            return actions;
        }

        self.current.set_pending_request(proposal.clone());
        if self.current.phase() == Phase::AcceptRequest && !self.waiting_for_round_change {
            self.send_preprepare(proposal, &mut actions);
        }
        actions
    }

    /// Handle a proposal the chain imported outside consensus.
    pub fn on_chain_advanced(
        &mut self,
        proposal: Proposal,
        proposer: Option<ValidatorId>,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        if proposal.number < self.current.sequence() {
            return actions;
        }
        if proposal.number > self.last_proposal.number {
            self.last_proposal = proposal;
            self.last_proposer = proposer;
        }
        self.start_new_round(0, &mut actions);
        actions
    }
}

impl StateMachine for BftState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::RoundChangeTimer => self.on_round_change_timer(),
            Event::FuturePreprepareTimer => self.on_future_preprepare_timer(),
            Event::MessageReceived { message } | Event::BacklogMessage { message } => {
                let mut actions = Vec::new();
                self.on_message(message, true, &mut actions);
                actions
            }
            Event::LocalMessage { message } => {
                let mut actions = Vec::new();
                self.on_message(message, false, &mut actions);
                actions
            }
            Event::ChainAdvanced { proposal, proposer } => {
                self.on_chain_advanced(proposal, proposer)
            }
            Event::ProposalRequested { proposal } => self.on_proposal_request(proposal),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
