//! Production runner.
//!
//! Owns one [`BftState`] and feeds it events from three sources, in priority
//! order: shutdown, timer expiry, then everything submitted through a
//! [`RunnerHandle`]. Internal events produced while handling an event are
//! drained before the next external event is taken, so the state machine
//! never observes an external input between a cause and its consequences.

use crate::codec::{decode_message, encode_message, CodecError};
use crate::timers::{TimerFired, TimerManager};
use ibft_bft::{BftBackend, BftConfig, BftState};
use ibft_core::{Action, Event, StateMachine};
use ibft_messages::{CommittedSeal, MessageCode};
use ibft_types::{KeyPair, Proposal, ValidatorId, View};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, span, trace, warn, Level};

/// Capacity of the external event channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Errors from the production runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Event channel closed")]
    ChannelClosed,

    #[error("Undecodable message: {0}")]
    Codec(#[from] CodecError),
}

/// Sends encoded consensus messages to every other validator.
///
/// Delivery is best effort. The runner never waits on the transport.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, code: MessageCode, bytes: Vec<u8>);
}

/// Receives finalized proposals.
///
/// The implementation must make the proposal visible through the
/// [`ibft_core::ChainReader`] the node was built with before the next
/// round-change timeout.
pub trait CommitHandler: Send + Sync {
    fn commit(
        &self,
        proposal: Proposal,
        view: View,
        proposer: ValidatorId,
        committed_seals: Vec<CommittedSeal>,
    );
}

/// Handle for shutting down a running [`ProductionRunner`].
///
/// When dropped, signals the runner to exit.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Cloneable input side of a [`ProductionRunner`].
#[derive(Clone)]
pub struct RunnerHandle {
    event_tx: mpsc::Sender<Event>,
}

impl RunnerHandle {
    /// Decode bytes received from a peer and queue them for consensus.
    ///
    /// Decoding happens on the caller's task so malformed input is rejected
    /// without touching the event loop.
    pub async fn submit_message(&self, bytes: &[u8]) -> Result<(), RunnerError> {
        let message = decode_message(bytes)?;
        self.send(Event::MessageReceived { message }).await
    }

    /// Offer a candidate proposal from the block producer.
    pub async fn propose(&self, proposal: Proposal) -> Result<(), RunnerError> {
        self.send(Event::ProposalRequested { proposal }).await
    }

    /// Report a proposal the chain imported outside consensus.
    pub async fn chain_advanced(
        &self,
        proposal: Proposal,
        proposer: Option<ValidatorId>,
    ) -> Result<(), RunnerError> {
        self.send(Event::ChainAdvanced { proposal, proposer }).await
    }

    async fn send(&self, event: Event) -> Result<(), RunnerError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RunnerError::ChannelClosed)
    }
}

/// Serialized event loop around one consensus node.
pub struct ProductionRunner {
    state: BftState,
    timers: TimerManager,
    /// Timer expiry gets its own channel so a message flood cannot delay it.
    timer_rx: mpsc::Receiver<TimerFired>,
    event_rx: mpsc::Receiver<Event>,
    shutdown_rx: oneshot::Receiver<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    broadcaster: Arc<dyn Broadcaster>,
    committer: Arc<dyn CommitHandler>,
    start_time: Instant,
}

impl ProductionRunner {
    /// Build a runner and the handle that feeds it.
    ///
    /// The loop ends once the runner's [`ShutdownHandle`] fires or every
    /// clone of the returned handle is dropped.
    pub fn new(
        validator_id: ValidatorId,
        signing_key: KeyPair,
        backend: BftBackend,
        config: BftConfig,
        broadcaster: Arc<dyn Broadcaster>,
        committer: Arc<dyn CommitHandler>,
    ) -> (Self, RunnerHandle) {
        Self::with_channel_capacity(
            validator_id,
            signing_key,
            backend,
            config,
            broadcaster,
            committer,
            DEFAULT_CHANNEL_CAPACITY,
        )
    }

    pub fn with_channel_capacity(
        validator_id: ValidatorId,
        signing_key: KeyPair,
        backend: BftBackend,
        config: BftConfig,
        broadcaster: Arc<dyn Broadcaster>,
        committer: Arc<dyn CommitHandler>,
        capacity: usize,
    ) -> (Self, RunnerHandle) {
        let (timer_tx, timer_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let runner = Self {
            state: BftState::new(validator_id, signing_key, backend, config),
            timers: TimerManager::new(timer_tx),
            timer_rx,
            event_rx,
            shutdown_rx,
            shutdown_tx: Some(shutdown_tx),
            broadcaster,
            committer,
            start_time: Instant::now(),
        };
        (runner, RunnerHandle { event_tx })
    }

    /// Take the shutdown handle. Returns `None` after the first call.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx
            .take()
            .map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    pub fn state(&self) -> &BftState {
        &self.state
    }

    /// Run the event loop. Spawn this as a task.
    pub async fn run(mut self) -> Result<(), RunnerError> {
        info!(
            validator = %self.state.validator_id(),
            view = %self.state.view(),
            validators = self.state.validators().len(),
            "Starting production runner"
        );
        self.state.set_time(self.start_time.elapsed());
        let actions = self.state.start();
        for event in self.execute(actions) {
            self.dispatch(event);
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                Some(fired) = self.timer_rx.recv() => {
                    if !self.timers.take_fired(fired) {
                        continue;
                    }
                    let event = fired.id.event();
                    let event_type = event.type_name();
                    let event_span = span!(
                        Level::INFO,
                        "handle_timer",
                        event.type = %event_type,
                        view = %self.state.view(),
                    );
                    let _guard = event_span.enter();
                    self.dispatch(event);
                }

                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        info!("All runner handles dropped");
                        break;
                    };
                    let event_type = event.type_name();
                    let event_span = span!(
                        Level::DEBUG,
                        "handle_event",
                        event.type = %event_type,
                        view = %self.state.view(),
                    );
                    let _guard = event_span.enter();
                    self.dispatch(event);
                }
            }
        }

        self.timers.cancel_all();
        info!(stats = ?self.state.stats(), "Production runner stopped");
        Ok(())
    }

    /// Handle `event` and every internal event it causes, depth first in
    /// emission order.
    fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            self.state.set_time(self.start_time.elapsed());
            trace!(event = event.type_name(), "Handling event");

            let actions = self.state.handle(event);
            let internal = self.execute(actions);
            for event in internal.into_iter().rev() {
                queue.push_front(event);
            }
        }
    }

    /// Execute external actions, returning the internal events to handle
    /// next.
    fn execute(&mut self, actions: Vec<Action>) -> Vec<Event> {
        let mut internal = Vec::new();
        for action in actions {
            match action {
                Action::EnqueueInternal { event } => internal.push(event),

                Action::Broadcast { message } => match encode_message(&message) {
                    Ok(bytes) => {
                        trace!(kind = message.type_name(), len = bytes.len(), "Broadcasting");
                        self.broadcaster.broadcast(message.code(), bytes);
                    }
                    Err(e) => {
                        warn!(error = %e, kind = message.type_name(), "Failed to encode broadcast")
                    }
                },

                Action::SetTimer { id, duration } => self.timers.set_timer(id, duration),

                Action::CancelTimer { id } => self.timers.cancel_timer(id),

                Action::CommitProposal {
                    proposal,
                    view,
                    proposer,
                    committed_seals,
                } => {
                    debug!(
                        sequence = proposal.number,
                        round = view.round,
                        proposal = %proposal.hash(),
                        "Handing committed proposal to the chain"
                    );
                    self.committer
                        .commit(proposal, view, proposer, committed_seals);
                }
            }
        }
        internal
    }
}
