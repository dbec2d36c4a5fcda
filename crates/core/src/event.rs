//! Event types for the deterministic state machine.

use ibft_messages::SignedMessage;
use ibft_types::{Proposal, ValidatorId};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: internal events (consequences of
/// processing an event) are handled before new external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    Internal = 0,

    /// Timer events: scheduled by the node itself.
    Timer = 1,

    /// Network events: external inputs from other nodes.
    Network = 2,

    /// Client events: external inputs from the block producer.
    Client = 3,
}

/// All possible events a node can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════════
    /// The round made no progress within its timeout.
    RoundChangeTimer,

    /// The delay reported for a future-block PRE-PREPARE has elapsed.
    FuturePreprepareTimer,

    // ═══════════════════════════════════════════════════════════════════════
    // Network Messages (priority: Network)
    // ═══════════════════════════════════════════════════════════════════════
    /// A decoded consensus message from a peer.
    ///
    /// Sender identity comes from `message.sender` and is checked against the
    /// envelope signature before the message is acted on.
    MessageReceived { message: SignedMessage },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal Events (priority: Internal)
    // ═══════════════════════════════════════════════════════════════════════
    /// A message this node broadcast, looped back to itself.
    LocalMessage { message: SignedMessage },

    /// A deferred message whose view has become current.
    BacklogMessage { message: SignedMessage },

    /// The chain imported a proposal outside consensus (e.g. through sync).
    ChainAdvanced {
        proposal: Proposal,
        proposer: Option<ValidatorId>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Client Requests (priority: Client)
    // ═══════════════════════════════════════════════════════════════════════
    /// A candidate proposal from the block producer.
    ///
    /// Only acted on when this node is the proposer for the proposal's
    /// sequence; otherwise it is held until its sequence comes up.
    ProposalRequested { proposal: Proposal },
}

impl Event {
    /// Get the priority for this event type.
    ///
    /// Events at the same timestamp are processed in priority order,
    /// ensuring causality is preserved.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::LocalMessage { .. }
            | Event::BacklogMessage { .. }
            | Event::ChainAdvanced { .. } => EventPriority::Internal,

            Event::RoundChangeTimer | Event::FuturePreprepareTimer => EventPriority::Timer,

            Event::MessageReceived { .. } => EventPriority::Network,

            Event::ProposalRequested { .. } => EventPriority::Client,
        }
    }

    /// Check if this is an internal event (consequence of prior processing).
    pub fn is_internal(&self) -> bool {
        self.priority() == EventPriority::Internal
    }

    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::RoundChangeTimer => "RoundChangeTimer",
            Event::FuturePreprepareTimer => "FuturePreprepareTimer",
            Event::MessageReceived { .. } => "MessageReceived",
            Event::LocalMessage { .. } => "LocalMessage",
            Event::BacklogMessage { .. } => "BacklogMessage",
            Event::ChainAdvanced { .. } => "ChainAdvanced",
            Event::ProposalRequested { .. } => "ProposalRequested",
        }
    }
}
