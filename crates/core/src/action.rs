//! Action types for the deterministic state machine.

use crate::{message::OutboundMessage, Event, TimerId};
use ibft_messages::CommittedSeal;
use ibft_types::{Proposal, ValidatorId, View};
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and may convert results back into events.
#[derive(Debug, Clone)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Network
    // ═══════════════════════════════════════════════════════════════════════
    /// Best-effort broadcast to every other validator in the committee.
    ///
    /// The node's own copy is delivered separately as an
    /// [`Event::LocalMessage`], never through the network.
    Broadcast { message: OutboundMessage },

    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Set a timer to fire after a duration, replacing any pending timer
    /// with the same id.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a previously set timer.
    CancelTimer { id: TimerId },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal (fed back as events with Internal priority)
    // ═══════════════════════════════════════════════════════════════════════
    /// Enqueue an internal event for immediate processing.
    ///
    /// Internal events are processed at the same timestamp with higher
    /// priority than external events, preserving causality.
    EnqueueInternal { event: Event },

    // ═══════════════════════════════════════════════════════════════════════
    // Chain
    // ═══════════════════════════════════════════════════════════════════════
    /// A proposal reached a COMMIT quorum and is final.
    ///
    /// `committed_seals` holds one seal per validator in the quorum, ordered
    /// by validator id.
    CommitProposal {
        proposal: Proposal,
        view: View,
        proposer: ValidatorId,
        committed_seals: Vec<CommittedSeal>,
    },
}

impl Action {
    /// Get the action type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Broadcast { .. } => "Broadcast",
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::EnqueueInternal { .. } => "EnqueueInternal",
            Action::CommitProposal { .. } => "CommitProposal",
        }
    }
}
