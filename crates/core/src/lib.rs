//! Core types for Istanbul BFT consensus.
//!
//! This crate provides the foundational types for the consensus architecture:
//!
//! - [`Event`]: All possible inputs to the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - [`StateMachine`]: The trait that all state machines implement
//! - [`ProposalVerifier`], [`ChainReader`], [`MessageValidator`]: the narrow
//!   capabilities the consensus core consumes from its host
//!
//! # Architecture
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is synchronous, deterministic and performs no I/O. The
//! runner (simulation or production) delivers events, executes the returned
//! actions, and turns timer expiry into events on the same serialized stream.

mod action;
mod backend;
mod event;
mod message;
mod traits;

pub use action::Action;
pub use backend::{
    ChainReader, MessageValidator, ProposalVerifier, SignatureValidator, ValidationError,
    VerifyError,
};
pub use event::{Event, EventPriority};
pub use message::OutboundMessage;
pub use traits::StateMachine;

/// Timers a consensus node can arm.
///
/// At most one timer per id is outstanding; arming an id again replaces the
/// pending one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    /// Round progress timeout; expiry escalates to a round change.
    RoundChange,
    /// Retry of a PRE-PREPARE whose proposal was reported as a future block.
    FuturePreprepare,
}

impl TimerId {
    /// Event delivered when this timer fires.
    pub fn event(self) -> Event {
        match self {
            TimerId::RoundChange => Event::RoundChangeTimer,
            TimerId::FuturePreprepare => Event::FuturePreprepareTimer,
        }
    }
}
