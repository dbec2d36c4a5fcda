//! Istanbul BFT consensus state machine.
//!
//! This crate provides a synchronous Istanbul BFT implementation that can be
//! used for both simulation and production.
//!
//! # Architecture
//!
//! The state machine processes events synchronously:
//!
//! - `Event::ProposalRequested` → Broadcast PRE-PREPARE if we're the proposer
//! - `Event::MessageReceived` → Validate, classify by view, dispatch by phase
//! - `Event::RoundChangeTimer` → Escalate to a round change if no progress
//! - `Event::FuturePreprepareTimer` → Retry a PRE-PREPARE that was too early
//!
//! All I/O is performed by the runner via returned `Action`s.
//!
//! # Terminology
//!
//! - **Sequence**: Position in the chain. One agreement instance per sequence.
//!
//! - **Round**: Attempt number within a sequence. A new round starts when
//!   N-F validators vote ROUND-CHANGE for it.
//!
//! - **Phase**: `AcceptRequest → Preprepared → Prepared → Committed`.
//!
//! - **Lock**: Once a replica sees a PREPARE quorum for a proposal it keeps
//!   that proposal across rounds of the same sequence. It only abandons it
//!   for a proposal backed by a proof of lock (POL): a quorum of PREPARE
//!   votes from a round at least as recent.
//!
//! # Quorums
//!
//! With N validators and F = ⌊(N-1)/3⌋, every quorum is N-F votes. Any two
//! quorums share at least one honest validator, so two different proposals
//! cannot both gather a COMMIT quorum in the same sequence.

mod backlog;
mod commit;
mod config;
mod error;
mod message_set;
mod prepare;
mod preprepare;
mod round_change;
mod round_change_set;
mod round_state;
mod state;

pub use backlog::Backlog;
pub use config::BftConfig;
pub use error::ConsensusError;
pub use message_set::MessageSet;
pub use round_change_set::RoundChangeSet;
pub use round_state::{Lock, Phase, RoundState};
pub use state::{BftBackend, BftState, BftStats};
