//! Deterministic simulation runner.
//!
//! This crate provides a fully deterministic simulation environment for
//! testing consensus. Given the same seed, it produces identical results
//! every run.
//!
//! # Architecture
//!
//! ```text
//!   run_until(t)
//!        │
//!        ▼
//!   event queue ── (time, priority, node, seq) ──► node i: BftState::handle
//!        ▲                                                   │
//!        │                                                   ▼ actions
//!        ├── Broadcast ─► wire round trip ─► network (partition, loss, latency)
//!        ├── SetTimer / CancelTimer ─► keyed (node, TimerId) entries
//!        ├── EnqueueInternal ─► same node, same instant
//!        └── CommitProposal ─► node i's SimChain, next proposal request
//! ```
//!
//! Every broadcast goes through the SBOR wire encoding before delivery, so
//! the simulation also exercises message decoding.

mod event_queue;
mod network;
mod runner;
mod storage;

pub use event_queue::EventKey;
pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{SimulationRunner, SimulationStats};
pub use storage::SimChain;

/// Type alias for deterministic node indexing in simulation.
///
/// Node `i` runs validator `ValidatorId(i)`.
pub type NodeIndex = u32;
