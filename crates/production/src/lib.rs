//! Production runner for Istanbul BFT.
//!
//! Wraps the synchronous [`ibft_bft::BftState`] in a tokio event loop:
//!
//! - [`ProductionRunner`]: serialized event loop executing the state
//!   machine's actions
//! - [`TimerManager`]: tokio tasks that turn timer expiry into events
//! - [`codec`]: SBOR + LZ4 wire encoding of consensus messages
//! - [`NodeConfig`]: TOML node configuration
//! - [`init_tracing`]: `tracing-subscriber` setup
//!
//! Transport and block storage stay with the host, behind the
//! [`Broadcaster`] and [`CommitHandler`] traits.

pub mod codec;
mod config;
mod runner;
mod telemetry;
mod timers;

pub use codec::{decode_message, encode_message, CodecError};
pub use config::{ConfigError, ConsensusSection, NodeConfig, NodeSection, ValidatorEntry};
pub use runner::{
    Broadcaster, CommitHandler, ProductionRunner, RunnerError, RunnerHandle, ShutdownHandle,
};
pub use telemetry::{init_tracing, TelemetryError, DEFAULT_FILTER};
pub use timers::{TimerFired, TimerManager};
