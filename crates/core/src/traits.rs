//! The state machine seam between consensus logic and its runners.

use crate::{Action, Event};
use std::time::Duration;

/// A synchronous, deterministic event handler.
///
/// Runners own the clock and all I/O. Before every [`handle`] call they set
/// the current time, then execute the returned actions in order. Given the
/// same state, time and event, `handle` returns the same actions.
///
/// [`handle`]: StateMachine::handle
pub trait StateMachine {
    /// Process one event. Never blocks on I/O.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the time used by the next `handle` call.
    fn set_time(&mut self, now: Duration);

    fn now(&self) -> Duration;
}
