//! Ordering key for the simulation event queue.

use crate::NodeIndex;
use ibft_core::{Event, EventPriority};
use std::time::Duration;

/// Key of a scheduled event.
///
/// Field order defines the ordering: earlier time first, then higher
/// priority (lower value), then node index, then insertion sequence. The
/// sequence makes every key unique and keeps FIFO order for ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub node_index: NodeIndex,
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, node_index: NodeIndex, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            node_index,
            sequence,
        }
    }
}
