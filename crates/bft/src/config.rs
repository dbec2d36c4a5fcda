//! BFT configuration.

use std::time::Duration;

/// Configuration for the consensus state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BftConfig {
    /// Round-change timeout for round 0.
    pub request_timeout: Duration,

    /// Base of the exponential round-change backoff.
    ///
    /// Round `r > 0` waits `request_timeout + round_change_backoff * 2^r`.
    pub round_change_backoff: Duration,

    /// Upper bound on any round-change timeout.
    pub max_round_change_timeout: Duration,

    /// Maximum number of future messages kept per sender.
    pub max_backlog_per_sender: usize,
}

impl Default for BftConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            round_change_backoff: Duration::from_secs(1),
            max_round_change_timeout: Duration::from_secs(120),
            max_backlog_per_sender: 64,
        }
    }
}

impl BftConfig {
    /// Create a new BFT configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the round 0 timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the backoff base.
    pub fn with_round_change_backoff(mut self, backoff: Duration) -> Self {
        self.round_change_backoff = backoff;
        self
    }

    /// Set the timeout cap.
    pub fn with_max_round_change_timeout(mut self, max: Duration) -> Self {
        self.max_round_change_timeout = max;
        self
    }

    /// Set the per-sender backlog cap.
    pub fn with_max_backlog_per_sender(mut self, max: usize) -> Self {
        self.max_backlog_per_sender = max;
        self
    }

    /// Timeout to arm for `round`.
    pub fn round_change_timeout(&self, round: u64) -> Duration {
        if round == 0 {
            return self.request_timeout.min(self.max_round_change_timeout);
        }
        let factor = 1u32 << round.min(31);
        self.request_timeout
            .saturating_add(self.round_change_backoff.saturating_mul(factor))
            .min(self.max_round_change_timeout)
    }
}
