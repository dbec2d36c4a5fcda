//! Deterministic simulation runner.
//!
//! Each node has its own chain. When a node emits `Action::CommitProposal`,
//! the runner appends the proposal to that node's chain and, with automatic
//! proposals on, hands the node a request for the next sequence.

use crate::event_queue::EventKey;
use crate::network::{NetworkConfig, SimulatedNetwork};
use crate::storage::SimChain;
use crate::NodeIndex;
use ibft_bft::{BftBackend, BftConfig, BftState};
use ibft_core::{Action, ChainReader, Event, OutboundMessage, StateMachine, TimerId};
use ibft_messages::SignedMessage;
use ibft_types::{Hash, KeyPair, Proposal, ProposerPolicy, ValidatorId, ValidatorInfo, ValidatorSet};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and executes actions.
/// Given the same seed, produces identical results every run.
pub struct SimulationRunner {
    /// All nodes in the simulation, indexed by NodeIndex.
    nodes: Vec<BftState>,

    /// Per-node chain, also serving as the node's proposal verifier.
    chains: Vec<Arc<SimChain>>,

    /// Nodes that stopped processing events.
    crashed: HashSet<NodeIndex>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    network: SimulatedNetwork,

    /// RNG for network conditions (seeded for determinism).
    rng: ChaCha8Rng,

    /// Maps (node, timer_id) -> event_key for replacement and cancellation.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,

    /// Finalized proposal hashes per node, by sequence.
    committed: Vec<BTreeMap<u64, Hash>>,

    /// Hand every node a proposal request whenever it reaches a new sequence.
    auto_propose: bool,

    /// Delay between finalizing a sequence and requesting the next proposal.
    block_interval: Duration,

    stats: SimulationStats,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 4],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages sent (successfully scheduled for delivery).
    pub messages_sent: u64,
    /// Messages dropped due to network partition.
    pub messages_dropped_partition: u64,
    /// Messages dropped due to packet loss.
    pub messages_dropped_loss: u64,
    /// Broadcasts that failed the wire round trip.
    pub messages_undecodable: u64,
    /// Events discarded because their node had crashed.
    pub events_dropped_crashed: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
    /// `CommitProposal` actions across all nodes.
    pub proposals_committed: u64,
    /// Commits that disagree with another node's commit at the same sequence.
    pub conflicting_commits: u64,
}

impl SimulationStats {
    /// Total messages dropped (partition + packet loss).
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_partition + self.messages_dropped_loss
    }

    /// Message delivery rate (sent / (sent + dropped)).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped();
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

impl SimulationRunner {
    /// Create a runner with the default consensus configuration.
    pub fn new(network_config: NetworkConfig, seed: u64) -> Self {
        Self::with_bft_config(network_config, BftConfig::default(), seed)
    }

    pub fn with_bft_config(network_config: NetworkConfig, bft_config: BftConfig, seed: u64) -> Self {
        let network = SimulatedNetwork::new(network_config.clone());
        let rng = ChaCha8Rng::seed_from_u64(seed);
        let num_nodes = network_config.num_validators;

        // Deterministic keys per (seed, index).
        let keys: Vec<KeyPair> = (0..num_nodes)
            .map(|i| {
                let mut seed_bytes = [0u8; 32];
                let key_seed = seed.wrapping_add(i as u64).wrapping_mul(0x517cc1b727220a95);
                seed_bytes[..8].copy_from_slice(&key_seed.to_le_bytes());
                seed_bytes[8..16].copy_from_slice(&(i as u64).to_le_bytes());
                KeyPair::ed25519_from_seed(&seed_bytes)
            })
            .collect();

        let validators = ValidatorSet::new(
            keys.iter()
                .enumerate()
                .map(|(i, key)| ValidatorInfo {
                    validator_id: ValidatorId(i as u64),
                    public_key: key.public_key(),
                })
                .collect(),
            ProposerPolicy::RoundRobin,
        );

        let chains: Vec<Arc<SimChain>> = (0..num_nodes)
            .map(|_| Arc::new(SimChain::new(validators.clone())))
            .collect();

        let nodes = keys
            .into_iter()
            .zip(&chains)
            .enumerate()
            .map(|(i, (key, chain))| {
                let backend = BftBackend::new(chain.clone(), chain.clone());
                BftState::new(ValidatorId(i as u64), key, backend, bft_config.clone())
            })
            .collect();

        info!(num_nodes, seed, "Created simulation runner");

        Self {
            nodes,
            chains,
            crashed: HashSet::new(),
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network,
            rng,
            timers: HashMap::new(),
            committed: vec![BTreeMap::new(); num_nodes as usize],
            auto_propose: true,
            block_interval: Duration::from_millis(100),
            stats: SimulationStats::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Setup
    // ═══════════════════════════════════════════════════════════════════════

    /// Turn automatic proposal requests on or off. Call before [`Self::start`].
    pub fn set_auto_propose(&mut self, enabled: bool) {
        self.auto_propose = enabled;
    }

    pub fn set_block_interval(&mut self, interval: Duration) {
        self.block_interval = interval;
    }

    /// Start consensus on every live node.
    pub fn start(&mut self) {
        for index in 0..self.nodes.len() as NodeIndex {
            if self.crashed.contains(&index) {
                continue;
            }
            let node = &mut self.nodes[index as usize];
            node.set_time(self.now);
            let actions = node.start();
            self.stats.actions_generated += actions.len() as u64;
            for action in actions {
                self.process_action(index, action);
            }
            if self.auto_propose {
                self.request_next_proposal(index, Duration::ZERO);
            }
        }
    }

    /// Stop a node: it drops every pending and future event.
    pub fn crash_node(&mut self, node: NodeIndex) {
        info!(node, "Crashing node");
        self.crashed.insert(node);
        self.timers.retain(|(n, _), _| *n != node);
    }

    pub fn is_crashed(&self, node: NodeIndex) -> bool {
        self.crashed.contains(&node)
    }

    /// Hand `proposal` to `node` as a block-producer request after `delay`.
    pub fn submit_proposal(&mut self, node: NodeIndex, delay: Duration, proposal: Proposal) {
        self.schedule_event(node, self.now + delay, Event::ProposalRequested { proposal });
    }

    /// Schedule an arbitrary event for a node.
    pub fn schedule_initial_event(&mut self, node: NodeIndex, delay: Duration, event: Event) {
        self.schedule_event(node, self.now + delay, event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn node(&self, index: NodeIndex) -> Option<&BftState> {
        self.nodes.get(index as usize)
    }

    pub fn chain(&self, index: NodeIndex) -> Option<&SimChain> {
        self.chains.get(index as usize).map(|c| c.as_ref())
    }

    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Mutable network access for partition/loss configuration.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    /// Highest sequence `node` has finalized (0 when only genesis).
    pub fn committed_height(&self, node: NodeIndex) -> u64 {
        self.committed
            .get(node as usize)
            .and_then(|c| c.keys().next_back().copied())
            .unwrap_or(0)
    }

    pub fn committed_hash(&self, node: NodeIndex, sequence: u64) -> Option<Hash> {
        self.committed
            .get(node as usize)
            .and_then(|c| c.get(&sequence).copied())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event Loop
    // ═══════════════════════════════════════════════════════════════════════

    /// Run simulation until no more events or time limit reached.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(
            end_time_secs = end_time.as_secs_f64(),
            "Running simulation step"
        );

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                debug!(
                    remaining_events = self.event_queue.len(),
                    "Time limit reached"
                );
                break;
            }
            let Some((key, event)) = self.event_queue.pop_first() else {
                break;
            };
            self.now = key.time;
            let node_index = key.node_index;

            if self.crashed.contains(&node_index) {
                self.stats.events_dropped_crashed += 1;
                continue;
            }
            if let Some(id) = timer_id(&event) {
                if self.timers.get(&(node_index, id)) == Some(&key) {
                    self.timers.remove(&(node_index, id));
                }
            }

            trace!(
                time = ?self.now,
                node = node_index,
                event = event.type_name(),
                "Processing event"
            );

            self.stats.events_processed += 1;
            self.stats.events_by_priority[event.priority() as usize] += 1;

            self.chains[node_index as usize].set_time(self.now);
            let node = &mut self.nodes[node_index as usize];
            node.set_time(self.now);
            let actions = node.handle(event);

            self.stats.actions_generated += actions.len() as u64;
            for action in actions {
                self.process_action(node_index, action);
            }
        }

        self.now = self.now.max(end_time);
        trace!(
            events_processed = self.stats.events_processed,
            actions_generated = self.stats.actions_generated,
            final_time = ?self.now,
            "Simulation step complete"
        );
    }

    /// Process an action from a node.
    fn process_action(&mut self, from: NodeIndex, action: Action) {
        match action {
            Action::Broadcast { message } => {
                let Some(message) = self.wire_round_trip(message) else {
                    return;
                };
                for to in self.network.all_nodes() {
                    if to != from {
                        self.try_deliver_message(
                            from,
                            to,
                            Event::MessageReceived {
                                message: message.clone(),
                            },
                        );
                    }
                }
            }

            Action::SetTimer { id, duration } => {
                if let Some(old) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&old);
                }
                let key = self.schedule_event(from, self.now + duration, id.event());
                self.timers.insert((from, id), key);
                self.stats.timers_set += 1;
            }

            Action::CancelTimer { id } => {
                if let Some(key) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&key);
                    self.stats.timers_cancelled += 1;
                }
            }

            Action::EnqueueInternal { event } => {
                self.schedule_event(from, self.now, event);
            }

            Action::CommitProposal {
                proposal,
                view,
                proposer,
                committed_seals,
            } => {
                let number = proposal.number;
                let hash = proposal.hash();
                debug!(
                    node = from,
                    sequence = number,
                    round = view.round,
                    proposal = %hash,
                    seals = committed_seals.len(),
                    "Node committed proposal"
                );
                self.check_agreement(from, number, hash);
                self.committed[from as usize].insert(number, hash);
                self.chains[from as usize].commit(proposal, proposer);
                self.stats.proposals_committed += 1;

                if self.auto_propose {
                    self.request_next_proposal(from, self.block_interval);
                }
            }
        }
    }

    /// Encode and decode a broadcast the way it would cross the wire.
    fn wire_round_trip(&mut self, message: OutboundMessage) -> Option<SignedMessage> {
        let decoded = message
            .signed()
            .encode()
            .and_then(|bytes| SignedMessage::decode(&bytes));
        match decoded {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(error = %e, kind = message.type_name(), "Broadcast failed wire round trip");
                self.stats.messages_undecodable += 1;
                None
            }
        }
    }

    fn check_agreement(&mut self, node: NodeIndex, number: u64, hash: Hash) {
        for (other, committed) in self.committed.iter().enumerate() {
            if let Some(existing) = committed.get(&number) {
                if *existing != hash {
                    warn!(
                        node,
                        other,
                        sequence = number,
                        proposal = %hash,
                        existing = %existing,
                        "Conflicting commit"
                    );
                    self.stats.conflicting_commits += 1;
                }
            }
        }
    }

    /// Build a proposal on top of the node's chain head and request it.
    fn request_next_proposal(&mut self, node: NodeIndex, delay: Duration) {
        let (head, _) = self.chains[node as usize].last_proposal();
        let at = self.now + delay;
        let payload = format!("sequence {} from node {}", head.number + 1, node).into_bytes();
        let proposal = head.child(at.as_millis() as u64, payload);
        self.schedule_event(node, at, Event::ProposalRequested { proposal });
    }

    fn schedule_event(&mut self, node: NodeIndex, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }

    /// Try to deliver a message, accounting for partitions and packet loss.
    fn try_deliver_message(&mut self, from: NodeIndex, to: NodeIndex, event: Event) {
        // Partition check first, it doesn't consume RNG.
        if self.network.is_partitioned(from, to) {
            self.stats.messages_dropped_partition += 1;
            trace!(from, to, "Message dropped due to partition");
            return;
        }
        if self.network.should_drop_packet(&mut self.rng) {
            self.stats.messages_dropped_loss += 1;
            trace!(from, to, "Message dropped due to packet loss");
            return;
        }

        let latency = self.network.sample_latency(&mut self.rng);
        self.schedule_event(to, self.now + latency, event);
        self.stats.messages_sent += 1;
    }
}

fn timer_id(event: &Event) -> Option<TimerId> {
    match event {
        Event::RoundChangeTimer => Some(TimerId::RoundChange),
        Event::FuturePreprepareTimer => Some(TimerId::FuturePreprepare),
        _ => None,
    }
}
