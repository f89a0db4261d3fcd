//! Event loop and agent state. `AgentState` owns the four tables plus
//! scalar state in one plain struct with no `Mutex` around it: it is
//! moved into the loop and never shared.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use common::async_std::channel;
use common::async_std::task;

use crate::commands::{
    AwaitAllStatus, ClientCommand, ClientEvent, ClientEventPayload, ConfigFlag, LockInfo, LockOutcome, LockSummary,
};
use crate::deadlock;
use crate::error::AgentError;
use crate::external::{LockServerClient, NodeMonitor, PeerBus};
use crate::ids::{AgentId, ClientId};
use crate::message::{AgentMessage, Effect};
use crate::normalizer;
use crate::readiness;
use crate::recovery;
use crate::tables::{AgentsHolding, LocksTable, RequestBag};
use crate::types::{LockId, NodeId, ObjectId, Request, RequestId};

pub enum Notifier {
    AwaitAll(channel::Sender<AwaitAllStatus>),
    AwaitAllLock(channel::Sender<Result<LockOutcome, AgentError>>),
    Events(channel::Sender<ClientEvent>),
}

/// Configuration options, passed once at `start` time rather than
/// parsed from a CLI: the agent is a library actor embedded in a
/// client process, not its own binary.
pub struct TransactionAgentConfig {
    pub client: ClientId,
    pub link: bool,
    pub abort_on_deadlock: bool,
    pub await_nodes: bool,
    pub notify: bool,
}

impl TransactionAgentConfig {
    pub fn new(client: ClientId) -> Self {
        TransactionAgentConfig {
            client,
            link: true,
            abort_on_deadlock: false,
            await_nodes: false,
            notify: false,
        }
    }
}

pub struct AgentState {
    pub id: AgentId,
    pub client: ClientId,
    pub link: bool,

    pub locks: LocksTable,
    pub agents_holding: AgentsHolding,
    pub active_requests: RequestBag,
    pub pending_requests: RequestBag,
    pub requests: HashMap<RequestId, Request>,

    pub interesting: BTreeSet<LockId>,
    pub sync: BTreeSet<LockId>,
    pub down: BTreeSet<NodeId>,
    pub monitored: BTreeSet<NodeId>,
    pub deadlocks: Vec<(AgentId, LockId)>,
    pub notify: Vec<Notifier>,

    pub claim_no: u64,
    pub have_all: bool,
    pub await_nodes: bool,
    pub abort_on_deadlock: bool,
    pub notify_events: bool,

    next_request_id: u64,
    pub snapshots_ingested: u64,
    pub last_ignored: Option<IgnoredReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    Outdated,
    SurrenderPending,
}

impl AgentState {
    pub fn new(config: TransactionAgentConfig) -> Self {
        AgentState {
            id: AgentId::new(),
            client: config.client,
            link: config.link,
            locks: LocksTable::default(),
            agents_holding: AgentsHolding::default(),
            active_requests: RequestBag::default(),
            pending_requests: RequestBag::default(),
            requests: HashMap::new(),
            interesting: BTreeSet::new(),
            sync: BTreeSet::new(),
            down: BTreeSet::new(),
            monitored: BTreeSet::new(),
            deadlocks: Vec::new(),
            notify: Vec::new(),
            claim_no: 0,
            have_all: false,
            await_nodes: config.await_nodes,
            abort_on_deadlock: config.abort_on_deadlock,
            notify_events: config.notify,
            next_request_id: 0,
            snapshots_ingested: 0,
            last_ignored: None,
        }
    }

    pub(crate) fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    /// Adds `node` to `monitored` if it isn't already there, returning
    /// the `MonitorNode` effect only the first time, so the node's
    /// lock-server ends up monitored exactly once.
    pub(crate) fn ensure_monitored(&mut self, node: &NodeId) -> Vec<Effect> {
        if self.monitored.insert(node.clone()) {
            vec![Effect::MonitorNode(node.clone())]
        } else {
            Vec::new()
        }
    }

    /// Removes a lock and its holdings from local state, without
    /// contacting the lock server. Used by the upgrade path, which
    /// purges stale snapshots before treating a request as new.
    pub(crate) fn purge_lock(&mut self, lock_id: &LockId) {
        if let Some(lock) = self.locks.remove(lock_id) {
            for agent in lock.head_agents() {
                self.agents_holding.remove(agent, lock_id);
            }
        }
        self.interesting.remove(lock_id);
    }

    /// Runs the readiness evaluator, then (unless we've already reached
    /// `have_all`) the deadlock analyzer. Every handler ends by calling
    /// this rather than conditioning the deadlock pass on whether a
    /// notifier happens to be registered.
    pub fn reevaluate(&mut self) -> Vec<Effect> {
        let mut effects = readiness::reevaluate(self);
        if effects.iter().any(|e| matches!(e, Effect::Abort(_))) {
            return effects;
        }
        if !self.have_all {
            effects.extend(deadlock::reevaluate(self));
        }
        effects
    }

    /// Pushes a payload to every registered persistent `Events` sink
    /// (the `notify` config flag), leaving the sink
    /// registered for the next event. One-shot notifiers (`AwaitAll`,
    /// `AwaitAllLock`) are untouched here; they are popped only by
    /// `readiness::reevaluate` once the transaction reaches `have_all`.
    pub(crate) fn notify_event(&self, payload: ClientEventPayload) {
        if !self.notify_events {
            return;
        }
        for notifier in &self.notify {
            if let Notifier::Events(sink) = notifier {
                let _ = sink.try_send((self.id, payload.clone()));
            }
        }
    }

    pub fn handle(&mut self, msg: AgentMessage) -> Vec<Effect> {
        match msg {
            AgentMessage::Client(cmd) => self.handle_command(cmd),
            AgentMessage::LockUpdate(update) => crate::ingestor::ingest(self, update),
            AgentMessage::PeerLockUpdate(update) => crate::ingestor::ingest(self, update),
            AgentMessage::PeerSurrendered { sender, lock_id } => {
                self.deadlocks.push((sender, lock_id));
                self.reevaluate()
            }
            AgentMessage::NodeUp(node) => recovery::handle_node_up(self, node),
            AgentMessage::NodeDown(_node) => Vec::new(),
            AgentMessage::LockServerDown(node) => recovery::handle_lock_server_down(self, node),
            AgentMessage::LocksRunning(node) => recovery::handle_locks_running(self, node),
            AgentMessage::ClientDied => recovery::handle_client_died(self),
        }
    }

    fn handle_command(&mut self, cmd: ClientCommand) -> Vec<Effect> {
        match cmd {
            ClientCommand::Lock { spec, wait, reply } => {
                let (outcome, mut effects) = normalizer::normalize(self, spec);
                if let normalizer::NormalizeOutcome::Conflict(err) = outcome {
                    let _ = reply.try_send(Err(err));
                    return effects;
                }
                effects.extend(self.reevaluate());
                if !wait {
                    let _ = reply.try_send(Ok(LockOutcome::Accepted));
                    return effects;
                }
                match readiness::await_all_status(self) {
                    Some(AwaitAllStatus::HaveAll(deadlocks)) => {
                        let _ = reply.try_send(Ok(LockOutcome::HaveAll(deadlocks)));
                    }
                    Some(AwaitAllStatus::CannotServe(reqs)) => {
                        let _ = reply.try_send(Err(AgentError::CannotLockObjects(reqs)));
                    }
                    _ => {
                        self.notify.push(Notifier::AwaitAllLock(reply));
                    }
                }
                effects
            }
            ClientCommand::LockObjects { specs, reply } => {
                let mut effects = Vec::new();
                let mut results = Vec::new();
                for spec in specs {
                    if let Err(err) = crate::commands::validate_lock_spec(&spec) {
                        results.push(Err(err));
                        continue;
                    }
                    let (outcome, spec_effects) = normalizer::normalize(self, spec);
                    effects.extend(spec_effects);
                    match outcome {
                        normalizer::NormalizeOutcome::Conflict(err) => results.push(Err(err)),
                        _ => results.push(Ok(LockOutcome::Accepted)),
                    }
                }
                effects.extend(self.reevaluate());
                let _ = reply.try_send(results);
                effects
            }
            ClientCommand::SurrenderNowait {
                object,
                other_agent,
                nodes,
                reply,
            } => {
                let mut lock_ids = Vec::with_capacity(nodes.len());
                for node in &nodes {
                    let lock_id = LockId::new(object.clone(), node.clone());
                    let holds_it = self
                        .locks
                        .get(&lock_id)
                        .map(|lock| lock.head_agents().contains(&self.id) && lock.tail_agents().contains(&other_agent))
                        .unwrap_or(false);
                    if !holds_it {
                        let _ = reply.try_send(Err(AgentError::CannotSurrender {
                            object: object.clone(),
                            other_agent,
                        }));
                        return Vec::new();
                    }
                    lock_ids.push(lock_id);
                }
                let mut effects = Vec::new();
                for lock_id in lock_ids {
                    effects.extend(deadlock::perform_surrender(self, lock_id));
                }
                let _ = reply.try_send(Ok(()));
                effects.extend(self.reevaluate());
                effects
            }
            ClientCommand::AwaitAllLocks { reply } => match readiness::await_all_status(self) {
                Some(status) => {
                    let _ = reply.try_send(status);
                    Vec::new()
                }
                None => {
                    self.notify.push(Notifier::AwaitAll(reply));
                    Vec::new()
                }
            },
            ClientCommand::ChangeFlag {
                flag,
                value,
                events_sink,
                reply,
            } => {
                match flag {
                    ConfigFlag::AbortOnDeadlock => self.abort_on_deadlock = value,
                    ConfigFlag::AwaitNodes => self.await_nodes = value,
                    ConfigFlag::Notify => {
                        self.notify_events = value;
                        if value {
                            if let Some(sink) = events_sink {
                                self.notify.push(Notifier::Events(sink));
                            }
                        } else {
                            self.notify.retain(|n| !matches!(n, Notifier::Events(_)));
                        }
                    }
                }
                let _ = reply.try_send(());
                self.reevaluate()
            }
            ClientCommand::LockInfo { reply } => {
                let info = self.lock_info();
                let _ = reply.try_send(info);
                Vec::new()
            }
            ClientCommand::Stop { client, reply } => {
                if client != self.client {
                    let _ = reply.try_send(Err(AgentError::NotOwner(client)));
                    return Vec::new();
                }
                let _ = reply.try_send(Ok(()));
                vec![Effect::Terminate]
            }
        }
    }

    fn lock_info(&self) -> LockInfo {
        let pending = self
            .pending_requests
            .iter_ids()
            .filter_map(|id| self.requests.get(&id))
            .map(|r| (r.object.clone(), r.into()))
            .collect();
        let active = self
            .active_requests
            .iter_ids()
            .filter_map(|id| self.requests.get(&id))
            .map(|r| (r.object.clone(), r.into()))
            .collect();
        let locks = self
            .locks
            .iter()
            .map(|(id, lock)| {
                (
                    id.clone(),
                    LockSummary {
                        version: lock.version,
                        queue_len: lock.queue.len(),
                        interesting: self.interesting.contains(id),
                    },
                )
            })
            .collect();
        LockInfo {
            have_all: self.have_all,
            claim_no: self.claim_no,
            pending,
            active,
            locks,
            deadlocks: self.deadlocks.clone(),
        }
    }
}

/// A handle the owning client uses to drive the agent; cloning it
/// shares the mailbox.
#[derive(Clone)]
pub struct AgentHandle {
    sender: channel::Sender<AgentMessage>,
}

impl AgentHandle {
    pub async fn send(&self, msg: AgentMessage) {
        let _ = self.sender.send(msg).await;
    }

    pub fn mailbox(&self) -> channel::Sender<AgentMessage> {
        self.sender.clone()
    }
}

pub struct TransactionAgent;

impl TransactionAgent {
    /// Spawns the event loop as a background task and returns a handle
    /// to its mailbox. Mirrors how `raft::Node` is started and then
    /// driven by its embedding binary, rather than the agent parsing
    /// its own CLI arguments.
    pub fn start<S, P, M>(config: TransactionAgentConfig, server: Arc<S>, peers: Arc<P>, monitor: Arc<M>) -> AgentHandle
    where
        S: LockServerClient + 'static,
        P: PeerBus + 'static,
        M: NodeMonitor + 'static,
    {
        let (sender, receiver) = channel::unbounded();
        let handle = AgentHandle { sender: sender.clone() };

        task::spawn(async move {
            monitor.monitor_nodes(sender.clone()).await;
            let mut state = AgentState::new(config);
            Self::run(&mut state, receiver, sender, server, peers, monitor).await;
        });

        handle
    }

    async fn run<S, P, M>(
        state: &mut AgentState,
        mailbox: channel::Receiver<AgentMessage>,
        self_sender: channel::Sender<AgentMessage>,
        server: Arc<S>,
        peers: Arc<P>,
        monitor: Arc<M>,
    ) where
        S: LockServerClient,
        P: PeerBus,
        M: NodeMonitor,
    {
        loop {
            let msg = match mailbox.recv().await {
                Ok(msg) => msg,
                Err(_) => break,
            };
            let effects = state.handle(msg);
            let mut terminate = false;
            for effect in effects {
                match effect {
                    Effect::Terminate => terminate = true,
                    Effect::Abort(err) => {
                        eprintln!("lock_agent: aborting transaction: {}", err);
                        terminate = true;
                    }
                    other => {
                        Self::apply_effect(state, other, &server, &peers, &monitor, &self_sender).await;
                    }
                }
            }
            if terminate {
                break;
            }
        }
    }

    async fn apply_effect<S, P, M>(
        state: &AgentState,
        effect: Effect,
        server: &Arc<S>,
        peers: &Arc<P>,
        monitor: &Arc<M>,
        self_sender: &channel::Sender<AgentMessage>,
    ) where
        S: LockServerClient,
        P: PeerBus,
        M: NodeMonitor,
    {
        match effect {
            Effect::SendLockRequest { node, object, mode } => {
                server.lock(node, object, state.id, mode).await;
            }
            Effect::SendSurrender { node, object } => {
                server.surrender(node, object).await;
            }
            Effect::SendSurrenderedToPeer { to, lock_id } => {
                peers.send_surrendered(to, state.id, lock_id).await;
            }
            Effect::RelayLockUpdate { to, update } => {
                peers.send_lock_update(to, update).await;
            }
            Effect::MonitorNode(_node) => {
                // node-level subscription is established once, up front,
                // by `monitor_nodes`; per-node lock-server death arrives
                // over the same subscription, so there's nothing further
                // to register here beyond what already happened in
                // `TransactionAgent::start`.
            }
            Effect::WatchForRestart(node) => {
                monitor.watch_for_restart(node, self_sender.clone()).await;
            }
            Effect::Abort(_) | Effect::Terminate => unreachable!("handled by the caller before apply_effect"),
        }
    }
}
