//! The three external collaborators the decision engine depends on but
//! does not implement, modeled as traits so the decision engine can be
//! driven deterministically in tests without a real network. Production
//! implementations of these traits (an RPC client speaking to the real
//! per-node lock servers, a node-discovery subscription, a peer
//! transport to sibling agents) live outside this crate.

use common::async_std::channel;

use crate::ids::AgentId;
use crate::types::{LockId, LockStateUpdate, Mode, NodeId, ObjectId};

/// Agent → lock server (per node).
#[async_trait]
pub trait LockServerClient: Send + Sync {
    async fn lock(&self, node: NodeId, object: ObjectId, agent: AgentId, mode: Mode);
    async fn surrender(&self, node: NodeId, object: ObjectId);
}

/// Agent ↔ agent.
#[async_trait]
pub trait PeerBus: Send + Sync {
    async fn send_surrendered(&self, to: AgentId, sender: AgentId, lock_id: LockId);
    async fn send_lock_update(&self, to: AgentId, update: LockStateUpdate);
}

/// Node/lock-server liveness. `monitor_nodes` registers this agent's
/// mailbox for the lifetime of the agent; `watch_for_restart` spawns a
/// one-shot watcher for a single node coming back up.
#[async_trait]
pub trait NodeMonitor: Send + Sync {
    async fn monitor_nodes(&self, sink: channel::Sender<crate::message::AgentMessage>);
    async fn watch_for_restart(&self, node: NodeId, sink: channel::Sender<crate::message::AgentMessage>);
}
