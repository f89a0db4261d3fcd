//! In-memory fakes for the three external traits, driving the decision
//! engine deterministically in tests without a real network. Mirrors
//! `datastore/src/meta/test_store.rs`'s plain (not `#[cfg(test)]`-gated)
//! test-harness module, kept in the crate so integration tests under
//! `tests/` can use it too.

use std::sync::Mutex;

use common::async_std::channel;

use crate::external::{LockServerClient, NodeMonitor, PeerBus};
use crate::ids::AgentId;
use crate::message::AgentMessage;
use crate::types::{LockId, LockStateUpdate, Mode, NodeId, ObjectId};

/// Records every `lock`/`surrender` call made against it; does not
/// itself emit `LockStateUpdate`s back, tests drive those by calling
/// `AgentState::handle` directly with a hand-built snapshot instead of
/// waiting on a fake server's internal queue logic.
#[derive(Default)]
pub struct RecordingLockServer {
    pub lock_calls: Mutex<Vec<(NodeId, ObjectId, AgentId, Mode)>>,
    pub surrender_calls: Mutex<Vec<(NodeId, ObjectId)>>,
}

#[async_trait]
impl LockServerClient for RecordingLockServer {
    async fn lock(&self, node: NodeId, object: ObjectId, agent: AgentId, mode: Mode) {
        self.lock_calls.lock().unwrap().push((node, object, agent, mode));
    }

    async fn surrender(&self, node: NodeId, object: ObjectId) {
        self.surrender_calls.lock().unwrap().push((node, object));
    }
}

#[derive(Default)]
pub struct RecordingPeerBus {
    pub surrendered: Mutex<Vec<(AgentId, AgentId, LockId)>>,
    pub relayed: Mutex<Vec<(AgentId, LockStateUpdate)>>,
}

#[async_trait]
impl PeerBus for RecordingPeerBus {
    async fn send_surrendered(&self, to: AgentId, sender: AgentId, lock_id: LockId) {
        self.surrendered.lock().unwrap().push((to, sender, lock_id));
    }

    async fn send_lock_update(&self, to: AgentId, update: LockStateUpdate) {
        self.relayed.lock().unwrap().push((to, update));
    }
}

/// Never fires node events on its own; tests deliver `NodeDown` /
/// `LockServerDown` / `LocksRunning` directly into the agent's mailbox.
#[derive(Default)]
pub struct NoopNodeMonitor;

#[async_trait]
impl NodeMonitor for NoopNodeMonitor {
    async fn monitor_nodes(&self, _sink: channel::Sender<AgentMessage>) {}

    async fn watch_for_restart(&self, _node: NodeId, _sink: channel::Sender<AgentMessage>) {}
}
