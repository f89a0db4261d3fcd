//! The agent's single mailbox message type and the effects its handlers
//! emit. Every external source (client commands, lock-server
//! snapshots, node monitor, the `locks_running` watcher) funnels into
//! one `common::async_std::channel::Sender<AgentMessage>` clone; there
//! is no `select!` across separate channels, every message is
//! delivered sequentially through one incoming queue.

use crate::commands::ClientCommand;
use crate::error::AgentError;
use crate::ids::AgentId;
use crate::types::{LockId, LockStateUpdate, Mode, NodeId, ObjectId};

#[derive(Debug)]
pub enum AgentMessage {
    Client(ClientCommand),
    LockUpdate(LockStateUpdate),
    PeerSurrendered { sender: AgentId, lock_id: LockId },
    PeerLockUpdate(LockStateUpdate),
    NodeUp(NodeId),
    NodeDown(NodeId),
    LockServerDown(NodeId),
    LocksRunning(NodeId),
    ClientDied,
}

/// A handler never performs I/O itself; it returns the list of
/// non-blocking sends the event loop should perform afterward.
#[derive(Debug)]
pub enum Effect {
    SendLockRequest {
        node: NodeId,
        object: ObjectId,
        mode: Mode,
    },
    SendSurrender {
        node: NodeId,
        object: ObjectId,
    },
    SendSurrenderedToPeer {
        to: AgentId,
        lock_id: LockId,
    },
    RelayLockUpdate {
        to: AgentId,
        update: LockStateUpdate,
    },
    MonitorNode(NodeId),
    WatchForRestart(NodeId),
    Abort(AgentError),
    Terminate,
}
