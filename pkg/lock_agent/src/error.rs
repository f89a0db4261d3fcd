//! Agent-visible error kinds, declared the way
//! `common::bits::BitIoError` is: a plain enum, one `#[fail(display)]`
//! arm per variant.

use crate::ids::{AgentId, ClientId};
use crate::types::{LockId, NodeId, ObjectId, RequestSummary};

#[derive(Debug, Clone, Fail)]
pub enum AgentError {
    /// No lock server was reachable on `NodeId` when the agent tried to
    /// establish it (the external lock-server-presence signal this
    /// carries is produced by the `NodeMonitor`/`LockServerClient`
    /// collaborators, whose internals this crate does not own).
    #[fail(display = "no lock server running on node {}", _0)]
    NotRunning(NodeId),

    #[fail(
        display = "conflicting request for object {}: new nodes {:?} vs existing {:?}",
        object, new_nodes, old_nodes
    )]
    ConflictingRequest {
        object: ObjectId,
        new_nodes: Vec<NodeId>,
        old_nodes: Vec<NodeId>,
    },

    #[fail(display = "cannot surrender object {} to agent {}", object, other_agent)]
    CannotSurrender { object: ObjectId, other_agent: AgentId },

    #[fail(display = "cannot lock objects: {:?}", _0)]
    CannotLockObjects(Vec<RequestSummary>),

    #[fail(display = "deadlock: aborted as victim for lock {}", _0)]
    Deadlock(LockId),

    #[fail(display = "illegal lock pattern: {}", _0)]
    IllegalLockPattern(String),

    /// `stop` issued by a client other than the one that started the
    /// transaction; only the owning client may invoke it.
    #[fail(display = "stop issued by non-owning client {}", _0)]
    NotOwner(ClientId),
}

impl From<AgentError> for common::errors::Error {
    fn from(err: AgentError) -> Self {
        common::errors::format_err!("{}", err)
    }
}
