//! Client interface. Each command that expects a reply carries a
//! `channel::Sender<T>` used exactly once as a reply token; `common`
//! has no dedicated oneshot type, so, like `http`'s endpoint code, a
//! `channel::Sender<T>` used once stands in for one.

use std::collections::BTreeSet;

use common::async_std::channel;

use crate::error::AgentError;
use crate::ids::{AgentId, ClientId};
use crate::types::{LockId, LockSpec, Mode, NodeId, ObjectId, Quorum, RequestSummary};

/// Result of a `lock`/`lock_objects` entry. `Accepted` is the nowait
/// happy path; `HaveAll` is what a blocking `lock(..., wait)` resolves
/// to once every one of its requests is satisfied.
#[derive(Debug, Clone)]
pub enum LockOutcome {
    Accepted,
    HaveAll(Vec<(AgentId, LockId)>),
}

#[derive(Debug, Clone)]
pub enum AwaitAllStatus {
    NoLocks,
    HaveAll(Vec<(AgentId, LockId)>),
    CannotServe(Vec<RequestSummary>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFlag {
    AbortOnDeadlock,
    AwaitNodes,
    Notify,
}

#[derive(Debug, Clone)]
pub struct LockSummary {
    pub version: u64,
    pub queue_len: usize,
    pub interesting: bool,
}

/// A snapshot of pending requests and the locks tables, for
/// introspection.
#[derive(Debug, Clone)]
pub struct LockInfo {
    pub have_all: bool,
    pub claim_no: u64,
    pub pending: Vec<(ObjectId, RequestSummary)>,
    pub active: Vec<(ObjectId, RequestSummary)>,
    pub locks: Vec<(LockId, LockSummary)>,
    pub deadlocks: Vec<(AgentId, LockId)>,
}

/// Payload delivered to a client that registered for persistent event
/// notifications (`notify`), tagged with this agent's id so a client
/// watching several agents can tell them apart.
#[derive(Debug, Clone)]
pub enum ClientEventPayload {
    LockUpdate(crate::types::LockStateUpdate),
    HaveAllLocks(Vec<(AgentId, LockId)>),
}

pub type ClientEvent = (AgentId, ClientEventPayload);

#[derive(Debug)]
pub enum ClientCommand {
    Lock {
        spec: LockSpec,
        wait: bool,
        reply: channel::Sender<Result<LockOutcome, AgentError>>,
    },
    LockObjects {
        specs: Vec<LockSpec>,
        reply: channel::Sender<Vec<Result<LockOutcome, AgentError>>>,
    },
    SurrenderNowait {
        object: ObjectId,
        other_agent: AgentId,
        nodes: BTreeSet<NodeId>,
        reply: channel::Sender<Result<(), AgentError>>,
    },
    AwaitAllLocks {
        reply: channel::Sender<AwaitAllStatus>,
    },
    ChangeFlag {
        flag: ConfigFlag,
        value: bool,
        events_sink: Option<channel::Sender<ClientEvent>>,
        reply: channel::Sender<()>,
    },
    LockInfo {
        reply: channel::Sender<LockInfo>,
    },
    Stop {
        client: ClientId,
        reply: channel::Sender<Result<(), AgentError>>,
    },
}

/// A single entry of a `lock_objects` batch. `require` is mandatory (it
/// is a field of `LockSpec`, not optional): the type system prevents
/// the field from being absent in the first place, and `lock_objects`
/// additionally rejects the one remaining illegal shape (a spec
/// naming zero nodes) with `AgentError::IllegalLockPattern`.
pub fn validate_lock_spec(spec: &LockSpec) -> Result<(), AgentError> {
    if spec.nodes.is_empty() {
        return Err(AgentError::IllegalLockPattern(format!(
            "lock spec for {} names zero nodes",
            spec.object
        )));
    }
    Ok(())
}

pub fn lock_spec(object: ObjectId, mode: Mode, nodes: BTreeSet<NodeId>, require: Quorum) -> LockSpec {
    LockSpec {
        object,
        mode,
        nodes,
        require,
    }
}
