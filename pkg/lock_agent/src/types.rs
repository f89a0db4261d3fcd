//! Core data model: lock identity, queue shape, requests.

use std::collections::BTreeSet;
use std::fmt;

use common::errors::{format_err, Result};

use crate::ids::AgentId;

pub type NodeId = String;

/// A nonempty ordered sequence of name components: a hierarchical key
/// naming the thing being locked, independent of which node holds it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Vec<String>);

impl ObjectId {
    pub fn new<I, S>(components: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();
        if components.is_empty() {
            return Err(format_err!("object id must have at least one component"));
        }
        Ok(ObjectId(components))
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// `(object, node)`: the unit of locking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId {
    pub object: ObjectId,
    pub node: NodeId,
}

impl LockId {
    pub fn new(object: ObjectId, node: NodeId) -> Self {
        Self { object, node }
    }

    /// Lexicographically smallest possible `LockId`. Used only as a range
    /// bound for the `agents_holding` successor lookup; never inserted
    /// into a table.
    pub(crate) fn min_sentinel() -> Self {
        LockId {
            object: ObjectId(Vec::new()),
            node: NodeId::new(),
        }
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.object, self.node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Read,
    Write,
}

impl Mode {
    /// A write holder satisfies a read waiter from the same agent.
    pub fn covers(self, requested: Mode) -> bool {
        match (self, requested) {
            (Mode::Write, _) => true,
            (Mode::Read, Mode::Read) => true,
            (Mode::Read, Mode::Write) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quorum {
    All,
    Any,
    Majority,
    MajorityAlive,
}

/// A participant in a lock's queue, stamped with the version the lock
/// server assigned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub agent: AgentId,
    pub version: u64,
}

/// Either a read group (granted concurrently) or a single exclusive
/// write entry. Elements of a lock's queue are ordered; the head is the
/// currently-granted group. Modeled as a tagged variant rather than
/// subclassing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueElement {
    Read(Vec<Entry>),
    Write(Entry),
}

impl QueueElement {
    pub fn agents(&self) -> Vec<AgentId> {
        match self {
            QueueElement::Read(entries) => entries.iter().map(|e| e.agent).collect(),
            QueueElement::Write(entry) => vec![entry.agent],
        }
    }

    pub fn contains_agent(&self, agent: AgentId) -> bool {
        match self {
            QueueElement::Read(entries) => entries.iter().any(|e| e.agent == agent),
            QueueElement::Write(entry) => entry.agent == agent,
        }
    }
}

/// The wire shape of a lock snapshot as emitted by a lock server: the
/// `object` hasn't been combined with the originating node into a full
/// `LockId` yet (that happens in the ingestor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLock {
    pub object: ObjectId,
    pub version: u64,
    pub queue: Vec<QueueElement>,
}

/// `{object_id: LockId, version, queue}`, stored once the ingestor has
/// combined the wire snapshot with its originating node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub object_id: LockId,
    pub version: u64,
    pub queue: Vec<QueueElement>,
}

impl Lock {
    pub fn from_raw(raw: RawLock, node: NodeId) -> Self {
        Lock {
            object_id: LockId::new(raw.object, node),
            version: raw.version,
            queue: raw.queue,
        }
    }

    pub fn head(&self) -> Option<&QueueElement> {
        self.queue.first()
    }

    pub fn head_agents(&self) -> Vec<AgentId> {
        self.head().map(|e| e.agents()).unwrap_or_default()
    }

    pub fn tail_agents(&self) -> Vec<AgentId> {
        self.queue.iter().skip(1).flat_map(|e| e.agents()).collect()
    }

    /// A received lock is outdated iff its version is not strictly newer
    /// than the currently-stored one for the same `LockId`.
    pub fn is_outdated(stored: Option<&Lock>, new_version: u64) -> bool {
        stored.map_or(false, |s| new_version <= s.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub(crate) u64);

/// `{object, mode, nodes, require, claim_no}`.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub object: ObjectId,
    pub mode: Mode,
    pub nodes: BTreeSet<NodeId>,
    pub require: Quorum,
    pub claim_no: u64,
}

/// A client-facing summary of a request, used for error payloads and
/// `lock_info` introspection.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub object: ObjectId,
    pub mode: Mode,
    pub nodes: Vec<NodeId>,
    pub require: Quorum,
}

impl From<&Request> for RequestSummary {
    fn from(req: &Request) -> Self {
        RequestSummary {
            object: req.object.clone(),
            mode: req.mode,
            nodes: req.nodes.iter().cloned().collect(),
            require: req.require,
        }
    }
}

/// The caller-supplied shape of a `lock`/`lock_objects` request, before
/// it has been compared against existing requests by the normalizer.
#[derive(Debug, Clone)]
pub struct LockSpec {
    pub object: ObjectId,
    pub mode: Mode,
    pub nodes: BTreeSet<NodeId>,
    pub require: Quorum,
}

/// `{surrender, agent}` attached to a `LockStateUpdate`: either our own
/// surrender being confirmed, or another agent's.
#[derive(Debug, Clone, Copy)]
pub struct SurrenderNote {
    pub agent: AgentId,
}

#[derive(Debug, Clone)]
pub struct LockStateUpdate {
    pub lock: RawLock,
    pub node: NodeId,
    pub note: Option<SurrenderNote>,
}
