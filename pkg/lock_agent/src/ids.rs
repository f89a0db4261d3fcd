//! Opaque identifiers for agents and the clients that own them.
//!
//! Deadlock victim selection only needs a total order over agents that
//! every peer computes identically; the id itself doesn't need to mean
//! anything beyond that. We mint one from the OS process id plus a
//! per-process counter: a process-unique value any peer can compare.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(u64);

impl AgentId {
    pub fn new() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let pid = std::process::id() as u64;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed) as u64;
        AgentId((pid << 32) | seq)
    }

    /// Builds an id from a raw value. Meant for tests that need
    /// deterministic, hand-picked ids to exercise victim selection.
    pub fn from_raw(value: u64) -> Self {
        AgentId(value)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{:x}", self.0)
    }
}

/// Identifies the owning client process. Distinct type from [`AgentId`]
/// so a `stop` command can't accidentally be authorized by another agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let pid = std::process::id() as u64;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed) as u64;
        ClientId((pid << 32) | seq)
    }

    pub fn from_raw(value: u64) -> Self {
        ClientId(value)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{:x}", self.0)
    }
}
