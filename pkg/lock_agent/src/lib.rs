//! The Transaction Agent of a distributed lock coordination system: a
//! per-client orchestrator that requests locks from per-node lock
//! servers, tracks their evolving state, detects deadlocks involving
//! peer agents, and resolves them by surrendering a contested lock or
//! aborting.

#[macro_use]
extern crate common;

mod agent;
mod commands;
mod deadlock;
mod error;
mod external;
mod ids;
mod ingestor;
mod message;
mod normalizer;
mod readiness;
mod recovery;
mod tables;
mod types;

pub mod testing;

pub use agent::{AgentHandle, AgentState, IgnoredReason, Notifier, TransactionAgent, TransactionAgentConfig};
pub use commands::{
    lock_spec, validate_lock_spec, AwaitAllStatus, ClientCommand, ClientEvent, ClientEventPayload, ConfigFlag,
    LockInfo, LockOutcome, LockSummary,
};
pub use error::AgentError;
pub use external::{LockServerClient, NodeMonitor, PeerBus};
pub use ids::{AgentId, ClientId};
pub use message::{AgentMessage, Effect};
pub use normalizer::NormalizeOutcome;
pub use types::{
    Entry, Lock, LockId, LockSpec, LockStateUpdate, Mode, NodeId, ObjectId, QueueElement, Quorum, RawLock, Request,
    RequestId, RequestSummary, SurrenderNote,
};
