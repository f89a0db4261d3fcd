//! Readiness evaluator: what are we still waiting for,
//! and can we still conceivably succeed?

use std::collections::BTreeSet;

use crate::agent::AgentState;
use crate::commands::{AwaitAllStatus, ClientEventPayload, LockOutcome};
use crate::error::AgentError;
use crate::ids::AgentId;
use crate::message::Effect;
use crate::types::{LockId, Mode, NodeId, Quorum, Request, RequestSummary};

impl Quorum {
    /// Is the request satisfied given the nodes currently held?
    pub fn is_satisfied(self, held: &BTreeSet<NodeId>, nodes: &BTreeSet<NodeId>, down: &BTreeSet<NodeId>) -> bool {
        match self {
            Quorum::All => nodes.iter().all(|n| held.contains(n)),
            Quorum::Any => nodes.iter().any(|n| held.contains(n)),
            Quorum::Majority => held.len() * 2 > nodes.len(),
            Quorum::MajorityAlive => {
                let alive = nodes.difference(down).count();
                held.len() * 2 > alive
            }
        }
    }

    /// Could this request still conceivably succeed, assuming every
    /// reachable node eventually grants it?
    pub fn is_servable(self, nodes: &BTreeSet<NodeId>, down: &BTreeSet<NodeId>) -> bool {
        let reachable: BTreeSet<NodeId> = nodes.difference(down).cloned().collect();
        self.is_satisfied(&reachable, nodes, down)
    }
}

/// Nodes on which `state` currently holds `object` with a mode covering
/// `mode`, restricted to `nodes`.
fn held_nodes(state: &AgentState, object: &crate::types::ObjectId, mode: Mode, nodes: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
    nodes
        .iter()
        .filter(|node| {
            let lock_id = LockId::new(object.clone(), (*node).clone());
            state
                .locks
                .get(&lock_id)
                .map(|lock| {
                    lock.head()
                        .map(|head| {
                            head.contains_agent(state.id)
                                && head_mode(head).map_or(false, |held_mode| held_mode.covers(mode))
                        })
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

fn head_mode(head: &crate::types::QueueElement) -> Option<Mode> {
    match head {
        crate::types::QueueElement::Read(_) => Some(Mode::Read),
        crate::types::QueueElement::Write(_) => Some(Mode::Write),
    }
}

fn request_satisfied(state: &AgentState, req: &Request) -> bool {
    let held = held_nodes(state, &req.object, req.mode, &req.nodes);
    req.require.is_satisfied(&held, &req.nodes, &state.down)
}

fn request_servable(state: &AgentState, req: &Request) -> bool {
    state.await_nodes || req.require.is_servable(&req.nodes, &state.down)
}

/// Sweeps `pending_requests`, promoting satisfied ones to
/// `active_requests`, transitioning to `have_all` once nothing remains
/// pending, and aborting if anything has become unservable.
pub fn reevaluate(state: &mut AgentState) -> Vec<Effect> {
    let mut effects = Vec::new();

    let pending_ids: Vec<_> = state.pending_requests.iter_ids().collect();
    let mut unservable = Vec::new();
    for id in pending_ids {
        let req = match state.requests.get(&id) {
            Some(r) => r.clone(),
            None => continue,
        };
        if request_satisfied(state, &req) {
            state.pending_requests.remove(&req.object, id);
            state.active_requests.insert(req.object.clone(), id);
        } else if !request_servable(state, &req) {
            unservable.push(RequestSummary::from(&req));
        }
    }

    if !unservable.is_empty() {
        effects.push(Effect::Abort(AgentError::CannotLockObjects(unservable)));
        return effects;
    }

    if state.pending_requests.is_empty() && !state.have_all && !state.requests.is_empty() {
        state.have_all = true;
        state.claim_no += 1;
        let deadlocks = state.deadlocks.clone();
        effects.extend(pop_await_all_notifiers(state, deadlocks));
    }

    effects
}

fn pop_await_all_notifiers(state: &mut AgentState, deadlocks: Vec<(AgentId, LockId)>) -> Vec<Effect> {
    let mut remaining = Vec::new();
    for notifier in state.notify.drain(..) {
        match notifier {
            crate::agent::Notifier::AwaitAll(reply) => {
                let _ = reply.try_send(AwaitAllStatus::HaveAll(deadlocks.clone()));
            }
            crate::agent::Notifier::AwaitAllLock(reply) => {
                let _ = reply.try_send(Ok(LockOutcome::HaveAll(deadlocks.clone())));
            }
            crate::agent::Notifier::Events(sink) => {
                let _ = sink.try_send((state.id, ClientEventPayload::HaveAllLocks(deadlocks.clone())));
                remaining.push(crate::agent::Notifier::Events(sink));
            }
        }
    }
    state.notify = remaining;
    Vec::new()
}

/// Synchronous status for `await_all_locks`: resolved immediately for
/// the `NoLocks`/`HaveAll`/`CannotServe` cases; the `Waiting` case is
/// returned implicitly by not replying yet; the caller registers a
/// notifier instead.
pub fn await_all_status(state: &AgentState) -> Option<AwaitAllStatus> {
    if state.requests.is_empty() {
        return Some(AwaitAllStatus::NoLocks);
    }
    let unservable: Vec<RequestSummary> = state
        .pending_requests
        .iter_ids()
        .filter_map(|id| state.requests.get(&id))
        .filter(|req| !request_servable(state, req))
        .map(RequestSummary::from)
        .collect();
    if !unservable.is_empty() {
        return Some(AwaitAllStatus::CannotServe(unservable));
    }
    if state.pending_requests.is_empty() {
        return Some(AwaitAllStatus::HaveAll(state.deadlocks.clone()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_requires_every_node_held() {
        let nodes: BTreeSet<NodeId> = ["n1", "n2"].iter().map(|s| s.to_string()).collect();
        let held: BTreeSet<NodeId> = ["n1"].iter().map(|s| s.to_string()).collect();
        let down = BTreeSet::new();
        assert!(!Quorum::All.is_satisfied(&held, &nodes, &down));
        let held_all: BTreeSet<NodeId> = nodes.clone();
        assert!(Quorum::All.is_satisfied(&held_all, &nodes, &down));
    }

    #[test]
    fn majority_alive_accounts_for_down_nodes() {
        let nodes: BTreeSet<NodeId> = ["n1", "n2", "n3", "n4", "n5"].iter().map(|s| s.to_string()).collect();
        let down: BTreeSet<NodeId> = ["n2", "n3"].iter().map(|s| s.to_string()).collect();
        let held: BTreeSet<NodeId> = ["n1", "n4"].iter().map(|s| s.to_string()).collect();
        // 2 of 5 nodes isn't a majority of the full set...
        assert!(!Quorum::Majority.is_satisfied(&held, &nodes, &down));
        // ...but it is a majority of the 3 nodes still alive.
        assert!(Quorum::MajorityAlive.is_satisfied(&held, &nodes, &down));
    }

    #[test]
    fn unservable_when_down_nodes_exceed_quorum_tolerance() {
        let nodes: BTreeSet<NodeId> = ["n1", "n2"].iter().map(|s| s.to_string()).collect();
        let down: BTreeSet<NodeId> = ["n1", "n2"].iter().map(|s| s.to_string()).collect();
        assert!(!Quorum::All.is_servable(&nodes, &down));
        assert!(!Quorum::Any.is_servable(&nodes, &down));
    }
}
