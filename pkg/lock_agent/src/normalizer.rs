//! Request normalizer. A pure function over
//! `&mut AgentState` plus the caller's `LockSpec`: it has no I/O of its
//! own, only table mutation plus a list of effects for the event loop
//! to carry out. Covered entirely by plain `#[test]`s.

use std::collections::BTreeSet;

use crate::agent::AgentState;
use crate::error::AgentError;
use crate::message::Effect;
use crate::types::{LockSpec, Mode, NodeId, Quorum, Request, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    NoOp,
    Extend { extra_nodes: BTreeSet<NodeId> },
    Upgrade,
    Conflict(AgentError),
    New,
}

pub fn normalize(state: &mut AgentState, spec: LockSpec) -> (NormalizeOutcome, Vec<Effect>) {
    let mut effects = Vec::new();

    let candidate = state
        .pending_requests
        .for_object(&spec.object)
        .iter()
        .chain(state.active_requests.for_object(&spec.object).iter())
        .next()
        .copied();

    let outcome = match candidate {
        Some(existing_id) => match_against_existing(state, existing_id, &spec),
        None => NormalizeOutcome::New,
    };

    match &outcome {
        NormalizeOutcome::NoOp | NormalizeOutcome::Conflict(_) => {}
        NormalizeOutcome::Extend { extra_nodes } => {
            let existing_id = candidate.unwrap();
            extend_request(state, existing_id, extra_nodes, &spec, &mut effects);
        }
        NormalizeOutcome::Upgrade => {
            let existing_id = candidate.unwrap();
            upgrade_request(state, existing_id, &spec, &mut effects);
        }
        NormalizeOutcome::New => {
            create_request(state, &spec, &mut effects);
        }
    }

    (outcome, effects)
}

fn match_against_existing(state: &AgentState, existing_id: RequestId, spec: &LockSpec) -> NormalizeOutcome {
    let existing = state.requests.get(&existing_id).expect("bag/requests desync");

    if existing.mode == spec.mode && existing.require == spec.require {
        if spec.nodes.is_subset(&existing.nodes) {
            return NormalizeOutcome::NoOp;
        }
        let extra_nodes: BTreeSet<NodeId> = spec.nodes.difference(&existing.nodes).cloned().collect();
        return NormalizeOutcome::Extend { extra_nodes };
    }

    if existing.require == spec.require && existing.nodes == spec.nodes {
        if existing.mode == Mode::Write && spec.mode == Mode::Read {
            return NormalizeOutcome::NoOp;
        }
        if existing.mode == Mode::Read && spec.mode == Mode::Write {
            return NormalizeOutcome::Upgrade;
        }
    }

    NormalizeOutcome::Conflict(AgentError::ConflictingRequest {
        object: spec.object.clone(),
        new_nodes: spec.nodes.iter().cloned().collect(),
        old_nodes: existing.nodes.iter().cloned().collect(),
    })
}

fn extend_request(
    state: &mut AgentState,
    existing_id: RequestId,
    extra_nodes: &BTreeSet<NodeId>,
    spec: &LockSpec,
    effects: &mut Vec<Effect>,
) {
    let was_active = state.active_requests.contains(existing_id);
    {
        let existing = state.requests.get_mut(&existing_id).expect("bag/requests desync");
        existing.nodes.extend(extra_nodes.iter().cloned());
    }
    if was_active {
        state.active_requests.remove(&spec.object, existing_id);
        state.pending_requests.insert(spec.object.clone(), existing_id);
        state.have_all = false;
    }
    for node in extra_nodes {
        effects.extend(state.ensure_monitored(node));
        effects.push(Effect::SendLockRequest {
            node: node.clone(),
            object: spec.object.clone(),
            mode: spec.mode,
        });
    }
}

fn upgrade_request(state: &mut AgentState, existing_id: RequestId, spec: &LockSpec, effects: &mut Vec<Effect>) {
    let was_active = state.active_requests.contains(existing_id);
    if was_active {
        state.active_requests.remove(&spec.object, existing_id);
    } else {
        state.pending_requests.remove(&spec.object, existing_id);
    }
    state.requests.remove(&existing_id);

    for lock_id in state.locks.ids_for_object(&spec.object) {
        state.purge_lock(&lock_id);
    }

    create_request(state, spec, effects);
}

fn create_request(state: &mut AgentState, spec: &LockSpec, effects: &mut Vec<Effect>) {
    let id = state.next_request_id();
    let request = Request {
        id,
        object: spec.object.clone(),
        mode: spec.mode,
        nodes: spec.nodes.clone(),
        require: spec.require,
        claim_no: state.claim_no,
    };
    state.requests.insert(id, request);
    state.pending_requests.insert(spec.object.clone(), id);
    state.have_all = false;

    for node in &spec.nodes {
        effects.extend(state.ensure_monitored(node));
        effects.push(Effect::SendLockRequest {
            node: node.clone(),
            object: spec.object.clone(),
            mode: spec.mode,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentState, TransactionAgentConfig};
    use crate::ids::ClientId;
    use crate::types::ObjectId;

    fn spec(object: &str, mode: Mode, nodes: &[&str], require: Quorum) -> LockSpec {
        LockSpec {
            object: ObjectId::new(vec![object]).unwrap(),
            mode,
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            require,
        }
    }

    fn new_state() -> AgentState {
        AgentState::new(TransactionAgentConfig::new(ClientId::new()))
    }

    #[test]
    fn first_request_is_new() {
        let mut state = new_state();
        let (outcome, effects) = normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::All));
        assert_eq!(outcome, NormalizeOutcome::New);
        assert_eq!(effects.len(), 2); // MonitorNode + SendLockRequest
        assert_eq!(state.pending_requests.for_object(&ObjectId::new(vec!["o1"]).unwrap()).len(), 1);
    }

    #[test]
    fn identical_repeat_request_is_a_noop() {
        let mut state = new_state();
        normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::All));
        let (outcome, effects) = normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::All));
        assert_eq!(outcome, NormalizeOutcome::NoOp);
        assert!(effects.is_empty());
    }

    #[test]
    fn write_covers_read() {
        let mut state = new_state();
        normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::All));
        let (outcome, _) = normalize(&mut state, spec("o1", Mode::Read, &["n1"], Quorum::All));
        assert_eq!(outcome, NormalizeOutcome::NoOp);
    }

    #[test]
    fn read_then_write_upgrades() {
        let mut state = new_state();
        normalize(&mut state, spec("o1", Mode::Read, &["n1"], Quorum::All));
        let (outcome, effects) = normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::All));
        assert_eq!(outcome, NormalizeOutcome::Upgrade);
        assert!(effects.iter().any(|e| matches!(e, Effect::SendLockRequest { .. })));
    }

    #[test]
    fn extending_with_extra_nodes() {
        let mut state = new_state();
        normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::All));
        let (outcome, effects) = normalize(&mut state, spec("o1", Mode::Write, &["n1", "n2"], Quorum::All));
        match outcome {
            NormalizeOutcome::Extend { extra_nodes } => {
                assert_eq!(extra_nodes, ["n2".to_string()].into_iter().collect())
            }
            other => panic!("expected Extend, got {:?}", other),
        }
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn differing_require_conflicts() {
        let mut state = new_state();
        normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::All));
        let (outcome, effects) = normalize(&mut state, spec("o1", Mode::Write, &["n1"], Quorum::Any));
        assert!(matches!(outcome, NormalizeOutcome::Conflict(AgentError::ConflictingRequest { .. })));
        assert!(effects.is_empty());
    }
}
