//! Failure & monitor handler.

use crate::agent::AgentState;
use crate::message::Effect;
use crate::types::NodeId;

pub fn handle_client_died(_state: &mut AgentState) -> Vec<Effect> {
    vec![Effect::Terminate]
}

pub fn handle_lock_server_down(state: &mut AgentState, node: NodeId) -> Vec<Effect> {
    if state.down.contains(&node) {
        return Vec::new();
    }
    state.down.insert(node.clone());

    for lock_id in state.locks.ids_on_node(&node) {
        state.purge_lock(&lock_id);
    }

    let affected: Vec<_> = state
        .active_requests
        .iter_ids()
        .filter(|id| {
            state
                .requests
                .get(id)
                .map(|req| req.nodes.contains(&node))
                .unwrap_or(false)
        })
        .collect();
    for id in affected {
        let object = state.requests.get(&id).unwrap().object.clone();
        state.active_requests.remove(&object, id);
        state.pending_requests.insert(object, id);
        state.have_all = false;
    }

    let mut effects = Vec::new();
    if state.await_nodes {
        effects.push(Effect::WatchForRestart(node));
    }
    effects.extend(state.reevaluate());
    effects
}

pub fn handle_node_up(state: &mut AgentState, node: NodeId) -> Vec<Effect> {
    if state.down.contains(&node) {
        vec![Effect::WatchForRestart(node)]
    } else {
        Vec::new()
    }
}

pub fn handle_locks_running(state: &mut AgentState, node: NodeId) -> Vec<Effect> {
    state.down.remove(&node);

    let mut effects = Vec::new();
    for id in state.pending_requests.iter_ids().collect::<Vec<_>>() {
        if let Some(req) = state.requests.get(&id) {
            if req.nodes.contains(&node) {
                effects.push(Effect::SendLockRequest {
                    node: node.clone(),
                    object: req.object.clone(),
                    mode: req.mode,
                });
            }
        }
    }
    effects.extend(state.reevaluate());
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TransactionAgentConfig;
    use crate::ids::ClientId;
    use crate::types::{LockSpec, Mode, Quorum};

    fn new_state() -> AgentState {
        AgentState::new(TransactionAgentConfig::new(ClientId::new()))
    }

    #[test]
    fn lock_server_down_moves_active_requests_back_to_pending() {
        let mut state = new_state();
        let spec = LockSpec {
            object: crate::types::ObjectId::new(vec!["o1"]).unwrap(),
            mode: Mode::Write,
            nodes: ["n1"].iter().map(|s| s.to_string()).collect(),
            require: Quorum::All,
        };
        let (_, _) = crate::normalizer::normalize(&mut state, spec);
        assert!(!state.down.contains("n1"));
        let effects = handle_lock_server_down(&mut state, "n1".to_string());
        assert!(state.down.contains("n1"));
        assert!(effects.iter().any(|e| matches!(e, Effect::Abort(_))));
    }

    #[test]
    fn repeated_down_signal_is_ignored() {
        let mut state = new_state();
        handle_lock_server_down(&mut state, "n1".to_string());
        let effects = handle_lock_server_down(&mut state, "n1".to_string());
        assert!(effects.is_empty());
    }
}
