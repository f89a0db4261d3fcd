//! Deadlock analyzer. Invoked whenever state changes and `have_all` is
//! false. Wait-for graph nodes are `(agent, LockId)` value pairs kept in
//! flat containers, never owning references: the graph is rebuilt
//! fresh on every invocation from `interesting` + `locks`, so its
//! lifetime is scoped to one analysis pass.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::agent::AgentState;
use crate::error::AgentError;
use crate::ids::AgentId;
use crate::message::Effect;
use crate::types::LockId;

type Node = (AgentId, LockId);

/// Builds the wait-for graph. A node `(A1, O)` exists for every agent
/// `A1` holding `O` at its head, for every interesting lock `O`. An edge
/// `(A1, O) -> (A2, O2)` exists when `A1` holds `O` at its head, `A2`
/// appears anywhere in `O`'s tail, and `A2` itself heads some other
/// interesting lock `O2`, chaining the "A2 is waiting behind A1 on O"
/// relationship into A2's own blocking position, which is what lets a
/// cycle span more than one lock.
fn build_graph(state: &AgentState) -> (BTreeSet<Node>, BTreeMap<Node, BTreeSet<Node>>) {
    let mut nodes = BTreeSet::new();
    for lock_id in &state.interesting {
        if let Some(lock) = state.locks.get(lock_id) {
            for agent in lock.head_agents() {
                nodes.insert((agent, lock_id.clone()));
            }
        }
    }

    let mut edges: BTreeMap<Node, BTreeSet<Node>> = BTreeMap::new();
    for lock_id in &state.interesting {
        let lock = match state.locks.get(lock_id) {
            Some(l) => l,
            None => continue,
        };
        let heads = lock.head_agents();
        let tails = lock.tail_agents();
        for &a1 in &heads {
            for &a2 in &tails {
                if a1 == a2 {
                    continue;
                }
                for held in state.agents_holding.locks_held_by(a2) {
                    if state.interesting.contains(held) {
                        edges
                            .entry((a1, lock_id.clone()))
                            .or_insert_with(BTreeSet::new)
                            .insert((a2, held.clone()));
                    }
                }
            }
        }
    }

    (nodes, edges)
}

/// Iterative Tarjan SCC, returning components in reverse finish-time
/// order (the textbook deterministic order), so "the first cycle" is
/// reproducible across independently computing agents.
fn tarjan_scc(nodes: &BTreeSet<Node>, edges: &BTreeMap<Node, BTreeSet<Node>>) -> Vec<Vec<Node>> {
    struct Frame {
        node: Node,
        neighbor_iter: usize,
    }

    let mut index_counter = 0usize;
    let mut indices: BTreeMap<Node, usize> = BTreeMap::new();
    let mut lowlink: BTreeMap<Node, usize> = BTreeMap::new();
    let mut on_stack: HashSet<Node> = HashSet::new();
    let mut stack: Vec<Node> = Vec::new();
    let mut components: Vec<Vec<Node>> = Vec::new();

    let empty: BTreeSet<Node> = BTreeSet::new();

    for root in nodes {
        if indices.contains_key(root) {
            continue;
        }

        let mut work: Vec<Frame> = vec![Frame {
            node: root.clone(),
            neighbor_iter: 0,
        }];
        indices.insert(root.clone(), index_counter);
        lowlink.insert(root.clone(), index_counter);
        index_counter += 1;
        stack.push(root.clone());
        on_stack.insert(root.clone());

        while let Some(frame) = work.last_mut() {
            let neighbors: Vec<&Node> = edges.get(&frame.node).unwrap_or(&empty).iter().collect();
            if frame.neighbor_iter < neighbors.len() {
                let next = neighbors[frame.neighbor_iter].clone();
                frame.neighbor_iter += 1;
                if !indices.contains_key(&next) {
                    indices.insert(next.clone(), index_counter);
                    lowlink.insert(next.clone(), index_counter);
                    index_counter += 1;
                    stack.push(next.clone());
                    on_stack.insert(next.clone());
                    work.push(Frame {
                        node: next,
                        neighbor_iter: 0,
                    });
                } else if on_stack.contains(&next) {
                    let next_index = indices[&next];
                    let cur = lowlink[&frame.node].min(next_index);
                    lowlink.insert(frame.node.clone(), cur);
                }
            } else {
                let finished = frame.node.clone();
                work.pop();
                if let Some(parent) = work.last() {
                    let child_low = lowlink[&finished];
                    let parent_low = lowlink[&parent.node];
                    lowlink.insert(parent.node.clone(), parent_low.min(child_low));
                }
                if lowlink[&finished] == indices[&finished] {
                    let mut component = Vec::new();
                    loop {
                        let member = stack.pop().expect("scc stack underflow");
                        on_stack.remove(&member);
                        let done = member == finished;
                        component.push(member);
                        if done {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }
    }

    components
}

fn is_nontrivial(component: &[Node], edges: &BTreeMap<Node, BTreeSet<Node>>) -> bool {
    if component.len() > 1 {
        return true;
    }
    if let [only] = component {
        return edges.get(only).map_or(false, |n| n.contains(only));
    }
    false
}

fn involved_agents(state: &AgentState) -> BTreeSet<AgentId> {
    state.agents_holding.distinct_agents()
}

fn interesting_for(state: &AgentState, agent: AgentId, lock_id: &LockId) -> bool {
    let not_in_queue = state
        .locks
        .get(lock_id)
        .map(|lock| !lock.queue.iter().any(|e| e.contains_agent(agent)))
        .unwrap_or(true);
    not_in_queue && state.agents_holding.holds_any(agent)
}

pub fn reevaluate(state: &mut AgentState) -> Vec<Effect> {
    let (nodes, edges) = build_graph(state);
    let components = tarjan_scc(&nodes, &edges);

    let cycle = components.into_iter().find(|c| is_nontrivial(c, &edges));

    match cycle {
        Some(cycle) => resolve_cycle(state, cycle),
        None => relay_informational_snapshots(state),
    }
}

fn resolve_cycle(state: &mut AgentState, cycle: Vec<Node>) -> Vec<Effect> {
    let (victim_agent, victim_object) = cycle
        .into_iter()
        .max_by(|a, b| a.cmp(b))
        .expect("nontrivial component is nonempty");

    if victim_agent != state.id {
        let entry = (victim_agent, victim_object);
        if !state.deadlocks.contains(&entry) {
            state.deadlocks.push(entry);
        }
        return Vec::new();
    }

    let already_claimed = state
        .active_requests
        .iter_ids()
        .filter_map(|id| state.requests.get(&id))
        .any(|req| req.object == victim_object.object && req.claim_no < state.claim_no);

    if state.abort_on_deadlock && already_claimed {
        return vec![Effect::Abort(AgentError::Deadlock(victim_object))];
    }

    perform_surrender(state, victim_object)
}

/// Deletes the victim lock locally, adds it to `sync`, asks the lock
/// server to surrender it, and tells every involved agent not already
/// in that lock's queue (they'll learn via the lock server instead).
pub fn perform_surrender(state: &mut AgentState, lock_id: LockId) -> Vec<Effect> {
    let mut effects = Vec::new();

    let queue_agents: HashSet<AgentId> = state
        .locks
        .get(&lock_id)
        .map(|lock| lock.queue.iter().flat_map(|e| e.agents()).collect())
        .unwrap_or_default();

    if let Some(lock) = state.locks.remove(&lock_id) {
        for agent in lock.head_agents() {
            state.agents_holding.remove(agent, &lock_id);
        }
    }
    state.interesting.remove(&lock_id);
    state.sync.insert(lock_id.clone());

    effects.push(Effect::SendSurrender {
        node: lock_id.node.clone(),
        object: lock_id.object.clone(),
    });

    for agent in involved_agents(state) {
        if !queue_agents.contains(&agent) {
            effects.push(Effect::SendSurrenderedToPeer {
                to: agent,
                lock_id: lock_id.clone(),
            });
        }
    }

    effects
}

fn relay_informational_snapshots(state: &AgentState) -> Vec<Effect> {
    let mut effects = Vec::new();
    for agent in involved_agents(state) {
        if agent <= state.id {
            continue;
        }
        for lock_id in &state.interesting {
            if interesting_for(state, agent, lock_id) {
                if let Some(lock) = state.locks.get(lock_id) {
                    effects.push(Effect::RelayLockUpdate {
                        to: agent,
                        update: crate::types::LockStateUpdate {
                            lock: crate::types::RawLock {
                                object: lock_id.object.clone(),
                                version: lock.version,
                                queue: lock.queue.clone(),
                            },
                            node: lock_id.node.clone(),
                            note: None,
                        },
                    });
                }
            }
        }
    }
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentState, TransactionAgentConfig};
    use crate::ids::ClientId;
    use crate::types::{Entry, Lock, ObjectId, QueueElement};

    fn lock_id(obj: &str, node: &str) -> LockId {
        LockId::new(ObjectId::new(vec![obj]).unwrap(), node.to_string())
    }

    fn write_lock(id: LockId, version: u64, head: AgentId, tail: &[AgentId]) -> Lock {
        let mut queue = vec![QueueElement::Write(Entry { agent: head, version })];
        for &agent in tail {
            queue.push(QueueElement::Write(Entry { agent, version }));
        }
        Lock {
            object_id: id,
            version,
            queue,
        }
    }

    fn ingest_directly(state: &mut AgentState, lock: Lock) {
        for agent in lock.head_agents() {
            state.agents_holding.insert(agent, lock.object_id.clone());
        }
        if lock.queue.len() >= 2 {
            state.interesting.insert(lock.object_id.clone());
        }
        state.locks.insert(lock);
    }

    #[test]
    fn two_agent_cycle_picks_max_agent_as_victim() {
        let mut state = AgentState::new(TransactionAgentConfig::new(ClientId::new()));
        let a1 = AgentId::from_raw(1);
        let a2 = AgentId::from_raw(2);
        state.id = a1;

        let o4 = lock_id("o4", "n1");
        let o5 = lock_id("o5", "n1");
        ingest_directly(&mut state, write_lock(o4.clone(), 1, a1, &[a2]));
        ingest_directly(&mut state, write_lock(o5.clone(), 1, a2, &[a1]));

        let effects = reevaluate(&mut state);
        // a2 > a1, so a1 (self) is not the victim: it just records the
        // deadlock and waits for a2 to surrender.
        assert!(effects.is_empty());
        assert_eq!(state.deadlocks, vec![(a2, o5)]);
        let _ = o4;
    }

    #[test]
    fn self_is_victim_and_surrenders() {
        let mut state = AgentState::new(TransactionAgentConfig::new(ClientId::new()));
        let a1 = AgentId::from_raw(1);
        let a2 = AgentId::from_raw(2);
        state.id = a2;

        let o4 = lock_id("o4", "n1");
        let o5 = lock_id("o5", "n1");
        ingest_directly(&mut state, write_lock(o4.clone(), 1, a1, &[a2]));
        ingest_directly(&mut state, write_lock(o5.clone(), 1, a2, &[a1]));

        let effects = reevaluate(&mut state);
        assert!(effects.iter().any(|e| matches!(e, Effect::SendSurrender { .. })));
        assert!(state.sync.contains(&o5));
        assert!(state.locks.get(&o5).is_none());
        let _ = o4;
    }

    #[test]
    fn no_cycle_means_no_effects_without_other_agents() {
        let mut state = AgentState::new(TransactionAgentConfig::new(ClientId::new()));
        let a1 = AgentId::from_raw(1);
        state.id = a1;
        let o1 = lock_id("o1", "n1");
        ingest_directly(&mut state, write_lock(o1, 1, a1, &[]));
        let effects = reevaluate(&mut state);
        assert!(effects.is_empty());
    }
}
