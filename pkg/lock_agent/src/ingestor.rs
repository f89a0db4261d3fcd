//! Lock-state ingestor: applies a received lock snapshot,
//! updates holder indices, maintains the `interesting` set.

use std::collections::HashSet;

use crate::agent::{AgentState, IgnoredReason};
use crate::commands::ClientEventPayload;
use crate::ids::AgentId;
use crate::message::Effect;
use crate::types::{Lock, LockId, LockStateUpdate};

pub fn ingest(state: &mut AgentState, update: LockStateUpdate) -> Vec<Effect> {
    // Step 1: form the full LockId from the wire-level object + node.
    let lock_id = LockId::new(update.lock.object.clone(), update.node.clone());

    // Step 2: process the note.
    if let Some(note) = update.note {
        if note.agent == state.id {
            state.sync.remove(&lock_id);
        } else {
            state.deadlocks.push((note.agent, lock_id.clone()));
        }
    }

    // Step 3: outdated check.
    let previous = state.locks.get(&lock_id);
    if Lock::is_outdated(previous, update.lock.version) {
        eprintln!(
            "lock_agent: ignoring outdated lock snapshot for {} (version {} <= {})",
            lock_id,
            update.lock.version,
            previous.map(|l| l.version).unwrap_or(0)
        );
        state.last_ignored = Some(IgnoredReason::Outdated);
        return Vec::new();
    }

    // Step 4: a surrender we initiated is still pending confirmation.
    if state.sync.contains(&lock_id) {
        eprintln!("lock_agent: ignoring lock snapshot for {}; surrender pending", lock_id);
        state.last_ignored = Some(IgnoredReason::SurrenderPending);
        return Vec::new();
    }

    // Step 5: recompute holders, replace the snapshot, update `interesting`.
    let raw_for_event = update.lock.clone();
    let node_for_event = update.node.clone();
    let new_lock = Lock::from_raw(update.lock, update.node);
    let old_heads: HashSet<AgentId> = previous.map(|l| l.head_agents().into_iter().collect()).unwrap_or_default();
    let new_heads: HashSet<AgentId> = new_lock.head_agents().into_iter().collect();

    for agent in old_heads.difference(&new_heads) {
        state.agents_holding.remove(*agent, &lock_id);
    }
    for agent in new_heads.difference(&old_heads) {
        state.agents_holding.insert(*agent, lock_id.clone());
    }

    let interesting_now = new_lock.queue.len() >= 2;
    state.locks.insert(new_lock);
    state.sync.remove(&lock_id);
    if interesting_now {
        state.interesting.insert(lock_id.clone());
    } else {
        state.interesting.remove(&lock_id);
    }
    state.snapshots_ingested += 1;

    state.notify_event(ClientEventPayload::LockUpdate(LockStateUpdate {
        lock: raw_for_event,
        node: node_for_event,
        note: None,
    }));

    // Step 6: readiness, then deadlock analysis.
    state.reevaluate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TransactionAgentConfig;
    use crate::ids::ClientId;
    use crate::types::{Entry, ObjectId, QueueElement, RawLock};

    fn new_state() -> AgentState {
        AgentState::new(TransactionAgentConfig::new(ClientId::new()))
    }

    fn update(object: &str, node: &str, version: u64, queue: Vec<QueueElement>) -> LockStateUpdate {
        LockStateUpdate {
            lock: RawLock {
                object: ObjectId::new(vec![object]).unwrap(),
                version,
                queue,
            },
            node: node.to_string(),
            note: None,
        }
    }

    #[test]
    fn single_holder_lock_grants_immediately() {
        let mut state = new_state();
        let a1 = state.id;
        let entry = Entry { agent: a1, version: 1 };
        ingest(&mut state, update("o1", "n1", 1, vec![QueueElement::Write(entry)]));
        assert!(state.agents_holding.holds_any(a1));
        assert!(!state.interesting.contains(&LockId::new(ObjectId::new(vec!["o1"]).unwrap(), "n1".to_string())));
    }

    #[test]
    fn outdated_snapshot_is_dropped() {
        let mut state = new_state();
        let a1 = state.id;
        let entry = Entry { agent: a1, version: 1 };
        ingest(&mut state, update("o1", "n1", 2, vec![QueueElement::Write(entry)]));
        let before = state.locks.get(&LockId::new(ObjectId::new(vec!["o1"]).unwrap(), "n1".to_string())).cloned();
        ingest(&mut state, update("o1", "n1", 1, vec![QueueElement::Write(entry)]));
        let after = state.locks.get(&LockId::new(ObjectId::new(vec!["o1"]).unwrap(), "n1".to_string())).cloned();
        assert_eq!(before, after);
        assert_eq!(state.last_ignored, Some(IgnoredReason::Outdated));
    }

    #[test]
    fn two_element_queue_is_interesting() {
        let mut state = new_state();
        let a1 = AgentId::from_raw(1);
        let a2 = AgentId::from_raw(2);
        let queue = vec![
            QueueElement::Write(Entry { agent: a1, version: 1 }),
            QueueElement::Write(Entry { agent: a2, version: 1 }),
        ];
        ingest(&mut state, update("o1", "n1", 1, queue));
        assert!(state.interesting.contains(&LockId::new(ObjectId::new(vec!["o1"]).unwrap(), "n1".to_string())));
    }
}
