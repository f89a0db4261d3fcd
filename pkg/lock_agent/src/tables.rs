//! Indexed tables. All four are owned exclusively by the single
//! `AgentState` that holds them; no concurrent access, so plain
//! in-memory containers are enough.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::ids::AgentId;
use crate::types::{Lock, LockId, NodeId, ObjectId, Request, RequestId};

/// `locks`: ordered by `(object, node)` so iteration is deterministic,
/// needed for reproducible victim selection and for tests.
#[derive(Debug, Default)]
pub struct LocksTable {
    locks: BTreeMap<LockId, Lock>,
}

impl LocksTable {
    pub fn get(&self, id: &LockId) -> Option<&Lock> {
        self.locks.get(id)
    }

    pub fn insert(&mut self, lock: Lock) {
        self.locks.insert(lock.object_id.clone(), lock);
    }

    pub fn remove(&mut self, id: &LockId) -> Option<Lock> {
        self.locks.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LockId, &Lock)> {
        self.locks.iter()
    }

    /// All `LockId`s resident on `node`. A linear scan, acceptable at the
    /// scale this table runs at (bounded by one agent's in-flight locks).
    pub fn ids_on_node(&self, node: &NodeId) -> Vec<LockId> {
        self.locks
            .keys()
            .filter(|id| &id.node == node)
            .cloned()
            .collect()
    }

    /// All `LockId`s for `object`, across every node. Used by the
    /// upgrade path, which purges snapshots for the object on *all*
    /// nodes.
    pub fn ids_for_object(&self, object: &ObjectId) -> Vec<LockId> {
        self.locks
            .keys()
            .filter(|id| &id.object == object)
            .cloned()
            .collect()
    }
}

/// `agents_holding`: `(agent, LockId)` pairs. Ordered by agent first so
/// "does A hold anything?" is a successor lookup, not a scan.
#[derive(Debug, Default)]
pub struct AgentsHolding {
    entries: BTreeSet<(AgentId, LockId)>,
}

impl AgentsHolding {
    pub fn insert(&mut self, agent: AgentId, lock_id: LockId) {
        self.entries.insert((agent, lock_id));
    }

    pub fn remove(&mut self, agent: AgentId, lock_id: &LockId) {
        self.entries.remove(&(agent, lock_id.clone()));
    }

    pub fn holds_any(&self, agent: AgentId) -> bool {
        self.entries
            .range((agent, LockId::min_sentinel())..)
            .next()
            .map(|(a, _)| *a == agent)
            .unwrap_or(false)
    }

    /// All locks held by `agent`, in `LockId` order.
    pub fn locks_held_by<'a>(&'a self, agent: AgentId) -> impl Iterator<Item = &'a LockId> + 'a {
        self.entries
            .range((agent, LockId::min_sentinel())..)
            .take_while(move |(a, _)| *a == agent)
            .map(|(_, l)| l)
    }

    /// Distinct agents present anywhere in this table.
    pub fn distinct_agents(&self) -> BTreeSet<AgentId> {
        self.entries.iter().map(|(a, _)| *a).collect()
    }
}

/// Backs both `active_requests` and `pending_requests`: a bag keyed by
/// object, holding the ids of the requests touching it. The request
/// bodies themselves live in `AgentState::requests`.
#[derive(Debug, Default)]
pub struct RequestBag {
    by_object: HashMap<ObjectId, Vec<RequestId>>,
    ids: HashSet<RequestId>,
}

impl RequestBag {
    pub fn insert(&mut self, object: ObjectId, id: RequestId) {
        self.by_object.entry(object).or_insert_with(Vec::new).push(id);
        self.ids.insert(id);
    }

    pub fn remove(&mut self, object: &ObjectId, id: RequestId) {
        if let Some(ids) = self.by_object.get_mut(object) {
            ids.retain(|i| *i != id);
            if ids.is_empty() {
                self.by_object.remove(object);
            }
        }
        self.ids.remove(&id);
    }

    pub fn for_object(&self, object: &ObjectId) -> &[RequestId] {
        self.by_object.get(object).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.ids.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_id(obj: &str, node: &str) -> LockId {
        LockId::new(ObjectId::new(vec![obj]).unwrap(), node.to_string())
    }

    #[test]
    fn holds_any_is_a_successor_lookup() {
        let mut table = AgentsHolding::default();
        let a1 = AgentId::from_raw(1);
        let a2 = AgentId::from_raw(2);
        assert!(!table.holds_any(a1));
        table.insert(a1, lock_id("o1", "n1"));
        assert!(table.holds_any(a1));
        assert!(!table.holds_any(a2));
        table.remove(a1, &lock_id("o1", "n1"));
        assert!(!table.holds_any(a1));
    }

    #[test]
    fn request_bag_tracks_membership_by_object() {
        let mut bag = RequestBag::default();
        let obj = ObjectId::new(vec!["o1"]).unwrap();
        let id = RequestId(1);
        assert!(bag.is_empty());
        bag.insert(obj.clone(), id);
        assert!(bag.contains(id));
        assert_eq!(bag.for_object(&obj), &[id]);
        bag.remove(&obj, id);
        assert!(bag.is_empty());
        assert!(bag.for_object(&obj).is_empty());
    }
}
