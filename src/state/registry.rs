//! `StateRegistry`: owns every live state, indexed by id.

use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};
use crate::event::EventKind;

use super::id::StateId;
use super::node::StateNode;

/// Sole owner of live states.
///
/// States reach each other (and the engine reaches them) only through
/// their ids. Iteration is in id order, which is creation order.
pub struct StateRegistry<K: EventKind> {
    states: BTreeMap<StateId, StateNode<K>>,
    next_id: u64,
}

impl<K: EventKind> StateRegistry<K> {
    pub fn new() -> Self {
        StateRegistry {
            states: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Reserve the next id. IDs are never reused.
    pub(crate) fn allocate(&mut self) -> StateId {
        let id = StateId::new(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, node: StateNode<K>) {
        self.states.insert(node.id, node);
    }

    pub fn get(&self, id: StateId) -> SimResult<&StateNode<K>> {
        self.states.get(&id).ok_or(SimError::StateNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: StateId) -> SimResult<&mut StateNode<K>> {
        self.states.get_mut(&id).ok_or(SimError::StateNotFound(id))
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.states.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// All registered ids in creation order.
    pub fn ids(&self) -> Vec<StateId> {
        self.states.keys().copied().collect()
    }

    /// States without a parent, in creation order.
    pub fn top_level(&self) -> Vec<StateId> {
        self.states
            .values()
            .filter(|node| node.parent.is_none())
            .map(|node| node.id)
            .collect()
    }

    /// Number of states in the subtree rooted at `id`, itself included.
    pub fn subtree_size(&self, id: StateId) -> SimResult<usize> {
        let mut size = 1;
        for child in self.get(id)?.children() {
            size += self.subtree_size(child)?;
        }
        Ok(size)
    }

    /// Remove `id` and all its descendants, children first.
    ///
    /// Only the entries are dropped; running exit behavior beforehand is
    /// the engine's job. Returns the number of states removed.
    pub(crate) fn remove_subtree(&mut self, id: StateId) -> SimResult<usize> {
        let mut removed = 0;
        for child in self.get(id)?.children() {
            removed += self.remove_subtree(child)?;
        }
        self.states.remove(&id);
        Ok(removed + 1)
    }
}

impl<K: EventKind> Default for StateRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::behavior::Passive;
    use crate::state::node::{ParallelState, Variant};

    fn leaf(reg: &mut StateRegistry<u8>, parent: Option<StateId>) -> StateId {
        let id = reg.allocate();
        reg.insert(StateNode::new(id, parent, "Leaf", Box::new(Passive), Variant::Atomic));
        id
    }

    fn group(reg: &mut StateRegistry<u8>, id: StateId, children: &[StateId]) {
        let mut par = ParallelState::default();
        par.children.extend(children.iter().copied());
        reg.insert(StateNode::new(id, None, "Group", Box::new(Passive), Variant::Parallel(par)));
    }

    #[test]
    fn test_ids_are_sequential_and_not_reused() {
        let mut reg = StateRegistry::new();
        let a = leaf(&mut reg, None);
        let b = leaf(&mut reg, None);
        assert_eq!((a.raw(), b.raw()), (0, 1));
        reg.remove_subtree(b).unwrap();
        let c = leaf(&mut reg, None);
        assert_eq!(c.raw(), 2);
        assert_eq!(reg.top_level(), vec![a, c]);
    }

    #[test]
    fn test_lookup_miss() {
        let reg: StateRegistry<u8> = StateRegistry::new();
        assert_eq!(
            reg.get(StateId::new(3)).err(),
            Some(SimError::StateNotFound(StateId::new(3)))
        );
    }

    #[test]
    fn test_recursive_removal_counts_subtree() {
        let mut reg = StateRegistry::new();
        let root = reg.allocate();
        let inner = reg.allocate();
        let a = leaf(&mut reg, Some(inner));
        let b = leaf(&mut reg, Some(inner));
        group(&mut reg, inner, &[a, b]);
        let c = leaf(&mut reg, Some(root));
        group(&mut reg, root, &[inner, c]);
        let other = leaf(&mut reg, None);

        assert_eq!(reg.len(), 6);
        assert_eq!(reg.subtree_size(root).unwrap(), 5);
        assert_eq!(reg.remove_subtree(root).unwrap(), 5);
        assert_eq!(reg.ids(), vec![other]);
    }
}
