//! `StateNode`: one live state and its variant payload.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::clock::ClockId;
use crate::event::EventKind;

use super::behavior::Behavior;
use super::id::StateId;
use super::spec::{CompositeSpec, StateKind};

/// Children of a composite, its table, and which child is current.
pub(crate) struct CompositeState<K: EventKind> {
    pub(crate) spec: Rc<CompositeSpec<K>>,
    /// Child instances in declaration order; index 0 is the initial state.
    pub(crate) children: Vec<(&'static str, StateId)>,
    pub(crate) current: usize,
}

impl<K: EventKind> CompositeState<K> {
    pub(crate) fn new(spec: Rc<CompositeSpec<K>>, children: Vec<(&'static str, StateId)>) -> Self {
        CompositeState {
            spec,
            children,
            current: 0,
        }
    }

    pub(crate) fn initial(&self) -> Option<StateId> {
        self.children.first().map(|(_, id)| *id)
    }

    pub(crate) fn current(&self) -> Option<(&'static str, StateId)> {
        self.children.get(self.current).copied()
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|(n, _)| *n == name)
    }
}

/// Members of a parallel state, iterated in id order.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParallelState {
    pub(crate) children: BTreeSet<StateId>,
}

pub(crate) enum Variant<K: EventKind> {
    Atomic,
    Composite(CompositeState<K>),
    Parallel(ParallelState),
}

/// A registered state.
pub struct StateNode<K: EventKind> {
    pub(crate) id: StateId,
    pub(crate) parent: Option<StateId>,
    pub(crate) name: &'static str,
    pub(crate) active: bool,
    pub(crate) clock: ClockId,
    pub(crate) behavior: Box<dyn Behavior<K>>,
    pub(crate) variant: Variant<K>,
}

impl<K: EventKind> StateNode<K> {
    pub(crate) fn new(
        id: StateId,
        parent: Option<StateId>,
        name: &'static str,
        behavior: Box<dyn Behavior<K>>,
        variant: Variant<K>,
    ) -> Self {
        StateNode {
            id,
            parent,
            name,
            active: false,
            clock: ClockId::REFERENCE,
            behavior,
            variant,
        }
    }

    #[inline]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[inline]
    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Clock this state's timers are measured on.
    #[inline]
    pub fn clock(&self) -> ClockId {
        self.clock
    }

    pub fn kind(&self) -> StateKind {
        match self.variant {
            Variant::Atomic => StateKind::Atomic,
            Variant::Composite(_) => StateKind::Composite,
            Variant::Parallel(_) => StateKind::Parallel,
        }
    }

    /// Direct children: declaration order for a composite, id order for a
    /// parallel.
    pub fn children(&self) -> Vec<StateId> {
        match &self.variant {
            Variant::Atomic => Vec::new(),
            Variant::Composite(c) => c.children.iter().map(|(_, id)| *id).collect(),
            Variant::Parallel(p) => p.children.iter().copied().collect(),
        }
    }

    /// The current child of a composite.
    pub fn current_child(&self) -> Option<StateId> {
        match &self.variant {
            Variant::Composite(c) => c.current().map(|(_, id)| id),
            Variant::Atomic | Variant::Parallel(_) => None,
        }
    }

    /// Type name of a composite's current child.
    pub fn current_child_name(&self) -> Option<&'static str> {
        match &self.variant {
            Variant::Composite(c) => c.current().map(|(name, _)| name),
            Variant::Atomic | Variant::Parallel(_) => None,
        }
    }
}

impl<K: EventKind> std::fmt::Debug for StateNode<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("active", &self.active)
            .field("clock", &self.clock)
            .finish()
    }
}
