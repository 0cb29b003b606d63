//! Machine definitions: state types, transition tables and child lists.
//!
//! A [`StateType`] describes how to build one state. Composite and
//! parallel types carry their child lists and transition table behind an
//! `Rc`, so the definition is built once and shared read-only by every
//! instance.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventKind};

use super::behavior::{Behavior, Passive, StateContext};

/// A side effect run by a composite when a transition fires.
///
/// Actions run in table order, before the child switch, with the
/// composite's own context.
pub type Action<K> = Rc<dyn Fn(&mut StateContext<'_, K>, &Event<K>) -> SimResult<()>>;

/// Wrap a closure as an [`Action`].
pub fn action<K, F>(f: F) -> Action<K>
where
    K: EventKind,
    F: Fn(&mut StateContext<'_, K>, &Event<K>) -> SimResult<()> + 'static,
{
    Rc::new(f)
}

type Factory<K> = Rc<dyn Fn() -> Box<dyn Behavior<K>>>;

// ── StateKind ─────────────────────────────────────────────────────────

/// The closed set of state variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum StateKind {
    Atomic,
    Composite,
    Parallel,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Atomic => write!(f, "atomic"),
            StateKind::Composite => write!(f, "composite"),
            StateKind::Parallel => write!(f, "parallel"),
        }
    }
}

/// Variant-specific part of a [`StateType`].
#[derive(Clone)]
pub enum Shape<K: EventKind> {
    Atomic,
    Composite(Rc<CompositeSpec<K>>),
    Parallel(Rc<ParallelSpec<K>>),
}

// ── StateType ─────────────────────────────────────────────────────────

/// Descriptor of a state class: its name, its shape and a factory for its
/// entry/exit behavior.
///
/// Names identify child types inside a composite's transition table and
/// must be unique among the children of one composite.
#[derive(Clone)]
pub struct StateType<K: EventKind> {
    name: &'static str,
    shape: Shape<K>,
    factory: Factory<K>,
}

impl<K: EventKind> StateType<K> {
    /// A leaf state with no behavior attached.
    pub fn atomic(name: &'static str) -> Self {
        Self::with_shape(name, Shape::Atomic)
    }

    pub fn composite(name: &'static str, spec: CompositeSpec<K>) -> Self {
        Self::with_shape(name, Shape::Composite(Rc::new(spec)))
    }

    pub fn parallel(name: &'static str, spec: ParallelSpec<K>) -> Self {
        Self::with_shape(name, Shape::Parallel(Rc::new(spec)))
    }

    fn with_shape(name: &'static str, shape: Shape<K>) -> Self {
        StateType {
            name,
            shape,
            factory: Rc::new(|| Box::new(Passive)),
        }
    }

    /// Attach a behavior; `factory` runs once per instance.
    pub fn with_behavior<B, F>(mut self, factory: F) -> Self
    where
        B: Behavior<K> + 'static,
        F: Fn() -> B + 'static,
    {
        self.factory = Rc::new(move || Box::new(factory()));
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn shape(&self) -> &Shape<K> {
        &self.shape
    }

    pub fn kind(&self) -> StateKind {
        match self.shape {
            Shape::Atomic => StateKind::Atomic,
            Shape::Composite(_) => StateKind::Composite,
            Shape::Parallel(_) => StateKind::Parallel,
        }
    }

    pub(crate) fn build_behavior(&self) -> Box<dyn Behavior<K>> {
        (self.factory)()
    }

    /// Check this definition and every nested one.
    pub fn validate(&self) -> SimResult<()> {
        match &self.shape {
            Shape::Atomic => Ok(()),
            Shape::Composite(spec) => {
                spec.validate(self.name)?;
                spec.children.iter().try_for_each(StateType::validate)
            }
            Shape::Parallel(spec) => spec.children.iter().try_for_each(StateType::validate),
        }
    }
}

impl<K: EventKind> fmt::Debug for StateType<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateType")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

// ── Transition ────────────────────────────────────────────────────────

/// One row of a transition table.
#[derive(Clone)]
pub struct Transition<K: EventKind> {
    target: &'static str,
    actions: Vec<Action<K>>,
}

impl<K: EventKind> Transition<K> {
    /// Name of the child type to switch to.
    #[inline]
    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn actions(&self) -> &[Action<K>] {
        &self.actions
    }
}

// ── CompositeSpec ─────────────────────────────────────────────────────

/// Children and transition table of a composite type.
///
/// ```rust
/// use skew::{CompositeSpec, StateType};
///
/// let red = StateType::<&str>::atomic("Red");
/// let green = StateType::atomic("Green");
/// let spec = CompositeSpec::new([red.clone(), green.clone()])
///     .on(&red, "TimeOut", &green)
///     .on(&green, "TimeOut", &red);
/// assert_eq!(spec.initial().map(|t| t.name()), Some("Red"));
/// ```
pub struct CompositeSpec<K: EventKind> {
    children: Vec<StateType<K>>,
    table: HashMap<(&'static str, K), Transition<K>>,
}

impl<K: EventKind> CompositeSpec<K> {
    /// Declare the child types; the first one is the initial state.
    pub fn new(children: impl IntoIterator<Item = StateType<K>>) -> Self {
        CompositeSpec {
            children: children.into_iter().collect(),
            table: HashMap::new(),
        }
    }

    /// Add a transition without actions.
    pub fn on(self, from: &StateType<K>, kind: K, to: &StateType<K>) -> Self {
        self.on_with(from, kind, to, [])
    }

    /// Add a transition running `actions` in order when it fires.
    pub fn on_with(
        mut self,
        from: &StateType<K>,
        kind: K,
        to: &StateType<K>,
        actions: impl IntoIterator<Item = Action<K>>,
    ) -> Self {
        self.table.insert(
            (from.name, kind),
            Transition {
                target: to.name,
                actions: actions.into_iter().collect(),
            },
        );
        self
    }

    pub fn children(&self) -> &[StateType<K>] {
        &self.children
    }

    pub fn initial(&self) -> Option<&StateType<K>> {
        self.children.first()
    }

    /// Look up the row for `(from, kind)`.
    pub fn transition(&self, from: &'static str, kind: &K) -> Option<&Transition<K>> {
        self.table.get(&(from, kind.clone()))
    }

    /// Number of rows in the transition table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn validate(&self, owner: &'static str) -> SimResult<()> {
        if self.children.is_empty() {
            return Err(SimError::InvalidMachine(format!(
                "composite {owner} declares no children"
            )));
        }
        let mut names = HashSet::new();
        for child in &self.children {
            if !names.insert(child.name) {
                return Err(SimError::InvalidMachine(format!(
                    "composite {owner} declares {} twice",
                    child.name
                )));
            }
        }
        for ((from, kind), row) in &self.table {
            for name in [*from, row.target] {
                if !names.contains(name) {
                    return Err(SimError::InvalidMachine(format!(
                        "composite {owner}: transition ({from}, {kind:?}) names undeclared child {name}"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── ParallelSpec ──────────────────────────────────────────────────────

/// Child types of a parallel type; every child is built and run together.
pub struct ParallelSpec<K: EventKind> {
    children: Vec<StateType<K>>,
}

impl<K: EventKind> ParallelSpec<K> {
    pub fn new(children: impl IntoIterator<Item = StateType<K>>) -> Self {
        ParallelSpec {
            children: children.into_iter().collect(),
        }
    }

    pub fn children(&self) -> &[StateType<K>] {
        &self.children
    }
}
