//! The state hierarchy: atomic, composite and parallel states.
//!
//! Client code describes machines with [`StateType`] values; the engine
//! instantiates them into [`StateNode`]s owned by the [`StateRegistry`].
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`StateId`] newtype |
//! | [`spec`] | [`StateType`], [`CompositeSpec`], [`ParallelSpec`], [`Transition`] |
//! | [`behavior`] | [`Behavior`] trait, [`StateContext`], [`LogRecord`] |
//! | [`node`] | [`StateNode`] |
//! | [`registry`] | [`StateRegistry`] |
//! | [`trace`] | [`TraceEntry`] |

pub mod behavior;
pub mod id;
pub mod node;
pub mod registry;
pub mod spec;
pub mod trace;

pub use behavior::{Behavior, LogHook, LogRecord, Passive, StateContext};
pub use id::StateId;
pub use node::StateNode;
pub use registry::StateRegistry;
pub use spec::{action, Action, CompositeSpec, ParallelSpec, Shape, StateKind, StateType, Transition};
pub use trace::TraceEntry;
