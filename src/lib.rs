//! # Skew — Discrete-Event Hierarchical State Machines
//!
//! A simulation kernel for UML-style state machines whose timers run on
//! clocks that drift and offset against a single reference clock. No
//! async, no threads, no wall-clock time: states react to events popped
//! from a deterministic queue in virtual time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │            Engine            │ ← run loop, activation protocol
//! │  ┌────────────────────────┐  │
//! │  │     StateRegistry      │  │ ← atomic / composite / parallel nodes
//! │  └────────────────────────┘  │
//! │  ┌────────────────────────┐  │
//! │  │       Scheduler        │  │ ← min-heap on (time, event id)
//! │  └────────────────────────┘  │
//! │  ┌────────────────────────┐  │
//! │  │       ClockBank        │  │ ← reference clock + drifting clocks
//! │  └────────────────────────┘  │
//! └──────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use skew::{Behavior, CompositeSpec, Engine, SimResult, StateContext, StateType, SEC};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Signal { TimeOut }
//!
//! struct Lamp(u64);
//!
//! impl Behavior<Signal> for Lamp {
//!     fn entry(&mut self, ctx: &mut StateContext<'_, Signal>) -> SimResult<()> {
//!         ctx.set_timer(self.0, Signal::TimeOut)?;
//!         Ok(())
//!     }
//! }
//!
//! let red = StateType::atomic("Red").with_behavior(|| Lamp(50 * SEC));
//! let green = StateType::atomic("Green").with_behavior(|| Lamp(50 * SEC));
//! let light = StateType::composite(
//!     "StopLight",
//!     CompositeSpec::new([red.clone(), green.clone()])
//!         .on(&red, Signal::TimeOut, &green)
//!         .on(&green, Signal::TimeOut, &red),
//! );
//!
//! let mut engine = Engine::new();
//! let id = engine.spawn(&light).unwrap();
//! engine.run_steps(2).unwrap();
//!
//! assert_eq!(engine.state_time(id).unwrap().ticks(), 50 * SEC);
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod state;
pub mod time;

// Re-exports for convenience.
pub use clock::{Clock, ClockBank, ClockId};
pub use config::{EngineConfig, DEFAULT_MAX_EVENTS};
pub use engine::{Engine, RunLimit, RunStats};
pub use error::{SimError, SimResult};
pub use event::{Event, EventId, EventIdGen, EventKind, Origin};
pub use scheduler::Scheduler;
pub use state::{
    action, Action, Behavior, CompositeSpec, LogHook, LogRecord, ParallelSpec, Passive, Shape,
    StateContext, StateId, StateKind, StateNode, StateRegistry, StateType, TraceEntry, Transition,
};
pub use time::{
    VirtualTime, DAY, HOUR, MSEC, NSEC, NSEC_PER_METER, PPB, PPM, SEC, SPEED_OF_LIGHT, TU, USEC,
};
