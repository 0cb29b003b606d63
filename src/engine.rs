/// Simulation engine: the run loop and the state activation protocol.
///
/// The engine owns the event queue, the clocks and the state registry.
/// Its loop pops events, advances the reference clock (and the clock the
/// event was measured on), then dispatches to the target state. All state
/// reactions to one event complete before the next event is considered.

use std::rc::Rc;

use tracing::{debug, info, trace};

use crate::clock::{Clock, ClockBank, ClockId};
use crate::config::EngineConfig;
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventId, EventKind, Origin};
use crate::scheduler::Scheduler;
use crate::state::behavior::{Behavior, LogHook, LogRecord, Passive, StateContext};
use crate::state::node::{CompositeState, ParallelState, StateNode, Variant};
use crate::state::spec::{CompositeSpec, Shape, StateKind, StateType};
use crate::state::{StateId, StateRegistry, TraceEntry};
use crate::time::VirtualTime;

// ── Kernel ────────────────────────────────────────────────────────────

/// The part of the engine a state's hooks may touch while the registry
/// is borrowed: clocks, the queue, and the log sink.
pub(crate) struct Kernel<K: EventKind> {
    pub(crate) clocks: ClockBank,
    pub(crate) scheduler: Scheduler<K>,
    log_hook: Option<LogHook>,
}

impl<K: EventKind> Kernel<K> {
    fn new() -> Self {
        Kernel {
            clocks: ClockBank::new(),
            scheduler: Scheduler::new(),
            log_hook: None,
        }
    }

    pub(crate) fn local_time(&self, clock: ClockId) -> SimResult<VirtualTime> {
        self.clocks.get(clock).map(Clock::time)
    }

    /// Schedule `kind` for `parent`, `delay` after now on `clock`.
    pub(crate) fn schedule_timer(
        &mut self,
        state: StateId,
        parent: Option<StateId>,
        clock: ClockId,
        delay: u64,
        kind: K,
    ) -> SimResult<EventId> {
        let target = parent.ok_or(SimError::NoParent(state))?;
        let now = self.clocks.now();
        let at = if clock.is_reference() {
            now.plus(delay).ok_or(SimError::TimeOverflow(clock))?
        } else {
            let local = self.clocks.get(clock)?;
            let due = local
                .time()
                .plus(delay)
                .ok_or(SimError::TimeOverflow(clock))?;
            // A due time behind this clock's reading of now cannot be honored.
            if local.local_at(now).is_some_and(|floor| due < floor) {
                return Err(SimError::NonCausalEvent {
                    requested: local.master_time(due).unwrap_or(VirtualTime::ZERO),
                    current: now,
                });
            }
            // master_time rounds down.
            local
                .master_time(due)
                .ok_or(SimError::TimeOverflow(clock))?
                .max(now)
        };

        let id = self.scheduler.push(
            at,
            kind,
            target,
            Origin {
                state: Some(state),
                clock,
                delay,
            },
        );
        trace!(%state, %target, %clock, delay, %at, event = %id, "timer set");
        Ok(id)
    }

    pub(crate) fn emit(&mut self, record: &LogRecord) {
        info!(
            target: "skew::state",
            state = %record.state,
            name = record.name,
            local = %record.local_time,
            "{}",
            record
        );
        if let Some(hook) = self.log_hook.as_mut() {
            hook(record);
        }
    }
}

// ── Run bookkeeping ───────────────────────────────────────────────────

/// How far a call to [`Engine::run_with`] may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLimit {
    /// Up to the configured `max_events` ceiling.
    Default,
    /// Advance the event counter by at most this many from its current value.
    Steps(u64),
    /// Stop once the event counter reaches this absolute value.
    Cap(u64),
}

/// What a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Events delivered to a live target.
    pub dispatched: u64,
    /// Canceled events skipped at pop time.
    pub canceled: u64,
    /// Events whose target had been deleted.
    pub dropped: u64,
}

enum Hook {
    Created,
    Entry,
    Exit,
}

/// Dispatch plan extracted from a node before mutating the engine.
enum Route<K: EventKind> {
    Atomic,
    Composite {
        spec: Rc<CompositeSpec<K>>,
        from: &'static str,
        current: StateId,
    },
    Parallel {
        active: bool,
        children: Vec<StateId>,
    },
}

// ── Engine ────────────────────────────────────────────────────────────

/// Owner of the event queue, the reference clock and the state registry.
///
/// ```rust
/// use skew::{CompositeSpec, Engine, StateType, SEC};
///
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// enum Signal { Tick }
///
/// let a = StateType::atomic("A");
/// let b = StateType::atomic("B");
/// let machine = StateType::composite(
///     "Toggle",
///     CompositeSpec::new([a.clone(), b.clone()])
///         .on(&a, Signal::Tick, &b)
///         .on(&b, Signal::Tick, &a),
/// );
///
/// let mut engine = Engine::new();
/// let toggle = engine.spawn(&machine).unwrap();
/// engine.send(toggle, Signal::Tick, SEC).unwrap();
/// let stats = engine.run().unwrap();
///
/// assert_eq!(stats.dispatched, 1);
/// assert_eq!(engine.time().ticks(), SEC);
/// ```
pub struct Engine<K: EventKind> {
    kernel: Kernel<K>,
    registry: StateRegistry<K>,
    config: EngineConfig,
    event_count: u64,
    trace: Vec<TraceEntry<K>>,
}

impl<K: EventKind> Engine<K> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            kernel: Kernel::new(),
            registry: StateRegistry::new(),
            config,
            event_count: 0,
            trace: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Route every [`LogRecord`] to `hook` as well as to `tracing`.
    pub fn set_log_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&LogRecord) + 'static,
    {
        self.kernel.log_hook = Some(Box::new(hook));
    }

    // ── Construction ──────────────────────────────────────────

    /// Build a top-level state and its whole subtree.
    pub fn spawn(&mut self, ty: &StateType<K>) -> SimResult<StateId> {
        ty.validate()?;
        let id = self.instantiate(ty, None)?;
        debug!(state = %id, name = ty.name(), "spawned");
        Ok(id)
    }

    fn instantiate(&mut self, ty: &StateType<K>, parent: Option<StateId>) -> SimResult<StateId> {
        let id = self.registry.allocate();
        let variant = match ty.shape() {
            Shape::Atomic => Variant::Atomic,
            Shape::Composite(spec) => {
                let mut children = Vec::with_capacity(spec.children().len());
                for child in spec.children() {
                    children.push((child.name(), self.instantiate(child, Some(id))?));
                }
                Variant::Composite(CompositeState::new(Rc::clone(spec), children))
            }
            Shape::Parallel(spec) => {
                let mut par = ParallelState::default();
                for child in spec.children() {
                    par.children.insert(self.instantiate(child, Some(id))?);
                }
                Variant::Parallel(par)
            }
        };
        self.registry.insert(StateNode::new(
            id,
            parent,
            ty.name(),
            ty.build_behavior(),
            variant,
        ));
        self.call_hook(id, Hook::Created)?;
        Ok(id)
    }

    /// Group existing top-level states under a new parallel state.
    pub fn parallel_of(&mut self, name: &'static str, children: &[StateId]) -> SimResult<StateId> {
        self.parallel_with(name, children, Passive)
    }

    /// Like [`Engine::parallel_of`], with a behavior for the new state.
    pub fn parallel_with<B>(
        &mut self,
        name: &'static str,
        children: &[StateId],
        behavior: B,
    ) -> SimResult<StateId>
    where
        B: Behavior<K> + 'static,
    {
        let mut par = ParallelState::default();
        for &child in children {
            if let Some(parent) = self.registry.get(child)?.parent {
                return Err(SimError::AlreadyParented {
                    state: child,
                    parent,
                });
            }
            if !par.children.insert(child) {
                return Err(SimError::InvalidMachine(format!(
                    "{child} listed twice in parallel {name}"
                )));
            }
        }

        let id = self.registry.allocate();
        for &child in &par.children {
            self.registry.get_mut(child)?.parent = Some(id);
        }
        self.registry.insert(StateNode::new(
            id,
            None,
            name,
            Box::new(behavior),
            Variant::Parallel(par),
        ));
        self.call_hook(id, Hook::Created)?;
        debug!(state = %id, name, members = children.len(), "parallel assembled");
        Ok(id)
    }

    // ── Run loop ──────────────────────────────────────────────

    /// Run up to the configured event ceiling or until the queue drains.
    pub fn run(&mut self) -> SimResult<RunStats> {
        self.run_with(RunLimit::Default)
    }

    /// Run until the event counter has advanced by `steps`.
    pub fn run_steps(&mut self, steps: u64) -> SimResult<RunStats> {
        self.run_with(RunLimit::Steps(steps))
    }

    /// Run until the event counter reaches `cap`.
    pub fn run_until(&mut self, cap: u64) -> SimResult<RunStats> {
        self.run_with(RunLimit::Cap(cap))
    }

    /// The run loop.
    ///
    /// The first successful call activates every top-level state, which
    /// counts as event #1. Returns normally when the queue empties or the cap is
    /// reached; errors raised while dispatching propagate.
    pub fn run_with(&mut self, limit: RunLimit) -> SimResult<RunStats> {
        let cap = match limit {
            RunLimit::Default => self.config.max_events,
            RunLimit::Steps(steps) => self.event_count.saturating_add(steps),
            RunLimit::Cap(cap) => cap,
        };
        let mut stats = RunStats::default();

        if self.event_count == 0 {
            // A failed activation leaves the counter at zero so the next
            // run retries the states that did not come up.
            for id in self.registry.top_level() {
                debug!(state = %id, "activating top-level state");
                self.start(id)?;
            }
            self.event_count = 1;
        }

        while self.event_count < cap {
            let Some(event) = self.kernel.scheduler.pop_next() else {
                break;
            };

            let now = self.kernel.clocks.now();
            if !self.kernel.clocks.reference_mut().advance_to(event.scheduled_at) {
                return Err(SimError::TimeWentBackward {
                    event: event.id,
                    at: event.scheduled_at,
                    current: now,
                });
            }
            self.advance_origin_clock(&event)?;

            if event.canceled {
                trace!(event = %event.id, "skipping canceled event");
                stats.canceled += 1;
                continue;
            }

            self.event_count += 1;
            if !self.registry.contains(event.target) {
                debug!(event = %event.id, target = %event.target, "target deleted; dropping event");
                stats.dropped += 1;
                continue;
            }

            trace!(%event, "dispatch");
            if self.config.record_trace {
                self.trace.push(TraceEntry {
                    time: event.scheduled_at,
                    event_id: event.id,
                    target: event.target,
                    kind: event.kind.clone(),
                });
            }
            self.dispatch(event.target, &event)?;
            stats.dispatched += 1;
        }
        Ok(stats)
    }

    /// Move the local clock the event's delay was measured on.
    ///
    /// The clock is the origin state's current one, so a clock installed
    /// while the timer was pending is the one that moves. The advance is
    /// the raw requested delay, not a drift-corrected span.
    fn advance_origin_clock(&mut self, event: &Event<K>) -> SimResult<()> {
        let clock = event
            .origin
            .state
            .and_then(|s| self.registry.get(s).ok())
            .map(|node| node.clock)
            .unwrap_or(event.origin.clock);
        if clock.is_reference() {
            return Ok(());
        }
        self.kernel
            .clocks
            .get_mut(clock)?
            .advance_local(event.origin.delay)
            .ok_or(SimError::TimeOverflow(clock))?;
        Ok(())
    }

    // ── Dispatch ──────────────────────────────────────────────

    fn dispatch(&mut self, id: StateId, event: &Event<K>) -> SimResult<()> {
        let route = {
            let node = self.registry.get(id)?;
            match &node.variant {
                Variant::Atomic => Route::Atomic,
                Variant::Composite(c) => {
                    let (from, current) = c.current().ok_or_else(|| {
                        SimError::InvalidMachine(format!("composite {id} has no children"))
                    })?;
                    Route::Composite {
                        spec: Rc::clone(&c.spec),
                        from,
                        current,
                    }
                }
                Variant::Parallel(p) => Route::Parallel {
                    active: node.active,
                    children: p.children.iter().copied().collect(),
                },
            }
        };

        match route {
            Route::Atomic => self.with_behavior(id, |b, ctx| b.on_event(ctx, event)),
            Route::Composite {
                spec,
                from,
                current,
            } => {
                let Some(row) = spec.transition(from, &event.kind) else {
                    return self.with_behavior(id, |b, ctx| b.unrecognized(ctx, from, event));
                };
                for act in row.actions() {
                    self.with_behavior(id, |_, ctx| act(ctx, event))?;
                }
                if row.target() != from {
                    self.switch_child(id, current, row.target())?;
                }
                Ok(())
            }
            Route::Parallel { active, children } => {
                if !active {
                    return Err(SimError::InactiveParallel(id));
                }
                for child in children {
                    self.dispatch(child, event)?;
                }
                Ok(())
            }
        }
    }

    /// Leave `current`, then enter the child named `target`.
    fn switch_child(&mut self, id: StateId, current: StateId, target: &'static str) -> SimResult<()> {
        let next = self.composite(id)?.index_of(target).ok_or_else(|| {
            SimError::InvalidMachine(format!("composite {id} has no child {target}"))
        })?;
        self.deactivate(current)?;
        let next_id = {
            let comp = self.composite_mut(id)?;
            comp.current = next;
            comp.children[next].1
        };
        trace!(composite = %id, from = %current, to = %next_id, "transition");
        self.activate(next_id)
    }

    fn composite(&self, id: StateId) -> SimResult<&CompositeState<K>> {
        match &self.registry.get(id)?.variant {
            Variant::Composite(c) => Ok(c),
            _ => Err(SimError::InvalidMachine(format!("{id} is not a composite"))),
        }
    }

    fn composite_mut(&mut self, id: StateId) -> SimResult<&mut CompositeState<K>> {
        match &mut self.registry.get_mut(id)?.variant {
            Variant::Composite(c) => Ok(c),
            _ => Err(SimError::InvalidMachine(format!("{id} is not a composite"))),
        }
    }

    fn with_behavior<R>(
        &mut self,
        id: StateId,
        f: impl FnOnce(&mut dyn Behavior<K>, &mut StateContext<'_, K>) -> SimResult<R>,
    ) -> SimResult<R> {
        let Engine {
            registry, kernel, ..
        } = self;
        let node = registry.get_mut(id)?;
        let mut ctx = StateContext::new(kernel, node.id, node.parent, node.name, node.clock);
        f(node.behavior.as_mut(), &mut ctx)
    }

    fn call_hook(&mut self, id: StateId, hook: Hook) -> SimResult<()> {
        self.with_behavior(id, |b, ctx| match hook {
            Hook::Created => b.created(ctx),
            Hook::Entry => b.entry(ctx),
            Hook::Exit => b.exit(ctx),
        })
    }

    // ── Activation protocol ───────────────────────────────────

    /// Activate a state and run its entry behavior.
    ///
    /// A composite restarts from its initial child and then activates it;
    /// a parallel activates every member. Activating an already-active
    /// composite or parallel is a no-op; an atomic state re-runs its entry.
    /// If entry or a child's activation fails, the state is left inactive.
    pub fn activate(&mut self, id: StateId) -> SimResult<()> {
        let node = self.registry.get_mut(id)?;
        let cascade: Vec<StateId> = match &mut node.variant {
            Variant::Atomic => Vec::new(),
            Variant::Composite(c) => {
                if node.active {
                    debug!(state = %id, "composite already active; ignoring activation");
                    return Ok(());
                }
                c.current = 0;
                c.initial().into_iter().collect()
            }
            Variant::Parallel(p) => {
                if node.active {
                    return Ok(());
                }
                p.children.iter().copied().collect()
            }
        };
        self.call_hook(id, Hook::Entry)?;
        self.registry.get_mut(id)?.active = true;
        for child in cascade {
            if let Err(err) = self.activate(child) {
                self.registry.get_mut(id)?.active = false;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Activate a state unless it is already active.
    pub fn start(&mut self, id: StateId) -> SimResult<()> {
        if self.registry.get(id)?.active {
            return Ok(());
        }
        self.activate(id)
    }

    /// Run exit behavior and clear the active flag.
    ///
    /// A composite first deactivates its active child. A parallel does
    /// *not* deactivate its members.
    pub fn deactivate(&mut self, id: StateId) -> SimResult<()> {
        let inner = self.registry.get(id)?.current_child();
        if let Some(child) = inner {
            if self.registry.get(child)?.active {
                self.deactivate(child)?;
            }
        }
        self.call_hook(id, Hook::Exit)?;
        self.registry.get_mut(id)?.active = false;
        Ok(())
    }

    // ── Clocks ────────────────────────────────────────────────

    /// Give `id` and its whole subtree a fresh clock reading `time`
    /// (default 0) with `drift` PPB (default 0).
    pub fn set_clock(
        &mut self,
        id: StateId,
        time: Option<VirtualTime>,
        drift: Option<i64>,
    ) -> SimResult<ClockId> {
        self.registry.get(id)?;
        let now = self.kernel.clocks.now();
        let clock = Clock::local(
            time.unwrap_or(VirtualTime::ZERO),
            drift.unwrap_or(0),
            now,
        )?;
        let clock = self.kernel.clocks.add(clock);
        self.rebind(id, clock)?;
        debug!(state = %id, %clock, "clock installed");
        Ok(clock)
    }

    /// Bind an existing clock to `id` and its subtree.
    pub fn install_clock(&mut self, id: StateId, clock: ClockId) -> SimResult<()> {
        self.kernel.clocks.get(clock)?;
        self.rebind(id, clock)
    }

    fn rebind(&mut self, root: StateId, clock: ClockId) -> SimResult<()> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.registry.get_mut(id)?;
            node.clock = clock;
            stack.extend(node.children());
        }
        Ok(())
    }

    /// Reset the time and/or drift of an existing clock.
    pub fn reset_clock(
        &mut self,
        clock: ClockId,
        time: Option<VirtualTime>,
        drift: Option<i64>,
    ) -> SimResult<()> {
        self.kernel.clocks.reset(clock, time, drift)
    }

    pub fn clock(&self, clock: ClockId) -> SimResult<&Clock> {
        self.kernel.clocks.get(clock)
    }

    pub fn clock_of(&self, id: StateId) -> SimResult<ClockId> {
        Ok(self.registry.get(id)?.clock)
    }

    /// Local time of a state's clock.
    pub fn state_time(&self, id: StateId) -> SimResult<VirtualTime> {
        Ok(self.clock(self.clock_of(id)?)?.time())
    }

    /// Current reference time.
    pub fn time(&self) -> VirtualTime {
        self.kernel.clocks.now()
    }

    // ── Events ────────────────────────────────────────────────

    /// Inject `kind` for `target`, `delay` after now on the reference clock.
    pub fn send(&mut self, target: StateId, kind: K, delay: u64) -> SimResult<EventId> {
        self.registry.get(target)?;
        let at = self
            .time()
            .plus(delay)
            .ok_or(SimError::TimeOverflow(ClockId::REFERENCE))?;
        Ok(self
            .kernel
            .scheduler
            .push(at, kind, target, Origin::external(delay)))
    }

    /// Mark a pending event canceled; it stays queued and is skipped.
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.kernel.scheduler.cancel(event)
    }

    /// Cancel every pending event measured on `clock`.
    pub fn cancel_clock_events(&mut self, clock: ClockId) -> usize {
        self.kernel.scheduler.cancel_clock_events(clock)
    }

    /// Stored events, canceled ones included.
    pub fn pending_events(&self) -> usize {
        self.kernel.scheduler.len()
    }

    /// Events counted so far; the initial activation counts as one.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn trace(&self) -> &[TraceEntry<K>] {
        &self.trace
    }

    // ── Registry ──────────────────────────────────────────────

    pub fn registry(&self) -> &StateRegistry<K> {
        &self.registry
    }

    pub fn state(&self, id: StateId) -> SimResult<&StateNode<K>> {
        self.registry.get(id)
    }

    pub fn is_active(&self, id: StateId) -> SimResult<bool> {
        Ok(self.registry.get(id)?.active)
    }

    /// The active child of a composite, if any.
    pub fn active_child(&self, id: StateId) -> SimResult<Option<StateId>> {
        let node = self.registry.get(id)?;
        match node.current_child() {
            Some(child) if node.active && self.registry.get(child)?.active => Ok(Some(child)),
            _ => Ok(None),
        }
    }

    pub fn children(&self, id: StateId) -> SimResult<Vec<StateId>> {
        Ok(self.registry.get(id)?.children())
    }

    /// Delete a state and its subtree.
    ///
    /// Active states are deactivated first, outermost first, so exit
    /// behavior runs before removal. A member of a parallel is detached
    /// from it; a composite's child cannot be deleted on its own. Events
    /// still queued for removed states are dropped when they fire.
    /// Returns the number of states removed.
    pub fn delete_state(&mut self, id: StateId) -> SimResult<usize> {
        let parent = self.registry.get(id)?.parent;
        if let Some(parent) = parent {
            if self.registry.get(parent)?.kind() == StateKind::Composite {
                return Err(SimError::InvalidMachine(format!(
                    "{id} is a child of composite {parent} and cannot be deleted alone"
                )));
            }
        }

        // Detach only after every exit hook has run.
        self.retire(id)?;
        if let Some(parent) = parent {
            if let Variant::Parallel(p) = &mut self.registry.get_mut(parent)?.variant {
                p.children.remove(&id);
            }
        }
        let removed = self.registry.remove_subtree(id)?;
        debug!(state = %id, removed, "deleted");
        Ok(removed)
    }

    fn retire(&mut self, id: StateId) -> SimResult<()> {
        if self.registry.get(id)?.active {
            self.deactivate(id)?;
        }
        for child in self.registry.get(id)?.children() {
            self.retire(child)?;
        }
        Ok(())
    }
}

impl<K: EventKind> Default for Engine<K> {
    fn default() -> Self {
        Self::new()
    }
}
