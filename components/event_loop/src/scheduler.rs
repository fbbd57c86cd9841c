//! The deterministic event loop.
//!
//! The scheduler owns four queues (microtasks, timers, I/O completions and
//! immediates) and a virtual clock measured in ticks. Each iteration of the
//! loop:
//! 1. Drains the microtask queue, including microtasks queued while draining
//! 2. Advances the clock and fires every due timer
//! 3. Delivers the I/O completions that are ready
//! 4. Runs the immediates queued before the phase began
//!
//! Microtasks are drained again after every timer, I/O and immediate
//! callback. The loop stops once no referenced task is left.

use crate::config::LoopConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::io::IoQueue;
use crate::task_queue::{Callback, QueueKind, Task, TaskHandle, TaskId, TaskQueue};
use crate::timers::TimerList;
use crate::trace::{Firing, Trace};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No referenced task remained.
    Idle,
    /// The next iteration would have moved the clock past the requested limit.
    TickLimit,
    /// The run was requested from inside a callback and did nothing.
    Reentrant,
}

/// Statistics for one call to a `run_*` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Why the run stopped
    pub outcome: RunOutcome,
    /// Loop iterations performed by this run
    pub iterations: u64,
    /// Callbacks executed by this run
    pub callbacks_run: u64,
    /// Clock value when the run returned
    pub final_tick: u64,
}

/// A single-threaded, cooperative event loop with a virtual clock.
///
/// Every callback receives `&mut Scheduler`, so it can schedule further work,
/// cancel tasks or toggle their liveness while it runs.
///
/// # Examples
///
/// ```
/// use event_loop::Scheduler;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let order = Rc::new(RefCell::new(Vec::new()));
/// let mut scheduler = Scheduler::new();
///
/// let o = order.clone();
/// scheduler.schedule_immediate(move |_| o.borrow_mut().push("immediate"));
/// let o = order.clone();
/// scheduler.schedule_microtask(move |_| o.borrow_mut().push("microtask"));
///
/// scheduler.run_until_idle();
/// assert_eq!(*order.borrow(), vec!["microtask", "immediate"]);
/// ```
pub struct Scheduler {
    epoch: u64,
    config: LoopConfig,
    now: u64,
    iteration: u64,
    depth: usize,
    next_id: u64,
    callbacks_run: u64,
    tasks: HashMap<TaskId, Task>,
    microtasks: TaskQueue,
    timers: TimerList,
    io: IoQueue,
    immediates: TaskQueue,
    trace: Trace,
}

impl Scheduler {
    /// Creates a scheduler with the default configuration.
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Creates a scheduler with the given configuration.
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
            config,
            now: 0,
            iteration: 0,
            depth: 0,
            next_id: 0,
            callbacks_run: 0,
            tasks: HashMap::new(),
            microtasks: TaskQueue::new(),
            timers: TimerList::new(),
            io: IoQueue::new(),
            immediates: TaskQueue::new(),
            trace: Trace::new(),
        }
    }

    /// The configuration this scheduler was built with.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Appends a callback to the microtask queue.
    ///
    /// Microtasks run after the current callback returns and before the loop
    /// moves on to any timer, I/O or immediate work.
    pub fn schedule_microtask<F>(&mut self, callback: F) -> TaskHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let id = self.insert_task(QueueKind::Microtask, Callback::Once(Box::new(callback)));
        self.microtasks.enqueue(id);
        self.handle(id)
    }

    /// Arms a timer that fires `delay_ticks` from now.
    ///
    /// A zero delay is raised to the configured minimum (one tick by
    /// default). When `recurring` is set the timer re-arms itself after every
    /// firing until it is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidDelay`] if `delay_ticks` is negative.
    pub fn schedule_timer<F>(
        &mut self,
        callback: F,
        delay_ticks: i64,
        recurring: bool,
    ) -> SchedulerResult<TaskHandle>
    where
        F: FnMut(&mut Scheduler) + 'static,
    {
        self.arm_timer(Callback::Repeat(Box::new(callback)), delay_ticks, recurring)
    }

    /// Arms a one-shot timer.
    pub fn set_timeout<F>(&mut self, callback: F, delay_ticks: i64) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.arm_timer(Callback::Once(Box::new(callback)), delay_ticks, false)
    }

    /// Arms a recurring timer.
    pub fn set_interval<F>(&mut self, callback: F, delay_ticks: i64) -> SchedulerResult<TaskHandle>
    where
        F: FnMut(&mut Scheduler) + 'static,
    {
        self.arm_timer(Callback::Repeat(Box::new(callback)), delay_ticks, true)
    }

    /// Queues the result of a finished background operation.
    ///
    /// It is delivered in the I/O phase of the next iteration.
    pub fn schedule_io_completion<F>(&mut self, callback: F) -> TaskHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let id = self.insert_task(QueueKind::Io, Callback::Once(Box::new(callback)));
        self.io.push(id, self.now);
        self.handle(id)
    }

    /// Starts a background operation whose result is ready `latency_ticks`
    /// from now.
    ///
    /// The operation keeps the loop alive while it is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidDelay`] if `latency_ticks` is negative
    /// or the ready tick would not fit the clock.
    pub fn schedule_io_completion_after<F>(
        &mut self,
        callback: F,
        latency_ticks: i64,
    ) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let ready_at = self.tick_after(non_negative(latency_ticks)?, latency_ticks)?;
        let id = self.insert_task(QueueKind::Io, Callback::Once(Box::new(callback)));
        self.io.push(id, ready_at);
        Ok(self.handle(id))
    }

    /// Queues a callback for the immediate phase.
    ///
    /// Immediates queued while the immediate phase is running wait for the
    /// next iteration.
    pub fn schedule_immediate<F>(&mut self, callback: F) -> TaskHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let id = self.insert_task(QueueKind::Immediate, Callback::Once(Box::new(callback)));
        self.immediates.enqueue(id);
        self.handle(id)
    }

    /// Cancels a task that has not started yet.
    ///
    /// Cancelling a task that already ran, or was already cancelled, is a
    /// no-op. Cancelling a task from inside its own callback leaves the
    /// current execution alone; for an interval it prevents the next firing.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownHandle`] if the handle was not issued
    /// by this scheduler.
    pub fn cancel(&mut self, handle: TaskHandle) -> SchedulerResult<()> {
        let id = self.resolve(handle)?;
        let Some(task) = self.tasks.get_mut(&id) else {
            return Ok(());
        };

        if task.is_running() {
            debug!(task = %id, "cancel deferred until callback returns");
            task.cancelled = true;
            return Ok(());
        }

        let kind = task.kind;
        let deadline = task.deadline;
        self.tasks.remove(&id);
        match kind {
            QueueKind::Microtask => {
                self.microtasks.remove(id);
            }
            QueueKind::Timer => {
                if let Some(deadline) = deadline {
                    self.timers.remove(deadline, id);
                }
            }
            QueueKind::Io => {
                self.io.remove(id);
            }
            QueueKind::Immediate => {
                self.immediates.remove(id);
            }
        }
        debug!(task = %id, kind = %kind, "task cancelled");
        Ok(())
    }

    /// Lets the loop exit even though this task is still pending.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownHandle`] if the task is not live.
    pub fn unref(&mut self, handle: TaskHandle) -> SchedulerResult<()> {
        self.live_task_mut(handle)?.keeps_alive = false;
        Ok(())
    }

    /// Undoes [`unref`](Self::unref): the task keeps the loop alive again.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownHandle`] if the task is not live.
    pub fn ref_(&mut self, handle: TaskHandle) -> SchedulerResult<()> {
        self.live_task_mut(handle)?.keeps_alive = true;
        Ok(())
    }

    /// Attaches a label that is reported in the [`Trace`].
    pub fn set_label(&mut self, handle: TaskHandle, label: impl Into<String>) -> SchedulerResult<()> {
        self.live_task_mut(handle)?.label = Some(label.into());
        Ok(())
    }

    /// Pins the arrival order of a pending I/O completion.
    ///
    /// Ready completions are delivered by ascending rank, ties broken by
    /// scheduling order. Completions without a rank use the tick their
    /// result became ready.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownHandle`] unless the handle names a
    /// pending I/O completion.
    pub fn set_arrival_rank(&mut self, handle: TaskHandle, rank: u64) -> SchedulerResult<()> {
        let id = self.resolve(handle)?;
        if self.io.set_rank(id, rank) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownHandle(handle))
        }
    }

    /// Simulates synchronous work that occupies the thread for `ticks`.
    ///
    /// The clock moves forward and nothing else runs, so every pending timer
    /// is delayed by the same amount.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidDelay`] if `ticks` is negative or
    /// would move the clock out of range.
    pub fn block_for(&mut self, ticks: i64) -> SchedulerResult<()> {
        self.now = self.tick_after(non_negative(ticks)?, ticks)?;
        debug!(ticks, now = self.now, "thread blocked");
        Ok(())
    }

    /// Runs `script` as the initiating synchronous code, then drives the loop
    /// until it is idle.
    pub fn run_main<F>(&mut self, script: F) -> RunSummary
    where
        F: FnOnce(&mut Scheduler),
    {
        self.run_sync(script);
        self.run_until_idle()
    }

    /// Runs `code` on the synchronous stack without turning the loop.
    ///
    /// Work it schedules stays queued until one of the `run_*` methods is
    /// called.
    pub fn run_sync<F, R>(&mut self, code: F) -> R
    where
        F: FnOnce(&mut Scheduler) -> R,
    {
        self.depth += 1;
        let result = code(self);
        self.depth -= 1;
        result
    }

    /// Drives the loop until no referenced task remains.
    ///
    /// Unreferenced timers still fire while something else keeps the loop
    /// alive, but they never keep it alive on their own.
    pub fn run_until_idle(&mut self) -> RunSummary {
        self.run_loop(None)
    }

    /// Like [`run_until_idle`](Self::run_until_idle), but stops before an
    /// iteration that would move the clock past `limit`.
    pub fn run_until_tick(&mut self, limit: u64) -> RunSummary {
        self.run_loop(Some(limit))
    }

    /// Current value of the virtual clock.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Number of loop iterations performed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Number of callbacks (including the main script) currently on the stack.
    pub fn call_depth(&self) -> usize {
        self.depth
    }

    /// Returns the task behind `handle` if it is still live.
    pub fn task(&self, handle: TaskHandle) -> Option<&Task> {
        if handle.epoch() != self.epoch {
            return None;
        }
        self.tasks.get(&handle.id())
    }

    /// True if the task is queued and has not started.
    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.task(handle).is_some_and(|task| !task.is_running())
    }

    /// Number of pending tasks of the given kind.
    pub fn pending_count(&self, kind: QueueKind) -> usize {
        self.tasks
            .values()
            .filter(|task| task.kind == kind && !task.is_running())
            .count()
    }

    /// True if some pending task keeps the loop alive.
    pub fn has_referenced_work(&self) -> bool {
        self.tasks
            .values()
            .any(|task| task.keeps_alive && !task.is_running())
    }

    /// Callbacks fired so far, in order.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Takes the recorded trace, leaving an empty one behind.
    pub fn take_trace(&mut self) -> Trace {
        std::mem::take(&mut self.trace)
    }

    fn run_loop(&mut self, limit: Option<u64>) -> RunSummary {
        if self.depth > 0 {
            warn!("run requested from inside a callback; ignoring");
            return RunSummary {
                outcome: RunOutcome::Reentrant,
                iterations: 0,
                callbacks_run: 0,
                final_tick: self.now,
            };
        }

        let start_iteration = self.iteration;
        let start_callbacks = self.callbacks_run;

        let outcome = loop {
            self.drain_microtasks();

            if !self.has_referenced_work() {
                break RunOutcome::Idle;
            }

            let tick = self.next_tick();
            if limit.is_some_and(|limit| tick > limit) {
                break RunOutcome::TickLimit;
            }

            self.iteration += 1;
            if tick > self.now {
                trace!(from = self.now, to = tick, "clock advanced");
                self.now = tick;
            }
            debug!(iteration = self.iteration, now = self.now, "loop iteration");

            self.run_timer_phase();
            self.run_io_phase();
            self.run_immediate_phase();
        };

        let summary = RunSummary {
            outcome,
            iterations: self.iteration - start_iteration,
            callbacks_run: self.callbacks_run - start_callbacks,
            final_tick: self.now,
        };
        debug!(?summary, "run finished");
        summary
    }

    /// Picks the clock value for the next iteration.
    ///
    /// Ready I/O or queued immediates make the turn cost one tick. Otherwise
    /// the loop sleeps until the earliest timer deadline or I/O readiness.
    fn next_tick(&self) -> u64 {
        if !self.immediates.is_empty() || self.io.has_ready(self.now) {
            return self.now.saturating_add(1);
        }
        let wake = [self.timers.next_deadline(), self.io.next_ready_at()]
            .into_iter()
            .flatten()
            .min();
        match wake {
            Some(tick) => tick.max(self.now),
            None => self.now.saturating_add(1),
        }
    }

    fn drain_microtasks(&mut self) {
        while let Some(id) = self.microtasks.dequeue() {
            self.run_task(id);
        }
    }

    fn run_timer_phase(&mut self) {
        // Timers armed during this phase are due strictly after `phase_tick`.
        let phase_tick = self.now;
        while let Some((deadline, id)) = self.timers.pop_due(phase_tick) {
            trace!(task = %id, deadline, "timer due");
            self.run_task(id);
            self.drain_microtasks();
        }
    }

    fn run_io_phase(&mut self) {
        for id in self.io.take_ready(self.now) {
            self.run_task(id);
            self.drain_microtasks();
        }
    }

    fn run_immediate_phase(&mut self) {
        for id in self.immediates.take_batch() {
            self.run_task(id);
            self.drain_microtasks();
        }
    }

    fn run_task(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            // Cancelled after its phase had already collected it.
            return;
        };
        let Some(callback) = task.callback.take() else {
            return;
        };
        let kind = task.kind;

        if self.config.record_trace {
            let label = task.label.clone();
            self.trace.push(Firing {
                id,
                kind,
                label,
                tick: self.now,
                iteration: self.iteration,
            });
        }
        trace!(task = %id, kind = %kind, now = self.now, "running task");

        self.callbacks_run += 1;
        self.depth += 1;
        let callback = match callback {
            Callback::Once(f) => {
                f(self);
                None
            }
            Callback::Repeat(mut f) => {
                f(self);
                Some(Callback::Repeat(f))
            }
        };
        self.depth -= 1;

        self.retire_or_rearm(id, callback);
    }

    fn retire_or_rearm(&mut self, id: TaskId, callback: Option<Callback>) {
        let now = self.now;
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        let rearm_at = task.repeat.and_then(|period| now.checked_add(period));
        match (rearm_at, callback) {
            (Some(deadline), Some(callback)) if !task.cancelled => {
                task.deadline = Some(deadline);
                task.callback = Some(callback);
                self.timers.insert(deadline, id);
                trace!(task = %id, deadline, "interval re-armed");
            }
            (None, Some(_)) if task.repeat.is_some() && !task.cancelled => {
                warn!(task = %id, "interval deadline past the end of the clock; retiring");
                self.tasks.remove(&id);
            }
            _ => {
                self.tasks.remove(&id);
            }
        }
    }

    fn arm_timer(
        &mut self,
        callback: Callback,
        delay_ticks: i64,
        recurring: bool,
    ) -> SchedulerResult<TaskHandle> {
        let delay = non_negative(delay_ticks)?.max(self.config.timer_floor());
        let deadline = self.tick_after(delay, delay_ticks)?;

        let id = self.insert_task(QueueKind::Timer, callback);
        if let Some(task) = self.tasks.get_mut(&id) {
            task.deadline = Some(deadline);
            task.repeat = recurring.then_some(delay);
        }
        self.timers.insert(deadline, id);
        Ok(self.handle(id))
    }

    /// Clock value `ticks` from now, rejecting values the clock cannot hold.
    fn tick_after(&self, ticks: u64, requested: i64) -> SchedulerResult<u64> {
        self.now.checked_add(ticks).ok_or_else(|| {
            warn!(requested, now = self.now, "delay runs past the end of the clock");
            SchedulerError::InvalidDelay(requested)
        })
    }

    fn insert_task(&mut self, kind: QueueKind, callback: Callback) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(id, Task::new(id, kind, callback));
        id
    }

    fn handle(&self, id: TaskId) -> TaskHandle {
        TaskHandle::new(self.epoch, id)
    }

    fn resolve(&self, handle: TaskHandle) -> SchedulerResult<TaskId> {
        if handle.epoch() != self.epoch || handle.id().as_u64() >= self.next_id {
            warn!(%handle, "handle was not issued by this scheduler");
            return Err(SchedulerError::UnknownHandle(handle));
        }
        Ok(handle.id())
    }

    fn live_task_mut(&mut self, handle: TaskHandle) -> SchedulerResult<&mut Task> {
        let id = self.resolve(handle)?;
        self.tasks
            .get_mut(&id)
            .ok_or(SchedulerError::UnknownHandle(handle))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("epoch", &self.epoch)
            .field("now", &self.now)
            .field("iteration", &self.iteration)
            .field("depth", &self.depth)
            .field("tasks", &self.tasks.len())
            .field("microtasks", &self.microtasks.len())
            .field("timers", &self.timers.len())
            .field("io", &self.io.len())
            .field("immediates", &self.immediates.len())
            .finish()
    }
}

fn non_negative(ticks: i64) -> SchedulerResult<u64> {
    u64::try_from(ticks).map_err(|_| {
        warn!(ticks, "rejected negative delay");
        SchedulerError::InvalidDelay(ticks)
    })
}
