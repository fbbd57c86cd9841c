//! Script execution
//!
//! The Simulation turns a [`Script`] into scheduler calls:
//! - top-level ops run as the initiating synchronous code
//! - every scheduled callback records its label, then runs its `then` ops
//! - the loop is driven until idle, or until the configured tick limit

use crate::error::{CliError, CliResult};
use crate::report::{EntrySource, Report, ReportEntry};
use crate::script::{Op, Script, ScriptFormat};
use event_loop::{Scheduler, TaskHandle};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Bookkeeping shared by every callback of one run
#[derive(Debug, Default)]
struct ScriptState {
    handles: HashMap<String, TaskHandle>,
    entries: Vec<ReportEntry>,
    error: Option<CliError>,
}

type SharedState = Rc<RefCell<ScriptState>>;

/// Runs scheduling scripts against a fresh scheduler
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    /// Tick limit for the loop, `None` to run until idle
    until: Option<u64>,
}

impl Simulation {
    /// Create a simulation that runs scripts until the loop is idle
    ///
    /// # Example
    /// ```
    /// use loop_cli::Simulation;
    ///
    /// let simulation = Simulation::new();
    /// assert_eq!(simulation.until(), None);
    /// ```
    pub fn new() -> Self {
        Self { until: None }
    }

    /// Stop the loop before the clock passes `until`
    pub fn with_until(mut self, until: Option<u64>) -> Self {
        self.until = until;
        self
    }

    /// The configured tick limit
    pub fn until(&self) -> Option<u64> {
        self.until
    }

    /// Execute a script file
    ///
    /// The format is picked from the extension, see [`ScriptFormat::from_path`].
    ///
    /// # Errors
    /// Returns `CliError` if the file cannot be read, parsed or executed
    pub fn execute_file(&self, path: &str) -> CliResult<Report> {
        let source = std::fs::read_to_string(path)?;
        self.execute_string(&source, ScriptFormat::from_path(Path::new(path)))
    }

    /// Execute a script held in a string
    ///
    /// # Example
    /// ```
    /// use loop_cli::{ScriptFormat, Simulation};
    ///
    /// let report = Simulation::new()
    ///     .execute_string(
    ///         r#"{"ops": [{"op": "immediate", "label": "Im"}, {"op": "microtask", "label": "M"}]}"#,
    ///         ScriptFormat::Json,
    ///     )
    ///     .unwrap();
    /// assert_eq!(report.labels(), vec!["M", "Im"]);
    /// ```
    pub fn execute_string(&self, source: &str, format: ScriptFormat) -> CliResult<Report> {
        let script = Script::parse(source, format)?;
        self.execute_script(&script)
    }

    /// Execute an already parsed script
    ///
    /// Errors raised by ops inside callbacks do not stop the loop; the first
    /// one is returned once the run is over.
    pub fn execute_script(&self, script: &Script) -> CliResult<Report> {
        let mut scheduler = Scheduler::with_config(script.config.clone());
        let state: SharedState = Rc::new(RefCell::new(ScriptState::default()));

        scheduler.run_sync(|s| apply_ops(s, &state, &script.ops));
        let summary = match self.until {
            Some(limit) => scheduler.run_until_tick(limit),
            None => scheduler.run_until_idle(),
        };
        info!(?summary, "script finished");

        let mut state = state.borrow_mut();
        if let Some(err) = state.error.take() {
            return Err(err);
        }
        Ok(Report {
            entries: std::mem::take(&mut state.entries),
            summary,
        })
    }
}

fn apply_ops(scheduler: &mut Scheduler, state: &SharedState, ops: &[Op]) {
    for op in ops {
        if let Err(err) = apply_op(scheduler, state, op) {
            fail(state, err);
            return;
        }
    }
}

fn apply_op(scheduler: &mut Scheduler, state: &SharedState, op: &Op) -> CliResult<()> {
    match op {
        Op::Log { label } => record(scheduler, state, EntrySource::Sync, label),
        Op::Microtask { label, then } => {
            let handle =
                scheduler.schedule_microtask(callback(state, EntrySource::Microtask, label, then));
            register(scheduler, state, label, handle)?;
        }
        Op::Timeout { label, delay, then } => {
            let handle =
                scheduler.set_timeout(callback(state, EntrySource::Timer, label, then), *delay)?;
            register(scheduler, state, label, handle)?;
        }
        Op::Interval {
            label,
            delay,
            times,
            then,
        } => {
            if *times == Some(0) {
                return Err(CliError::Parse(format!(
                    "interval '{label}' must fire at least once (times: 0)"
                )));
            }
            let own = Rc::new(Cell::new(None));
            let handle = scheduler.set_interval(
                interval_callback(state, label, then, *times, Rc::clone(&own)),
                *delay,
            )?;
            own.set(Some(handle));
            register(scheduler, state, label, handle)?;
        }
        Op::Io {
            label,
            latency,
            rank,
            then,
        } => {
            let cb = callback(state, EntrySource::Io, label, then);
            let handle = if *latency == 0 {
                scheduler.schedule_io_completion(cb)
            } else {
                scheduler.schedule_io_completion_after(cb, *latency)?
            };
            if let Some(rank) = rank {
                scheduler.set_arrival_rank(handle, *rank)?;
            }
            register(scheduler, state, label, handle)?;
        }
        Op::Immediate { label, then } => {
            let handle =
                scheduler.schedule_immediate(callback(state, EntrySource::Immediate, label, then));
            register(scheduler, state, label, handle)?;
        }
        Op::Cancel { target } => scheduler.cancel(lookup(state, target)?)?,
        Op::Ref { target } => scheduler.ref_(lookup(state, target)?)?,
        Op::Unref { target } => scheduler.unref(lookup(state, target)?)?,
        Op::Block { ticks } => scheduler.block_for(*ticks)?,
    }
    Ok(())
}

fn callback(
    state: &SharedState,
    source: EntrySource,
    label: &str,
    then: &[Op],
) -> impl FnOnce(&mut Scheduler) + 'static {
    let state = Rc::clone(state);
    let label = label.to_string();
    let then = then.to_vec();
    move |scheduler: &mut Scheduler| {
        record(scheduler, &state, source, &label);
        apply_ops(scheduler, &state, &then);
    }
}

fn interval_callback(
    state: &SharedState,
    label: &str,
    then: &[Op],
    times: Option<u32>,
    own: Rc<Cell<Option<TaskHandle>>>,
) -> impl FnMut(&mut Scheduler) + 'static {
    let state = Rc::clone(state);
    let label = label.to_string();
    let then = then.to_vec();
    let mut fired = 0u32;
    move |scheduler: &mut Scheduler| {
        fired += 1;
        record(scheduler, &state, EntrySource::Timer, &label);
        apply_ops(scheduler, &state, &then);

        if times.is_some_and(|limit| fired >= limit) {
            if let Some(handle) = own.get() {
                if let Err(err) = scheduler.cancel(handle) {
                    fail(&state, err.into());
                }
            }
        }
    }
}

fn record(scheduler: &Scheduler, state: &SharedState, source: EntrySource, label: &str) {
    state.borrow_mut().entries.push(ReportEntry {
        tick: scheduler.now(),
        iteration: scheduler.iteration(),
        source,
        label: label.to_string(),
    });
}

fn register(
    scheduler: &mut Scheduler,
    state: &SharedState,
    label: &str,
    handle: TaskHandle,
) -> CliResult<()> {
    scheduler.set_label(handle, label)?;
    state
        .borrow_mut()
        .handles
        .insert(label.to_string(), handle);
    debug!(label, task = %handle.id(), "scheduled");
    Ok(())
}

fn lookup(state: &SharedState, label: &str) -> CliResult<TaskHandle> {
    state
        .borrow()
        .handles
        .get(label)
        .copied()
        .ok_or_else(|| CliError::UnknownLabel(label.to_string()))
}

fn fail(state: &SharedState, err: CliError) {
    warn!(error = %err, "script op failed");
    let mut state = state.borrow_mut();
    if state.error.is_none() {
        state.error = Some(err);
    }
}
