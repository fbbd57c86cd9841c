//! Contract tests for the event_loop component
//!
//! These tests pin the public surface the harness and other callers rely on.

use event_loop::{
    EventEmitter, Firing, LoopConfig, QueueKind, RunOutcome, RunSummary, Scheduler,
    SchedulerError, SchedulerResult, TaskHandle, TaskId, Trace,
};

mod scheduler_contract {
    use super::*;

    #[test]
    fn scheduler_new_returns_self() {
        let scheduler = Scheduler::new();
        let _ = scheduler;
    }

    #[test]
    fn scheduler_default_matches_new() {
        let scheduler = Scheduler::default();
        assert_eq!(scheduler.config(), &LoopConfig::default());
    }

    #[test]
    fn schedule_microtask_returns_handle() {
        let mut scheduler = Scheduler::new();
        let _: TaskHandle = scheduler.schedule_microtask(|_| {});
    }

    #[test]
    fn schedule_timer_returns_result_handle() {
        let mut scheduler = Scheduler::new();
        let result: SchedulerResult<TaskHandle> = scheduler.schedule_timer(|_| {}, 1, false);
        assert!(result.is_ok());
    }

    #[test]
    fn schedule_io_completion_returns_handle() {
        let mut scheduler = Scheduler::new();
        let _: TaskHandle = scheduler.schedule_io_completion(|_| {});
    }

    #[test]
    fn schedule_immediate_returns_handle() {
        let mut scheduler = Scheduler::new();
        let _: TaskHandle = scheduler.schedule_immediate(|_| {});
    }

    #[test]
    fn lifecycle_methods_return_results() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_timer(|_| {}, 1, true).unwrap();

        let unref: SchedulerResult<()> = scheduler.unref(handle);
        let reref: SchedulerResult<()> = scheduler.ref_(handle);
        let cancel: SchedulerResult<()> = scheduler.cancel(handle);
        assert!(unref.is_ok() && reref.is_ok() && cancel.is_ok());
    }

    #[test]
    fn run_until_idle_returns_summary() {
        let mut scheduler = Scheduler::new();
        let summary: RunSummary = scheduler.run_until_idle();
        assert_eq!(summary.outcome, RunOutcome::Idle);
    }

    #[test]
    fn handle_exposes_task_id() {
        let mut scheduler = Scheduler::new();
        let first = scheduler.schedule_microtask(|_| {});
        let second = scheduler.schedule_microtask(|_| {});
        let _: TaskId = first.id();
        assert!(first.id() < second.id());
    }
}

mod error_contract {
    use super::*;

    #[test]
    fn error_has_invalid_delay_variant() {
        let err = SchedulerError::InvalidDelay(-1);
        assert!(matches!(err, SchedulerError::InvalidDelay(-1)));
    }

    #[test]
    fn error_has_unknown_handle_variant() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_microtask(|_| {});
        let err = SchedulerError::UnknownHandle(handle);
        assert!(matches!(err, SchedulerError::UnknownHandle(_)));
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<SchedulerError>();
    }
}

mod queue_kind_contract {
    use super::*;

    #[test]
    fn queue_kind_has_four_variants() {
        let kinds = [
            QueueKind::Microtask,
            QueueKind::Timer,
            QueueKind::Io,
            QueueKind::Immediate,
        ];
        let names: Vec<_> = kinds.iter().map(QueueKind::as_str).collect();
        assert_eq!(names, vec!["microtask", "timer", "io", "immediate"]);
    }
}

mod trace_contract {
    use super::*;

    #[test]
    fn trace_exposes_firings() {
        let scheduler = Scheduler::new();
        let trace: &Trace = scheduler.trace();
        let _: &[Firing] = trace.firings();
    }
}

mod emitter_contract {
    use super::*;

    #[test]
    fn emitter_emit_returns_bool() {
        let emitter: EventEmitter<i32> = EventEmitter::default();
        let delivered: bool = emitter.emit("anything", &0);
        assert!(!delivered);
    }
}
