//! Ordering guarantees between the loop phases

use event_loop::{EventEmitter, QueueKind, RunOutcome, Scheduler};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn record(log: &Log, label: &str) -> impl FnMut(&mut Scheduler) + 'static {
    let log = log.clone();
    let label = label.to_string();
    move |_: &mut Scheduler| log.borrow_mut().push(label.clone())
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn documented_phase_order() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    scheduler.schedule_microtask(record(&log, "M"));
    scheduler.set_timeout(record(&log, "T0"), 0).unwrap();
    scheduler.set_timeout(record(&log, "T10"), 10).unwrap();
    scheduler.schedule_immediate(record(&log, "Im"));
    scheduler.schedule_io_completion(record(&log, "IO1"));

    let summary = scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["M", "T0", "IO1", "Im", "T10"]);
    assert_eq!(summary.outcome, RunOutcome::Idle);
    assert_eq!(summary.final_tick, 10);
}

#[test]
fn snap_quiz_order() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    let script_log = log.clone();
    scheduler.run_main(move |s| {
        let log = script_log;
        let messenger: EventEmitter<String> = EventEmitter::new();
        let l = log.clone();
        messenger.on("message", move |msg| l.borrow_mut().push(format!("MESSAGE: {msg}")));

        log.borrow_mut().push("FIRST".to_string());
        s.schedule_microtask(record(&log, "NEXT"));
        s.set_timeout(record(&log, "QUICK TIMER"), 0).unwrap();
        s.set_timeout(record(&log, "LONG TIMER"), 10).unwrap();
        s.schedule_immediate(record(&log, "IMMEDIATE"));
        messenger.emit("message", &"Hello!".to_string());
        s.schedule_io_completion(record(&log, "FIRST STAT"));
        s.schedule_io_completion(record(&log, "LAST STAT"));
        log.borrow_mut().push("LAST".to_string());
    });

    assert_eq!(
        entries(&log),
        vec![
            "FIRST",
            "MESSAGE: Hello!",
            "LAST",
            "NEXT",
            "QUICK TIMER",
            "FIRST STAT",
            "LAST STAT",
            "IMMEDIATE",
            "LONG TIMER",
        ]
    );
}

#[test]
fn microtasks_drain_between_timer_callbacks() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    let l = log.clone();
    scheduler
        .set_timeout(
            move |s| {
                l.borrow_mut().push("T1".to_string());
                s.schedule_immediate(record(&l, "Im"));
                let l = l.clone();
                s.schedule_microtask(move |s| {
                    l.borrow_mut().push("m1".to_string());
                    let l = l.clone();
                    s.schedule_microtask(move |s| {
                        l.borrow_mut().push("m2".to_string());
                        s.schedule_microtask(record(&l, "m3"));
                    });
                });
            },
            4,
        )
        .unwrap();
    scheduler.set_timeout(record(&log, "T2"), 4).unwrap();

    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["T1", "m1", "m2", "m3", "T2", "Im"]);
}

#[test]
fn recursive_microtasks_drain_before_first_timer() {
    let mut scheduler = Scheduler::new();
    let count = Rc::new(RefCell::new(0u32));
    let seen_by_timer = Rc::new(RefCell::new(None));

    fn chain(s: &mut Scheduler, count: Rc<RefCell<u32>>, remaining: u32) {
        *count.borrow_mut() += 1;
        if remaining > 0 {
            s.schedule_microtask(move |s| chain(s, count, remaining - 1));
        }
    }

    let c = count.clone();
    scheduler.schedule_microtask(move |s| chain(s, c, 99));
    let c = count.clone();
    let seen = seen_by_timer.clone();
    scheduler
        .set_timeout(move |_| *seen.borrow_mut() = Some(*c.borrow()), 0)
        .unwrap();

    scheduler.run_until_idle();

    assert_eq!(*seen_by_timer.borrow(), Some(100));
}

#[test]
fn equal_delays_fire_in_registration_order() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    scheduler.set_timeout(record(&log, "A"), 5).unwrap();
    scheduler.set_timeout(record(&log, "B"), 3).unwrap();
    scheduler.set_timeout(record(&log, "C"), 5).unwrap();
    scheduler.set_timeout(record(&log, "D"), 1).unwrap();
    scheduler.set_timeout(record(&log, "E"), 5).unwrap();

    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["D", "B", "A", "C", "E"]);
}

#[test]
fn shorter_delay_never_fires_after_longer_delay() {
    let mut scheduler = Scheduler::new();
    let fired = Rc::new(RefCell::new(Vec::new()));

    for delay in (1..=20).rev() {
        let f = fired.clone();
        scheduler
            .set_timeout(move |_| f.borrow_mut().push(delay), delay)
            .unwrap();
    }
    scheduler.run_until_idle();

    let fired = fired.borrow();
    assert_eq!(fired.len(), 20);
    assert!(fired.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn cancelled_tasks_never_fire() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    let micro = scheduler.schedule_microtask(record(&log, "micro"));
    let io = scheduler.schedule_io_completion(record(&log, "io"));
    let immediate = scheduler.schedule_immediate(record(&log, "immediate"));
    let timer = scheduler.set_timeout(record(&log, "timer"), 2).unwrap();
    scheduler.schedule_immediate(record(&log, "kept"));

    for handle in [micro, io, immediate, timer] {
        scheduler.cancel(handle).unwrap();
    }
    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["kept"]);
}

#[test]
fn timer_cancelled_by_earlier_timer_in_same_group() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    let victim = Rc::new(RefCell::new(None));
    let v = victim.clone();
    let l = log.clone();
    scheduler
        .set_timeout(
            move |s| {
                l.borrow_mut().push("first".to_string());
                if let Some(handle) = v.borrow_mut().take() {
                    s.cancel(handle).unwrap();
                }
            },
            3,
        )
        .unwrap();
    let handle = scheduler.set_timeout(record(&log, "second"), 3).unwrap();
    *victim.borrow_mut() = Some(handle);

    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["first"]);
}

#[test]
fn immediate_queued_by_immediate_runs_next_iteration() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    let l = log.clone();
    let first = scheduler.schedule_immediate(move |s| {
        l.borrow_mut().push("I1".to_string());
        let handle = s.schedule_immediate(record(&l, "I2"));
        s.set_label(handle, "I2").unwrap();
    });
    scheduler.set_label(first, "I1").unwrap();
    scheduler.schedule_immediate(record(&log, "I1b"));

    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["I1", "I1b", "I2"]);
    let iterations: Vec<_> = scheduler
        .trace()
        .firings()
        .iter()
        .map(|firing| firing.iteration)
        .collect();
    assert_eq!(iterations, vec![1, 1, 2]);
}

#[test]
fn io_queued_during_io_phase_waits_for_next_iteration() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    let l = log.clone();
    scheduler.schedule_io_completion(move |s| {
        l.borrow_mut().push("io1".to_string());
        s.schedule_io_completion(record(&l, "io2"));
    });
    scheduler.schedule_immediate(record(&log, "imm"));

    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["io1", "imm", "io2"]);
}

#[test]
fn in_flight_io_is_delivered_when_ready() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    scheduler.set_timeout(record(&log, "T3"), 3).unwrap();
    scheduler
        .schedule_io_completion_after(record(&log, "IO5"), 5)
        .unwrap();
    scheduler.set_timeout(record(&log, "T7"), 7).unwrap();

    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["T3", "IO5", "T7"]);
    let io_tick = scheduler
        .trace()
        .firings()
        .iter()
        .find(|firing| firing.kind == QueueKind::Io)
        .map(|firing| firing.tick);
    assert_eq!(io_tick, Some(5));
}

#[test]
fn arrival_rank_fixes_io_order() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    let a = scheduler.schedule_io_completion(record(&log, "a"));
    let b = scheduler.schedule_io_completion(record(&log, "b"));
    let c = scheduler.schedule_io_completion(record(&log, "c"));
    scheduler.set_arrival_rank(a, 3).unwrap();
    scheduler.set_arrival_rank(b, 1).unwrap();
    scheduler.set_arrival_rank(c, 2).unwrap();

    scheduler.run_until_idle();

    assert_eq!(entries(&log), vec!["b", "c", "a"]);
}

#[test]
fn blocking_work_delays_timers_uniformly() {
    let mut scheduler = Scheduler::new();
    let log = new_log();

    scheduler.run_main(|s| {
        s.set_timeout(record(&log, "T10"), 10).unwrap();
        s.set_timeout(record(&log, "T5"), 5).unwrap();
        s.block_for(20).unwrap();
    });

    assert_eq!(entries(&log), vec!["T5", "T10"]);
    let ticks: Vec<_> = scheduler.trace().firings().iter().map(|f| f.tick).collect();
    assert_eq!(ticks, vec![20, 20]);
}
