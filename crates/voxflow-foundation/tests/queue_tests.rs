//! Task queue tests
//!
//! Tests cover:
//! - FIFO execution order
//! - Lazy start on first submit
//! - Purge/cancel semantics and idempotence
//! - Wait-until-empty blocking and timeout behavior
//! - Panic isolation at the task boundary

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use voxflow_foundation::{TaskQueue, WaitOutcome};

// ─── Ordering ───────────────────────────────────────────────────────

#[test]
fn tasks_run_in_submission_order() {
    let queue = TaskQueue::new();
    let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100u32 {
        let log = log.clone();
        queue
            .submit(Box::new(move || log.lock().push(i)))
            .expect("submit should succeed");
    }

    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_secs(5))),
        WaitOutcome::Done
    );
    assert_eq!(*log.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn tasks_submitted_during_a_drain_are_not_skipped() {
    let queue = TaskQueue::new();
    let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    // The first task submits a follow-up while the worker is mid-drain.
    let inner_log = log.clone();
    let (tx, rx) = crossbeam_channel::bounded::<u32>(1);
    queue
        .submit(Box::new(move || {
            inner_log.lock().push(1);
            let _ = tx.send(2);
        }))
        .unwrap();
    let follow = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let inner_log = log.clone();
    queue
        .submit(Box::new(move || inner_log.lock().push(follow)))
        .unwrap();

    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_secs(2))),
        WaitOutcome::Done
    );
    assert_eq!(*log.lock(), vec![1, 2]);
}

// ─── Lifecycle ──────────────────────────────────────────────────────

#[test]
fn submit_lazily_starts_the_worker() {
    let queue = TaskQueue::new();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    queue
        .submit(Box::new(move || flag.store(true, Ordering::SeqCst)))
        .expect("submit on a fresh queue should start it");

    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_secs(1))),
        WaitOutcome::Done
    );
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn cancel_is_idempotent_after_start() {
    let queue = TaskQueue::new();
    queue.start().unwrap();
    queue.submit(Box::new(|| {})).unwrap();
    queue.cancel();
    queue.cancel();
}

#[test]
fn cancel_discards_pending_tasks() {
    let queue = TaskQueue::new();
    queue
        .submit(Box::new(|| thread::sleep(Duration::from_millis(200))))
        .unwrap();
    // Give the worker time to pick up the sleeper so the next task stays
    // pending.
    thread::sleep(Duration::from_millis(50));

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    queue
        .submit(Box::new(move || flag.store(true, Ordering::SeqCst)))
        .unwrap();

    queue.cancel();
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn queue_restarts_after_cancel() {
    let queue = TaskQueue::new();
    queue.submit(Box::new(|| {})).unwrap();
    queue.cancel();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    queue
        .submit(Box::new(move || flag.store(true, Ordering::SeqCst)))
        .unwrap();
    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_secs(1))),
        WaitOutcome::Done
    );
    assert!(ran.load(Ordering::SeqCst));
}

// ─── Purge ──────────────────────────────────────────────────────────

#[test]
fn purge_then_submit_runs_only_the_new_task() {
    let queue = TaskQueue::new();
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);

    // Hold the worker inside a task so later submissions stay pending.
    queue
        .submit(Box::new(move || {
            let _ = gate_rx.recv_timeout(Duration::from_secs(5));
        }))
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    let discarded = Arc::new(AtomicBool::new(false));
    let flag = discarded.clone();
    queue
        .submit(Box::new(move || flag.store(true, Ordering::SeqCst)))
        .unwrap();

    queue.purge_pending();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    queue
        .submit(Box::new(move || flag.store(true, Ordering::SeqCst)))
        .unwrap();

    gate_tx.send(()).unwrap();
    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_secs(2))),
        WaitOutcome::Done
    );
    assert!(!discarded.load(Ordering::SeqCst));
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn purge_on_unstarted_queue_is_a_noop() {
    let queue = TaskQueue::new();
    queue.purge_pending();
}

// ─── Wait-until-empty ───────────────────────────────────────────────

#[test]
fn wait_blocks_while_a_task_runs() {
    let queue = TaskQueue::new();
    queue
        .submit(Box::new(|| thread::sleep(Duration::from_millis(300))))
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_secs(2))),
        WaitOutcome::Done
    );
    // The sleeper keeps the queue non-empty for the rest of its sleep.
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[test]
fn wait_times_out_while_a_task_runs() {
    let queue = TaskQueue::new();
    queue
        .submit(Box::new(|| thread::sleep(Duration::from_millis(500))))
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_millis(50))),
        WaitOutcome::TimedOut
    );
    queue.cancel();
}

// ─── Fault isolation ────────────────────────────────────────────────

#[test]
fn a_panicking_task_does_not_kill_the_worker() {
    let queue = TaskQueue::new();
    queue.submit(Box::new(|| panic!("synthetic failure"))).unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    queue
        .submit(Box::new(move || flag.store(true, Ordering::SeqCst)))
        .unwrap();

    assert_eq!(
        queue.wait_until_empty(Some(Duration::from_secs(2))),
        WaitOutcome::Done
    );
    assert!(ran.load(Ordering::SeqCst));
}
