use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use taskrace::{Outcome, Task, TaskError, TestScheduler};

#[test]
fn resolves_exactly_once() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let f = Task::<i32>::never().run(&s);
    assert!(f.complete(Outcome::Success(1)), "First writer wins");
    assert!(
        !f.complete(Outcome::Success(2)),
        "A second resolution attempt is a silent no-op"
    );
    assert!(!f.complete(Outcome::Failure(TaskError::msg("late"))));
    assert_eq!(f.value().and_then(Outcome::success), Some(1));
}

#[test]
fn continuations_fire_once_in_registration_order() {
    let sched = TestScheduler::new();
    let s = sched.handle();
    let order = Arc::new(Mutex::new(String::new()));

    let f = Task::<i32>::never().run(&s);
    for label in ['a', 'b', 'c'] {
        let o = Arc::clone(&order);
        f.on_complete(move |_| o.lock().unwrap().push(label));
    }

    f.complete(Outcome::Success(5));
    assert_eq!(
        *order.lock().unwrap(),
        "abc",
        "Continuations fire in registration order"
    );
}

#[test]
fn continuation_registered_after_resolution_fires_immediately() {
    let sched = TestScheduler::new();
    let s = sched.handle();
    let seen = Arc::new(Mutex::new(None));

    let f = Task::now(3).run(&s);
    let seen_cl = Arc::clone(&seen);
    f.on_complete(move |result| *seen_cl.lock().unwrap() = result.ok());

    assert_eq!(*seen.lock().unwrap(), Some(3));
}

#[test]
fn canceled_future_reports_nothing() {
    let sched = TestScheduler::new();
    let s = sched.handle();
    let fired = Arc::new(Mutex::new(false));

    let f = Task::now(1).delay_execution(Duration::from_secs(1)).run(&s);
    let flag = Arc::clone(&fired);
    f.on_complete(move |_| *flag.lock().unwrap() = true);

    f.cancel();
    sched.advance(Duration::from_secs(5));

    assert!(
        !*fired.lock().unwrap(),
        "A canceled future fires no continuations"
    );
    assert!(f.is_canceled());
    assert!(
        f.value().map_or(false, |o| o.is_canceled()),
        "Cancellation is a distinct terminal state, not an error"
    );
}

#[test]
fn resolution_after_cancellation_is_discarded() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let f = Task::<i32>::never().run(&s);
    f.cancel();
    assert!(
        !f.complete(Outcome::Success(9)),
        "Resolving a canceled future is silently discarded"
    );
    assert!(f.value().map_or(false, |o| o.is_canceled()));
}

#[test]
fn cancel_after_resolution_is_a_no_op() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let f = Task::now(8).run(&s);
    f.cancel();
    f.cancel();
    assert_eq!(
        f.value().and_then(Outcome::success),
        Some(8),
        "Canceling a completed future changes nothing"
    );
}

#[test]
fn resolved_handles_fire_continuations_immediately() {
    let seen = Arc::new(Mutex::new(None));

    let f = taskrace::TaskFuture::resolved(Outcome::Success(11));
    assert!(f.is_completed());

    let seen_cl = Arc::clone(&seen);
    f.on_complete(move |result| *seen_cl.lock().unwrap() = result.ok());
    assert_eq!(
        *seen.lock().unwrap(),
        Some(11),
        "An already-resolved handle needs no scheduler to notify"
    );
}

#[test]
fn from_future_mirrors_an_external_handle() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let source = Task::<i32>::never().run(&s);
    let f = Task::from_future(source.clone()).run(&s);
    assert!(f.value().is_none());

    source.complete(Outcome::Success(7));
    assert_eq!(
        f.value().and_then(Outcome::success),
        Some(7),
        "The run resolves when the observed handle does"
    );
}

#[test]
fn canceling_a_from_future_run_leaves_the_source_alone() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let source = Task::<i32>::never().run(&s);
    let f = Task::from_future(source.clone()).run(&s);

    f.cancel();
    assert!(
        !source.is_canceled(),
        "Handle lifecycles are independent: the observer stops, the source runs on"
    );

    source.complete(Outcome::Success(7));
    assert!(
        f.value().map_or(false, |o| o.is_canceled()),
        "The canceled run never sees the late value"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn awaiting_a_canceled_future_yields_none() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let f = Task::now(1).delay_execution(Duration::from_secs(1)).run(&s);
    f.cancel();

    assert_eq!(f.clone().await, None, "Awaiting cancellation yields None");
}
