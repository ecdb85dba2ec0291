use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use taskrace::{Either, Outcome, Task, TaskError, TestScheduler, choose_first_of, choose_first_of_list};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn list_race_first_to_finish_wins() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of_list(vec![
        Task::now(1).delay_execution(secs(10)),
        Task::now(99).delay_execution(secs(1)),
    ]);
    let f = race.run(&s);

    assert!(f.value().is_none(), "Nothing resolved at t=0");

    sched.advance(secs(1));
    assert_eq!(
        f.value().and_then(Outcome::success),
        Some(99),
        "The 1s branch should win"
    );
    assert_eq!(
        sched.pending_count(),
        0,
        "The losing 10s branch should be canceled, not left pending"
    );
}

#[test]
fn list_race_ties_go_to_the_lowest_index() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of_list(vec![
        Task::now('a').delay_execution(secs(1)),
        Task::now('b').delay_execution(secs(1)),
        Task::now('c').delay_execution(secs(1)),
    ]);
    let f = race.run(&s);

    sched.advance(secs(1));
    assert_eq!(
        f.value().and_then(Outcome::success),
        Some('a'),
        "All due in the same step: input order decides"
    );
}

#[test]
fn list_race_immediate_branch_stops_later_branches_from_starting() {
    let sched = TestScheduler::new();
    let s = sched.handle();
    let started = Arc::new(Mutex::new(false));

    let flag = Arc::clone(&started);
    let race = choose_first_of_list(vec![
        Task::now(7),
        Task::eval(move || {
            *flag.lock().unwrap() = true;
            8
        }),
    ]);
    let f = race.run(&s);

    assert_eq!(
        f.value().and_then(Outcome::success),
        Some(7),
        "An immediately-ready branch resolves the race synchronously"
    );
    assert!(
        !*started.lock().unwrap(),
        "Branches after the winner must never start"
    );
    assert_eq!(sched.pending_count(), 0);
}

#[test]
fn list_race_error_short_circuits_and_cancels_siblings() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of_list(vec![
        Task::raise_error(TaskError::msg("boom")).delay_execution(secs(1)),
        Task::now(99).delay_execution(secs(2)),
    ]);
    let f = race.run(&s);

    sched.advance(secs(1));
    let err = f
        .value()
        .and_then(Outcome::failure)
        .expect("Race should fail with the first error");
    assert_eq!(err.to_string(), "boom", "The error propagates verbatim");
    assert_eq!(
        sched.pending_count(),
        0,
        "The branch that would have succeeded later is canceled"
    );

    // The sibling's would-be success can never overwrite the failure.
    sched.advance(secs(10));
    assert!(
        f.value().map_or(false, |o| o.is_failure()),
        "Outcome stays the original failure"
    );
}

#[test]
fn list_race_cancellation_cancels_every_branch() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of_list(vec![
        Task::now(1).delay_execution(secs(1)),
        Task::now(2).delay_execution(secs(2)),
        Task::now(3).delay_execution(secs(3)),
    ]);
    let f = race.run(&s);
    assert_eq!(sched.pending_count(), 3, "All branches registered timers");

    f.cancel();
    assert_eq!(sched.pending_count(), 0, "Canceling the race leaks no work");

    sched.advance(secs(10));
    assert!(
        f.value().map_or(false, |o| o.is_canceled()),
        "No branch completion is observed after cancellation"
    );
}

#[test]
fn list_race_of_nothing_never_resolves() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let f = choose_first_of_list(Vec::<Task<i32>>::new()).run(&s);
    sched.advance(secs(100));

    assert!(f.value().is_none(), "No branches, no resolution");
    assert_eq!(sched.pending_count(), 0, "And no work registered either");
}

#[test]
fn list_race_is_stack_safe_for_huge_inputs() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let branches: Vec<_> = (0..100_000u32)
        .map(|i| Task::now(i).delay_execution(Duration::from_millis(1)))
        .collect();
    let f = choose_first_of_list(branches).run(&s);
    assert_eq!(sched.pending_count(), 100_000);

    sched.advance(Duration::from_millis(1));
    assert_eq!(
        f.value().and_then(Outcome::success),
        Some(0),
        "All ready in one step, the first wins"
    );
    assert_eq!(sched.pending_count(), 0, "All losers canceled");
}

#[test]
fn two_way_race_keeps_the_loser_running() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of(
        Task::now(1).delay_execution(secs(1)),
        Task::now("slow").delay_execution(secs(10)),
    );
    let f = race.run(&s);

    sched.advance(secs(1));
    let loser = match f.value() {
        Some(Outcome::Success(Either::Left((winner, loser)))) => {
            assert_eq!(winner, 1);
            loser
        }
        other => panic!("Expected a left-side win, got {other:?}"),
    };
    assert!(loser.value().is_none(), "Loser is still running");
    assert_eq!(
        sched.pending_count(),
        1,
        "Loser's timer stays scheduled on a success outcome"
    );

    sched.advance(secs(9));
    assert_eq!(
        loser.value().and_then(Outcome::success),
        Some("slow"),
        "The loser can still be awaited to completion"
    );
    assert_eq!(sched.pending_count(), 0);
}

#[test]
fn two_way_race_ties_go_left() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let f = choose_first_of(Task::now(1), Task::now(2)).run(&s);
    sched.tick();

    assert!(
        f.value().map_or(false, |o| o
            .success()
            .map_or(false, |either| either.is_left())),
        "Both ready in the same step: left wins"
    );
}

#[test]
fn two_way_race_loser_is_independent_of_the_outer_future() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of(
        Task::now(1),
        Task::now(2).delay_execution(secs(10)),
    );
    let f = race.run(&s);
    sched.tick();

    let loser = match f.value() {
        Some(Outcome::Success(Either::Left((_, loser)))) => loser,
        other => panic!("Expected a left-side win, got {other:?}"),
    };

    // Canceling the resolved outer future must not touch the loser.
    f.cancel();
    assert_eq!(
        sched.pending_count(),
        1,
        "Loser unaffected by canceling the outer future"
    );
    assert!(!loser.is_canceled());

    // Only an explicit cancel on the handle stops it.
    loser.cancel();
    assert_eq!(sched.pending_count(), 0, "Explicit cancel stops the loser");
    assert!(loser.is_canceled());
}

#[test]
fn two_way_race_error_cancels_both_sides() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of(
        Task::<i32>::raise_error(TaskError::msg("left failed")).delay_execution(secs(1)),
        Task::now(2).delay_execution(secs(5)),
    );
    let f = race.run(&s);

    sched.advance(secs(1));
    let err = f
        .value()
        .and_then(Outcome::failure)
        .expect("Errors short-circuit even though the right side would succeed");
    assert_eq!(err.to_string(), "left failed");
    assert_eq!(
        sched.pending_count(),
        0,
        "The side that was about to win is canceled on failure"
    );
}

#[test]
fn two_way_race_cancellation_before_resolution_cancels_both() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let race = choose_first_of(
        Task::now(1).delay_execution(secs(1)),
        Task::now(2).delay_execution(secs(2)),
    );
    let f = race.run(&s);

    f.cancel();
    assert_eq!(sched.pending_count(), 0, "Both sides canceled, no leaks");

    sched.advance(secs(10));
    assert!(f.value().map_or(false, |o| o.is_canceled()));
}

#[test]
fn two_way_race_folds_without_stack_growth() {
    let sched = TestScheduler::new();
    let s = sched.handle();

    let mut acc = Task::now(0u64);
    for _ in 0..10_000 {
        acc = choose_first_of(acc, Task::<u64>::never()).map(|either| match either {
            Either::Left((value, _)) => value,
            Either::Right((_, value)) => value,
        });
    }
    let f = acc.run(&s);

    sched.tick();
    assert_eq!(
        f.value().and_then(Outcome::success),
        Some(0),
        "The innermost ready task should surface through 10_000 fold layers"
    );
    assert_eq!(sched.pending_count(), 0);
}
