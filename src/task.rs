//! Defines the `Task` struct and its primitive constructors.
//!
//! A `Task` is a lazy, immutable description of an asynchronous computation
//! that produces a value or an error. Nothing happens when a `Task` is built
//! or composed; running it on a [`Scheduler`](crate::Scheduler) starts the
//! work and yields a [`TaskFuture`] that can be observed, awaited, and
//! canceled. The same description can be run any number of times, each run
//! independent of the others.

use std::{sync::Arc, time::Duration};

use crate::{
    cancelable::CancelGroup,
    future::TaskFuture,
    outcome::{Outcome, TaskError},
    scheduler::SchedulerRef,
};

/// Callback receiving a run's terminal outcome.
pub(crate) type OnFinish<A> = Box<dyn FnOnce(Outcome<A>) + Send>;

type RunFn<A> = dyn Fn(&SchedulerRef, &CancelGroup, OnFinish<A>) + Send + Sync;

/// A lazy, composable description of an asynchronous computation.
///
/// The task does not start running when constructed; it must be started
/// with [`run`](Task::run). Values are shared with every observer of a run,
/// so they must be `Clone` (cheaply, e.g. behind an `Arc`, for anything
/// big).
///
/// Cloning a `Task` clones the description, not any running instance.
pub struct Task<A> {
    run_fn: Arc<RunFn<A>>,
}

impl<A> Clone for Task<A> {
    fn clone(&self) -> Self {
        Task {
            run_fn: Arc::clone(&self.run_fn),
        }
    }
}

impl<A: Clone + Send + 'static> Task<A> {
    pub(crate) fn from_run_fn(
        run_fn: impl Fn(&SchedulerRef, &CancelGroup, OnFinish<A>) + Send + Sync + 'static,
    ) -> Self {
        Task {
            run_fn: Arc::new(run_fn),
        }
    }

    /// A task that immediately succeeds with `value`.
    pub fn now(value: A) -> Self
    where
        A: Sync,
    {
        Task::from_run_fn(move |_, _, finish| finish(Outcome::Success(value.clone())))
    }

    /// A task that evaluates `f` each time it is run and succeeds with the
    /// result.
    pub fn eval(f: impl Fn() -> A + Send + Sync + 'static) -> Self {
        Task::from_run_fn(move |_, _, finish| finish(Outcome::Success(f())))
    }

    /// A task that immediately fails with `error`.
    pub fn raise_error(error: TaskError) -> Self {
        Task::from_run_fn(move |_, _, finish| finish(Outcome::Failure(error.clone())))
    }

    /// A task that never resolves. Running it registers no work, so it can
    /// only end through cancellation.
    pub fn never() -> Self {
        Task::from_run_fn(|_, _, _finish| {})
    }

    /// A task that, when run, observes an already-running computation.
    ///
    /// Each run registers a continuation on `handle` and mirrors its
    /// resolution. The handle's lifecycle stays independent: canceling a
    /// run of this task stops observing but does not cancel `handle`, and
    /// if `handle` itself is canceled the run simply never resolves.
    pub fn from_future(handle: TaskFuture<A>) -> Self {
        Task::from_run_fn(move |_, _, finish| {
            handle.on_complete(move |result| finish(Outcome::from_result(result)));
        })
    }

    /// Transforms the success value of this task with `f`. Errors and
    /// cancellation pass through untouched.
    pub fn map<B: Clone + Send + 'static>(
        &self,
        f: impl Fn(A) -> B + Send + Sync + 'static,
    ) -> Task<B> {
        let source = self.clone();
        let f = Arc::new(f);
        Task::from_run_fn(move |scheduler, conn, finish| {
            let f = Arc::clone(&f);
            source.run_raw(
                scheduler,
                conn,
                Box::new(move |outcome| {
                    finish(match outcome {
                        Outcome::Success(a) => Outcome::Success(f(a)),
                        Outcome::Failure(e) => Outcome::Failure(e),
                        Outcome::Canceled => Outcome::Canceled,
                    });
                }),
            );
        })
    }

    /// Sequences this task with a continuation chosen from its success
    /// value.
    ///
    /// The continuation crossing goes through the scheduler rather than the
    /// call stack, so arbitrarily long `flat_map` chains will not overflow
    /// it. Canceling the run between the two steps prevents the
    /// continuation from ever starting.
    pub fn flat_map<B: Clone + Send + 'static>(
        &self,
        f: impl Fn(A) -> Task<B> + Send + Sync + 'static,
    ) -> Task<B> {
        let source = self.clone();
        let f = Arc::new(f);
        Task::from_run_fn(move |scheduler, conn, finish| {
            let f = Arc::clone(&f);
            let scheduler_for_step = scheduler.clone();
            let conn_for_step = conn.clone();
            source.run_raw(
                scheduler,
                conn,
                Box::new(move |outcome| match outcome {
                    Outcome::Success(a) => {
                        let next = f(a);
                        let conn = conn_for_step.clone();
                        let scheduler = scheduler_for_step.clone();
                        // The crossing is a cancelable queue entry, not a
                        // direct call: long chains cost queue hops instead
                        // of stack frames, and canceling the run removes
                        // the entry before the continuation starts.
                        let step = scheduler_for_step.schedule_once(
                            Duration::ZERO,
                            Box::new(move || {
                                if conn.is_canceled() {
                                    return;
                                }
                                next.run_raw(&scheduler, &conn, finish);
                            }),
                        );
                        conn_for_step.push(step);
                    }
                    Outcome::Failure(e) => finish(Outcome::Failure(e)),
                    Outcome::Canceled => finish(Outcome::Canceled),
                }),
            );
        })
    }

    /// Postpones the start of this task by `delay` on the scheduler's
    /// clock.
    ///
    /// The timer is registered with the run's cancelables, so canceling the
    /// run before the delay elapses removes the scheduled callback and the
    /// task never starts.
    #[must_use]
    pub fn delay_execution(&self, delay: Duration) -> Task<A> {
        let source = self.clone();
        Task::from_run_fn(move |scheduler, conn, finish| {
            let source = source.clone();
            let scheduler_at_due = scheduler.clone();
            let conn_at_due = conn.clone();
            let timer = scheduler.schedule_once(
                delay,
                Box::new(move || {
                    if conn_at_due.is_canceled() {
                        return;
                    }
                    source.run_raw(&scheduler_at_due, &conn_at_due, finish);
                }),
            );
            conn.push(timer);
        })
    }

    /// Starts the computation on `scheduler` and returns the handle to the
    /// running instance.
    ///
    /// Steps without a scheduling boundary resolve the handle synchronously
    /// within this call; everything else resolves during a later scheduler
    /// step. The handle's [`cancel`](TaskFuture::cancel) stops all work
    /// this run has registered.
    pub fn run(&self, scheduler: &SchedulerRef) -> TaskFuture<A> {
        let conn = CancelGroup::new();
        let future = TaskFuture::pending(conn.clone());
        let resolve = future.clone();
        (self.run_fn)(
            scheduler,
            &conn,
            Box::new(move |outcome| {
                resolve.complete(outcome);
            }),
        );
        future
    }

    /// Like [`run`](Task::run), but the register step itself is enqueued on
    /// the scheduler instead of running inline. Used where inline
    /// registration would nest — one queue entry per level instead of one
    /// stack frame.
    pub(crate) fn run_deferred(&self, scheduler: &SchedulerRef) -> TaskFuture<A> {
        let conn = CancelGroup::new();
        let future = TaskFuture::pending(conn.clone());
        let resolve = future.clone();
        let task = self.clone();
        let scheduler_at_start = scheduler.clone();
        let conn_at_start = conn.clone();
        let start = scheduler.schedule_once(
            Duration::ZERO,
            Box::new(move || {
                if conn_at_start.is_canceled() {
                    return;
                }
                task.run_raw(
                    &scheduler_at_start,
                    &conn_at_start,
                    Box::new(move |outcome| {
                        resolve.complete(outcome);
                    }),
                );
            }),
        );
        conn.push(start);
        future
    }

    /// Runs the register function against an existing connection. This is
    /// how combinators chain without allocating a handle per layer.
    pub(crate) fn run_raw(&self, scheduler: &SchedulerRef, conn: &CancelGroup, finish: OnFinish<A>) {
        (self.run_fn)(scheduler, conn, finish);
    }
}

impl<A> std::fmt::Debug for Task<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}
