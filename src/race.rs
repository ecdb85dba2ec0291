//! First-to-finish racing of concurrently started tasks.
//!
//! Both combinators start every branch under the same scheduler and resolve
//! with whichever branch leaves the pending state first. They differ in what
//! happens to the other branches: [`choose_first_of_list`] cancels every
//! loser, while [`choose_first_of`] hands the caller a live handle to the
//! losing side so it can be awaited, ignored, or canceled explicitly.

use std::sync::{Arc, Mutex};

use crate::{
    cancelable::{CancelGroup, Cancelable},
    future::TaskFuture,
    outcome::Outcome,
    task::Task,
};

/// Result of a two-way race: which side won, its value, and the handle of
/// the side still running.
#[derive(Debug, Clone)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Either<L, R> {
    #[must_use]
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }

    #[must_use]
    pub fn is_right(&self) -> bool {
        matches!(self, Either::Right(_))
    }

    pub fn left(self) -> Option<L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    pub fn right(self) -> Option<R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }
}

/// Races a sequence of tasks; the first branch to resolve — with a value or
/// an error — decides the outcome and every other branch is canceled.
///
/// Branches are started in input order in one flat loop, so racing very
/// large sequences does not grow the call stack. A branch that resolves
/// while later branches are still being started stops those later branches
/// from ever starting. If several branches become ready within the same
/// scheduling step, the one with the lowest input index wins, because
/// branches are started, and their completions observed, in input order.
///
/// The first error short-circuits: the race fails with it verbatim and a
/// later success from a sibling is discarded. Canceling the race's own
/// handle before any branch resolves cancels every branch, and no branch's
/// later completion is observed.
///
/// An empty sequence yields a race that never resolves.
pub fn choose_first_of_list<A: Clone + Send + 'static>(
    tasks: impl IntoIterator<Item = Task<A>>,
) -> Task<A> {
    let branches: Arc<Vec<Task<A>>> = Arc::new(tasks.into_iter().collect());
    Task::from_run_fn(move |scheduler, conn, finish| {
        let race = CancelGroup::new();
        conn.push(race.to_cancelable());
        // One-shot cell: whichever branch takes the callback is the winner.
        let winner = Arc::new(Mutex::new(Some(finish)));
        for branch in branches.iter() {
            if race.is_canceled() {
                // A branch already won (or the race was canceled); the
                // remaining branches must never start.
                break;
            }
            let running = branch.run(scheduler);
            let handle = running.clone();
            race.push(Cancelable::new(move || handle.cancel()));
            let winner = Arc::clone(&winner);
            let race = race.clone();
            running.on_complete(move |result| {
                let finish = winner.lock().unwrap().take();
                if let Some(finish) = finish {
                    // Losers first, then resolution. Canceling the winning
                    // branch's own slot is a no-op by this point.
                    race.cancel();
                    finish(Outcome::from_result(result));
                }
            });
        }
    })
}

/// Races two tasks, keeping the loser alive on success.
///
/// If one side succeeds first the race resolves with that value plus the
/// other side's still-running [`TaskFuture`]; the loser is *not* canceled
/// and its lifecycle is independent from the race's handle from then on —
/// only an explicit [`cancel`](TaskFuture::cancel) on the loser handle
/// stops it. If either side fails first, both sides are canceled and the
/// race fails with that error, even if the other side was about to succeed.
///
/// Both sides are started through the scheduler queue, left first, so
/// same-step ties resolve to the left side, and folding this combinator
/// pairwise over large sequences costs queue entries rather than stack
/// frames.
pub fn choose_first_of<A, B>(
    left: Task<A>,
    right: Task<B>,
) -> Task<Either<(A, TaskFuture<B>), (TaskFuture<A>, B)>>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    Task::from_run_fn(move |scheduler, conn, finish| {
        let race = CancelGroup::new();
        conn.push(race.to_cancelable());

        // Left is enqueued first: on a FIFO scheduler it also completes
        // first when both sides are ready in the same step.
        let left_running = left.run_deferred(scheduler);
        let right_running = right.run_deferred(scheduler);
        let cancel_left = left_running.clone();
        let cancel_right = right_running.clone();
        race.push(Cancelable::new(move || cancel_left.cancel()));
        race.push(Cancelable::new(move || cancel_right.cancel()));

        let winner = Arc::new(Mutex::new(Some(finish)));

        let loser_of_left = right_running.clone();
        let winner_left = Arc::clone(&winner);
        let race_left = race.clone();
        let scheduler_left = scheduler.clone();
        left_running.on_complete(move |result| {
            let finish = winner_left.lock().unwrap().take();
            let Some(finish) = finish else { return };
            let outcome = match result {
                Ok(a) => Outcome::Success(Either::Left((a, loser_of_left))),
                Err(e) => {
                    race_left.cancel();
                    Outcome::Failure(e)
                }
            };
            // Resolution crosses the scheduler: when this race is one layer
            // of a deep pairwise fold, the winner surfaces through queue
            // entries instead of nested listener calls.
            scheduler_left.execute(Box::new(move || finish(outcome)));
        });

        let loser_of_right = left_running.clone();
        let winner_right = Arc::clone(&winner);
        let race_right = race.clone();
        let scheduler_right = scheduler.clone();
        right_running.on_complete(move |result| {
            let finish = winner_right.lock().unwrap().take();
            let Some(finish) = finish else { return };
            let outcome = match result {
                Ok(b) => Outcome::Success(Either::Right((loser_of_right, b))),
                Err(e) => {
                    race_right.cancel();
                    Outcome::Failure(e)
                }
            };
            scheduler_right.execute(Box::new(move || finish(outcome)));
        });
    })
}
