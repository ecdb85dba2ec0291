//! Time limits for tasks, built as races against a timer.
//!
//! [`Task::timeout`] fails a slow source with [`TaskError::Timeout`];
//! [`Task::timeout_to`] switches to a backup task instead. In both, the
//! timer lives in the scheduler queue, so a source that resolves in time
//! removes it and leaves nothing pending, and a timer that fires cancels
//! the source so a late completion can never surface.

use std::{
    mem,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    cancelable::{CancelGroup, Cancelable},
    outcome::{Outcome, TaskError},
    task::{OnFinish, Task},
};

/// Which lane owns the resolution of a `timeout_to` run.
enum Lane<A> {
    /// Source and timer are racing.
    Racing(OnFinish<A>),
    /// The timer fired; the backup task owns the resolution now.
    Backup(OnFinish<A>),
    /// Resolved, or resolution in progress by the lane that took the
    /// callback.
    Done,
}

impl<A> Lane<A> {
    fn take_if_racing(cell: &Mutex<Self>) -> Option<OnFinish<A>> {
        let mut lane = cell.lock().unwrap();
        match mem::replace(&mut *lane, Lane::Done) {
            Lane::Racing(finish) => Some(finish),
            other => {
                *lane = other;
                None
            }
        }
    }

    fn take_if_backup(cell: &Mutex<Self>) -> Option<OnFinish<A>> {
        let mut lane = cell.lock().unwrap();
        match mem::replace(&mut *lane, Lane::Done) {
            Lane::Backup(finish) => Some(finish),
            other => {
                *lane = other;
                None
            }
        }
    }

    /// Racing -> Backup; returns `false` if some lane already resolved.
    fn switch_to_backup(cell: &Mutex<Self>) -> bool {
        let mut lane = cell.lock().unwrap();
        match mem::replace(&mut *lane, Lane::Done) {
            Lane::Racing(finish) => {
                *lane = Lane::Backup(finish);
                true
            }
            other => {
                *lane = other;
                false
            }
        }
    }
}

impl<A: Clone + Send + 'static> Task<A> {
    /// Bounds this task to `after` on the scheduler's clock.
    ///
    /// If the source resolves strictly first, the timer is canceled — no
    /// scheduled callback remains pending — and the outcome mirrors the
    /// source's exactly, value or error. If the timer fires first, the
    /// source is canceled and the run fails with
    /// [`TaskError::Timeout`]`{ after }`; the result is fixed from that
    /// point and a late completion of the source is disregarded. Canceling
    /// the run while both are live cancels the timer and the source.
    #[must_use]
    pub fn timeout(&self, after: Duration) -> Task<A> {
        let source = self.clone();
        Task::from_run_fn(move |scheduler, conn, finish| {
            let race = CancelGroup::new();
            conn.push(race.to_cancelable());

            let running = source.run(scheduler);
            let cancel_source = running.clone();
            race.push(Cancelable::new(move || cancel_source.cancel()));

            let winner = Arc::new(Mutex::new(Some(finish)));

            let timer_winner = Arc::clone(&winner);
            let timed_out = running.clone();
            let timer = scheduler.schedule_once(
                after,
                Box::new(move || {
                    if let Some(finish) = timer_winner.lock().unwrap().take() {
                        timed_out.cancel();
                        finish(Outcome::Failure(TaskError::Timeout { after }));
                    }
                }),
            );
            race.push(timer.clone());

            running.on_complete(move |result| {
                if let Some(finish) = winner.lock().unwrap().take() {
                    timer.cancel();
                    finish(Outcome::from_result(result));
                }
            });
        })
    }

    /// Like [`timeout`](Task::timeout), but when the timer fires the run
    /// switches to `backup` instead of failing.
    ///
    /// While racing, a source that resolves first cancels the timer and
    /// settles the run. A timer that fires first cancels the source —
    /// dropping its continuations before the backup is even scheduled, so
    /// an in-flight source completion can never reach the run's handle —
    /// and starts `backup`, whose outcome then settles the run. External
    /// cancellation cancels whichever of source, timer, and backup are
    /// still live; the run then never resolves.
    #[must_use]
    pub fn timeout_to(&self, after: Duration, backup: Task<A>) -> Task<A> {
        let source = self.clone();
        Task::from_run_fn(move |scheduler, conn, finish| {
            let group = CancelGroup::new();
            conn.push(group.to_cancelable());

            let running = source.run(scheduler);
            let cancel_source = running.clone();
            group.push(Cancelable::new(move || cancel_source.cancel()));

            let lane = Arc::new(Mutex::new(Lane::Racing(finish)));

            let timer_lane = Arc::clone(&lane);
            let timed_out = running.clone();
            let group_at_switch = group.clone();
            let scheduler_at_switch = scheduler.clone();
            let backup = backup.clone();
            let timer = scheduler.schedule_once(
                after,
                Box::new(move || {
                    if !Lane::switch_to_backup(&timer_lane) {
                        return;
                    }
                    // Source first: after this its completion cannot be
                    // observed anywhere.
                    timed_out.cancel();
                    if group_at_switch.is_canceled() {
                        return;
                    }
                    let rescue = backup.run(&scheduler_at_switch);
                    let cancel_rescue = rescue.clone();
                    group_at_switch.push(Cancelable::new(move || cancel_rescue.cancel()));
                    let rescue_lane = Arc::clone(&timer_lane);
                    rescue.on_complete(move |result| {
                        if let Some(finish) = Lane::take_if_backup(&rescue_lane) {
                            finish(Outcome::from_result(result));
                        }
                    });
                }),
            );
            group.push(timer.clone());

            let source_lane = Arc::clone(&lane);
            running.on_complete(move |result| {
                if let Some(finish) = Lane::take_if_racing(&source_lane) {
                    timer.cancel();
                    finish(Outcome::from_result(result));
                }
            });
        })
    }
}
