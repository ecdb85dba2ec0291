//! The live handle produced by running a [`Task`](crate::Task).

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
};

use crate::{
    cancelable::CancelGroup,
    outcome::{Outcome, TaskError},
};

type Listener<A> = Box<dyn FnOnce(Result<A, TaskError>) + Send>;

/// A handle for canceling and observing one running task.
///
/// The handle starts out pending and leaves that state at most once: either
/// it resolves with a success or failure, or it is canceled. The transition
/// is guarded by a single lock — under concurrent resolution attempts the
/// first writer wins and every later attempt is silently discarded, which is
/// the only synchronization the racing layer relies on.
///
/// Continuations registered with [`on_complete`] fire exactly once, in
/// registration order, when the handle resolves. A canceled handle fires
/// nothing: cancellation is not an error, it is the absence of a result,
/// observable through [`value`] or by awaiting the handle (which yields
/// `None`).
///
/// Values are cloned per observer, so `A: Clone` is required wherever a
/// value can be handed out — the same contract as `futures`' `Shared`.
///
/// Cloning the handle shares the same underlying state.
///
/// [`on_complete`]: TaskFuture::on_complete
/// [`value`]: TaskFuture::value
pub struct TaskFuture<A> {
    state: Arc<Mutex<State<A>>>,
}

impl<A> Clone for TaskFuture<A> {
    fn clone(&self) -> Self {
        TaskFuture {
            state: Arc::clone(&self.state),
        }
    }
}

enum State<A> {
    Pending {
        listeners: Vec<Listener<A>>,
        wakers: Vec<Waker>,
        // Cancelables owned by this run; dropped once the state settles.
        connection: CancelGroup,
    },
    Done(Outcome<A>),
}

impl<A: Send + 'static> TaskFuture<A> {
    /// A pending handle whose cancellation cancels `connection`.
    pub(crate) fn pending(connection: CancelGroup) -> Self {
        TaskFuture {
            state: Arc::new(Mutex::new(State::Pending {
                listeners: Vec::new(),
                wakers: Vec::new(),
                connection,
            })),
        }
    }

    /// A handle that is already resolved.
    #[must_use]
    pub fn resolved(outcome: Outcome<A>) -> Self {
        TaskFuture {
            state: Arc::new(Mutex::new(State::Done(outcome))),
        }
    }

    /// Cancels the running task: stops its in-flight work and drops every
    /// registered continuation unfired. No-op if the handle already
    /// resolved, so canceling a race branch that already won has no effect.
    pub fn cancel(&self) {
        let connection = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Pending {
                    listeners,
                    wakers,
                    connection,
                } => {
                    listeners.clear();
                    let wakers = std::mem::take(wakers);
                    let connection = connection.clone();
                    *state = State::Done(Outcome::Canceled);
                    for waker in wakers {
                        waker.wake();
                    }
                    connection
                }
                State::Done(_) => return,
            }
        };
        // Outside the lock: stopping the work may re-enter this handle.
        connection.cancel();
    }

    /// Snapshot of the terminal state, or `None` while pending.
    #[must_use]
    pub fn value(&self) -> Option<Outcome<A>>
    where
        A: Clone,
    {
        match &*self.state.lock().unwrap() {
            State::Pending { .. } => None,
            State::Done(outcome) => Some(outcome.clone()),
        }
    }

    /// Returns `true` once the handle has left the pending state, whether
    /// resolved or canceled.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(&*self.state.lock().unwrap(), State::Done(_))
    }

    /// Returns `true` if the handle was canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(
            &*self.state.lock().unwrap(),
            State::Done(Outcome::Canceled)
        )
    }

    /// Registers a continuation.
    ///
    /// Fires exactly once when the handle resolves with a success or
    /// failure; fires immediately if it already has. Never fires if the
    /// handle is, or later becomes, canceled.
    pub fn on_complete(&self, f: impl FnOnce(Result<A, TaskError>) + Send + 'static)
    where
        A: Clone,
    {
        let immediate = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Pending { listeners, .. } => {
                    listeners.push(Box::new(f));
                    return;
                }
                State::Done(Outcome::Success(a)) => Some(Ok(a.clone())),
                State::Done(Outcome::Failure(e)) => Some(Err(e.clone())),
                State::Done(Outcome::Canceled) => None,
            }
        };
        if let Some(result) = immediate {
            f(result);
        }
    }

    /// Attempts to resolve the handle. Returns `true` if this call won the
    /// transition; a handle that already resolved — or was canceled — is
    /// left untouched and `false` is returned.
    ///
    /// Continuations run synchronously inside this call, after the state
    /// lock is released, in registration order. An `Outcome::Canceled`
    /// argument routes through [`cancel`](TaskFuture::cancel) instead.
    pub fn complete(&self, outcome: Outcome<A>) -> bool
    where
        A: Clone,
    {
        if outcome.is_canceled() {
            self.cancel();
            return false;
        }
        let result = match &outcome {
            Outcome::Success(a) => Ok(a.clone()),
            Outcome::Failure(e) => Err(e.clone()),
            Outcome::Canceled => return false,
        };
        let listeners = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Pending {
                    listeners, wakers, ..
                } => {
                    let listeners = std::mem::take(listeners);
                    let wakers = std::mem::take(wakers);
                    *state = State::Done(outcome);
                    for waker in wakers {
                        waker.wake();
                    }
                    listeners
                }
                State::Done(_) => return false,
            }
        };
        for listener in listeners {
            listener(result.clone());
        }
        true
    }
}

impl<A: Clone + Send + 'static> Future for TaskFuture<A> {
    type Output = Option<Result<A, TaskError>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
            State::Done(Outcome::Success(a)) => Poll::Ready(Some(Ok(a.clone()))),
            State::Done(Outcome::Failure(e)) => Poll::Ready(Some(Err(e.clone()))),
            State::Done(Outcome::Canceled) => Poll::Ready(None),
        }
    }
}

impl<A> std::fmt::Debug for TaskFuture<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.lock().unwrap() {
            State::Pending { .. } => "pending",
            State::Done(Outcome::Success(_)) => "success",
            State::Done(Outcome::Failure(_)) => "failure",
            State::Done(Outcome::Canceled) => "canceled",
        };
        f.debug_struct("TaskFuture").field("state", &state).finish()
    }
}
