//! Racing and timeout combinators for lazy, cancelable tasks.
//!
//! `taskrace` provides a small runtime core for running several asynchronous
//! computations concurrently and resolving to whichever finishes first,
//! with cancellation propagated correctly to the branches that lost — plus
//! the timeout combinators built on top of racing, and a deterministic
//! virtual-time scheduler that makes all of it testable and reproducible.
//!
//! The building blocks:
//! - A [`Task`] describes work lazily; nothing runs until
//!   [`Task::run`] starts it on a [`Scheduler`].
//! - Running yields a [`TaskFuture`], a cancelable handle that resolves at
//!   most once and notifies continuations in registration order. It also
//!   implements `std::future::Future`, so it can be awaited on any
//!   executor.
//! - [`choose_first_of_list`] races any number of branches and cancels the
//!   losers; [`choose_first_of`] races two branches and hands back the
//!   loser's live handle instead.
//! - [`Task::timeout`] and [`Task::timeout_to`] bound or substitute slow
//!   tasks by racing them against a scheduler timer.
//! - [`TestScheduler`] owns an explicit virtual clock: tests advance it,
//!   observe deterministic interleavings, and assert that no scheduled
//!   work leaked after a race was decided or canceled.
//!
//! The crate is executor-agnostic: the production [`ThreadPoolScheduler`]
//! runs the same task descriptions on real time and real threads, and the
//! handles can be awaited from tokio, smol, or any other executor.

pub mod cancelable;
pub mod future;
pub mod outcome;
pub mod race;
pub mod scheduler;
pub mod task;
pub mod timeout;

pub use cancelable::{CancelGroup, Cancelable};
pub use future::TaskFuture;
pub use outcome::{Outcome, TaskError};
pub use race::{Either, choose_first_of, choose_first_of_list};
pub use scheduler::{
    PendingCallback, Scheduler, SchedulerRef, TestScheduler, ThreadPoolScheduler,
};
pub use task::Task;
