//! Terminal outcomes of a running task and the error kinds they carry.

use std::{error::Error, fmt, sync::Arc, time::Duration};

/// How a running task ended.
///
/// This is deliberately a closed three-variant union: cancellation is a
/// distinct terminal state, not a missing value or an error, and pattern
/// matches are forced to handle it.
#[derive(Debug, Clone)]
pub enum Outcome<A> {
    /// The task produced a value.
    Success(A),
    /// The task raised an error (a source error or a timeout).
    Failure(TaskError),
    /// The task was canceled before it could resolve. A canceled task
    /// reports nothing to its continuations; this state is visible only
    /// through [`TaskFuture::value`](crate::TaskFuture::value).
    Canceled,
}

impl<A> Outcome<A> {
    /// Extracts the success value, if any.
    pub fn success(self) -> Option<A> {
        match self {
            Outcome::Success(a) => Some(a),
            _ => None,
        }
    }

    /// Extracts the error, if any.
    pub fn failure(self) -> Option<TaskError> {
        match self {
            Outcome::Failure(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }

    pub(crate) fn from_result(result: Result<A, TaskError>) -> Self {
        match result {
            Ok(a) => Outcome::Success(a),
            Err(e) => Outcome::Failure(e),
        }
    }
}

/// The error half of a task outcome.
///
/// Source errors are carried behind a shared `Arc` and propagate verbatim
/// through races and timeouts; this layer never wraps, retries, or
/// translates them. `Timeout` is the one error kind the layer itself
/// raises, when a timer lane wins its race.
#[derive(Clone)]
pub enum TaskError {
    /// The time limit given to [`Task::timeout`](crate::Task::timeout)
    /// elapsed before the source resolved.
    Timeout {
        /// The limit that was exceeded.
        after: Duration,
    },
    /// An error raised by the task itself.
    Failed(Arc<dyn Error + Send + Sync>),
}

impl TaskError {
    /// Wraps an arbitrary error as a task failure.
    pub fn failed(err: impl Error + Send + Sync + 'static) -> Self {
        TaskError::Failed(Arc::new(err))
    }

    /// A task failure carrying just a message.
    pub fn msg(text: impl Into<String>) -> Self {
        TaskError::Failed(Arc::new(Message(text.into())))
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }
}

impl PartialEq for TaskError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TaskError::Timeout { after: a }, TaskError::Timeout { after: b }) => a == b,
            (TaskError::Failed(a), TaskError::Failed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Timeout { after } => {
                write!(f, "task timed out after {after:?}")
            }
            TaskError::Failed(err) => err.fmt(f),
        }
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Timeout { after } => {
                f.debug_struct("Timeout").field("after", after).finish()
            }
            TaskError::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskError::Timeout { .. } => None,
            TaskError::Failed(err) => Some(err.as_ref()),
        }
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}
