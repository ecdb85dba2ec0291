//! Cancellation capabilities for in-flight work.
//!
//! A [`Cancelable`] wraps a single "stop this" action and guarantees it runs
//! at most once, no matter how many clones of the handle exist or how often
//! `cancel()` is called. A [`CancelGroup`] composes many cancelables into one
//! unit: canceling the group cancels every live child, and children attached
//! after the group was canceled are stopped immediately, so work that has not
//! even started yet cannot slip through.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

type CancelFn = Box<dyn FnOnce() + Send>;

/// An idempotent capability to stop one unit of in-flight work.
///
/// Cloning shares the same underlying action. Invoking [`cancel`] twice, or
/// after the underlying work already completed, has no effect and never
/// reports an error.
///
/// [`cancel`]: Cancelable::cancel
#[derive(Clone)]
pub struct Cancelable {
    inner: Arc<Inner>,
}

struct Inner {
    canceled: AtomicBool,
    action: Mutex<Option<CancelFn>>,
}

impl Cancelable {
    /// Wraps a cancel action. The action runs at most once, on the first
    /// `cancel()` call across all clones of this handle.
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Cancelable {
            inner: Arc::new(Inner {
                canceled: AtomicBool::new(false),
                action: Mutex::new(Some(Box::new(action))),
            }),
        }
    }

    /// A cancelable with nothing to stop. Canceling it only flips the flag.
    #[must_use]
    pub fn noop() -> Self {
        Cancelable {
            inner: Arc::new(Inner {
                canceled: AtomicBool::new(false),
                action: Mutex::new(None),
            }),
        }
    }

    /// Requests cancellation. The first call runs the wrapped action;
    /// subsequent calls do nothing.
    pub fn cancel(&self) {
        if self.inner.canceled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Take the action out under the lock, run it outside, so a cancel
        // action may itself touch other cancelables without deadlocking.
        let action = self.inner.action.lock().unwrap().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Returns `true` if `cancel()` has been called on any clone.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Cancelable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancelable")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// An ordered arena of child cancelables that cancels as one.
///
/// Children live in indexed slots behind a single lock, so canceling a group
/// of any size is a flat loop over the arena rather than a chain of nested
/// wrappers. The cancellation order of children is not guaranteed.
///
/// Cloning shares the same group.
#[derive(Clone)]
pub struct CancelGroup {
    state: Arc<Mutex<GroupState>>,
}

struct GroupState {
    canceled: bool,
    slots: Vec<Option<Cancelable>>,
}

impl CancelGroup {
    #[must_use]
    pub fn new() -> Self {
        CancelGroup {
            state: Arc::new(Mutex::new(GroupState {
                canceled: false,
                slots: Vec::new(),
            })),
        }
    }

    /// Attaches a child and returns its slot index.
    ///
    /// If the group was already canceled the child is canceled immediately,
    /// no slot is kept, and `None` is returned; this is what stops branches
    /// that have not yet started from ever running.
    pub fn push(&self, child: Cancelable) -> Option<usize> {
        let index = {
            let mut state = self.state.lock().unwrap();
            if state.canceled {
                None
            } else {
                state.slots.push(Some(child.clone()));
                Some(state.slots.len() - 1)
            }
        };
        if index.is_none() {
            child.cancel();
        }
        index
    }

    /// Releases the child at `index` without canceling it, dropping the
    /// group's reference to it. Used when a unit completed on its own.
    pub fn release(&self, index: usize) {
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state.slots.get_mut(index) {
            slot.take();
        }
    }

    /// Cancels every live child exactly once. Idempotent.
    pub fn cancel(&self) {
        let children = {
            let mut state = self.state.lock().unwrap();
            if state.canceled {
                return;
            }
            state.canceled = true;
            std::mem::take(&mut state.slots)
        };
        // Children are canceled outside the lock: a child's cancel action may
        // re-enter this group (e.g. to push a late arrival).
        for child in children.into_iter().flatten() {
            child.cancel();
        }
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.state.lock().unwrap().canceled
    }

    /// Number of children currently held. Released and canceled slots do not
    /// count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adapts the whole group into a single [`Cancelable`], so groups nest
    /// inside other groups.
    #[must_use]
    pub fn to_cancelable(&self) -> Cancelable {
        let group = self.clone();
        Cancelable::new(move || group.cancel())
    }
}

impl Default for CancelGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("CancelGroup")
            .field("canceled", &state.canceled)
            .field("slots", &state.slots.len())
            .finish()
    }
}
