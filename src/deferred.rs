use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::trampoline::{self, Job};
use crate::Error;

/// A single settlement slot for the eventual result of some operation
///
/// The value starts out pending, and is settled exactly once, either
/// fulfilled with a `T` or rejected with an `E`. Further settlement
/// attempts are ignored. Continuations registered while pending run in
/// registration order at the moment of settlement, continuations
/// registered afterwards run immediately.
///
/// This is a handle, cloning it refers to the same slot. Only the
/// [Succeed] and [Fail] capabilities given to the setup routine
/// (see [create](function@create)) are able to settle it.
///
/// Everything here is single threaded, the handle is neither `Send` nor `Sync`.
pub struct Deferred<T, E> {
    inner: Slot<T, E>,
}

type Slot<T, E> = Rc<RefCell<Inner<T, E>>>;

/// The internal state of the slot
///
/// `result` being `None` is the pending state, so the state and the
/// payload are always written together.
struct Inner<T, E> {
    result: Option<Result<T, E>>,
    on_success: Vec<Box<dyn FnOnce(T)>>,
    on_failure: Vec<Box<dyn FnOnce(E)>>,
}

/// Where a deferred value is in its lifecycle
///
/// The only transitions are `Pending -> Fulfilled` and `Pending -> Rejected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Not settled yet
    Pending,
    /// Settled with a value
    Fulfilled,
    /// Settled with a failure reason
    Rejected,
}

impl State {
    fn of<T, E>(result: &Option<Result<T, E>>) -> State {
        match result {
            None => State::Pending,
            Some(Ok(_)) => State::Fulfilled,
            Some(Err(_)) => State::Rejected,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Pending => f.write_str("pending"),
            State::Fulfilled => f.write_str("fulfilled"),
            State::Rejected => f.write_str("rejected"),
        }
    }
}

/// Capability that fulfills the deferred value it was created for
///
/// Handed to the setup routine of [create](function@create). It can be
/// cloned and moved into callbacks, so settlement may happen much later.
pub struct Succeed<T, E> {
    inner: Slot<T, E>,
}

/// Capability that rejects the deferred value it was created for
///
/// The counterpart of [Succeed]
pub struct Fail<T, E> {
    inner: Slot<T, E>,
}

/// Creates a deferred value, running the setup routine immediately
///
/// The routine receives the two settlement capabilities. It may use them
/// straight away, or stash them somewhere (a callback, an event queue)
/// and settle later. If the routine returns an error before settling,
/// the value is rejected with that error.
/// ```
/// use deferred::*;
/// let now: Deferred<i32, String> = create(|succeed, _| {
///     succeed.succeed(1);
///     Ok(())
/// });
/// assert_eq!(now.outcome(), Some(Ok(1)));
///
/// let broken: Deferred<i32, &str> = create(|_, _| Err("setup failed"));
/// assert_eq!(broken.outcome(), Some(Err("setup failed")));
/// ```
pub fn create<T, E, F>(setup: F) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    F: FnOnce(Succeed<T, E>, Fail<T, E>) -> Result<(), E>,
{
    let inner = Rc::new(RefCell::new(Inner {
        result: None,
        on_success: Vec::new(),
        on_failure: Vec::new(),
    }));
    let succeed = Succeed {
        inner: inner.clone(),
    };
    let fail = Fail {
        inner: inner.clone(),
    };
    if let Err(reason) = setup(succeed, fail) {
        trace!("setup routine failed");
        // a routine that settled before failing keeps its first settlement
        let _ = settle(&inner, Err(reason));
    }
    Deferred { inner }
}

/// Moves the slot out of pending, then drains the matching continuations
///
/// The borrow is released before any continuation runs, they are free
/// to register on (or try to settle) the same slot again.
fn settle<T, E>(slot: &Slot<T, E>, result: Result<T, E>) -> Result<(), Error>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let (on_success, on_failure) = {
        let mut inner = slot.borrow_mut();
        if inner.result.is_some() {
            let state = State::of(&inner.result);
            trace!(%state, "ignoring settlement of settled deferred");
            return Err(Error::AlreadySettled { state });
        }
        inner.result = Some(result.clone());
        (
            mem::take(&mut inner.on_success),
            mem::take(&mut inner.on_failure),
        )
    };
    match result {
        Ok(value) => {
            trace!(state = %State::Fulfilled, continuations = on_success.len(), "deferred settled");
            drain(on_success, value);
        }
        Err(reason) => {
            trace!(state = %State::Rejected, continuations = on_failure.len(), "deferred settled");
            drain(on_failure, reason);
        }
    }
    Ok(())
}

/// Runs each continuation in order, the last one gets the original payload
///
/// When this settlement was itself caused by a continuation, the queue runs
/// as soon as that continuation returns.
fn drain<A: Clone + 'static>(mut queue: Vec<Box<dyn FnOnce(A)>>, payload: A) {
    let last = queue.pop();
    let mut jobs: Vec<Job> = Vec::with_capacity(queue.len() + 1);
    for continuation in queue {
        let payload = payload.clone();
        jobs.push(Box::new(move || continuation(payload)));
    }
    if let Some(continuation) = last {
        jobs.push(Box::new(move || continuation(payload)));
    }
    trampoline::run(jobs);
}

/// The downstream end of a chain link
///
/// Settles the slot like a [Succeed] and [Fail] pair would. Dropping it
/// releases the slot through the trampoline, so tearing down a long pending
/// chain does not recurse link by link.
pub(crate) struct Link<T: 'static, E: 'static> {
    slot: Option<Slot<T, E>>,
}

impl<T: Clone + 'static, E: Clone + 'static> Link<T, E> {
    pub(crate) fn settle(&self, result: Result<T, E>) {
        if let Some(slot) = &self.slot {
            let _ = settle(slot, result);
        }
    }
}

impl<T: 'static, E: 'static> Clone for Link<T, E> {
    fn clone(&self) -> Self {
        Link {
            slot: self.slot.clone(),
        }
    }
}

impl<T: 'static, E: 'static> Drop for Link<T, E> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            trampoline::release(slot);
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Succeed<T, E> {
    /// Fulfills the deferred value, does nothing if it is already settled
    pub fn succeed(&self, value: T) {
        let _ = self.try_succeed(value);
    }

    /// Fulfills the deferred value, reporting if it was already settled
    pub fn try_succeed(&self, value: T) -> Result<(), Error> {
        settle(&self.inner, Ok(value))
    }

    /// Turns this capability into the downstream end of a chain link
    pub(crate) fn into_link(self) -> Link<T, E> {
        Link {
            slot: Some(self.inner),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Fail<T, E> {
    /// Rejects the deferred value, does nothing if it is already settled
    pub fn fail(&self, reason: E) {
        let _ = self.try_fail(reason);
    }

    /// Rejects the deferred value, reporting if it was already settled
    pub fn try_fail(&self, reason: E) -> Result<(), Error> {
        settle(&self.inner, Err(reason))
    }
}

impl<T, E> Deferred<T, E> {
    /// The current lifecycle state
    pub fn state(&self) -> State {
        State::of(&self.inner.borrow().result)
    }

    /// Not settled yet
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// Settled with a value
    pub fn is_fulfilled(&self) -> bool {
        self.state() == State::Fulfilled
    }

    /// Settled with a failure reason
    pub fn is_rejected(&self) -> bool {
        self.state() == State::Rejected
    }
}

impl<T: Clone, E: Clone> Deferred<T, E> {
    /// A copy of the settled result, none while pending
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.inner.borrow().result.clone()
    }

    /// Registers a pair of continuations, one per outcome
    ///
    /// Exactly one of them will run. If the value is pending they are
    /// queued behind any earlier registrations, otherwise the matching one
    /// runs before this returns.
    ///
    /// This is the primitive [then](Deferred::then) is built from.
    /// ```
    /// use deferred::*;
    /// use std::{cell::RefCell, rc::Rc};
    ///
    /// let seen = Rc::new(RefCell::new(None));
    /// let sink = seen.clone();
    /// let d: Deferred<i32, ()> = resolved(3);
    /// d.subscribe(move |v| *sink.borrow_mut() = Some(v), |_| ());
    /// assert_eq!(*seen.borrow(), Some(3));
    /// ```
    pub fn subscribe<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce(T) + 'static,
        F: FnOnce(E) + 'static,
    {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            match inner.result.clone() {
                Some(result) => result,
                None => {
                    inner.on_success.push(Box::new(on_success));
                    inner.on_failure.push(Box::new(on_failure));
                    return;
                }
            }
        };
        match settled {
            Ok(value) => on_success(value),
            Err(reason) => on_failure(reason),
        }
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Deferred {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Clone for Succeed<T, E> {
    fn clone(&self) -> Self {
        Succeed {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Clone for Fail<T, E> {
    fn clone(&self) -> Self {
        Fail {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Deferred")
                .field("state", &State::of(&inner.result))
                .field("result", &inner.result)
                .finish(),
            Err(_) => f.debug_struct("Deferred").finish_non_exhaustive(),
        }
    }
}

impl<T, E> fmt::Debug for Succeed<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Succeed").finish_non_exhaustive()
    }
}

impl<T, E> fmt::Debug for Fail<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fail").finish_non_exhaustive()
    }
}
