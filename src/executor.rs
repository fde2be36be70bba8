//! A sample host driver that consumes an iterator of callbacks
//!
//! Deferred values never run anything on their own, settlement happens when
//! some host callback calls a capability. This drives such callbacks one at
//! a time until a deferred value settles. It's a good reference for wiring
//! the core into a real event source.

use std::fmt::Debug;

use tracing::trace;

use crate::*;

pub enum ExecutorResult<It, T, E> {
    /// The deferred value has settled
    Settled {
        /// The final outcome of the deferred value
        outcome: Result<T, E>,
        remaining: It,
    },
    /// We ran out of events, returns the deferred value so it can
    /// be driven again when more events are available
    Exhausted { deferred: Deferred<T, E> },
}

impl<It, T, E> core::fmt::Debug for ExecutorResult<It, T, E>
where
    It: Debug,
    T: Debug,
    E: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settled { outcome, remaining } => f
                .debug_struct("Settled")
                .field("outcome", outcome)
                .field("remaining", remaining)
                .finish(),
            Self::Exhausted { deferred } => f
                .debug_struct("Exhausted")
                .field("deferred", deferred)
                .finish(),
        }
    }
}

/// Runs host callbacks until the deferred value settles
///
/// Callbacks are invoked in iteration order, one at a time. Returns as soon as
/// the value settles, handing back the events not yet consumed.
/// ```
/// use deferred::*;
/// use deferred::executor::*;
/// use std::{cell::RefCell, collections::VecDeque, rc::Rc};
///
/// // a toy event loop, the setup routine queues its completion callback
/// let queue: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>> = Rc::default();
/// let host = queue.clone();
/// let d: Deferred<&str, ()> = create(|succeed, _| {
///     host.borrow_mut().push_back(Box::new(move || succeed.succeed("loaded")));
///     Ok(())
/// });
/// assert!(d.is_pending());
///
/// let events = std::iter::from_fn(|| queue.borrow_mut().pop_front());
/// let exec = run_until_settled(d, events);
///
/// assert!(matches!(exec, ExecutorResult::Settled { outcome: Ok("loaded"), .. }));
/// ```
pub fn run_until_settled<It, Ev, T, E>(
    deferred: Deferred<T, E>,
    mut events: It,
) -> ExecutorResult<It, T, E>
where
    It: Iterator<Item = Ev>,
    Ev: FnOnce(),
    T: Clone,
    E: Clone,
{
    loop {
        if let Some(outcome) = deferred.outcome() {
            return ExecutorResult::Settled {
                outcome,
                remaining: events,
            };
        }
        match events.next() {
            Some(event) => event(),
            None => {
                trace!("events exhausted before settlement");
                return ExecutorResult::Exhausted { deferred };
            }
        }
    }
}
