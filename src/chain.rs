use tracing::trace;

use crate::deferred::Link;
use crate::{create, Deferred};

/// What a chain handler hands back
///
/// Either an immediate outcome, or another deferred value whose eventual
/// outcome the chain adopts. An immediate `Err` is how a handler fails.
#[derive(Debug)]
pub enum Step<T, E> {
    /// The outcome is already known
    Immediate(Result<T, E>),
    /// The outcome is whatever this deferred value settles with
    Deferred(Deferred<T, E>),
}

impl<T, E> Step<T, E> {
    /// An immediate success
    pub fn fulfill(value: T) -> Self {
        Step::Immediate(Ok(value))
    }

    /// An immediate failure
    pub fn reject(reason: E) -> Self {
        Step::Immediate(Err(reason))
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Step<T, E> {
    /// Forwards this step's outcome to the downstream end of a link
    ///
    /// A deferred step is mirrored through a continuation on it, so the
    /// link settles whenever it does.
    fn settle_into(self, link: Link<T, E>) {
        match self {
            Step::Immediate(result) => link.settle(result),
            Step::Deferred(adopted) => {
                trace!(state = %adopted.state(), "adopting deferred value");
                let on_failure = link.clone();
                adopted.subscribe(
                    move |value| link.settle(Ok(value)),
                    move |reason| on_failure.settle(Err(reason)),
                );
            }
        }
    }
}

impl<T, E> From<Result<T, E>> for Step<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Step::Immediate(result)
    }
}

impl<T, E> From<Deferred<T, E>> for Step<T, E> {
    fn from(deferred: Deferred<T, E>) -> Self {
        Step::Deferred(deferred)
    }
}

/// Anything a chain handler may return
///
/// Implemented for [Step], [Result] and [Deferred], so handlers can
/// return whichever is most natural. The associated types keep the
/// value and error types inferable from the handler's body.
pub trait IntoStep {
    type Value;
    type Error;

    fn into_step(self) -> Step<Self::Value, Self::Error>;
}

impl<T, E> IntoStep for Step<T, E> {
    type Value = T;
    type Error = E;

    fn into_step(self) -> Step<T, E> {
        self
    }
}

impl<T, E> IntoStep for Result<T, E> {
    type Value = T;
    type Error = E;

    fn into_step(self) -> Step<T, E> {
        Step::Immediate(self)
    }
}

impl<T, E> IntoStep for Deferred<T, E> {
    type Value = T;
    type Error = E;

    fn into_step(self) -> Step<T, E> {
        Step::Deferred(self)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    /// Chains a handler for each outcome
    ///
    /// Returns a new deferred value, settled once this one settles and the
    /// chosen handler has produced its step (adopting it if it is deferred).
    /// A handler returning `Err` rejects the new value, so the failure
    /// handler can either recover or re-reject.
    /// ```
    /// use deferred::*;
    /// let d: Deferred<i32, String> = rejected("offline".to_string());
    /// let handled = d.then(
    ///     |v| Ok(v.to_string()),
    ///     |reason| Ok(format!("fallback after {reason}")),
    /// );
    /// assert_eq!(handled.outcome(), Some(Ok("fallback after offline".to_string())));
    /// ```
    pub fn then<U, S, F, RS, RF>(&self, on_success: S, on_failure: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        S: FnOnce(T) -> RS + 'static,
        F: FnOnce(E) -> RF + 'static,
        RS: IntoStep<Value = U, Error = E>,
        RF: IntoStep<Value = U, Error = E>,
    {
        self.chain(
            move |value| on_success(value).into_step(),
            move |reason| on_failure(reason).into_step(),
        )
    }

    /// Chains a success handler, rejections pass through untouched
    ///
    /// This is bind for deferred values, and what `m!` desugars into.
    /// ```
    /// use deferred::*;
    /// let d: Deferred<i32, ()> = resolved(5);
    /// let doubled = d.and_then(|v| resolved(v * 2));
    /// assert_eq!(doubled.outcome(), Some(Ok(10)));
    /// ```
    pub fn and_then<U, S, RS>(&self, on_success: S) -> Deferred<U, E>
    where
        U: Clone + 'static,
        S: FnOnce(T) -> RS + 'static,
        RS: IntoStep<Value = U, Error = E>,
    {
        self.chain(move |value| on_success(value).into_step(), Step::reject)
    }

    /// Chains a failure handler, values pass through untouched
    /// ```
    /// use deferred::*;
    /// let d: Deferred<&str, &str> = rejected("err");
    /// let recovered = d.catch(|_| Ok("recovered"));
    /// assert_eq!(recovered.outcome(), Some(Ok("recovered")));
    /// ```
    pub fn catch<F, RF>(&self, on_failure: F) -> Deferred<T, E>
    where
        F: FnOnce(E) -> RF + 'static,
        RF: IntoStep<Value = T, Error = E>,
    {
        self.chain(Step::fulfill, move |reason| on_failure(reason).into_step())
    }

    /// Chains without handlers, mirroring this value's outcome
    pub fn pass(&self) -> Deferred<T, E> {
        self.chain(Step::fulfill, Step::reject)
    }

    /// Builds the downstream value of a chain link
    ///
    /// Each handler gets its own copy of the downstream link, only the one
    /// matching the upstream outcome will ever run.
    fn chain<U, S, F>(&self, on_success: S, on_failure: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        S: FnOnce(T) -> Step<U, E> + 'static,
        F: FnOnce(E) -> Step<U, E> + 'static,
    {
        let upstream = self.clone();
        create(move |succeed, _| {
            let link = succeed.into_link();
            let link_on_failure = link.clone();
            upstream.subscribe(
                move |value| on_success(value).settle_into(link),
                move |reason| on_failure(reason).settle_into(link_on_failure),
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rejected, resolved, Fail, Succeed};
    use std::{cell::RefCell, rc::Rc};

    fn pending<T, E>() -> (Deferred<T, E>, Succeed<T, E>, Fail<T, E>)
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        let mut caps = None;
        let d = create(|s, f| {
            caps = Some((s, f));
            Ok(())
        });
        let (s, f) = caps.expect("setup always runs");
        (d, s, f)
    }

    #[test]
    fn pass_through_value() {
        let d: Deferred<i32, &str> = resolved(42);
        assert_eq!(d.pass().outcome(), Some(Ok(42)));
    }

    #[test]
    fn pass_through_rejection() {
        let d: Deferred<i32, &str> = rejected("boom");
        assert_eq!(d.pass().outcome(), Some(Err("boom")));
    }

    #[test]
    fn rejection_skips_success_handlers() {
        let called = Rc::new(RefCell::new(false));
        let flag = called.clone();
        let d: Deferred<i32, &str> = rejected("boom");
        let chained = d
            .and_then(move |v| {
                *flag.borrow_mut() = true;
                Ok(v + 1)
            })
            .and_then(|v| Ok(v * 10));
        assert_eq!(chained.outcome(), Some(Err("boom")));
        assert!(!*called.borrow());
    }

    #[test]
    fn value_skips_failure_handlers() {
        let d: Deferred<i32, &str> = resolved(1);
        let chained = d.catch(|_| Ok(0)).and_then(|v| Ok(v + 1));
        assert_eq!(chained.outcome(), Some(Ok(2)));
    }

    #[test]
    fn adopts_returned_deferred() {
        let d: Deferred<i32, ()> = resolved(5);
        let adopted = d.and_then(|v| create(move |succeed, _| {
            succeed.succeed(v * 2);
            Ok(())
        }));
        assert_eq!(adopted.outcome(), Some(Ok(10)));
    }

    #[test]
    fn adopts_pending_deferred_once_it_settles() {
        let (source, succeed, _) = pending::<i32, &str>();
        let (inner, inner_succeed, _) = pending::<i32, &str>();
        let adopted = source.and_then(move |_| inner);

        succeed.succeed(1);
        assert!(adopted.is_pending());

        inner_succeed.succeed(99);
        assert_eq!(adopted.outcome(), Some(Ok(99)));
    }

    #[test]
    fn adopts_rejection_of_returned_deferred() {
        let d: Deferred<i32, &str> = resolved(1);
        let adopted = d.and_then(|_| rejected::<i32, &str>("nested"));
        assert_eq!(adopted.outcome(), Some(Err("nested")));
    }

    #[test]
    fn adoption_through_several_links() {
        let (source, succeed, _) = pending::<i32, String>();
        let result = source
            .and_then(|v| resolved(v + 1).and_then(|w| resolved(w * 3)))
            .and_then(|v| Ok(v.to_string()));
        succeed.succeed(1);
        assert_eq!(result.outcome(), Some(Ok("6".to_string())));
    }

    #[test]
    fn recovery_from_rejection() {
        let d: Deferred<&str, &str> = rejected("err");
        assert_eq!(d.catch(|_| Ok("recovered")).outcome(), Some(Ok("recovered")));
    }

    #[test]
    fn recovery_with_deferred() {
        let d: Deferred<i32, &str> = rejected("err");
        let recovered = d.catch(|_| resolved(7));
        assert_eq!(recovered.outcome(), Some(Ok(7)));
    }

    #[test]
    fn failing_recovery_rejects_with_new_reason() {
        let d: Deferred<i32, String> = rejected("err".to_string());
        let rethrown = d.catch(|r| Err(format!("wrapped {r}")));
        assert_eq!(rethrown.outcome(), Some(Err("wrapped err".to_string())));
    }

    #[test]
    fn handler_failure_rejects() {
        let d: Deferred<i32, String> = resolved(1);
        let failed = d.and_then(|_| Err::<i32, _>("x".to_string()));
        assert_eq!(failed.outcome(), Some(Err("x".to_string())));
    }

    #[test]
    fn then_picks_handler_by_outcome() {
        let ok: Deferred<i32, i32> = resolved(1);
        let err: Deferred<i32, i32> = rejected(2);
        let handle = |d: &Deferred<i32, i32>| d.then(|v| Ok(v * 10), |r| Ok(r * 100));
        assert_eq!(handle(&ok).outcome(), Some(Ok(10)));
        assert_eq!(handle(&err).outcome(), Some(Ok(200)));
    }

    #[test]
    fn chained_value_waits_for_upstream() {
        let (source, _, fail) = pending::<i32, &str>();
        let chained = source.then(|v| Ok(v), |_| Ok(-1));
        assert!(chained.is_pending());
        fail.fail("late");
        assert_eq!(chained.outcome(), Some(Ok(-1)));
    }

    #[test]
    fn chain_on_settled_value_settles_synchronously() {
        let d: Deferred<i32, ()> = resolved(3);
        let chained = d.and_then(|v| Ok(v + 1));
        assert!(chained.is_fulfilled());
    }

    #[test]
    fn branches_share_one_upstream() {
        let (source, succeed, _) = pending::<i32, ()>();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (first, second) = (order.clone(), order.clone());
        let a = source.and_then(move |v| {
            first.borrow_mut().push("a");
            Ok(v + 1)
        });
        let b = source.and_then(move |v| {
            second.borrow_mut().push("b");
            Ok(v + 2)
        });
        succeed.succeed(0);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
        assert_eq!((a.outcome(), b.outcome()), (Some(Ok(1)), Some(Ok(2))));
    }

    #[test]
    fn long_chain_settles_without_recursing() {
        let (head, succeed, _) = pending::<u32, ()>();
        let mut tail = head.clone();
        for _ in 0..20_000 {
            tail = tail.and_then(|v| Ok(v + 1));
        }
        succeed.succeed(0);
        assert_eq!(tail.outcome(), Some(Ok(20_000)));
    }

    #[test]
    fn long_chain_passes_rejection_through() {
        let (head, _, fail) = pending::<u32, &str>();
        let mut tail = head.clone();
        for _ in 0..20_000 {
            tail = tail.and_then(|v| Ok(v + 1));
        }
        let recovered = tail.catch(|_| Ok(0));
        fail.fail("head failed");
        assert_eq!(tail.outcome(), Some(Err("head failed")));
        assert_eq!(recovered.outcome(), Some(Ok(0)));
    }

    #[test]
    fn long_chain_of_adoptions_settles() {
        let (head, succeed, _) = pending::<u32, ()>();
        let mut tail = head.clone();
        for _ in 0..20_000 {
            tail = tail.and_then(|v| resolved(v + 1));
        }
        succeed.succeed(0);
        assert_eq!(tail.outcome(), Some(Ok(20_000)));
    }

    #[test]
    fn dropping_long_pending_chain_releases_every_link() {
        let token = Rc::new(());
        let (head, succeed, fail) = pending::<u32, ()>();
        let mut tail = head.clone();
        for _ in 0..100_000 {
            let held = token.clone();
            tail = tail.and_then(move |v| {
                let _ = &held;
                Ok(v + 1)
            });
        }
        assert_eq!(Rc::strong_count(&token), 100_001);

        drop((head, succeed, fail, tail));
        assert_eq!(Rc::strong_count(&token), 1);
    }
}
