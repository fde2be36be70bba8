//! This module contains functions that provide easier
//! to use workflows for deferred values.
//! This can be implemented outside the crate, but are here for convenience.

use super::*;

/// Return/unit. Creates a deferred value already fulfilled with the value
///
/// This lifts the value into the deferred 'world'
/// ```
/// use deferred::*;
/// let d: Deferred<i32, ()> = resolved(1);
/// assert!(d.is_fulfilled());
/// ```
pub fn resolved<T, E>(value: T) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    create(move |succeed, _| {
        succeed.succeed(value);
        Ok(())
    })
}

/// Creates a deferred value already rejected with the reason
/// ```
/// use deferred::*;
/// let d: Deferred<i32, &str> = rejected("boom");
/// assert_eq!(d.outcome(), Some(Err("boom")));
/// ```
pub fn rejected<T, E>(reason: E) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    create(move |_, fail| {
        fail.fail(reason);
        Ok(())
    })
}

/// Map the value of the deferred
///
/// This is sugar of and_then and Ok
/// ```
/// use deferred::*;
/// let d: Deferred<String, ()> = map(resolved::<i32, ()>(2), |v| v.to_string());
/// assert_eq!(d.outcome(), Some(Ok("2".to_string())));
/// ```
pub fn map<T, E, U, F>(deferred: Deferred<T, E>, f: F) -> Deferred<U, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    U: Clone + 'static,
    F: FnOnce(T) -> U + 'static,
{
    deferred.and_then(move |value| Ok(f(value)))
}

/// Convert the failure reason E1 into E2
///
/// Values pass through untouched
/// ```
/// use deferred::*;
/// let not_found = rejected::<(), i32>(404);
/// let d: Deferred<(), String> = map_err(not_found, |code| format!("status {code}"));
/// assert_eq!(d.outcome(), Some(Err("status 404".to_string())));
/// ```
pub fn map_err<T, E1, E2, F>(deferred: Deferred<T, E1>, f: F) -> Deferred<T, E2>
where
    T: Clone + 'static,
    E1: Clone + 'static,
    E2: Clone + 'static,
    F: FnOnce(E1) -> E2 + 'static,
{
    create(move |succeed, fail| {
        deferred.subscribe(
            move |value| succeed.succeed(value),
            move |reason| fail.fail(f(reason)),
        );
        Ok(())
    })
}

/// Collapses a deferred value of a deferred value
///
/// The result settles with the inner value's outcome
/// ```
/// use deferred::*;
/// let nested: Deferred<Deferred<i32, ()>, ()> = resolved(resolved(3));
/// assert_eq!(flatten(nested).outcome(), Some(Ok(3)));
/// ```
pub fn flatten<T, E>(deferred: Deferred<Deferred<T, E>, E>) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    deferred.and_then(|inner| inner)
}

/// Waits for two deferred values, first then second
///
/// Returns both values tupled together. The first rejection
/// observed (first's, then second's) rejects the result.
pub fn tuple<A, B, E>(first: Deferred<A, E>, second: Deferred<B, E>) -> Deferred<(A, B), E>
where
    A: Clone + 'static,
    B: Clone + 'static,
    E: Clone + 'static,
{
    first.and_then(move |a| map(second, move |b| (a, b)))
}

/// Waits for both, keeping the result of the first
///
/// if you need both results, use tuple
pub fn left<A, B, E>(left: Deferred<A, E>, right: Deferred<B, E>) -> Deferred<A, E>
where
    A: Clone + 'static,
    B: Clone + 'static,
    E: Clone + 'static,
{
    map(tuple(left, right), |(a, _)| a)
}

/// Waits for both, keeping the result of the second
///
/// if you need both results, use tuple
pub fn right<A, B, E>(left: Deferred<A, E>, right: Deferred<B, E>) -> Deferred<B, E>
where
    A: Clone + 'static,
    B: Clone + 'static,
    E: Clone + 'static,
{
    map(tuple(left, right), |(_, b)| b)
}

/// Converts the value to the unit type
///
/// Useful when you only care that the deferred value succeeded
pub fn void<T, E>(deferred: Deferred<T, E>) -> Deferred<(), E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    map(deferred, |_| ())
}
