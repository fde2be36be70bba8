//! Compatibility with do-notation
//!
//! As rust currently lacks the ability to define a generic 'bind'
//! operation, thus provides syntactic sugar.
//! It's not necessary to use the library, but does help with callback hell
//!```
//! use deferred::*;
//! use ::do_notation::m;
//!
//! // The chain in do-notation
//! let total: Deferred<i32, String> =
//!        m! {
//!            price <- resolved(40);
//!            shipping <- resolved(2);
//!            let sum = price + shipping;
//!            resolved(sum)
//!        };
//!
//! assert_eq!(total.outcome(), Some(Ok(42)));
//!
//! // a rejection anywhere short-circuits the rest
//! let failed: Deferred<i32, String> =
//!        m! {
//!            price <- resolved(40);
//!            rejected::<i32, String>("out of stock".to_string());
//!            resolved(price)
//!        };
//!
//! assert_eq!(failed.outcome(), Some(Err("out of stock".to_string())));
//!```
use crate::*;
use ::do_notation::Lift;

impl<T: Clone + 'static, E: Clone + 'static> Lift<T> for Deferred<T, E> {
    /// Creates a fulfilled deferred value
    ///
    /// see [resolved](function@resolved)
    fn lift(value: T) -> Self {
        resolved(value)
    }
}
