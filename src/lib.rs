#![doc = include_str!("../README.md")]

mod chain;
mod compat;
mod deferred;
mod error;
mod functions;
mod trampoline;

pub use chain::*;
pub use deferred::*;
pub use error::*;
pub use functions::*;

pub mod executor;
