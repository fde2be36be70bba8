use crate::State;

/// Errors reported by the deferred value itself
///
/// Failures of the deferred computation are never represented here,
/// they are the caller's own `E` and travel through the chain untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A settlement was attempted after the first one took effect
    #[error("deferred value is already {state}")]
    AlreadySettled { state: State },
}
