//! Errors surfacing from generator progression.

use std::convert::Infallible;

use thiserror::Error;

/// Breaches of the generator protocol.
///
/// A violation always denotes a logic bug, either in the routine
/// body or in the way the generator is driven. They are never
/// retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum Violation {
    /// The routine completed with a non-empty value while being
    /// iterated plainly. Completion values are only observable
    /// through delegation.
    #[error("generator returned a non-empty value outside of delegation")]
    ReturnedValue,

    /// The routine let an end-of-sequence error escape from its own
    /// body, where it would be confused with its own exhaustion.
    #[error("generator raised end-of-sequence from its own body")]
    LeakedEndOfSequence,

    /// The routine yielded an item instead of terminating while
    /// being closed.
    #[error("generator yielded an item while being closed")]
    YieldedOnClose,

    /// A value was sent to a generator that never started.
    #[error("cannot send a value to a just-started generator")]
    SendToUnstarted,

    /// A value or an error was sent to a generator whose previous
    /// step was abandoned while the routine awaited the runtime.
    #[error("cannot send or throw into a generator suspended mid-step")]
    ResumeMidStep,

    /// A value was sent while the routine delegates to an iterator
    /// that cannot receive values, such as a stream.
    #[error("cannot send a value to an iterator that does not receive values")]
    SendUnsupported,

    /// The routine yielded a second item before the first one was
    /// handed to the consumer.
    #[error("generator yielded two items within a single suspension")]
    OverlappingYield,
}

/// The generator error.
///
/// `E` is the application error type, thrown into routines with
/// [`throw`] and raised by them through [`Error::Raised`].
///
/// [`throw`]: crate::AsyncGenerator::throw
#[derive(Debug, Error)]
pub enum Error<E = Infallible> {
    /// A step was requested while another one was in flight.
    #[error("generator already executing")]
    Reentrant,

    /// The generator protocol has been violated.
    #[error("generator protocol violation: {0}")]
    Protocol(#[from] Violation),

    /// The routine did not terminate within the single step allowed
    /// during finalization.
    #[error("generator ignored cancellation")]
    CancellationNotHonored,

    /// The cancellation signal injected by `close`.
    #[error("generator exited")]
    Cancelled,

    /// End-of-sequence, raised as an error.
    #[error("generator exhausted")]
    Exhausted,

    /// Application error raised inside or thrown into a routine.
    #[error("{0}")]
    Raised(E),
}

impl<E> Error<E> {
    /// Returns `true` for the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Extracts the application error, if any.
    pub fn into_raised(self) -> Option<E> {
        match self {
            Self::Raised(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, Violation};

    #[test]
    fn display() {
        let err: Error<&str> = Violation::ReturnedValue.into();
        assert_eq!(
            err.to_string(),
            "generator protocol violation: generator returned a non-empty value outside of delegation"
        );

        let err = Error::Raised("oops");
        assert_eq!(err.to_string(), "oops");
        assert_eq!(err.into_raised(), Some("oops"));

        let err: Error = Error::Cancelled;
        assert!(err.is_cancelled());
        assert_eq!(err.into_raised(), None);
    }
}
