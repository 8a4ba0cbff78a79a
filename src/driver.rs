//! The iteration driver.
//!
//! Drives exactly one poll of a routine and classifies what came
//! back: a produced item, a completion, a trap for the runtime, or
//! an error.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use log::{error, trace};

use crate::{
    co::Shared,
    tag::{self, Suspension},
    Error, Violation,
};

/// A suspendable computation owned by a generator.
pub(crate) type Routine<R, E> = Pin<Box<dyn Future<Output = Result<R, Error<E>>>>>;

/// The instruction a step resumes its routine with.
#[derive(Debug)]
pub enum Resume<S, E> {
    /// Resumes without value.
    Advance,

    /// Resumes with the given value.
    Send(S),

    /// Raises the given error at the yield point.
    Throw(E),

    /// Raises the cancellation signal at the yield point.
    Cancel,
}

impl<S, E> Resume<S, E> {
    /// Places the instruction where the suspended routine will pick
    /// it up.
    pub(crate) fn deliver<Y>(self, channel: &Shared<Y, S, E>) {
        let incoming = match self {
            Self::Advance => Ok(None),
            Self::Send(value) => Ok(Some(value)),
            Self::Throw(err) => Err(Error::Raised(err)),
            Self::Cancel => Err(Error::Cancelled),
        };

        channel.borrow_mut().incoming = Some(incoming);
    }
}

/// How a finished step ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome<Y, R> {
    /// The routine produced an item and is suspended.
    Produced(Y),

    /// The routine terminated with the given value.
    Complete(R),
}

/// The completion value of a routine.
///
/// Generators iterated plainly must complete with an empty value;
/// non-empty values are only observable through delegation.
pub trait Completion: 'static {
    /// The value of a routine that completed without value.
    fn empty() -> Self;

    /// Returns `true` if the value carries nothing.
    fn is_empty(&self) -> bool;
}

impl Completion for () {
    fn empty() -> Self {}

    fn is_empty(&self) -> bool {
        true
    }
}

impl<T: 'static> Completion for Option<T> {
    fn empty() -> Self {
        None
    }

    fn is_empty(&self) -> bool {
        self.is_none()
    }
}

/// Whether a step runs on behalf of a delegation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Frame {
    Plain,
    Delegated,
}

/// Polls the routine once and classifies the result.
///
/// The routine is dropped as soon as it terminates, so that a
/// missing routine means a closed one.
pub(crate) fn drive<Y, S, R, E>(
    routine: &mut Option<Routine<R, E>>,
    channel: &Shared<Y, S, E>,
    frame: Frame,
    cx: &mut Context<'_>,
) -> Poll<Result<Outcome<Y, R>, Error<E>>>
where
    R: Completion,
{
    let Some(fut) = routine.as_mut() else {
        return Poll::Ready(Ok(Outcome::Complete(R::empty())));
    };

    let polled = fut.as_mut().poll(cx);

    if polled.is_ready() {
        *routine = None;
    }

    match polled {
        Poll::Ready(Ok(value)) if frame == Frame::Plain && !value.is_empty() => {
            Poll::Ready(Err(Violation::ReturnedValue.into()))
        }
        Poll::Ready(Ok(value)) => {
            trace!("routine completed");
            Poll::Ready(Ok(Outcome::Complete(value)))
        }
        Poll::Ready(Err(Error::Exhausted)) => {
            error!("routine leaked end-of-sequence from its own body");
            Poll::Ready(Err(Violation::LeakedEndOfSequence.into()))
        }
        Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
        Poll::Pending => match channel.borrow_mut().take_suspension() {
            Suspension::Tagged(tagged) => Poll::Ready(Ok(Outcome::Produced(tag::unwrap(tagged)))),
            Suspension::Trap => {
                trace!("pass trap through to the runtime");
                Poll::Pending
            }
        },
    }
}
