//! The suspension adapter.
//!
//! Every item produced by a routine goes through
//! [`Co::yield_item`]. Ordinary futures awaited by the routine never
//! touch the channel, so their suspensions reach the runtime as
//! plain traps.

use std::{
    cell::RefCell,
    convert::Infallible,
    fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use log::{error, trace};
use pin_project::pin_project;

use crate::{
    hooks::Identity,
    tag::{self, Suspension, Tagged},
    Error, Violation,
};

/// What the consumer delivered at a yield point: `None` for a bare
/// advance, `Some` for a sent value, or an error to raise.
pub(crate) type Incoming<S, E> = Result<Option<S>, Error<E>>;

/// Channel shared between a routine and its generator.
pub(crate) struct Channel<Y, S, E> {
    /// Item deposited by the routine right before suspending.
    pub(crate) outgoing: Option<Tagged<Y>>,

    /// Resume value, consumed when the routine resumes.
    pub(crate) incoming: Option<Incoming<S, E>>,

    /// The iterator the routine currently delegates to.
    pub(crate) delegating: Option<Identity>,
}

impl<Y, S, E> Channel<Y, S, E> {
    /// Takes what the routine left behind when it suspended.
    pub(crate) fn take_suspension(&mut self) -> Suspension<Y> {
        self.outgoing.take().into()
    }
}

impl<Y, S, E> Default for Channel<Y, S, E> {
    fn default() -> Self {
        Self {
            outgoing: None,
            incoming: None,
            delegating: None,
        }
    }
}

pub(crate) type Shared<Y, S, E> = Rc<RefCell<Channel<Y, S, E>>>;

/// The yield handle given to a routine.
///
/// `Y` is the type of produced items, `S` the type of values sent
/// back by the consumer and `E` the application error type.
pub struct Co<Y, S = (), E = Infallible> {
    pub(crate) channel: Shared<Y, S, E>,
}

impl<Y, S, E> Co<Y, S, E> {
    pub(crate) fn new(channel: Shared<Y, S, E>) -> Self {
        Self { channel }
    }

    /// Produces one item, suspending the routine until the consumer
    /// asks for the next one.
    ///
    /// Resolves to the value sent by the consumer (`None` for a
    /// plain advance), or to the error thrown into the generator.
    /// [`Error::Cancelled`] is raised when the generator is being
    /// closed: the routine should propagate it, or terminate.
    pub fn yield_item(&self, value: Y) -> YieldItem<'_, Y, S, E> {
        YieldItem {
            co: self,
            value: Some(value),
        }
    }
}

impl<Y, S, E> fmt::Debug for Co<Y, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Co").finish_non_exhaustive()
    }
}

/// Future returned by [`Co::yield_item`].
#[pin_project]
#[must_use = "items are only produced when the yield is awaited"]
pub struct YieldItem<'co, Y, S, E> {
    co: &'co Co<Y, S, E>,
    value: Option<Y>,
}

impl<Y, S, E> Future for YieldItem<'_, Y, S, E> {
    type Output = Incoming<S, E>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut channel = this.co.channel.borrow_mut();

        if let Some(value) = this.value.take() {
            if channel.outgoing.is_some() {
                error!("routine yielded an item while another one is pending");
                return Poll::Ready(Err(Violation::OverlappingYield.into()));
            }

            trace!("suspend routine on a tagged item");
            channel.outgoing = Some(tag::wrap(value));
            return Poll::Pending;
        }

        match channel.incoming.take() {
            Some(incoming) => {
                trace!("resume routine from its yield point");
                Poll::Ready(incoming)
            }
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        future::Future,
        pin::pin,
        rc::Rc,
        task::{Context, Poll},
    };

    use futures::task::noop_waker_ref;

    use crate::{tag::Suspension, AsyncGenerator, Error, Violation};

    use super::{Channel, Co};

    #[test]
    fn yield_item_round_trip() {
        let _ = env_logger::try_init();

        let channel = Rc::new(RefCell::new(Channel::<u8, u8, &str>::default()));
        let co = Co::new(channel.clone());
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut fut = pin!(co.yield_item(1));
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        let suspension = channel.borrow_mut().take_suspension();
        assert!(matches!(suspension, Suspension::Tagged(_)));

        // spurious poll, nothing delivered yet
        assert!(fut.as_mut().poll(&mut cx).is_pending());
        assert_eq!(channel.borrow_mut().take_suspension(), Suspension::Trap);

        channel.borrow_mut().incoming = Some(Ok(Some(2)));
        assert!(matches!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(Some(2)))));

        let mut fut = pin!(co.yield_item(3));
        assert!(fut.as_mut().poll(&mut cx).is_pending());
        channel.borrow_mut().incoming = Some(Err(Error::Raised("oops")));
        assert!(matches!(
            fut.as_mut().poll(&mut cx),
            Poll::Ready(Err(Error::Raised("oops")))
        ));
    }

    #[test]
    fn overlapping_yield_keeps_first_item() {
        let _ = env_logger::try_init();

        let channel = Rc::new(RefCell::new(Channel::<u8, u8, &str>::default()));
        let co = Co::new(channel.clone());
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut first = pin!(co.yield_item(1));
        let mut second = pin!(co.yield_item(2));

        assert!(first.as_mut().poll(&mut cx).is_pending());
        assert!(matches!(
            second.as_mut().poll(&mut cx),
            Poll::Ready(Err(Error::Protocol(Violation::OverlappingYield)))
        ));

        let suspension = channel.borrow_mut().take_suspension();
        assert_eq!(suspension, Suspension::Tagged(crate::tag::wrap(1)));
    }

    async fn joined_yields(co: Co<u8>) -> Result<(), Error> {
        let (first, second) = futures::join!(co.yield_item(1), co.yield_item(2));
        first?;
        second?;
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_yield_fails_routine() {
        let _ = env_logger::try_init();

        let gen = AsyncGenerator::new(joined_yields);

        assert_eq!(gen.next().await.unwrap(), Some(1));

        let err = gen.next().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(Violation::OverlappingYield)));
        assert_eq!(gen.next().await.unwrap(), None);
    }
}
