//! The delegation engine.
//!
//! A routine can forward an entire nested iterator through its own
//! generator with [`Co::delegate`]: items flow up as if the routine
//! produced them, sent values and thrown errors flow down, and the
//! nested completion value becomes the result of the delegation.

use std::{cell::RefCell, convert::Infallible, marker::PhantomData};

use futures::{
    future::{self, LocalBoxFuture},
    Stream, StreamExt,
};
use log::debug;

use crate::{
    co::Co,
    driver::{Completion, Frame, Outcome, Resume},
    generator::{AsyncGenerator, Step},
    hooks::Identity,
    Error, Violation,
};

/// Result of one step of a nested iterator.
pub type Stepped<'a, Y, R, E> = LocalBoxFuture<'a, Result<Outcome<Y, R>, Error<E>>>;

/// Capabilities of an iterator that can be delegated to.
///
/// Only resuming is required. Iterators that cannot receive errors
/// or be closed keep the default implementations, which report the
/// capability as absent.
pub trait AsyncIterate {
    /// The type of produced items.
    type Item;

    /// The type of values sent to the iterator.
    type Send;

    /// The type of the completion value.
    type Return;

    /// The application error type.
    type Error;

    /// Produces the next item, sending the given value first if
    /// any.
    fn resume(
        &self,
        value: Option<Self::Send>,
    ) -> Stepped<'_, Self::Item, Self::Return, Self::Error>;

    /// Raises the given error inside the iterator.
    ///
    /// Gives the error back if the iterator cannot receive errors.
    fn throw_into(
        &self,
        err: Self::Error,
    ) -> Result<Stepped<'_, Self::Item, Self::Return, Self::Error>, Self::Error> {
        Err(err)
    }

    /// Closes the iterator, if it supports it.
    fn try_close(&self) -> Option<LocalBoxFuture<'_, Result<(), Error<Self::Error>>>> {
        None
    }

    /// Identifies the iterator, if it has an identity.
    fn identity(&self) -> Option<Identity> {
        None
    }
}

impl<Y, S, R, E> AsyncIterate for AsyncGenerator<Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    type Item = Y;
    type Send = S;
    type Return = R;
    type Error = E;

    fn resume(&self, value: Option<S>) -> Stepped<'_, Y, R, E> {
        let resume = match value {
            Some(value) => Resume::Send(value),
            None => Resume::Advance,
        };

        Box::pin(Step::new(self, resume, Frame::Delegated))
    }

    fn throw_into(&self, err: E) -> Result<Stepped<'_, Y, R, E>, E> {
        Ok(Box::pin(Step::new(self, Resume::Throw(err), Frame::Delegated)))
    }

    fn try_close(&self) -> Option<LocalBoxFuture<'_, Result<(), Error<E>>>> {
        Some(Box::pin(self.close()))
    }

    fn identity(&self) -> Option<Identity> {
        Some(AsyncGenerator::identity(self).clone())
    }
}

/// Adapts a [`Stream`] so that routines can delegate to it.
///
/// Streams cannot receive values nor errors: sending a value fails
/// with [`Violation::SendUnsupported`], and thrown errors are raised
/// in the delegating routine directly. The completion value is
/// empty.
pub struct FromStream<St, S = (), E = Infallible> {
    stream: RefCell<St>,
    _resume: PhantomData<fn(S, E)>,
}

impl<St, S, E> FromStream<St, S, E> {
    /// Wraps the given stream.
    pub fn new(stream: St) -> Self {
        Self {
            stream: RefCell::new(stream),
            _resume: PhantomData,
        }
    }

    /// Gives the wrapped stream back.
    pub fn into_inner(self) -> St {
        self.stream.into_inner()
    }
}

impl<St, S, E> AsyncIterate for FromStream<St, S, E>
where
    St: Stream + Unpin,
{
    type Item = St::Item;
    type Send = S;
    type Return = ();
    type Error = E;

    fn resume(&self, value: Option<S>) -> Stepped<'_, St::Item, (), E> {
        if value.is_some() {
            debug!("reject value sent to a stream");
            return Box::pin(future::ready(Err(Violation::SendUnsupported.into())));
        }

        let Ok(mut stream) = self.stream.try_borrow_mut() else {
            return Box::pin(future::ready(Err(Error::Reentrant)));
        };

        Box::pin(async move {
            match stream.next().await {
                Some(item) => Ok(Outcome::Produced(item)),
                None => Ok(Outcome::Complete(())),
            }
        })
    }
}

/// Bookkeeping of an ongoing delegation.
///
/// Lives as long as the delegation call and publishes the nested
/// identity on the channel of the delegating generator.
struct DelegationFrame<'a, I: ?Sized, Y, S, E> {
    co: &'a Co<Y, S, E>,
    nested: &'a I,
}

impl<'a, I, Y, S, E> DelegationFrame<'a, I, Y, S, E>
where
    I: AsyncIterate + ?Sized,
{
    fn enter(co: &'a Co<Y, S, E>, nested: &'a I) -> Self {
        let identity = nested.identity();

        match &identity {
            Some(identity) => debug!("delegate to {identity}"),
            None => debug!("delegate to an anonymous iterator"),
        }

        co.channel.borrow_mut().delegating = identity;
        Self { co, nested }
    }
}

impl<I: ?Sized, Y, S, E> Drop for DelegationFrame<'_, I, Y, S, E> {
    fn drop(&mut self) {
        self.co.channel.borrow_mut().delegating = None;
    }
}

impl<Y, S, E> Co<Y, S, E> {
    /// Forwards all the items of the given iterator as if the
    /// routine produced them, and returns its completion value.
    ///
    /// Values sent to the delegating generator are sent to the
    /// nested iterator, errors thrown into it are thrown into the
    /// nested iterator when supported, and closing it closes the
    /// nested iterator before propagating the cancellation.
    pub async fn delegate<I>(&self, nested: &I) -> Result<I::Return, Error<E>>
    where
        I: AsyncIterate<Item = Y, Send = S, Error = E> + ?Sized,
    {
        let frame = DelegationFrame::enter(self, nested);
        let mut outcome = frame.nested.resume(None).await?;

        loop {
            let item = match outcome {
                Outcome::Produced(item) => item,
                Outcome::Complete(value) => break Ok(value),
            };

            outcome = match self.yield_item(item).await {
                Ok(value) => frame.nested.resume(value).await?,
                Err(Error::Cancelled) => {
                    if let Some(close) = frame.nested.try_close() {
                        close.await?;
                    }

                    break Err(Error::Cancelled);
                }
                Err(Error::Raised(err)) => match frame.nested.throw_into(err) {
                    Ok(thrown) => thrown.await?,
                    Err(err) => break Err(Error::Raised(err)),
                },
                Err(err) => break Err(err),
            };
        }
    }

    /// Forwards all the items of the given stream, see
    /// [`Co::delegate`].
    pub async fn delegate_stream<St>(&self, stream: St) -> Result<(), Error<E>>
    where
        St: Stream<Item = Y> + Unpin,
    {
        let nested = FromStream::<St, S, E>::new(stream);
        self.delegate(&nested).await
    }
}
