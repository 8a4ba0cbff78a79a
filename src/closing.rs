//! Scoped closing of iterators.

use std::{
    future::Future,
    panic::{self, AssertUnwindSafe},
};

use futures::FutureExt;
use log::{debug, warn};

use crate::{delegate::AsyncIterate, Error};

/// Runs the given body against the iterator, then closes the
/// iterator whatever the way the body exits: normal completion,
/// error or panic.
///
/// An error raised by the body takes precedence over an error raised
/// while closing, which is only logged. Panics resume once the
/// iterator is closed. Iterators that cannot be closed are left as
/// is.
///
/// Cancelling the returned future skips the close: the iterator is
/// then finalized when dropped.
pub async fn closing<'g, G, F, Fut, T>(gen: &'g G, body: F) -> Result<T, Error<G::Error>>
where
    G: AsyncIterate + ?Sized,
    F: FnOnce(&'g G) -> Fut,
    Fut: Future<Output = Result<T, Error<G::Error>>>,
{
    let res = AssertUnwindSafe(body(gen)).catch_unwind().await;

    let closed = match gen.try_close() {
        Some(close) => {
            debug!("close iterator at the end of its scope");
            close.await
        }
        None => Ok(()),
    };

    match res {
        Err(payload) => {
            if closed.is_err() {
                warn!("iterator failed to close while unwinding");
            }

            panic::resume_unwind(payload)
        }
        Ok(Err(err)) => {
            if closed.is_err() {
                warn!("iterator failed to close after an error, keep the first one");
            }

            Err(err)
        }
        Ok(Ok(value)) => closed.map(|()| value),
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, panic::AssertUnwindSafe, rc::Rc};

    use futures::FutureExt;

    use crate::{AsyncGenerator, Co, Error, State, Violation};

    use super::closing;

    type Track = Rc<RefCell<Vec<&'static str>>>;

    async fn tracked(
        co: Co<u8, (), &'static str>,
        track: Track,
    ) -> Result<(), Error<&'static str>> {
        for i in 0.. {
            if let Err(err) = co.yield_item(i).await {
                track.borrow_mut().push(if err.is_cancelled() { "closed" } else { "raised" });
                return Err(err);
            }
        }

        Ok(())
    }

    fn generator(track: &Track) -> AsyncGenerator<u8, (), (), &'static str> {
        let track = track.clone();
        AsyncGenerator::new(move |co| tracked(co, track))
    }

    #[tokio::test]
    async fn closes_after_body() {
        let _ = env_logger::try_init();

        let track = Track::default();
        let gen = generator(&track);

        let first = closing(&gen, |gen| async move { gen.next().await })
            .await
            .unwrap();

        assert_eq!(first, Some(0));
        assert_eq!(*track.borrow(), ["closed"]);
        assert_eq!(gen.state(), State::Closed);
    }

    #[tokio::test]
    async fn body_error_takes_precedence() {
        let _ = env_logger::try_init();

        let track = Track::default();
        let gen = generator(&track);

        let err = closing(&gen, |gen| async move {
            gen.next().await?;
            Err::<(), _>(Error::Raised("body"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Raised("body")));
        assert_eq!(*track.borrow(), ["closed"]);
    }

    async fn yields_on_close(co: Co<u8, (), &'static str>) -> Result<(), Error<&'static str>> {
        let res = co.yield_item(0).await;
        co.yield_item(1).await?;
        res?;
        Ok(())
    }

    #[tokio::test]
    async fn close_error_surfaces() {
        let _ = env_logger::try_init();

        let gen = AsyncGenerator::new(yields_on_close);
        let err = closing(&gen, |gen| async move { gen.next().await })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(Violation::YieldedOnClose)));
    }

    #[tokio::test]
    async fn closes_on_panic() {
        let _ = env_logger::try_init();

        let track = Track::default();
        let gen = generator(&track);

        let body = closing(&gen, |gen| async move {
            gen.next().await?;

            if gen.state() == State::Suspended {
                panic!("body panicked");
            }

            Ok::<(), Error<&'static str>>(())
        });

        let res = AssertUnwindSafe(body).catch_unwind().await;

        assert!(res.is_err());
        assert_eq!(*track.borrow(), ["closed"]);
        assert_eq!(gen.state(), State::Closed);
    }
}
