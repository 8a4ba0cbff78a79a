//! Consuming generators as [`Stream`]s.

use std::{
    future::Future,
    pin::Pin,
    task::{ready, Context, Poll},
};

use futures::{stream, Stream};
use pin_project::pin_project;

use crate::{
    driver::Completion,
    generator::{AsyncGenerator, Next},
    Error,
};

impl<Y, S, R, E> AsyncGenerator<Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    /// Borrows the generator as a stream of items.
    ///
    /// The stream ends with the sequence, or right after the first
    /// error. Dropping it does not close the generator.
    pub fn stream(&self) -> Iter<'_, Y, S, R, E> {
        Iter {
            gen: self,
            next: None,
            done: false,
        }
    }

    /// Turns the generator into a stream of items.
    ///
    /// Dropping the stream drops the generator, see the
    /// [finalization](crate::Hooks) rules.
    pub fn into_stream(self) -> impl Stream<Item = Result<Y, Error<E>>> {
        stream::unfold(Some(self), |gen| async move {
            let gen = gen?;
            let next = gen.next().await;

            match next {
                Ok(Some(item)) => Some((Ok(item), Some(gen))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

/// Stream returned by [`AsyncGenerator::stream`].
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct Iter<'g, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    gen: &'g AsyncGenerator<Y, S, R, E>,
    #[pin]
    next: Option<Next<'g, Y, S, R, E>>,
    done: bool,
}

impl<Y, S, R, E> Stream for Iter<'_, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    type Item = Result<Y, Error<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.done {
            return Poll::Ready(None);
        }

        if this.next.is_none() {
            let gen = *this.gen;
            this.next.set(Some(gen.next()));
        }

        let Some(next) = this.next.as_mut().as_pin_mut() else {
            return Poll::Ready(None);
        };

        let item = ready!(next.poll(cx));
        this.next.set(None);

        if !matches!(item, Ok(Some(_))) {
            *this.done = true;
        }

        Poll::Ready(item.transpose())
    }
}

#[cfg(test)]
mod tests {
    use futures::{pin_mut, StreamExt, TryStreamExt};

    use crate::{AsyncGenerator, Co, Error, State};

    async fn range(co: Co<u8, (), &'static str>, count: u8) -> Result<(), Error<&'static str>> {
        for i in 0..count {
            tokio::task::yield_now().await;
            co.yield_item(i).await?;
        }

        Ok(())
    }

    async fn fails(co: Co<u8, (), &'static str>) -> Result<(), Error<&'static str>> {
        co.yield_item(0).await?;
        Err(Error::Raised("oops"))
    }

    #[tokio::test]
    async fn borrowed() {
        let _ = env_logger::try_init();

        let gen = AsyncGenerator::new(|co| range(co, 4));

        let firsts: Vec<_> = gen.stream().take(2).try_collect().await.unwrap();
        assert_eq!(firsts, [0, 1]);
        assert_eq!(gen.state(), State::Suspended);

        let rest: Vec<_> = gen.stream().try_collect().await.unwrap();
        assert_eq!(rest, [2, 3]);
        assert_eq!(gen.state(), State::Closed);
    }

    #[tokio::test]
    async fn ends_after_error() {
        let _ = env_logger::try_init();

        let gen = AsyncGenerator::new(fails);
        let items: Vec<_> = gen.stream().collect().await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(0)));
        assert!(matches!(items[1], Err(Error::Raised("oops"))));
    }

    #[tokio::test]
    async fn owned() {
        let _ = env_logger::try_init();

        let items = AsyncGenerator::new(|co| range(co, 3)).into_stream();
        pin_mut!(items);

        assert_eq!(items.try_next().await.unwrap(), Some(0));
        assert_eq!(items.try_next().await.unwrap(), Some(1));
        assert_eq!(items.try_next().await.unwrap(), Some(2));
        assert_eq!(items.try_next().await.unwrap(), None);
    }
}
