//! Generator functions.

use std::{fmt, future::Future};

use crate::{
    co::Co,
    driver::Completion,
    generator::AsyncGenerator,
    hooks::{Hooks, Identity},
    Error,
};

/// A routine factory declared to build async generators.
///
/// Each [`call`](GeneratorFn::call) builds a new generator from the
/// factory, named after the factory type and configured with the
/// hooks of the function.
#[derive(Clone)]
pub struct GeneratorFn<F> {
    factory: F,
    hooks: Hooks,
}

/// Declares the given routine factory as an async generator function.
///
/// ```
/// use async_gen::{async_generator, Co, Error};
///
/// async fn countdown(co: Co<u32>, from: u32) -> Result<(), Error> {
///     for i in (0..from).rev() {
///         co.yield_item(i).await?;
///     }
///
///     Ok(())
/// }
///
/// # futures::executor::block_on(async {
/// let countdown = async_generator(countdown);
/// let gen = countdown.call(2);
///
/// assert_eq!(gen.next().await.unwrap(), Some(1));
/// assert_eq!(gen.next().await.unwrap(), Some(0));
/// assert_eq!(gen.next().await.unwrap(), None);
/// # });
/// ```
pub fn async_generator<F>(factory: F) -> GeneratorFn<F> {
    GeneratorFn {
        factory,
        hooks: Hooks::default(),
    }
}

impl<F> GeneratorFn<F> {
    /// Sets the hooks of the generators built by this function.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the hooks given to the generators built by this
    /// function.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Builds a generator, passing the given arguments to the
    /// factory.
    pub fn call<A, Y, S, R, E, Fut>(&self, args: A) -> AsyncGenerator<Y, S, R, E>
    where
        F: Fn(Co<Y, S, E>, A) -> Fut,
        Fut: Future<Output = Result<R, Error<E>>> + 'static,
        Y: 'static,
        S: 'static,
        R: Completion,
        E: 'static,
    {
        AsyncGenerator::create(Identity::of::<F>(), self.hooks.clone(), |co| {
            (self.factory)(co, args)
        })
    }
}

impl<F> fmt::Debug for GeneratorFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorFn")
            .field("factory", &std::any::type_name::<F>())
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use futures::TryStreamExt;

    use crate::{Co, Error, Hooks};

    use super::async_generator;

    async fn repeat(
        co: Co<&'static str>,
        (item, count): (&'static str, usize),
    ) -> Result<(), Error> {
        for _ in 0..count {
            co.yield_item(item).await?;
        }

        Ok(())
    }

    #[tokio::test]
    async fn builds_independent_generators() {
        let _ = env_logger::try_init();

        let repeat = async_generator(repeat);
        let a = repeat.call(("a", 2));
        let b = repeat.call(("b", 1));

        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.identity().name(), b.identity().name());
        assert!(a.identity().name().ends_with("repeat"));

        let items: Vec<_> = b.stream().try_collect().await.unwrap();
        assert_eq!(items, ["b"]);
        let items: Vec<_> = a.stream().try_collect().await.unwrap();
        assert_eq!(items, ["a", "a"]);
    }

    #[tokio::test]
    async fn shares_hooks() {
        let _ = env_logger::try_init();

        let names = Rc::new(RefCell::new(Vec::new()));
        let hooks = Hooks::new().with_first_iter({
            let names = names.clone();
            move |identity| names.borrow_mut().push(identity.id())
        });

        let repeat = async_generator(repeat).with_hooks(hooks);
        let a = repeat.call(("a", 1));
        let b = repeat.call(("b", 1));

        b.next().await.unwrap();
        a.next().await.unwrap();

        assert_eq!(*names.borrow(), [b.identity().id(), a.identity().id()]);
    }
}
