//! Reflection predicates.
//!
//! Answered at compile time through autoref specialization: the
//! [`is_async_generator!`] and [`is_generator_fn!`] macros probe the
//! static type of their argument, and fall back to `false` for any
//! type that is not a generator, respectively a generator function.
//!
//! Wrappers are not seen through: a closure calling a
//! [`GeneratorFn`] is not itself a generator function.
//!
//! [`GeneratorFn`]: crate::GeneratorFn
//! [`is_async_generator!`]: crate::is_async_generator
//! [`is_generator_fn!`]: crate::is_generator_fn

use crate::{driver::Completion, factory::GeneratorFn, generator::AsyncGenerator};

#[doc(hidden)]
pub struct Probe<'a, T: ?Sized>(pub &'a T);

#[doc(hidden)]
pub trait IsAsyncGenerator {
    fn is_async_generator(&self) -> bool {
        true
    }
}

impl<Y, S, R, E> IsAsyncGenerator for Probe<'_, AsyncGenerator<Y, S, R, E>>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
}

#[doc(hidden)]
pub trait IsNotAsyncGenerator {
    fn is_async_generator(&self) -> bool {
        false
    }
}

impl<T: ?Sized> IsNotAsyncGenerator for &Probe<'_, T> {}

#[doc(hidden)]
pub trait IsGeneratorFn {
    fn is_generator_fn(&self) -> bool {
        true
    }
}

impl<F> IsGeneratorFn for Probe<'_, GeneratorFn<F>> {}

#[doc(hidden)]
pub trait IsNotGeneratorFn {
    fn is_generator_fn(&self) -> bool {
        false
    }
}

impl<T: ?Sized> IsNotGeneratorFn for &Probe<'_, T> {}

/// Returns `true` if the given value is an async generator.
///
/// ```
/// use async_gen::{is_async_generator, AsyncGenerator, Co, Error};
///
/// async fn empty(_co: Co<u8>) -> Result<(), Error> {
///     Ok(())
/// }
///
/// let gen = AsyncGenerator::new(empty);
///
/// assert!(is_async_generator!(gen));
/// assert!(!is_async_generator!(empty));
/// ```
#[macro_export]
macro_rules! is_async_generator {
    ($value:expr) => {{
        #[allow(unused_imports)]
        use $crate::reflect::{IsAsyncGenerator as _, IsNotAsyncGenerator as _};
        (&$crate::reflect::Probe(&$value)).is_async_generator()
    }};
}

/// Returns `true` if the given value is a generator function, as
/// declared with [`async_generator`](crate::async_generator).
///
/// ```
/// use async_gen::{async_generator, is_generator_fn, Co, Error};
///
/// async fn empty(_co: Co<u8>, _: ()) -> Result<(), Error> {
///     Ok(())
/// }
///
/// let empty_fn = async_generator(empty);
///
/// assert!(is_generator_fn!(empty_fn));
/// assert!(!is_generator_fn!(empty));
/// ```
#[macro_export]
macro_rules! is_generator_fn {
    ($value:expr) => {{
        #[allow(unused_imports)]
        use $crate::reflect::{IsGeneratorFn as _, IsNotGeneratorFn as _};
        (&$crate::reflect::Probe(&$value)).is_generator_fn()
    }};
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use futures::stream;

    use crate::{async_generator, AsyncGenerator, Co, Error, FromStream};

    async fn count(co: Co<u8>, to: u8) -> Result<(), Error> {
        for i in 0..to {
            co.yield_item(i).await?;
        }

        Ok(())
    }

    #[test]
    fn generators() {
        let gen = AsyncGenerator::new(|co| count(co, 1));
        let from_stream = FromStream::<_, (), Infallible>::new(stream::iter([1u8]));

        assert!(is_async_generator!(gen));
        assert!(!is_async_generator!(from_stream));
        assert!(!is_async_generator!(42));
        assert!(!is_async_generator!("gen"));
    }

    #[test]
    fn generator_functions() {
        let count_fn = async_generator(count);
        let wrapper = |to: u8| count_fn.call(to);

        assert!(is_generator_fn!(count_fn));
        assert!(!is_generator_fn!(count));
        assert!(!is_generator_fn!(wrapper));

        let gen = wrapper(2);
        assert!(is_async_generator!(gen));
        assert!(!is_generator_fn!(gen));
    }
}
