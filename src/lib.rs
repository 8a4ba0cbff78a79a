//! Async generators built on top of async/await, with send, throw,
//! close and delegation.
//!
//! An [`AsyncGenerator`] owns one routine: a future built by a
//! factory receiving a [`Co`] yield handle. The routine produces
//! items with [`Co::yield_item`], and can await any other future in
//! between: those suspensions are passed through to the runtime
//! polling the generator, while produced items are handed to the
//! consumer.
//!
//! ```
//! use async_gen::{AsyncGenerator, Co, Error};
//!
//! async fn running_total(co: Co<u32, u32>) -> Result<(), Error> {
//!     let mut total = 0;
//!
//!     while let Some(value) = co.yield_item(total).await? {
//!         total += value;
//!     }
//!
//!     Ok(())
//! }
//!
//! # futures::executor::block_on(async {
//! let gen = AsyncGenerator::new(running_total);
//!
//! assert_eq!(gen.next().await.unwrap(), Some(0));
//! assert_eq!(gen.send(2).await.unwrap(), Some(2));
//! assert_eq!(gen.send(3).await.unwrap(), Some(5));
//!
//! gen.close().await.unwrap();
//! assert_eq!(gen.next().await.unwrap(), None);
//! # });
//! ```

mod closing;
mod co;
pub mod delegate;
mod driver;
mod error;
mod factory;
mod generator;
pub mod hooks;
#[doc(hidden)]
pub mod reflect;
mod stream;
pub mod tag;

#[doc(inline)]
pub use crate::{
    closing::closing,
    co::{Co, YieldItem},
    delegate::{AsyncIterate, FromStream},
    driver::{Completion, Outcome, Resume},
    error::{Error, Violation},
    factory::{async_generator, GeneratorFn},
    generator::{AsyncGenerator, Next, State},
    hooks::{Finalizing, Hooks, Identity},
    stream::Iter,
};
