//! Generator hooks and routine identities.
//!
//! Hooks are plain values handed to generators at creation: there is
//! no process-wide registry. Clone a [`Hooks`] to share the same
//! configuration between generators.

use std::{
    any, fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
};

use futures::future::LocalBoxFuture;

/// Identifies the routine of a generator, for tracing purposes.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Identity {
    id: u64,
    name: &'static str,
}

impl Identity {
    /// Allocates a new identity named after the given routine
    /// factory type.
    pub(crate) fn of<F>() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: any::type_name::<F>(),
        }
    }

    /// Returns the unique identifier of the routine.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the name of the routine factory.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Hook called once per generator, right before its first step.
pub type FirstIterHook = Rc<dyn Fn(&Identity)>;

/// Hook receiving generators dropped while suspended.
pub type FinalizerHook = Rc<dyn Fn(Finalizing)>;

/// The pair of hooks read by generators.
///
/// The first-iteration hook is read when a generator takes its
/// first step, which is also when the finalizer hook gets bound to
/// the generator.
#[derive(Clone, Default)]
pub struct Hooks {
    first_iter: Option<FirstIterHook>,
    finalizer: Option<FinalizerHook>,
}

impl Hooks {
    /// Creates hooks that do nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first-iteration hook, builder style.
    pub fn with_first_iter(mut self, hook: impl Fn(&Identity) + 'static) -> Self {
        self.set_first_iter(Some(Rc::new(hook)));
        self
    }

    /// Sets the finalizer hook, builder style.
    pub fn with_finalizer(mut self, hook: impl Fn(Finalizing) + 'static) -> Self {
        self.set_finalizer(Some(Rc::new(hook)));
        self
    }

    /// Returns the first-iteration hook.
    pub fn first_iter(&self) -> Option<&FirstIterHook> {
        self.first_iter.as_ref()
    }

    /// Replaces the first-iteration hook.
    ///
    /// Only generators created afterwards see the change.
    pub fn set_first_iter(&mut self, hook: Option<FirstIterHook>) {
        self.first_iter = hook;
    }

    /// Returns the finalizer hook.
    pub fn finalizer(&self) -> Option<&FinalizerHook> {
        self.finalizer.as_ref()
    }

    /// Replaces the finalizer hook.
    pub fn set_finalizer(&mut self, hook: Option<FinalizerHook>) {
        self.finalizer = hook;
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("first_iter", &self.first_iter.is_some())
            .field("finalizer", &self.finalizer.is_some())
            .finish()
    }
}

/// A generator dropped while suspended, handed to the finalizer
/// hook.
///
/// Driving this future to completion closes the generator. Dropping
/// it instead falls back to a best-effort synchronous cancellation.
#[must_use = "dropped generators are only closed when the future is awaited"]
pub struct Finalizing {
    identity: Identity,
    close: LocalBoxFuture<'static, ()>,
}

impl Finalizing {
    pub(crate) fn new(identity: Identity, close: LocalBoxFuture<'static, ()>) -> Self {
        Self { identity, close }
    }

    /// Returns the identity of the dropped generator routine.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Future for Finalizing {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.close.as_mut().poll(cx)
    }
}

impl fmt::Debug for Finalizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizing")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
