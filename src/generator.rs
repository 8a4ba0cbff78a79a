//! The generator state machine.

use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
    fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{ready, Context, Poll},
};

use futures::task::noop_waker_ref;
use log::{debug, error, trace, warn};
use pin_project::{pin_project, pinned_drop};

use crate::{
    co::{Channel, Co, Shared},
    driver::{self, Completion, Frame, Outcome, Resume, Routine},
    hooks::{FinalizerHook, Finalizing, Hooks, Identity},
    Error, Violation,
};

/// Lifecycle of a generator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// The routine has not run yet.
    Created,

    /// The routine waits for the next step.
    Suspended,

    /// A step is in flight.
    Running,

    /// The routine terminated, or was closed.
    Closed,
}

/// An async generator.
///
/// Owns one routine, built from a factory receiving a [`Co`] yield
/// handle, and exposes it as a sequence of `Y` items. Consumers can
/// send `S` values back, throw `E` errors into the routine and close
/// it early. The routine completes with an `R` value, only
/// observable through [delegation].
///
/// At most one step runs at a time: requesting a step while another
/// one is in flight fails with [`Error::Reentrant`].
///
/// [delegation]: crate::Co::delegate
pub struct AsyncGenerator<Y, S = (), R = (), E = Infallible>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    routine: RefCell<Option<Routine<R, E>>>,
    channel: Shared<Y, S, E>,
    identity: Identity,
    hooks: Hooks,

    /// Lifecycle state, [`State::Running`] excluded.
    state: Cell<State>,

    /// Whether a step is in flight.
    running: Cell<bool>,

    /// Whether the last step was abandoned while the routine awaited
    /// the runtime.
    mid_step: Cell<bool>,

    /// Bound from the hooks at the first step.
    finalizer: RefCell<Option<FinalizerHook>>,
}

impl<Y, S, R, E> AsyncGenerator<Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    /// Creates a generator from the given routine factory.
    ///
    /// The factory is called right away, but the routine it returns
    /// does not run before the first step.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: FnOnce(Co<Y, S, E>) -> Fut,
        Fut: Future<Output = Result<R, Error<E>>> + 'static,
    {
        Self::with_hooks(Hooks::default(), factory)
    }

    /// Creates a generator from the given routine factory, using the
    /// given hooks.
    pub fn with_hooks<F, Fut>(hooks: Hooks, factory: F) -> Self
    where
        F: FnOnce(Co<Y, S, E>) -> Fut,
        Fut: Future<Output = Result<R, Error<E>>> + 'static,
    {
        Self::create(Identity::of::<F>(), hooks, factory)
    }

    pub(crate) fn create<F, Fut>(identity: Identity, hooks: Hooks, factory: F) -> Self
    where
        F: FnOnce(Co<Y, S, E>) -> Fut,
        Fut: Future<Output = Result<R, Error<E>>> + 'static,
    {
        debug!("create generator {identity}");

        let channel = Rc::new(RefCell::new(Channel::default()));
        let routine: Routine<R, E> = Box::pin(factory(Co::new(channel.clone())));

        Self {
            routine: RefCell::new(Some(routine)),
            channel,
            identity,
            hooks,
            state: Cell::new(State::Created),
            running: Cell::new(false),
            mid_step: Cell::new(false),
            finalizer: RefCell::new(None),
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> State {
        if self.running.get() {
            State::Running
        } else {
            self.state.get()
        }
    }

    /// Returns the identity of the underlying routine.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the identity of the generator the routine currently
    /// delegates to, if any.
    pub fn delegating_to(&self) -> Option<Identity> {
        self.channel.borrow().delegating.clone()
    }

    /// Produces the next item, or `None` at the end of the sequence.
    pub fn next(&self) -> Next<'_, Y, S, R, E> {
        Next::new(self, Resume::Advance)
    }

    /// Sends a value to the routine, and produces the next item.
    ///
    /// The value becomes the result of the pending
    /// [`Co::yield_item`]. Fails with [`Violation::SendToUnstarted`]
    /// if the routine never ran.
    pub fn send(&self, value: S) -> Next<'_, Y, S, R, E> {
        Next::new(self, Resume::Send(value))
    }

    /// Raises the given error at the pending yield point, and
    /// produces the next item.
    ///
    /// If the routine does not handle it, the error propagates back
    /// unchanged. Throwing into a never-started generator closes it
    /// and gives the error back.
    pub fn throw(&self, err: E) -> Next<'_, Y, S, R, E> {
        Next::new(self, Resume::Throw(err))
    }

    /// Closes the generator.
    ///
    /// A never-started routine is dropped without running. A
    /// suspended one receives [`Error::Cancelled`] at its yield
    /// point, and must either terminate or propagate it. Closing an
    /// already closed generator does nothing.
    pub async fn close(&self) -> Result<(), Error<E>> {
        if self.running.get() {
            return Err(Error::Reentrant);
        }

        match self.state.get() {
            State::Closed => return Ok(()),
            State::Created => {
                debug!("close unstarted generator {}", self.identity);
                self.shut();
                return Ok(());
            }
            State::Suspended | State::Running => (),
        }

        if self.mid_step.get() {
            warn!("drop routine of generator {} suspended mid-step", self.identity);
            self.shut();
            return Ok(());
        }

        debug!("close generator {}", self.identity);

        match Step::new(self, Resume::Cancel, Frame::Delegated).await {
            Ok(Outcome::Complete(_)) | Err(Error::Cancelled) => Ok(()),
            Ok(Outcome::Produced(_)) => {
                self.shut();
                Err(Violation::YieldedOnClose.into())
            }
            Err(err) => Err(err),
        }
    }

    /// Prepares a step to run with the given instruction.
    ///
    /// Returns the outcome right away when the step cannot run the
    /// routine.
    fn begin(&self, resume: Resume<S, E>) -> Option<Result<Outcome<Y, R>, Error<E>>> {
        if self.running.get() {
            return Some(Err(Error::Reentrant));
        }

        match self.state.get() {
            State::Closed => return Some(Ok(Outcome::Complete(R::empty()))),
            State::Created => match resume {
                Resume::Advance => self.first_iter(),
                Resume::Send(_) => return Some(Err(Violation::SendToUnstarted.into())),
                Resume::Throw(err) => {
                    self.first_iter();
                    self.shut();
                    return Some(Err(Error::Raised(err)));
                }
                Resume::Cancel => {
                    self.shut();
                    return Some(Ok(Outcome::Complete(R::empty())));
                }
            },
            State::Suspended if self.mid_step.get() => match resume {
                Resume::Advance => trace!("continue abandoned step of {}", self.identity),
                _ => return Some(Err(Violation::ResumeMidStep.into())),
            },
            State::Suspended | State::Running => resume.deliver(&self.channel),
        }

        self.running.set(true);
        self.state.set(State::Suspended);
        None
    }

    /// Binds the finalizer and runs the first-iteration hook.
    fn first_iter(&self) {
        *self.finalizer.borrow_mut() = self.hooks.finalizer().cloned();

        if let Some(hook) = self.hooks.first_iter() {
            trace!("run first-iteration hook of {}", self.identity);
            hook(&self.identity);
        }
    }

    fn finish(&self) {
        self.running.set(false);
        self.mid_step.set(false);

        if self.routine.borrow().is_none() {
            debug!("generator {} closed", self.identity);
            self.state.set(State::Closed);
        }
    }

    fn abandon(&self) {
        self.running.set(false);

        if self.routine.borrow().is_some() {
            debug!("step of generator {} abandoned mid-flight", self.identity);
            self.mid_step.set(true);
        } else {
            self.state.set(State::Closed);
        }
    }

    /// Drops the routine without resuming it.
    fn shut(&self) {
        let routine = self.routine.borrow_mut().take();
        self.state.set(State::Closed);
        self.mid_step.set(false);
        drop(routine);
    }

    /// Best-effort synchronous cancellation, used when no finalizer
    /// hook takes over a dropped generator.
    ///
    /// The routine gets a single poll to terminate.
    fn close_now(&mut self) -> Result<(), Error<E>> {
        Resume::<S, E>::Cancel.deliver(&self.channel);

        let mut cx = Context::from_waker(noop_waker_ref());
        let routine = self.routine.get_mut();
        let polled = driver::drive(routine, &self.channel, Frame::Delegated, &mut cx);

        *routine = None;
        self.state.set(State::Closed);

        match polled {
            Poll::Ready(Ok(Outcome::Complete(_))) | Poll::Ready(Err(Error::Cancelled)) => Ok(()),
            Poll::Ready(Ok(Outcome::Produced(_))) => Err(Violation::YieldedOnClose.into()),
            Poll::Ready(Err(err)) => Err(err),
            Poll::Pending => Err(Error::CancellationNotHonored),
        }
    }

    /// Moves the routine into a new generator owned by a finalizer.
    fn orphan(&mut self) -> Self {
        let routine = self.routine.get_mut().take();
        self.state.set(State::Closed);

        Self {
            routine: RefCell::new(routine),
            channel: self.channel.clone(),
            identity: self.identity.clone(),
            hooks: Hooks::default(),
            state: Cell::new(State::Suspended),
            running: Cell::new(false),
            mid_step: Cell::new(self.mid_step.replace(false)),
            finalizer: RefCell::new(None),
        }
    }

    fn finalize(&mut self) {
        if let Some(finalizer) = self.finalizer.get_mut().take() {
            let identity = self.identity.clone();
            warn!("generator {identity} dropped while suspended, handing it to the finalizer");

            let orphan = self.orphan();
            let close = Box::pin(async move {
                match orphan.close().await {
                    Ok(()) => debug!("generator {} finalized", orphan.identity),
                    Err(_) => {
                        error!("generator {} failed to close during finalization", orphan.identity)
                    }
                }
            });

            finalizer(Finalizing::new(identity, close));
            return;
        }

        if self.mid_step.get() {
            error!(
                "generator {} dropped mid-step, its routine cannot be cancelled: \
                 install a finalizer hook, or close it with `closing`",
                self.identity,
            );
            self.shut();
            return;
        }

        match self.close_now() {
            Ok(()) => debug!("generator {} closed on drop", self.identity),
            Err(Error::CancellationNotHonored) => error!(
                "generator {} awaited during finalization: \
                 install a finalizer hook, or close it with `closing`",
                self.identity,
            ),
            Err(Error::Protocol(violation)) => {
                error!("generator {} dropped while suspended: {violation}", self.identity)
            }
            Err(_) => error!("generator {} raised an error during finalization", self.identity),
        }
    }
}

impl<Y, S, R, E> Drop for AsyncGenerator<Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    fn drop(&mut self) {
        match self.state.get() {
            State::Created => trace!("drop unstarted generator {}", self.identity),
            State::Closed => (),
            State::Suspended | State::Running => self.finalize(),
        }
    }
}

impl<Y, S, R, E> fmt::Debug for AsyncGenerator<Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncGenerator")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// One step of a generator.
///
/// The routine only runs while this future is polled. Dropping it
/// while the routine awaits the runtime abandons the step: the next
/// advance continues it.
#[pin_project(PinnedDrop)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub(crate) struct Step<'g, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    gen: &'g AsyncGenerator<Y, S, R, E>,
    resume: Option<Resume<S, E>>,
    frame: Frame,
    in_flight: bool,
}

impl<'g, Y, S, R, E> Step<'g, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    pub(crate) fn new(
        gen: &'g AsyncGenerator<Y, S, R, E>,
        resume: Resume<S, E>,
        frame: Frame,
    ) -> Self {
        Self {
            gen,
            resume: Some(resume),
            frame,
            in_flight: false,
        }
    }
}

impl<Y, S, R, E> Future for Step<'_, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    type Output = Result<Outcome<Y, R>, Error<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let gen = *this.gen;

        if let Some(resume) = this.resume.take() {
            if let Some(outcome) = gen.begin(resume) {
                return Poll::Ready(outcome);
            }

            *this.in_flight = true;
        }

        if !*this.in_flight {
            panic!("generator step polled after completion");
        }

        let polled = {
            let mut routine = gen.routine.borrow_mut();
            driver::drive(&mut routine, &gen.channel, *this.frame, cx)
        };

        let outcome = ready!(polled);
        *this.in_flight = false;
        gen.finish();
        Poll::Ready(outcome)
    }
}

#[pinned_drop]
impl<Y, S, R, E> PinnedDrop for Step<'_, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    fn drop(self: Pin<&mut Self>) {
        if self.in_flight {
            self.gen.abandon();
        }
    }
}

/// Future returned by [`AsyncGenerator::next`], [`send`] and
/// [`throw`].
///
/// Resolves to the produced item, or to `None` at the end of the
/// sequence.
///
/// [`send`]: AsyncGenerator::send
/// [`throw`]: AsyncGenerator::throw
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Next<'g, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    #[pin]
    step: Step<'g, Y, S, R, E>,
}

impl<'g, Y, S, R, E> Next<'g, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    fn new(gen: &'g AsyncGenerator<Y, S, R, E>, resume: Resume<S, E>) -> Self {
        let step = Step::new(gen, resume, Frame::Plain);
        Self { step }
    }
}

impl<Y, S, R, E> Future for Next<'_, Y, S, R, E>
where
    Y: 'static,
    S: 'static,
    R: Completion,
    E: 'static,
{
    type Output = Result<Option<Y>, Error<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = ready!(self.project().step.poll(cx))?;

        match outcome {
            Outcome::Produced(item) => Poll::Ready(Ok(Some(item))),
            Outcome::Complete(_) => Poll::Ready(Ok(None)),
        }
    }
}
