/// Declares that `name` moves the machine from any of `src` to `dst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDesc {
    pub name: String,
    pub src: Vec<String>,
    pub dst: String,
}

impl EventDesc {
    pub fn new<S>(name: impl Into<String>, src: impl IntoIterator<Item = S>, dst: impl Into<String>) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            src: src.into_iter().map(Into::into).collect(),
            dst: dst.into(),
        }
    }
}

/// The event handed to every callback of one transition.
///
/// Callbacks communicate back through it: [`cancel`](Self::cancel) aborts the
/// transition (honoured in the before-event and leave-state phases),
/// [`defer`](Self::defer) suspends it until [`Fsm::transition`](crate::Fsm::transition)
/// is called (leave-state phase only), and [`set_error`](Self::set_error)
/// attaches a cause that is surfaced in the resulting [`Outcome`].
#[derive(Debug)]
pub struct FsmEvent<A, E> {
    name: String,
    src: String,
    dst: String,
    args: A,
    error: Option<E>,
    cancelled: bool,
    deferred: bool,
}

impl<A, E> FsmEvent<A, E> {
    pub(crate) fn new(name: String, src: String, dst: String, args: A) -> Self {
        Self {
            name,
            src,
            dst,
            args,
            error: None,
            cancelled: false,
            deferred: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn args(&self) -> &A {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut A {
        &mut self.args
    }

    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: E) {
        self.error = Some(error);
    }

    pub fn cancel(&mut self, error: Option<E>) {
        self.cancelled = true;
        if error.is_some() {
            self.error = error;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn defer(&mut self) {
        self.deferred = true;
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub(crate) fn take_error(&mut self) -> Option<E> {
        self.error.take()
    }
}

/// Result of a successfully processed event.
///
/// Everything except `Transitioned` is a recognized signal rather than a
/// failure; the optional payload is the cause a callback attached.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub enum Outcome<E> {
    Transitioned,
    NoTransition(Option<E>),
    Cancelled(Option<E>),
    Async(Option<E>),
}

impl<E> Outcome<E> {
    pub fn is_transitioned(&self) -> bool {
        matches!(self, Outcome::Transitioned)
    }

    pub fn cause(&self) -> Option<&E> {
        match self {
            Outcome::Transitioned => None,
            Outcome::NoTransition(cause) | Outcome::Cancelled(cause) | Outcome::Async(cause) => {
                cause.as_ref()
            }
        }
    }

    pub fn into_cause(self) -> Option<E> {
        match self {
            Outcome::Transitioned => None,
            Outcome::NoTransition(cause) | Outcome::Cancelled(cause) | Outcome::Async(cause) => cause,
        }
    }
}
