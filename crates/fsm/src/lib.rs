//! Event-driven finite state machine.
//!
//! States and events are free-form strings. An [`EventDesc`] declares which
//! source states an event may fire from and where it leads. Callbacks hook
//! into four phases of a transition:
//!
//! ```text
//!   raise_event(name)
//!        |
//!   BeforeEvent ---- cancel ----> Outcome::Cancelled
//!        |
//!   src == dst ? --- AfterEvent -> Outcome::NoTransition
//!        |
//!   LeaveState ----- cancel ----> Outcome::Cancelled
//!        |    `----- defer -----> Outcome::Async   (complete with `transition()`)
//!        |
//!   state := dst, EnterState, AfterEvent
//!        |
//!   Outcome::Transitioned
//! ```
//!
//! Within a phase the callback registered for the specific trigger always
//! runs before the wildcard callback.

mod callback;
mod error;
mod event;
mod machine;

#[cfg(test)]
mod tests;

pub use callback::{Callback, CallbackDesc, CallbackPhase, Trigger};
pub use error::{FsmError, FsmResult};
pub use event::{EventDesc, FsmEvent, Outcome};
pub use machine::Fsm;
