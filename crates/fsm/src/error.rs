use crate::callback::{CallbackPhase, Trigger};

/// Hard failures raised by [`Fsm`](crate::Fsm).
///
/// Expected control-flow signals (no state change, cancellation, deferred
/// completion) are reported through [`Outcome`](crate::Outcome) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
    #[error("fsm: event {event} inappropriate because previous transition did not complete")]
    InTransition { event: String },

    #[error("fsm: event {event} does not exist")]
    UnknownEvent { event: String },

    #[error("fsm: event {event} inappropriate in current state {state}")]
    InvalidEvent { event: String, state: String },

    #[error("fsm: transition inappropriate because no state change in progress")]
    NotInTransition,

    #[error("fsm: {phase} callback already registered for {trigger}")]
    DuplicateCallback { phase: CallbackPhase, trigger: Trigger },

    #[error("fsm: event {event} from {src} already leads to {dst}")]
    ConflictingTransition {
        event: String,
        src: String,
        dst: String,
    },
}

impl FsmError {
    /// True for the two lookup failures a caller typically answers with a
    /// protocol-level rejection rather than a crash.
    pub fn is_illegal_event(&self) -> bool {
        matches!(
            self,
            FsmError::UnknownEvent { .. } | FsmError::InvalidEvent { .. }
        )
    }
}

pub type FsmResult<T> = Result<T, FsmError>;
