use std::fmt;

use crate::event::FsmEvent;

/// The point of a transition at which a callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackPhase {
    /// Before anything happens; keyed by event name. May cancel.
    BeforeEvent,
    /// Before the current state is left; keyed by state name. May cancel or defer.
    LeaveState,
    /// After the new state is set; keyed by state name.
    EnterState,
    /// Last; keyed by event name.
    AfterEvent,
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackPhase::BeforeEvent => "before_event",
            CallbackPhase::LeaveState => "leave_state",
            CallbackPhase::EnterState => "enter_state",
            CallbackPhase::AfterEvent => "after_event",
        };
        f.write_str(name)
    }
}

/// What a callback is attached to: one event/state name, or every one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    Any,
    Named(String),
}

impl Trigger {
    pub fn named(name: impl Into<String>) -> Self {
        Trigger::Named(name.into())
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Any => f.write_str("*"),
            Trigger::Named(name) => f.write_str(name),
        }
    }
}

pub type Callback<A, E> = Box<dyn FnMut(&mut FsmEvent<A, E>) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CallbackKey {
    pub(crate) trigger: Trigger,
    pub(crate) phase: CallbackPhase,
}

/// A callback together with the (trigger, phase) slot it occupies.
pub struct CallbackDesc<A, E> {
    pub(crate) key: CallbackKey,
    pub(crate) callback: Callback<A, E>,
}

impl<A, E> CallbackDesc<A, E> {
    pub fn new<F>(phase: CallbackPhase, trigger: Trigger, callback: F) -> Self
    where
        F: FnMut(&mut FsmEvent<A, E>) + Send + 'static,
    {
        Self {
            key: CallbackKey { trigger, phase },
            callback: Box::new(callback),
        }
    }

    pub fn before_event<F>(event: &str, callback: F) -> Self
    where
        F: FnMut(&mut FsmEvent<A, E>) + Send + 'static,
    {
        Self::new(CallbackPhase::BeforeEvent, Trigger::named(event), callback)
    }

    pub fn after_event<F>(event: &str, callback: F) -> Self
    where
        F: FnMut(&mut FsmEvent<A, E>) + Send + 'static,
    {
        Self::new(CallbackPhase::AfterEvent, Trigger::named(event), callback)
    }

    pub fn leave_state<F>(state: &str, callback: F) -> Self
    where
        F: FnMut(&mut FsmEvent<A, E>) + Send + 'static,
    {
        Self::new(CallbackPhase::LeaveState, Trigger::named(state), callback)
    }

    pub fn enter_state<F>(state: &str, callback: F) -> Self
    where
        F: FnMut(&mut FsmEvent<A, E>) + Send + 'static,
    {
        Self::new(CallbackPhase::EnterState, Trigger::named(state), callback)
    }

    pub fn phase(&self) -> CallbackPhase {
        self.key.phase
    }

    pub fn trigger(&self) -> &Trigger {
        &self.key.trigger
    }
}

impl<A, E> fmt::Debug for CallbackDesc<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackDesc")
            .field("phase", &self.key.phase)
            .field("trigger", &self.key.trigger)
            .finish_non_exhaustive()
    }
}
