use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::trace;

use crate::callback::{Callback, CallbackDesc, CallbackKey, CallbackPhase, Trigger};
use crate::error::{FsmError, FsmResult};
use crate::event::{EventDesc, FsmEvent, Outcome};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EventKey {
    event: String,
    src: String,
}

/// String-keyed state machine generic over the event arguments `A` and the
/// error type `E` callbacks may attach.
pub struct Fsm<A, E> {
    current: String,
    transitions: HashMap<EventKey, String>,
    callbacks: HashMap<CallbackKey, Callback<A, E>>,
    states: BTreeSet<String>,
    events: BTreeSet<String>,
    // Set only while a leave-state callback has deferred completion.
    pending: Option<FsmEvent<A, E>>,
}

impl<A, E> Fsm<A, E> {
    pub fn new(initial: impl Into<String>) -> Self {
        let current = initial.into();
        let mut states = BTreeSet::new();
        states.insert(current.clone());
        Self {
            current,
            transitions: HashMap::new(),
            callbacks: HashMap::new(),
            states,
            events: BTreeSet::new(),
            pending: None,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn is(&self, state: &str) -> bool {
        self.current == state
    }

    pub fn in_transition(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether `event` could fire right now.
    pub fn can(&self, event: &str) -> bool {
        !self.in_transition() && self.destination(event).is_some()
    }

    pub fn cannot(&self, event: &str) -> bool {
        !self.can(event)
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(String::as_str)
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    /// Events that are legal from the current state, sorted by name.
    pub fn available_events(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|event| self.destination(event).is_some())
            .map(String::as_str)
            .collect()
    }

    pub fn add_events<I>(&mut self, descs: I) -> FsmResult<()>
    where
        I: IntoIterator<Item = EventDesc>,
    {
        for desc in descs {
            for src in &desc.src {
                let key = EventKey {
                    event: desc.name.clone(),
                    src: src.clone(),
                };
                match self.transitions.get(&key) {
                    Some(existing) if existing != &desc.dst => {
                        return Err(FsmError::ConflictingTransition {
                            event: desc.name.clone(),
                            src: src.clone(),
                            dst: existing.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        self.transitions.insert(key, desc.dst.clone());
                    }
                }
                self.states.insert(src.clone());
            }
            self.states.insert(desc.dst.clone());
            self.events.insert(desc.name);
        }
        Ok(())
    }

    pub fn add_callbacks<I>(&mut self, descs: I) -> FsmResult<()>
    where
        I: IntoIterator<Item = CallbackDesc<A, E>>,
    {
        for desc in descs {
            if self.callbacks.contains_key(&desc.key) {
                return Err(FsmError::DuplicateCallback {
                    phase: desc.key.phase,
                    trigger: desc.key.trigger,
                });
            }
            self.callbacks.insert(desc.key, desc.callback);
        }
        Ok(())
    }

    /// Fires `event` with `args`.
    ///
    /// `Err` is reserved for misuse and illegal events; every other result,
    /// including cancellation, comes back as an [`Outcome`].
    pub fn raise_event(&mut self, event: &str, args: A) -> FsmResult<Outcome<E>> {
        if self.pending.is_some() {
            return Err(FsmError::InTransition {
                event: event.to_string(),
            });
        }

        let dst = match self.destination(event) {
            Some(dst) => dst.to_string(),
            None if self.events.contains(event) => {
                return Err(FsmError::InvalidEvent {
                    event: event.to_string(),
                    state: self.current.clone(),
                });
            }
            None => {
                return Err(FsmError::UnknownEvent {
                    event: event.to_string(),
                });
            }
        };

        trace!(event = %event, src = %self.current, dst = %dst, "raising fsm event");
        let mut fsm_event = FsmEvent::new(event.to_string(), self.current.clone(), dst, args);

        if self.run_phase(CallbackPhase::BeforeEvent, event, &mut fsm_event, true) {
            return Ok(Outcome::Cancelled(fsm_event.take_error()));
        }

        if self.current == fsm_event.dst() {
            self.run_phase(CallbackPhase::AfterEvent, event, &mut fsm_event, false);
            return Ok(Outcome::NoTransition(fsm_event.take_error()));
        }

        let src = self.current.clone();
        for trigger in [Trigger::named(src), Trigger::Any] {
            self.run_callback(CallbackPhase::LeaveState, trigger, &mut fsm_event);
            if fsm_event.is_cancelled() {
                return Ok(Outcome::Cancelled(fsm_event.take_error()));
            }
            if fsm_event.is_deferred() {
                let cause = fsm_event.take_error();
                self.pending = Some(fsm_event);
                return Ok(Outcome::Async(cause));
            }
        }

        self.complete(fsm_event);
        Ok(Outcome::Transitioned)
    }

    /// Completes a transition previously deferred by a leave-state callback.
    pub fn transition(&mut self) -> FsmResult<Outcome<E>> {
        let fsm_event = self.pending.take().ok_or(FsmError::NotInTransition)?;
        self.complete(fsm_event);
        Ok(Outcome::Transitioned)
    }

    fn complete(&mut self, mut fsm_event: FsmEvent<A, E>) {
        self.current = fsm_event.dst().to_string();
        let dst = self.current.clone();
        let name = fsm_event.name().to_string();
        self.run_phase(CallbackPhase::EnterState, &dst, &mut fsm_event, false);
        self.run_phase(CallbackPhase::AfterEvent, &name, &mut fsm_event, false);
    }

    // Returns true when a callback cancelled and `stop_on_cancel` is set.
    fn run_phase(
        &mut self,
        phase: CallbackPhase,
        trigger: &str,
        fsm_event: &mut FsmEvent<A, E>,
        stop_on_cancel: bool,
    ) -> bool {
        for trigger in [Trigger::named(trigger), Trigger::Any] {
            self.run_callback(phase, trigger, fsm_event);
            if stop_on_cancel && fsm_event.is_cancelled() {
                return true;
            }
        }
        false
    }

    fn run_callback(&mut self, phase: CallbackPhase, trigger: Trigger, fsm_event: &mut FsmEvent<A, E>) {
        if let Some(callback) = self.callbacks.get_mut(&CallbackKey { trigger, phase }) {
            callback(fsm_event);
        }
    }

    fn destination(&self, event: &str) -> Option<&str> {
        self.transitions
            .get(&EventKey {
                event: event.to_string(),
                src: self.current.clone(),
            })
            .map(String::as_str)
    }
}

impl<A, E> fmt::Debug for Fsm<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fsm")
            .field("current", &self.current)
            .field("states", &self.states)
            .field("events", &self.events)
            .field("callbacks", &self.callbacks.len())
            .field("in_transition", &self.in_transition())
            .finish()
    }
}
