use std::sync::{Arc, Mutex};

use crate::{CallbackDesc, CallbackPhase, EventDesc, Fsm, FsmError, Outcome, Trigger};

type Log = Arc<Mutex<Vec<String>>>;

fn door() -> Fsm<u32, String> {
    let mut fsm = Fsm::new("closed");
    fsm.add_events([
        EventDesc::new("open", ["closed"], "open"),
        EventDesc::new("close", ["open"], "closed"),
        EventDesc::new("knock", ["closed", "open"], "closed"),
        EventDesc::new("ping", ["open"], "open"),
    ])
    .unwrap();
    fsm
}

fn recorder(log: &Log, label: &'static str) -> impl FnMut(&mut crate::FsmEvent<u32, String>) + Send {
    let log = Arc::clone(log);
    move |event| {
        log.lock()
            .unwrap()
            .push(format!("{label}:{}:{}->{}", event.name(), event.src(), event.dst()))
    }
}

#[test]
fn plain_transition_runs_every_phase_in_order() {
    let log = Log::default();
    let mut fsm = door();
    fsm.add_callbacks([
        CallbackDesc::before_event("open", recorder(&log, "before")),
        CallbackDesc::new(CallbackPhase::BeforeEvent, Trigger::Any, recorder(&log, "before*")),
        CallbackDesc::leave_state("closed", recorder(&log, "leave")),
        CallbackDesc::new(CallbackPhase::LeaveState, Trigger::Any, recorder(&log, "leave*")),
        CallbackDesc::enter_state("open", recorder(&log, "enter")),
        CallbackDesc::new(CallbackPhase::EnterState, Trigger::Any, recorder(&log, "enter*")),
        CallbackDesc::after_event("open", recorder(&log, "after")),
        CallbackDesc::new(CallbackPhase::AfterEvent, Trigger::Any, recorder(&log, "after*")),
    ])
    .unwrap();

    assert_eq!(fsm.raise_event("open", 7).unwrap(), Outcome::Transitioned);
    assert_eq!(fsm.current(), "open");
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before:open:closed->open",
            "before*:open:closed->open",
            "leave:open:closed->open",
            "leave*:open:closed->open",
            "enter:open:closed->open",
            "enter*:open:closed->open",
            "after:open:closed->open",
            "after*:open:closed->open",
        ]
    );
}

#[test]
fn unknown_and_invalid_events_are_distinguished() {
    let mut fsm = door();
    assert_eq!(
        fsm.raise_event("explode", 0),
        Err(FsmError::UnknownEvent {
            event: "explode".into()
        })
    );
    assert_eq!(
        fsm.raise_event("close", 0),
        Err(FsmError::InvalidEvent {
            event: "close".into(),
            state: "closed".into()
        })
    );
    assert!(fsm.is("closed"));
}

#[test]
fn before_event_cancel_keeps_state() {
    let mut fsm = door();
    fsm.add_callbacks([CallbackDesc::before_event("open", |event| {
        event.cancel(Some(format!("locked with {}", event.args())))
    })])
    .unwrap();

    let outcome = fsm.raise_event("open", 3).unwrap();
    assert_eq!(outcome, Outcome::Cancelled(Some("locked with 3".to_string())));
    assert!(fsm.is("closed"));
    assert!(!fsm.in_transition());
}

#[test]
fn cancel_in_specific_callback_skips_wildcard() {
    let log = Log::default();
    let mut fsm = door();
    fsm.add_callbacks([
        CallbackDesc::before_event("open", |event| event.cancel(None)),
        CallbackDesc::new(CallbackPhase::BeforeEvent, Trigger::Any, recorder(&log, "any")),
    ])
    .unwrap();

    assert_eq!(fsm.raise_event("open", 0).unwrap(), Outcome::Cancelled(None));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn self_loop_reports_no_transition_after_after_callbacks() {
    let log = Log::default();
    let mut fsm = door();
    fsm.raise_event("open", 0).unwrap();
    fsm.add_callbacks([
        CallbackDesc::after_event("ping", recorder(&log, "after")),
        CallbackDesc::enter_state("open", recorder(&log, "enter")),
    ])
    .unwrap();

    assert_eq!(fsm.raise_event("ping", 0).unwrap(), Outcome::NoTransition(None));
    assert_eq!(*log.lock().unwrap(), vec!["after:ping:open->open"]);
}

#[test]
fn self_loop_surfaces_attached_error() {
    let mut fsm = door();
    fsm.raise_event("open", 0).unwrap();
    fsm.add_callbacks([CallbackDesc::after_event("ping", |event| {
        event.set_error("nobody home".to_string())
    })])
    .unwrap();

    let outcome = fsm.raise_event("ping", 0).unwrap();
    assert_eq!(outcome.cause().map(String::as_str), Some("nobody home"));
}

#[test]
fn leave_state_cancel_discards_transition() {
    let mut fsm = door();
    fsm.add_callbacks([CallbackDesc::leave_state("closed", |event| event.cancel(None))])
        .unwrap();

    assert_eq!(fsm.raise_event("open", 0).unwrap(), Outcome::Cancelled(None));
    assert!(fsm.is("closed"));
    assert!(!fsm.in_transition());
    assert_eq!(fsm.transition(), Err(FsmError::NotInTransition));
}

#[test]
fn deferred_transition_completes_on_demand() {
    let log = Log::default();
    let mut fsm = door();
    fsm.add_callbacks([
        CallbackDesc::leave_state("closed", |event| event.defer()),
        CallbackDesc::enter_state("open", recorder(&log, "enter")),
        CallbackDesc::after_event("open", recorder(&log, "after")),
    ])
    .unwrap();

    assert_eq!(fsm.raise_event("open", 0).unwrap(), Outcome::Async(None));
    assert!(fsm.is("closed"));
    assert!(fsm.in_transition());
    assert!(fsm.cannot("knock"));
    assert_eq!(
        fsm.raise_event("knock", 0),
        Err(FsmError::InTransition {
            event: "knock".into()
        })
    );
    assert!(log.lock().unwrap().is_empty());

    assert_eq!(fsm.transition().unwrap(), Outcome::Transitioned);
    assert!(fsm.is("open"));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["enter:open:closed->open", "after:open:closed->open"]
    );
    assert_eq!(fsm.transition(), Err(FsmError::NotInTransition));
}

#[test]
fn duplicate_callbacks_are_rejected() {
    let mut fsm = door();
    fsm.add_callbacks([CallbackDesc::before_event("open", |_| {})])
        .unwrap();
    let err = fsm
        .add_callbacks([CallbackDesc::before_event("open", |_| {})])
        .unwrap_err();
    assert_eq!(
        err,
        FsmError::DuplicateCallback {
            phase: CallbackPhase::BeforeEvent,
            trigger: Trigger::named("open")
        }
    );

    fsm.add_callbacks([CallbackDesc::new(CallbackPhase::AfterEvent, Trigger::Any, |_| {})])
        .unwrap();
    assert!(fsm
        .add_callbacks([CallbackDesc::new(CallbackPhase::AfterEvent, Trigger::Any, |_| {})])
        .is_err());
}

#[test]
fn conflicting_destination_is_rejected() {
    let mut fsm = door();
    fsm.add_events([EventDesc::new("open", ["closed"], "open")])
        .unwrap();
    assert_eq!(
        fsm.add_events([EventDesc::new("open", ["closed"], "broken")]),
        Err(FsmError::ConflictingTransition {
            event: "open".into(),
            src: "closed".into(),
            dst: "open".into()
        })
    );
}

#[test]
fn introspection() {
    let fsm = door();
    assert!(fsm.can("open"));
    assert!(fsm.can("knock"));
    assert!(fsm.cannot("close"));
    assert_eq!(fsm.available_events(), vec!["knock", "open"]);
    assert_eq!(fsm.states().collect::<Vec<_>>(), vec!["closed", "open"]);
    assert_eq!(fsm.events().count(), 4);
}
