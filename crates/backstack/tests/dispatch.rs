mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use scopestack_backstack::{
	Backstack, BackstackConfig, BackstackError, Completion, Direction, DispatchPhase, History, SavedState,
	StateChange,
};

fn started(keys: &[&'static str]) -> Backstack<Screen> {
	init_tracing();
	let backstack = Backstack::new();
	backstack.setup(History::of(keys.iter().map(|k| plain(k)))).unwrap();
	backstack.set_state_changer(immediate()).unwrap();
	backstack
}

#[test]
fn go_to_pushes_and_go_back_pops() {
	let backstack = started(&["A"]);
	let changes = Arc::new(Mutex::new(Vec::new()));
	let seen = changes.clone();
	backstack.add_completion_listener(move |change: &StateChange<Screen>| {
		seen.lock().push((names(change.previous()), names(change.new_history()), change.direction()));
	});

	backstack.go_to(plain("B")).unwrap();
	assert_eq!(names(&backstack.history()), ["A", "B"]);
	assert!(backstack.go_back().unwrap());
	assert_eq!(names(&backstack.history()), ["A"]);

	assert!(!backstack.go_back().unwrap());
	assert!(!backstack.can_go_back());

	assert_eq!(
		*changes.lock(),
		[
			(vec!["A"], vec!["A", "B"], Direction::Forward),
			(vec!["A", "B"], vec!["A"], Direction::Backward),
		]
	);
}

#[test]
fn go_to_an_existing_key_returns_to_it() {
	let backstack = started(&["A", "B", "C"]);
	backstack.go_to(plain("A")).unwrap();
	assert_eq!(names(&backstack.history()), ["A"]);
	assert_eq!(backstack.top().map(|k| k.name), Some("A"));
	assert_eq!(backstack.root().map(|k| k.name), Some("A"));
}

#[test]
fn history_is_committed_only_on_completion() {
	init_tracing();
	let backstack = Backstack::new();
	let deferred = Deferred::default();
	backstack.setup(History::single(plain("A"))).unwrap();
	assert!(backstack.history().is_empty());
	assert_eq!(backstack.dispatch_phase(), DispatchPhase::Queued(1));

	backstack.set_state_changer(deferred.changer()).unwrap();
	assert_eq!(backstack.dispatch_phase(), DispatchPhase::InFlight);
	assert!(backstack.history().is_empty());
	let initial = deferred.complete_next();
	assert!(initial.is_initialization());
	assert_eq!(names(&backstack.history()), ["A"]);

	backstack.go_to(plain("B")).unwrap();
	assert!(backstack.is_state_change_pending());
	assert_eq!(names(&backstack.history()), ["A"]);
	assert!(backstack.can_go_back());

	deferred.complete_next();
	assert_eq!(names(&backstack.history()), ["A", "B"]);
	assert_eq!(backstack.dispatch_phase(), DispatchPhase::Idle);
}

#[test]
fn requests_queued_during_a_transition_are_coalesced() {
	init_tracing();
	let backstack = Backstack::new();
	let deferred = Deferred::default();
	backstack.setup(History::single(plain("A"))).unwrap();
	backstack.set_state_changer(deferred.changer()).unwrap();
	deferred.complete_next();

	backstack.go_to(plain("B")).unwrap();
	backstack.go_to(plain("C")).unwrap();
	backstack.go_to(plain("D")).unwrap();
	assert_eq!(deferred.pending(), 1);

	let first = deferred.complete_next();
	assert_eq!(names(first.new_history()), ["A", "B"]);
	assert_eq!(deferred.pending(), 1);

	let second = deferred.complete_next();
	assert_eq!(names(second.previous()), ["A", "B"]);
	assert_eq!(names(second.new_history()), ["A", "B", "C", "D"]);
	assert_eq!(second.direction(), Direction::Forward);
	assert_eq!(deferred.pending(), 0);
	assert_eq!(deferred.seen.lock().len(), 3);
}

#[test]
fn without_coalescing_every_request_is_dispatched() {
	init_tracing();
	let config = BackstackConfig {
		coalesce_requests: false,
		..BackstackConfig::default()
	};
	let backstack = Backstack::with_config(config);
	let deferred = Deferred::default();
	backstack.setup(History::single(plain("A"))).unwrap();
	backstack.set_state_changer(deferred.changer()).unwrap();
	deferred.complete_next();

	backstack.go_to(plain("B")).unwrap();
	backstack.go_to(plain("C")).unwrap();
	backstack.go_to(plain("D")).unwrap();

	let mut targets = Vec::new();
	while deferred.pending() > 0 {
		targets.push(names(deferred.complete_next().new_history()));
	}
	assert_eq!(targets, [vec!["A", "B"], vec!["A", "B", "C"], vec!["A", "B", "C", "D"]]);
	assert_eq!(deferred.seen.lock().len(), 4);
}

#[test]
fn impossible_requests_are_dropped_from_the_queue() {
	init_tracing();
	let backstack = Backstack::new();
	let deferred = Deferred::default();
	backstack.setup(History::of([plain("A"), plain("B")])).unwrap();
	backstack.set_state_changer(deferred.changer()).unwrap();

	assert!(backstack.go_back().unwrap());
	assert!(!backstack.go_back().unwrap());
	assert!(!backstack.jump_to_root().unwrap());
	deferred.complete_next();
	let back = deferred.complete_next();
	assert_eq!(names(back.new_history()), ["A"]);
	assert_eq!(deferred.pending(), 0);
}

#[test]
fn listener_navigation_runs_after_every_listener() {
	let backstack = started(&["A"]);
	let log = Arc::new(Mutex::new(Vec::new()));

	let first = {
		let backstack = backstack.clone();
		let log = log.clone();
		move |change: &StateChange<Screen>| {
			let top = change.top_new_key().map(|k| k.name).unwrap_or_default();
			log.lock().push(format!("first {top}"));
			if top == "B" {
				backstack.go_to(plain("C")).unwrap();
				log.lock().push("first requested C".to_owned());
			}
		}
	};
	let second = {
		let log = log.clone();
		move |change: &StateChange<Screen>| {
			let top = change.top_new_key().map(|k| k.name).unwrap_or_default();
			log.lock().push(format!("second {top}"));
		}
	};
	backstack.add_completion_listener(first);
	backstack.add_completion_listener(second);

	backstack.go_to(plain("B")).unwrap();
	assert_eq!(names(&backstack.history()), ["A", "B", "C"]);
	assert_eq!(
		*log.lock(),
		["first B", "first requested C", "second B", "first C", "second C"]
	);
}

#[test]
fn removed_listener_is_not_notified() {
	let backstack = started(&["A"]);
	let count = Arc::new(Mutex::new(0));
	let seen = count.clone();
	let id = backstack.add_completion_listener(move |_: &StateChange<Screen>| *seen.lock() += 1);

	backstack.go_to(plain("B")).unwrap();
	assert!(backstack.remove_completion_listener(id));
	assert!(!backstack.remove_completion_listener(id));
	backstack.go_to(plain("C")).unwrap();
	assert_eq!(*count.lock(), 1);
}

#[test]
fn handler_can_navigate_before_completing() {
	init_tracing();
	let backstack = Backstack::new();
	let handle = backstack.clone();
	backstack.setup(History::single(plain("A"))).unwrap();
	backstack
		.set_state_changer(move |change: StateChange<Screen>, completion: Completion<Screen>| {
			if change.top_new_key().map(|k| k.name) == Some("B") {
				handle.go_to(plain("redirect")).unwrap();
				assert_eq!(handle.dispatch_phase(), DispatchPhase::InFlight);
			}
			completion.complete().unwrap();
		})
		.unwrap();

	backstack.go_to(plain("B")).unwrap();
	assert_eq!(names(&backstack.history()), ["A", "B", "redirect"]);
	assert_eq!(backstack.dispatch_phase(), DispatchPhase::Idle);
}

#[test]
fn detaching_mid_flight_holds_the_queue_for_the_next_changer() {
	init_tracing();
	let backstack = Backstack::new();
	let deferred = Deferred::default();
	backstack.setup(History::single(plain("A"))).unwrap();
	backstack.set_state_changer(deferred.changer()).unwrap();
	deferred.complete_next();

	backstack.go_to(plain("B")).unwrap();
	backstack.remove_state_changer();
	backstack.go_to(plain("C")).unwrap();

	deferred.complete_next();
	assert_eq!(names(&backstack.history()), ["A", "B"]);
	assert_eq!(backstack.dispatch_phase(), DispatchPhase::Queued(1));
	assert_eq!(deferred.pending(), 0);

	let next = Deferred::default();
	backstack.set_state_changer(next.changer()).unwrap();
	let change = next.complete_next();
	assert!(!change.is_initialization());
	assert_eq!(names(change.new_history()), ["A", "B", "C"]);
	assert_eq!(next.seen.lock().len(), 1);
}

#[test]
fn completion_can_arrive_from_another_thread() {
	init_tracing();
	let backstack = Backstack::new();
	backstack.setup(History::single(plain("A"))).unwrap();
	let workers = Arc::new(Mutex::new(Vec::new()));
	let spawned = workers.clone();
	backstack
		.set_state_changer(move |_: StateChange<Screen>, completion: Completion<Screen>| {
			spawned
				.lock()
				.push(thread::spawn(move || completion.complete().unwrap()));
		})
		.unwrap();

	backstack.go_to(plain("B")).unwrap();
	backstack.go_to(plain("C")).unwrap();
	loop {
		let next = workers.lock().pop();
		match next {
			Some(worker) => worker.join().unwrap(),
			None if backstack.is_state_change_pending() => thread::yield_now(),
			None => break,
		}
	}
	assert_eq!(names(&backstack.history()), ["A", "B", "C"]);
}

#[test]
fn state_change_describes_the_move() {
	let backstack = started(&["A", "B"]);
	let last = Arc::new(Mutex::new(None));
	let seen = last.clone();
	backstack.add_completion_listener(move |change: &StateChange<Screen>| {
		*seen.lock() = Some(change.clone());
	});

	backstack.go_to(plain("B")).unwrap();
	let change = last.lock().take().unwrap();
	assert_eq!(change.direction(), Direction::Replace);
	assert!(change.is_top_new_key_equal_to_previous());
	assert!(!change.is_initialization());

	backstack.replace_top(plain("X"), Direction::Forward).unwrap();
	let change = last.lock().take().unwrap();
	assert_eq!(change.top_previous_key().map(|k| k.name), Some("B"));
	assert_eq!(change.top_new_key().map(|k| k.name), Some("X"));
	assert!(!change.is_top_new_key_equal_to_previous());

	backstack.move_to_top(plain("A")).unwrap();
	assert_eq!(names(&backstack.history()), ["X", "A"]);
	backstack.go_up(plain("X")).unwrap();
	assert_eq!(names(&backstack.history()), ["X"]);
	backstack.go_up(plain("Y")).unwrap();
	assert_eq!(names(&backstack.history()), ["Y"]);
	let change = last.lock().take().unwrap();
	assert_eq!(change.direction(), Direction::Backward);
}

#[test]
fn protocol_violations_are_reported() {
	init_tracing();
	let backstack = Backstack::new();
	assert_eq!(backstack.go_to(plain("A")), Err(BackstackError::NotInitialized));
	assert_eq!(backstack.set_state_changer(immediate()), Err(BackstackError::NotInitialized));
	assert_eq!(backstack.setup(History::empty()), Err(BackstackError::EmptyHistory));

	backstack.setup(History::single(plain("A"))).unwrap();
	assert!(backstack.is_initialized());
	assert_eq!(backstack.setup(History::single(plain("A"))), Ok(()));
	assert_eq!(
		backstack.setup(History::single(plain("B"))),
		Err(BackstackError::ConflictingSetup)
	);
	assert_eq!(
		backstack.set_scoped_services(recording(&Events::default())),
		Err(BackstackError::AlreadyInitialized)
	);
	assert_eq!(
		backstack.set_persistence_tag(Some("v2".into())),
		Err(BackstackError::ConflictingPersistenceTag {
			current: None,
			requested: Some("v2".into()),
		})
	);
	assert_eq!(backstack.set_persistence_tag(None), Ok(()));

	backstack.set_state_changer(immediate()).unwrap();
	assert_eq!(
		backstack.set_history(History::empty(), Direction::Replace),
		Err(BackstackError::EmptyHistory)
	);
}

#[test]
fn saved_state_round_trips_through_json() {
	let backstack: Backstack<String> = Backstack::new();
	backstack.set_persistence_tag(Some("v1".into())).unwrap();
	backstack
		.setup(History::of(["home".to_owned(), "detail".to_owned()]))
		.unwrap();
	backstack
		.set_state_changer(|_: StateChange<String>, completion: Completion<String>| {
			completion.complete().unwrap();
		})
		.unwrap();

	let json = serde_json::to_string(&backstack.saved_state().unwrap()).unwrap();
	assert_eq!(json, r#"{"persistence_tag":"v1","history":["home","detail"]}"#);

	let saved: SavedState<String> = serde_json::from_str(&json).unwrap();
	let restored: Backstack<String> = Backstack::new();
	restored.set_persistence_tag(Some("v1".into())).unwrap();
	restored.restore(saved, History::single("home".to_owned())).unwrap();
	restored
		.set_state_changer(|_: StateChange<String>, completion: Completion<String>| {
			completion.complete().unwrap();
		})
		.unwrap();
	assert_eq!(restored.history(), backstack.history());
}

#[test]
fn restore_checks_the_tag_and_falls_back_on_empty_state() {
	let backstack: Backstack<String> = Backstack::new();
	backstack.set_persistence_tag(Some("v2".into())).unwrap();
	let stale = SavedState::new(History::single("old".to_owned())).with_tag("v1");
	assert_eq!(
		backstack.restore(stale, History::single("home".to_owned())),
		Err(BackstackError::PersistenceTagMismatch {
			expected: Some("v2".into()),
			found: Some("v1".into()),
		})
	);
	assert!(!backstack.is_initialized());

	let empty = SavedState::new(History::empty()).with_tag("v2");
	backstack.restore(empty, History::single("home".to_owned())).unwrap();
	backstack
		.set_state_changer(|_: StateChange<String>, completion: Completion<String>| {
			completion.complete().unwrap();
		})
		.unwrap();
	assert_eq!(backstack.history(), History::single("home".to_owned()));
}

#[test]
fn config_from_toml_drives_the_dispatcher() {
	let config = BackstackConfig::from_toml_str(
		r#"
persistence_tag = "app"
coalesce_requests = false
"#,
	)
	.unwrap();
	let backstack: Backstack<&'static str> = Backstack::with_config(config);
	assert_eq!(backstack.config().persistence_tag.as_deref(), Some("app"));
	assert!(!backstack.config().coalesce_requests);

	backstack.setup(History::single("home")).unwrap();
	assert_eq!(backstack.saved_state().unwrap().persistence_tag.as_deref(), Some("app"));
}

#[test]
fn saved_state_needs_setup_first() {
	let backstack: Backstack<String> = Backstack::new();
	assert_eq!(backstack.saved_state(), Err(BackstackError::NotInitialized));

	backstack.setup(History::single("home".to_owned())).unwrap();
	assert_eq!(backstack.saved_state().unwrap().history, History::single("home".to_owned()));
}
