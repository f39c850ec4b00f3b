#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use scopestack_backstack::{
	Activated, Completion, Key, Registered, ScopeDescriptor, ScopeError, ScopeTag, ScopedServices, Service,
	ServiceBinder, StateChange, StateChanger,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
	pub name: &'static str,
	scope: ScopeDescriptor,
}

impl Key for Screen {
	fn scope(&self) -> ScopeDescriptor {
		self.scope.clone()
	}
}

/// A key without scopes.
pub fn plain(name: &'static str) -> Screen {
	Screen {
		name,
		scope: ScopeDescriptor::none(),
	}
}

/// A key owning the scope named after it.
pub fn scoped(name: &'static str) -> Screen {
	Screen {
		name,
		scope: ScopeDescriptor::scoped(name),
	}
}

/// A key owning its scope below `parents`, outermost first.
pub fn child(name: &'static str, parents: &[&'static str]) -> Screen {
	Screen {
		name,
		scope: ScopeDescriptor::scoped(name).with_parents(parents.iter().copied()),
	}
}

/// A key that only requests `parents`.
pub fn parents_only(name: &'static str, parents: &[&'static str]) -> Screen {
	Screen {
		name,
		scope: ScopeDescriptor::none().with_parents(parents.iter().copied()),
	}
}

pub fn with_scope(name: &'static str, scope: ScopeDescriptor) -> Screen {
	Screen { name, scope }
}

pub fn names(history: &scopestack_backstack::History<Screen>) -> Vec<&'static str> {
	history.iter().map(|k| k.name).collect()
}

/// Shared, ordered log of lifecycle callbacks.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
	pub fn push(&self, entry: String) {
		self.0.lock().push(entry);
	}

	pub fn all(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	pub fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.0.lock())
	}

	/// Scopes of every event starting with `stage`, in order.
	pub fn stage(&self, stage: &str) -> Vec<String> {
		self.0
			.lock()
			.iter()
			.filter_map(|e| e.strip_prefix(stage).map(|s| s.trim().to_owned()))
			.collect()
	}
}

/// Service that logs its lifecycle as `"<stage> <scope>"`.
pub struct Recorder {
	pub scope: String,
	events: Events,
}

impl Recorder {
	pub fn new(scope: &str, events: &Events) -> Arc<Self> {
		Arc::new(Self {
			scope: scope.to_owned(),
			events: events.clone(),
		})
	}
}

impl Registered for Recorder {
	fn on_service_registered(&self, _: &ScopeTag) {
		self.events.push(format!("registered {}", self.scope));
	}

	fn on_service_unregistered(&self, _: &ScopeTag) {
		self.events.push(format!("unregistered {}", self.scope));
	}
}

impl Activated for Recorder {
	fn on_scope_active(&self, _: &ScopeTag) {
		self.events.push(format!("active {}", self.scope));
	}

	fn on_scope_inactive(&self, _: &ScopeTag) {
		self.events.push(format!("inactive {}", self.scope));
	}
}

/// Binds a [`Recorder`] as `"service"` in every scope.
pub fn recording(events: &Events) -> impl ScopedServices + use<> {
	let events = events.clone();
	move |binder: &mut ServiceBinder<'_>| -> Result<(), ScopeError> {
		let recorder = Recorder::new(binder.scope_tag(), &events);
		binder.add("service", Service::observing(recorder))?;
		Ok(())
	}
}

/// State changer that completes every transition before returning.
pub fn immediate() -> impl StateChanger<Screen> {
	|_: StateChange<Screen>, completion: Completion<Screen>| {
		completion.complete().expect("queued navigation failed");
	}
}

/// State changer that parks every completion until the test releases it.
#[derive(Clone, Default)]
pub struct Deferred {
	pending: Arc<Mutex<Vec<(StateChange<Screen>, Completion<Screen>)>>>,
	pub seen: Arc<Mutex<Vec<StateChange<Screen>>>>,
}

impl Deferred {
	pub fn changer(&self) -> impl StateChanger<Screen> + use<> {
		let this = self.clone();
		move |change: StateChange<Screen>, completion: Completion<Screen>| {
			this.seen.lock().push(change.clone());
			this.pending.lock().push((change, completion));
		}
	}

	pub fn pending(&self) -> usize {
		self.pending.lock().len()
	}

	/// Completes the oldest parked transition.
	pub fn complete_next(&self) -> StateChange<Screen> {
		let (change, completion) = self.pending.lock().remove(0);
		completion.complete().expect("queued navigation failed");
		change
	}
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_max_level(tracing::Level::TRACE)
		.with_test_writer()
		.try_init();
}
