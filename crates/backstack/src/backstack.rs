//! The back-stack handle.
//!
//! All state lives behind one mutex. The lock is released before any
//! application code runs (state changer, lifecycle callbacks, completion
//! listeners) except for the scoped services provider, which binds services
//! while scopes are being built and must not call back into the back-stack.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use scopestack_history::{Direction, History, Key, ScopeTag};
use scopestack_scopes::{LifecycleBatch, ScopeGraph, ScopeRegistry, ScopedServices};
use tracing::{debug, trace, warn};

use crate::config::BackstackConfig;
use crate::dispatcher::{DispatchPhase, Dispatcher, InFlight, Navigation, Plan, TransitionId};
use crate::error::{BackstackError, Result};
use crate::persistence::SavedState;
use crate::state_change::{Completion, CompletionListener, ListenerId, StateChange, StateChanger};

/// Navigation history plus the scopes its keys require.
///
/// Cloning yields another handle to the same back-stack.
pub struct Backstack<K: Key> {
	inner: Arc<Mutex<Core<K>>>,
}

struct Core<K: Key> {
	config: BackstackConfig,
	/// History passed to `setup`, once initialized.
	initial: Option<History<K>>,
	/// Last committed history.
	history: History<K>,
	dispatcher: Dispatcher<K>,
	registry: ScopeRegistry,
	services: Option<Arc<dyn ScopedServices>>,
	changer: Option<Arc<dyn StateChanger<K>>>,
	listeners: Vec<(ListenerId, Arc<dyn CompletionListener<K>>)>,
	next_listener: u64,
	/// Someone up the stack is already dispatching; re-entrant calls only
	/// enqueue.
	draining: bool,
}

impl<K: Key> Core<K> {
	fn ensure_initialized(&self) -> Result<()> {
		match self.initial {
			Some(_) => Ok(()),
			None => Err(BackstackError::NotInitialized),
		}
	}

	fn ensure_configurable(&self) -> Result<()> {
		match self.initial {
			Some(_) => Err(BackstackError::AlreadyInitialized),
			None => Ok(()),
		}
	}

	fn next_plan(&mut self) -> Option<Plan<K>> {
		if self.dispatcher.is_in_flight() || self.changer.is_none() {
			return None;
		}
		self.dispatcher.plan(&self.history)
	}

	/// Resolves and builds the scopes of `plan`, then marks it in flight.
	fn begin(&mut self, plan: Plan<K>) -> Result<(StateChange<K>, LifecycleBatch, TransitionId)> {
		let graph = ScopeGraph::resolve(&plan.target, self.services.is_some())?;
		let batch = self.registry.build_scopes(&graph, self.services.as_deref())?;
		let previous = if plan.initialization {
			History::empty()
		} else {
			self.history.clone()
		};
		let change = StateChange::new(previous, plan.target, plan.direction);
		let id = self.dispatcher.begin(change.clone(), graph);
		Ok((change, batch, id))
	}
}

/// Marks the back-stack as draining until released or dropped.
struct DrainGuard<K: Key> {
	inner: Arc<Mutex<Core<K>>>,
	armed: bool,
}

impl<K: Key> DrainGuard<K> {
	/// Clears the flag under a lock the caller already holds.
	fn release(mut self, core: &mut Core<K>) {
		core.draining = false;
		self.armed = false;
	}
}

impl<K: Key> Drop for DrainGuard<K> {
	fn drop(&mut self) {
		if self.armed {
			self.inner.lock().draining = false;
		}
	}
}

impl<K: Key> Backstack<K> {
	pub fn new() -> Self {
		Self::with_config(BackstackConfig::default())
	}

	pub fn with_config(config: BackstackConfig) -> Self {
		let coalesce = config.coalesce_requests;
		Self {
			inner: Arc::new(Mutex::new(Core {
				config,
				initial: None,
				history: History::empty(),
				dispatcher: Dispatcher::new(coalesce),
				registry: ScopeRegistry::new(),
				services: None,
				changer: None,
				listeners: Vec::new(),
				next_listener: 0,
				draining: false,
			})),
		}
	}

	/// Installs the provider that binds services into new scopes.
	///
	/// # Errors
	///
	/// [`BackstackError::AlreadyInitialized`] after [`setup`](Self::setup).
	pub fn set_scoped_services(&self, services: impl ScopedServices + 'static) -> Result<()> {
		let mut core = self.inner.lock();
		core.ensure_configurable()?;
		core.services = Some(Arc::new(services));
		Ok(())
	}

	/// Sets the tag stamped on saved state.
	///
	/// Setting the same tag again after setup is allowed.
	pub fn set_persistence_tag(&self, tag: Option<String>) -> Result<()> {
		let mut core = self.inner.lock();
		if core.initial.is_some() && core.config.persistence_tag != tag {
			return Err(BackstackError::ConflictingPersistenceTag {
				current: core.config.persistence_tag.clone(),
				requested: tag,
			});
		}
		core.config.persistence_tag = tag;
		Ok(())
	}

	pub fn config(&self) -> BackstackConfig {
		self.inner.lock().config.clone()
	}

	/// Initializes the back-stack with its first history.
	///
	/// The history is committed by the first transition, once a state
	/// changer is attached. Calling `setup` again with an equal history is a
	/// no-op.
	///
	/// # Errors
	///
	/// [`BackstackError::EmptyHistory`] for an empty history and
	/// [`BackstackError::ConflictingSetup`] when already set up with a
	/// different one.
	pub fn setup(&self, initial: History<K>) -> Result<()> {
		if initial.is_empty() {
			return Err(BackstackError::EmptyHistory);
		}
		{
			let mut core = self.inner.lock();
			if let Some(existing) = &core.initial {
				return if *existing == initial {
					Ok(())
				} else {
					Err(BackstackError::ConflictingSetup)
				};
			}
			debug!(keys = initial.len(), "back-stack set up");
			core.initial = Some(initial.clone());
			core.dispatcher.enqueue(Navigation::SetHistory(initial, Direction::Replace));
		}
		self.pump()
	}

	/// Initializes from saved state, using `fallback` if it holds no keys.
	///
	/// # Errors
	///
	/// [`BackstackError::PersistenceTagMismatch`] if the saved tag differs
	/// from the configured one, plus everything [`setup`](Self::setup)
	/// returns.
	pub fn restore(&self, saved: SavedState<K>, fallback: History<K>) -> Result<()> {
		let expected = self.inner.lock().config.persistence_tag.clone();
		if saved.persistence_tag != expected {
			return Err(BackstackError::PersistenceTagMismatch {
				expected,
				found: saved.persistence_tag,
			});
		}
		let history = if saved.history.is_empty() {
			fallback
		} else {
			saved.history
		};
		self.setup(history)
	}

	/// Snapshot of the committed history for an external serializer.
	///
	/// Until the first transition commits, the snapshot holds the history
	/// given to [`setup`](Self::setup).
	///
	/// # Errors
	///
	/// Returns [`BackstackError::NotInitialized`] before [`Backstack::setup`].
	pub fn saved_state(&self) -> Result<SavedState<K>> {
		let core = self.inner.lock();
		core.ensure_initialized()?;
		let history = match &core.initial {
			Some(initial) if core.history.is_empty() => initial.clone(),
			_ => core.history.clone(),
		};
		Ok(SavedState {
			persistence_tag: core.config.persistence_tag.clone(),
			history,
		})
	}

	pub fn is_initialized(&self) -> bool {
		self.inner.lock().initial.is_some()
	}

	/// Attaches the state changer, replacing any previous one.
	///
	/// If nothing is in flight or queued, the current history is dispatched
	/// again as an initialization so the new changer can render it. Scopes
	/// that are already alive are not rebuilt.
	pub fn set_state_changer(&self, changer: impl StateChanger<K> + 'static) -> Result<()> {
		{
			let mut core = self.inner.lock();
			core.ensure_initialized()?;
			core.changer = Some(Arc::new(changer));
			if !core.dispatcher.is_in_flight() && core.dispatcher.queued() == 0 {
				core.dispatcher.enqueue(Navigation::Restore);
			}
		}
		self.pump()
	}

	/// Detaches the state changer.
	///
	/// A transition already in flight still completes; queued navigation
	/// waits for the next changer.
	pub fn remove_state_changer(&self) {
		self.inner.lock().changer = None;
	}

	pub fn has_state_changer(&self) -> bool {
		self.inner.lock().changer.is_some()
	}

	pub fn add_completion_listener(&self, listener: impl CompletionListener<K> + 'static) -> ListenerId {
		let mut core = self.inner.lock();
		core.next_listener += 1;
		let id = ListenerId(core.next_listener);
		core.listeners.push((id, Arc::new(listener)));
		id
	}

	/// Returns false if `id` was not registered.
	pub fn remove_completion_listener(&self, id: ListenerId) -> bool {
		let mut core = self.inner.lock();
		let before = core.listeners.len();
		core.listeners.retain(|(existing, _)| *existing != id);
		core.listeners.len() != before
	}

	/// Navigates to `key`.
	///
	/// Pushes it, or goes back to it if it is already in the history.
	pub fn go_to(&self, key: K) -> Result<()> {
		self.navigate(Navigation::GoTo(key))
	}

	/// Pops the top key.
	///
	/// Returns `Ok(false)` without doing anything if the history, including
	/// queued navigation, holds a single key.
	pub fn go_back(&self) -> Result<bool> {
		self.navigate_if_legal(Navigation::GoBack)
	}

	pub fn replace_top(&self, key: K, direction: Direction) -> Result<()> {
		self.navigate(Navigation::ReplaceTop(key, direction))
	}

	/// Goes back to `key` if it is below the top, otherwise replaces the top
	/// with it.
	pub fn go_up(&self, key: K) -> Result<()> {
		self.navigate(Navigation::GoUp(key))
	}

	pub fn move_to_top(&self, key: K) -> Result<()> {
		self.navigate(Navigation::MoveToTop(key))
	}

	/// Drops every key above the root, moving backward.
	pub fn jump_to_root(&self) -> Result<bool> {
		self.jump_to_root_with(Direction::Backward)
	}

	pub fn jump_to_root_with(&self, direction: Direction) -> Result<bool> {
		self.navigate_if_legal(Navigation::JumpToRoot(direction))
	}

	/// Replaces the whole history.
	pub fn set_history(&self, history: History<K>, direction: Direction) -> Result<()> {
		if history.is_empty() {
			return Err(BackstackError::EmptyHistory);
		}
		self.navigate(Navigation::SetHistory(history, direction))
	}

	/// Committed history. Empty until the first transition completes.
	pub fn history(&self) -> History<K> {
		self.inner.lock().history.clone()
	}

	pub fn top(&self) -> Option<K> {
		self.inner.lock().history.top().cloned()
	}

	pub fn root(&self) -> Option<K> {
		self.inner.lock().history.root().cloned()
	}

	/// Whether [`go_back`](Self::go_back) would do anything right now.
	pub fn can_go_back(&self) -> bool {
		let core = self.inner.lock();
		core.dispatcher.projected(&core.history).len() > 1
	}

	/// True while a transition is in flight or navigation is queued.
	pub fn is_state_change_pending(&self) -> bool {
		self.inner.lock().dispatcher.phase() != DispatchPhase::Idle
	}

	pub fn dispatch_phase(&self) -> DispatchPhase {
		self.inner.lock().dispatcher.phase()
	}

	pub fn has_scope(&self, tag: &str) -> bool {
		self.inner.lock().registry.has_scope(tag)
	}

	pub fn has_service(&self, tag: &str, name: &str) -> bool {
		self.inner.lock().registry.has_service(tag, name)
	}

	/// Gets the service bound under `name` directly in scope `tag`.
	pub fn service<T: Any + Send + Sync>(&self, tag: &str, name: &str) -> scopestack_scopes::Result<Arc<T>> {
		self.inner.lock().registry.service(tag, name)
	}

	/// Looks `name` up from the top key down.
	pub fn lookup_service<T: Any + Send + Sync>(&self, name: &str) -> scopestack_scopes::Result<Arc<T>> {
		self.inner.lock().registry.lookup_service(name)
	}

	pub fn can_find_service(&self, name: &str) -> bool {
		self.inner.lock().registry.can_find_service(name)
	}

	/// Looks `name` up starting at scope `tag`.
	pub fn lookup_from_scope<T: Any + Send + Sync>(&self, tag: &str, name: &str) -> scopestack_scopes::Result<Arc<T>> {
		self.inner.lock().registry.lookup_from_scope(tag, name)
	}

	pub fn can_find_from_scope(&self, tag: &str, name: &str) -> bool {
		self.inner.lock().registry.can_find_from_scope(tag, name)
	}

	/// Scopes active for the committed top key, ancestors first.
	pub fn active_scopes(&self) -> Vec<ScopeTag> {
		self.inner.lock().registry.active_scopes().to_vec()
	}

	/// Destroys every scope, firing inactivation then unregistration
	/// callbacks in reverse order.
	pub fn finalize_scopes(&self) {
		let batch = self.inner.lock().registry.finalize();
		debug!(events = batch.len(), "scopes finalized");
		batch.dispatch();
	}

	fn navigate(&self, navigation: Navigation<K>) -> Result<()> {
		{
			let mut core = self.inner.lock();
			core.ensure_initialized()?;
			trace!(?navigation, "navigation queued");
			core.dispatcher.enqueue(navigation);
		}
		self.pump()
	}

	fn navigate_if_legal(&self, navigation: Navigation<K>) -> Result<bool> {
		{
			let mut core = self.inner.lock();
			core.ensure_initialized()?;
			let projected = core.dispatcher.projected(&core.history);
			if navigation.apply(&projected).is_none() {
				warn!(?navigation, keys = projected.len(), "navigation ignored, history has a single key");
				return Ok(false);
			}
			trace!(?navigation, "navigation queued");
			core.dispatcher.enqueue(navigation);
		}
		self.pump().map(|()| true)
	}

	fn enter_drain(&self) -> Option<DrainGuard<K>> {
		let mut core = self.inner.lock();
		if core.draining {
			return None;
		}
		core.draining = true;
		Some(DrainGuard {
			inner: Arc::clone(&self.inner),
			armed: true,
		})
	}

	/// Dispatches queued navigation unless a caller up the stack already is.
	fn pump(&self) -> Result<()> {
		match self.enter_drain() {
			Some(guard) => self.drain(guard),
			None => Ok(()),
		}
	}

	fn drain(&self, guard: DrainGuard<K>) -> Result<()> {
		loop {
			let mut core = self.inner.lock();
			let Some(plan) = core.next_plan() else {
				guard.release(&mut core);
				return Ok(());
			};
			let Some(changer) = core.changer.clone() else {
				guard.release(&mut core);
				return Ok(());
			};

			let (change, batch, id) = match core.begin(plan) {
				Ok(begun) => begun,
				Err(err) => {
					let dropped = core.dispatcher.abort();
					warn!(error = %err, dropped, "transition aborted, queued navigation discarded");
					guard.release(&mut core);
					return Err(err);
				}
			};
			drop(core);

			debug!(
				transition = %id,
				direction = %change.direction(),
				keys = change.new_history().len(),
				"state change dispatched"
			);
			batch.dispatch();
			changer.handle_state_change(change, Completion::new(self.clone(), id));
		}
	}

	/// Commits the in-flight transition `id`.
	pub(crate) fn complete(&self, id: TransitionId) -> Result<()> {
		let drain = self.enter_drain();
		let mut core = self.inner.lock();
		let InFlight { change, graph, .. } = match core.dispatcher.finish(id) {
			Ok(in_flight) => in_flight,
			Err(err) => {
				if let Some(guard) = drain {
					guard.release(&mut core);
				}
				return Err(err);
			}
		};

		core.history = change.new_history().clone();
		let batch = core.registry.reconcile(graph);
		let listeners: Vec<_> = core.listeners.iter().map(|(_, listener)| Arc::clone(listener)).collect();
		debug!(
			transition = %id,
			keys = core.history.len(),
			queued = core.dispatcher.queued(),
			"state change committed"
		);
		drop(core);

		batch.dispatch();
		for listener in &listeners {
			listener.state_change_completed(&change);
		}

		match drain {
			Some(guard) => self.drain(guard),
			// Whoever holds the drain flag may already have stopped looking.
			None => self.pump(),
		}
	}
}

impl<K: Key> Clone for Backstack<K> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<K: Key> Default for Backstack<K> {
	fn default() -> Self {
		Self::new()
	}
}
