//! The transition handed to the application and the hooks around it.

use std::fmt;

use scopestack_history::{Direction, History, Key};
use tracing::error;

use crate::backstack::Backstack;
use crate::dispatcher::TransitionId;
use crate::error::Result;

/// A pending move from one history to another.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange<K> {
	previous: History<K>,
	new: History<K>,
	direction: Direction,
}

impl<K> StateChange<K> {
	pub(crate) fn new(previous: History<K>, new: History<K>, direction: Direction) -> Self {
		Self {
			previous,
			new,
			direction,
		}
	}

	/// History before the change. Empty for the initial transition.
	pub fn previous(&self) -> &History<K> {
		&self.previous
	}

	/// History after the change.
	pub fn new_history(&self) -> &History<K> {
		&self.new
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	pub fn top_new_key(&self) -> Option<&K> {
		self.new.top()
	}

	pub fn top_previous_key(&self) -> Option<&K> {
		self.previous.top()
	}

	/// True for the first transition after a state changer attaches to an
	/// idle back-stack.
	pub fn is_initialization(&self) -> bool {
		self.previous.is_empty()
	}
}

impl<K: PartialEq> StateChange<K> {
	pub fn is_top_new_key_equal_to_previous(&self) -> bool {
		matches!((self.new.top(), self.previous.top()), (Some(a), Some(b)) if a == b)
	}
}

/// Performs the externally visible part of a transition.
///
/// The handler must call [`Completion::complete`] exactly once, either
/// before returning or later from any thread. Until then the back-stack
/// keeps reporting the previous history and queues further navigation.
pub trait StateChanger<K: Key>: Send + Sync {
	fn handle_state_change(&self, change: StateChange<K>, completion: Completion<K>);
}

impl<K: Key, F> StateChanger<K> for F
where
	F: Fn(StateChange<K>, Completion<K>) + Send + Sync,
{
	fn handle_state_change(&self, change: StateChange<K>, completion: Completion<K>) {
		self(change, completion)
	}
}

/// Observer notified after every committed transition.
///
/// Runs once scopes have been reconciled with the new history.
pub trait CompletionListener<K>: Send + Sync {
	fn state_change_completed(&self, change: &StateChange<K>);
}

impl<K, F> CompletionListener<K> for F
where
	F: Fn(&StateChange<K>) + Send + Sync,
{
	fn state_change_completed(&self, change: &StateChange<K>) {
		self(change)
	}
}

/// Handle returned by
/// [`Backstack::add_completion_listener`](crate::Backstack::add_completion_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// One-shot completion signal for an in-flight transition.
#[must_use = "the back-stack stalls until the transition is completed"]
pub struct Completion<K: Key> {
	backstack: Backstack<K>,
	id: TransitionId,
	done: bool,
}

impl<K: Key> Completion<K> {
	pub(crate) fn new(backstack: Backstack<K>, id: TransitionId) -> Self {
		Self {
			backstack,
			id,
			done: false,
		}
	}

	pub fn id(&self) -> TransitionId {
		self.id
	}

	/// Commits the transition.
	///
	/// The new history becomes current, scopes are reconciled, listeners are
	/// notified and the next queued navigation is dispatched.
	///
	/// # Errors
	///
	/// The commit itself always happens. An error reports a failure to
	/// dispatch the navigation queued behind it.
	pub fn complete(mut self) -> Result<()> {
		self.done = true;
		self.backstack.complete(self.id)
	}
}

impl<K: Key> Drop for Completion<K> {
	fn drop(&mut self) {
		if !self.done {
			error!(transition = %self.id, "state change completion dropped without completing, back-stack is stalled");
		}
	}
}

impl<K: Key> fmt::Debug for Completion<K> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Completion").field("id", &self.id).field("done", &self.done).finish()
	}
}
