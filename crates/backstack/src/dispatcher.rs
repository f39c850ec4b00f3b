//! Single-flight dispatch state machine.
//!
//! At most one transition is in flight. Navigation requests that arrive
//! meanwhile wait in a FIFO and are applied against whatever history is
//! current when they are finally planned, so a request always sees the
//! effect of the ones before it.

use std::collections::VecDeque;
use std::fmt;

use scopestack_history::{Direction, History, Key};
use scopestack_scopes::ScopeGraph;

use crate::error::{BackstackError, Result};
use crate::state_change::StateChange;

/// Identifies one dispatched transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(u64);

impl fmt::Display for TransitionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Externally observable state of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
	/// Nothing in flight, nothing queued.
	Idle,
	/// A transition waits for its completion signal.
	InFlight,
	/// Requests wait for a state changer to be attached.
	Queued(usize),
}

/// A navigation request, applied lazily to the history current at plan time.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation<K> {
	/// Push `key`, or go back to its first occurrence if it is already in the
	/// history.
	GoTo(K),
	/// Pop the top key.
	GoBack,
	/// Swap the top key for another.
	ReplaceTop(K, Direction),
	/// Go back to `key` if present below the top, otherwise replace the top.
	GoUp(K),
	/// Move `key` to the top, removing its previous occurrence.
	MoveToTop(K),
	/// Drop everything above the root key.
	JumpToRoot(Direction),
	/// Replace the whole history.
	SetHistory(History<K>, Direction),
	/// Re-dispatch the current history as an initialization.
	Restore,
}

impl<K: Key> Navigation<K> {
	/// Applies the request to `current`.
	///
	/// Returns `None` when the request would not change anything it is
	/// allowed to change, such as popping the last key.
	pub fn apply(&self, current: &History<K>) -> Option<(History<K>, Direction)> {
		match self {
			Self::GoTo(key) => {
				if current.top() == Some(key) {
					return Some((current.clone(), Direction::Replace));
				}
				match current.index_of(key) {
					Some(index) => Some((current.to_builder().truncate_above(index).build(), Direction::Backward)),
					None => Some((current.to_builder().add(key.clone()).build(), Direction::Forward)),
				}
			}
			Self::GoBack => {
				(current.len() > 1).then(|| (current.to_builder().remove_last().build(), Direction::Backward))
			}
			Self::ReplaceTop(key, direction) => {
				let history = current.to_builder().remove_last().add(key.clone()).build();
				Some((history, *direction))
			}
			Self::GoUp(key) => {
				let below = current.len().saturating_sub(1);
				match current.as_slice()[..below].iter().rposition(|k| k == key) {
					Some(index) => Some((current.to_builder().truncate_above(index).build(), Direction::Backward)),
					None => {
						let history = current.to_builder().remove_last().add(key.clone()).build();
						Some((history, Direction::Backward))
					}
				}
			}
			Self::MoveToTop(key) => {
				if current.top() == Some(key) {
					return Some((current.clone(), Direction::Replace));
				}
				let history = current.to_builder().remove(key).add(key.clone()).build();
				Some((history, Direction::Forward))
			}
			Self::JumpToRoot(direction) => {
				let root = current.root().filter(|_| current.len() > 1)?;
				Some((History::single(root.clone()), *direction))
			}
			Self::SetHistory(history, direction) => {
				(!history.is_empty()).then(|| (history.clone(), *direction))
			}
			Self::Restore => (!current.is_empty()).then(|| (current.clone(), Direction::Replace)),
		}
	}
}

/// Target of the next transition.
#[derive(Debug, Clone)]
pub(crate) struct Plan<K> {
	pub(crate) target: History<K>,
	pub(crate) direction: Direction,
	/// The plan re-dispatches the current history to a fresh state changer.
	pub(crate) initialization: bool,
}

pub(crate) struct InFlight<K> {
	pub(crate) id: TransitionId,
	pub(crate) change: StateChange<K>,
	pub(crate) graph: ScopeGraph,
}

pub(crate) struct Dispatcher<K> {
	queue: VecDeque<Navigation<K>>,
	in_flight: Option<InFlight<K>>,
	coalesce: bool,
	next_id: u64,
}

impl<K: Key> Dispatcher<K> {
	pub(crate) fn new(coalesce: bool) -> Self {
		Self {
			queue: VecDeque::new(),
			in_flight: None,
			coalesce,
			next_id: 0,
		}
	}

	pub(crate) fn enqueue(&mut self, navigation: Navigation<K>) {
		self.queue.push_back(navigation);
	}

	pub(crate) fn is_in_flight(&self) -> bool {
		self.in_flight.is_some()
	}

	pub(crate) fn queued(&self) -> usize {
		self.queue.len()
	}

	pub(crate) fn phase(&self) -> DispatchPhase {
		match (&self.in_flight, self.queue.len()) {
			(Some(_), _) => DispatchPhase::InFlight,
			(None, 0) => DispatchPhase::Idle,
			(None, n) => DispatchPhase::Queued(n),
		}
	}

	/// History the back-stack will hold once everything in flight and queued
	/// has been committed.
	pub(crate) fn projected(&self, committed: &History<K>) -> History<K> {
		let base = match &self.in_flight {
			Some(in_flight) => in_flight.change.new_history(),
			None => committed,
		};
		self.queue
			.iter()
			.fold(base.clone(), |current, nav| nav.apply(&current).map_or(current, |(next, _)| next))
	}

	/// Takes the next transition off the queue.
	///
	/// Coalescing folds every queued request into one plan; otherwise
	/// requests are popped until one applies. Requests that do not apply are
	/// dropped either way.
	pub(crate) fn plan(&mut self, committed: &History<K>) -> Option<Plan<K>> {
		let mut current = committed.clone();
		let mut direction = None;
		let mut initialization = false;

		while let Some(navigation) = self.queue.pop_front() {
			if let Some((next, dir)) = navigation.apply(&current) {
				initialization |= matches!(navigation, Navigation::Restore);
				current = next;
				direction = Some(dir);
				if !self.coalesce {
					break;
				}
			}
		}

		direction.map(|direction| Plan {
			target: current,
			direction,
			initialization,
		})
	}

	pub(crate) fn begin(&mut self, change: StateChange<K>, graph: ScopeGraph) -> TransitionId {
		self.next_id += 1;
		let id = TransitionId(self.next_id);
		self.in_flight = Some(InFlight { id, change, graph });
		id
	}

	/// Releases the in-flight slot for `id`.
	pub(crate) fn finish(&mut self, id: TransitionId) -> Result<InFlight<K>> {
		match self.in_flight.take() {
			Some(in_flight) if in_flight.id == id => Ok(in_flight),
			other => {
				self.in_flight = other;
				Err(BackstackError::UnknownTransition(id))
			}
		}
	}

	/// Drops every queued request, returning how many there were.
	pub(crate) fn abort(&mut self) -> usize {
		let dropped = self.queue.len();
		self.queue.clear();
		dropped
	}
}
