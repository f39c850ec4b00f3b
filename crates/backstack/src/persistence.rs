//! State handed to an external serializer.
//!
//! The back-stack never writes anything to storage itself. It exports the
//! committed history together with its persistence tag, and accepts the same
//! shape back in [`Backstack::restore`](crate::Backstack::restore).

use scopestack_history::History;
use serde::{Deserialize, Serialize};

/// Serializable snapshot of a back-stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState<K> {
	/// Tag identifying which back-stack the state belongs to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub persistence_tag: Option<String>,
	/// Committed history at the time of saving.
	pub history: History<K>,
}

impl<K> SavedState<K> {
	pub fn new(history: History<K>) -> Self {
		Self {
			persistence_tag: None,
			history,
		}
	}

	pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
		self.persistence_tag = Some(tag.into());
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn untagged_state_omits_the_tag() {
		let state = SavedState::new(History::of(["a".to_string(), "b".to_string()]));
		let json = serde_json::to_string(&state).unwrap();
		assert_eq!(json, r#"{"history":["a","b"]}"#);
		assert_eq!(serde_json::from_str::<SavedState<String>>(&json).unwrap(), state);
	}

	#[test]
	fn tagged_state_round_trips() {
		let state = SavedState::new(History::single(7u32)).with_tag("main");
		let json = serde_json::to_string(&state).unwrap();
		let back: SavedState<u32> = serde_json::from_str(&json).unwrap();
		assert_eq!(back.persistence_tag.as_deref(), Some("main"));
		assert_eq!(back.history.as_slice(), &[7]);
	}
}
