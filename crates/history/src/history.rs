//! Immutable history snapshots.
//!
//! A [`History`] is exchanged atomically between transitions: the back-stack
//! never edits a snapshot in place, it builds a new one with
//! [`HistoryBuilder`] and swaps it in on commit.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Ordered sequence of keys, oldest first, newest (top) last.
///
/// Cloning is cheap: snapshots share their backing storage.
pub struct History<K> {
	keys: Arc<[K]>,
}

impl<K> History<K> {
	/// Returns an empty history.
	pub fn empty() -> Self {
		Self {
			keys: Arc::from(Vec::new()),
		}
	}

	/// Creates a history holding exactly one key.
	pub fn single(key: K) -> Self {
		Self {
			keys: Arc::from(vec![key]),
		}
	}

	/// Creates a history from keys in navigation order.
	pub fn of<I>(keys: I) -> Self
	where
		I: IntoIterator<Item = K>,
	{
		keys.into_iter().collect()
	}

	/// Returns an empty builder.
	pub fn builder() -> HistoryBuilder<K> {
		HistoryBuilder { keys: Vec::new() }
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	/// The current key.
	pub fn top(&self) -> Option<&K> {
		self.keys.last()
	}

	/// The first key.
	pub fn root(&self) -> Option<&K> {
		self.keys.first()
	}

	/// Returns the key `offset` positions below the top (`0` is the top).
	pub fn from_top(&self, offset: usize) -> Option<&K> {
		let len = self.keys.len();
		if offset >= len {
			return None;
		}
		self.keys.get(len - 1 - offset)
	}

	pub fn get(&self, index: usize) -> Option<&K> {
		self.keys.get(index)
	}

	pub fn iter(&self) -> std::slice::Iter<'_, K> {
		self.keys.iter()
	}

	pub fn as_slice(&self) -> &[K] {
		&self.keys
	}
}

impl<K: Clone> History<K> {
	/// Returns a builder seeded with the keys of `history`.
	pub fn builder_from(history: &History<K>) -> HistoryBuilder<K> {
		HistoryBuilder {
			keys: history.keys.to_vec(),
		}
	}

	/// Returns a builder seeded with this snapshot.
	pub fn to_builder(&self) -> HistoryBuilder<K> {
		Self::builder_from(self)
	}

	pub fn to_vec(&self) -> Vec<K> {
		self.keys.to_vec()
	}
}

impl<K: PartialEq> History<K> {
	pub fn contains(&self, key: &K) -> bool {
		self.keys.contains(key)
	}

	/// Position of the first occurrence of `key`.
	pub fn index_of(&self, key: &K) -> Option<usize> {
		self.keys.iter().position(|k| k == key)
	}

	/// Position of the topmost occurrence of `key`.
	pub fn last_index_of(&self, key: &K) -> Option<usize> {
		self.keys.iter().rposition(|k| k == key)
	}
}

impl<K> Clone for History<K> {
	fn clone(&self) -> Self {
		Self {
			keys: Arc::clone(&self.keys),
		}
	}
}

impl<K> Default for History<K> {
	fn default() -> Self {
		Self::empty()
	}
}

impl<K: PartialEq> PartialEq for History<K> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.keys, &other.keys) || self.keys == other.keys
	}
}

impl<K: Eq> Eq for History<K> {}

impl<K: fmt::Debug> fmt::Debug for History<K> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.keys.iter()).finish()
	}
}

impl<K> Index<usize> for History<K> {
	type Output = K;

	fn index(&self, index: usize) -> &K {
		&self.keys[index]
	}
}

impl<K> FromIterator<K> for History<K> {
	fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
		Self {
			keys: iter.into_iter().collect(),
		}
	}
}

impl<K> From<Vec<K>> for History<K> {
	fn from(keys: Vec<K>) -> Self {
		Self { keys: Arc::from(keys) }
	}
}

impl<'a, K> IntoIterator for &'a History<K> {
	type Item = &'a K;
	type IntoIter = std::slice::Iter<'a, K>;

	fn into_iter(self) -> Self::IntoIter {
		self.keys.iter()
	}
}

impl<K: Serialize> Serialize for History<K> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_seq(self.keys.iter())
	}
}

impl<'de, K: Deserialize<'de>> Deserialize<'de> for History<K> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		Vec::<K>::deserialize(deserializer).map(Self::from)
	}
}

/// Mutable staging area for a new [`History`].
#[derive(Debug, Clone)]
pub struct HistoryBuilder<K> {
	keys: Vec<K>,
}

impl<K> HistoryBuilder<K> {
	/// Appends `key` on top.
	pub fn add(mut self, key: K) -> Self {
		self.keys.push(key);
		self
	}

	/// Appends `key` only when `condition` holds.
	pub fn add_if(self, condition: bool, key: K) -> Self {
		if condition { self.add(key) } else { self }
	}

	pub fn add_all<I>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = K>,
	{
		self.keys.extend(keys);
		self
	}

	/// Removes the top key, if any.
	pub fn remove_last(mut self) -> Self {
		self.keys.pop();
		self
	}

	/// Drops every key above `index`, keeping `index` as the new top.
	pub fn truncate_above(mut self, index: usize) -> Self {
		self.keys.truncate(index.saturating_add(1));
		self
	}

	pub fn clear(mut self) -> Self {
		self.keys.clear();
		self
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	pub fn top(&self) -> Option<&K> {
		self.keys.last()
	}

	pub fn build(self) -> History<K> {
		History::from(self.keys)
	}
}

impl<K: PartialEq> HistoryBuilder<K> {
	/// Removes the topmost occurrence of `key`.
	pub fn remove(mut self, key: &K) -> Self {
		if let Some(index) = self.keys.iter().rposition(|k| k == key) {
			self.keys.remove(index);
		}
		self
	}

	pub fn contains(&self, key: &K) -> bool {
		self.keys.contains(key)
	}
}
