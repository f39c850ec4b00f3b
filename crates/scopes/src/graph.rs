//! Scope graph resolution.
//!
//! Turns the scope descriptors of every key in a history into a graph of
//! scope nodes. Nodes are created on first encounter and never move
//! afterwards: per key, declared parents (outermost first) come before the
//! key's own scope, and keys are visited bottom to top. The registry derives
//! registration order from this discovery order.

use std::collections::VecDeque;

use indexmap::IndexMap;
use indexmap::map::Entry;
use rustc_hash::{FxBuildHasher, FxHashSet};
use scopestack_history::{History, Key, ParentScopes, ScopeTag};
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Result, ScopeError};

type TagList = SmallVec<[ScopeTag; 4]>;

/// Resolved scope requirements of a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct KeyScopes {
	/// Declared parents, outermost first.
	parents: TagList,
	tag: Option<ScopeTag>,
}

impl KeyScopes {
	/// Local chain, outermost first, ending at the key's own scope.
	fn chain(&self) -> impl DoubleEndedIterator<Item = &ScopeTag> {
		self.parents.iter().chain(self.tag.iter())
	}

	fn mentions(&self, tag: &str) -> bool {
		self.chain().any(|t| t.as_str() == tag)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ScopeNode {
	/// Immediate parents in first-declaration order.
	parents: TagList,
}

/// Scope graph for one history snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeGraph {
	nodes: IndexMap<ScopeTag, ScopeNode, FxBuildHasher>,
	keys: Vec<KeyScopes>,
}

impl ScopeGraph {
	/// A graph with no scopes, matching an empty history.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Resolves the scope graph of `history`.
	///
	/// `services_configured` reports whether a scoped services provider is
	/// installed; keys that declare parent scopes require one.
	///
	/// # Errors
	///
	/// Returns [`ScopeError::InvalidParentScopeList`] when a key reports a
	/// missing parent list or an empty tag, and
	/// [`ScopeError::NoScopedServicesConfigured`] when parents are declared
	/// without a provider.
	pub fn resolve<K: Key>(history: &History<K>, services_configured: bool) -> Result<Self> {
		let mut graph = Self {
			nodes: IndexMap::default(),
			keys: Vec::with_capacity(history.len()),
		};

		for key in history {
			let scopes = validate(key, services_configured)?;
			let mut previous: Option<&ScopeTag> = None;
			for tag in scopes.chain() {
				let node = match graph.nodes.entry(tag.clone()) {
					Entry::Occupied(entry) => entry.into_mut(),
					Entry::Vacant(entry) => {
						trace!(scope = %tag, "scope discovered");
						entry.insert(ScopeNode::default())
					}
				};
				if let Some(parent) = previous {
					if !node.parents.contains(parent) {
						node.parents.push(parent.clone());
					}
				}
				previous = Some(tag);
			}
			graph.keys.push(scopes);
		}

		Ok(graph)
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Number of reachable scopes.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Returns true if `tag` is reachable from some key.
	pub fn contains(&self, tag: &str) -> bool {
		self.nodes.contains_key(tag)
	}

	/// Reachable scopes in discovery order.
	pub fn scopes(&self) -> impl DoubleEndedIterator<Item = &ScopeTag> + ExactSizeIterator {
		self.nodes.keys()
	}

	/// Position of `tag` in discovery order.
	pub fn discovery_index(&self, tag: &str) -> Option<usize> {
		self.nodes.get_index_of(tag)
	}

	/// Immediate parents of `tag`, in first-declaration order.
	pub fn parents_of(&self, tag: &str) -> &[ScopeTag] {
		self.nodes.get(tag).map_or(&[][..], |node| node.parents.as_slice())
	}

	/// All ancestors of `tag`, breadth first, nearest first.
	///
	/// Cycles among declared parents are tolerated.
	pub fn ancestors(&self, tag: &str) -> Vec<ScopeTag> {
		let mut out = Vec::new();
		let mut seen = FxHashSet::default();
		if let Some((own, _)) = self.nodes.get_key_value(tag) {
			seen.insert(own.clone());
		}
		self.push_ancestors(tag, &mut out, &mut seen);
		out
	}

	/// The top key's own chain, ancestors first.
	///
	/// These are the scopes that are active for the current history.
	pub fn active_chain(&self) -> Vec<ScopeTag> {
		self.keys
			.last()
			.map(|key| key.chain().cloned().collect())
			.unwrap_or_default()
	}

	/// Lookup order for the top key.
	pub fn lookup_chain(&self) -> Vec<ScopeTag> {
		match self.keys.len() {
			0 => Vec::new(),
			len => self.key_lookup_chain(len - 1),
		}
	}

	/// Lookup order starting at key `index`, walking down to the root key.
	///
	/// Each key contributes its own scope, its declared parents nearest
	/// first, then any remaining graph ancestors. Duplicates keep their first
	/// position.
	pub fn key_lookup_chain(&self, index: usize) -> Vec<ScopeTag> {
		let mut out = Vec::new();
		let mut seen = FxHashSet::default();
		let end = index.saturating_add(1).min(self.keys.len());
		for key in self.keys[..end].iter().rev() {
			self.push_key_chain(key, &mut out, &mut seen);
		}
		out
	}

	/// Lookup order starting at scope `tag`.
	///
	/// The search starts at `tag`, continues with the ancestors declared
	/// before it by the topmost key that mentions it, then the remaining
	/// graph ancestors, then every key beneath that key.
	///
	/// # Errors
	///
	/// Returns [`ScopeError::ScopeNotFound`] if `tag` is not reachable.
	pub fn scope_lookup_chain(&self, tag: &str) -> Result<Vec<ScopeTag>> {
		let Some((own, _)) = self.nodes.get_key_value(tag) else {
			return Err(ScopeError::ScopeNotFound(ScopeTag::from(tag)));
		};
		let Some(index) = self.keys.iter().rposition(|key| key.mentions(tag)) else {
			return Err(ScopeError::ScopeNotFound(own.clone()));
		};

		let mut out = vec![own.clone()];
		let mut seen = FxHashSet::default();
		seen.insert(own.clone());

		let key = &self.keys[index];
		for parent in key.chain().rev().skip_while(|t| t.as_str() != tag).skip(1) {
			if seen.insert(parent.clone()) {
				out.push(parent.clone());
			}
		}
		self.push_ancestors(tag, &mut out, &mut seen);

		for key in self.keys[..index].iter().rev() {
			self.push_key_chain(key, &mut out, &mut seen);
		}
		Ok(out)
	}

	fn push_key_chain(&self, key: &KeyScopes, out: &mut Vec<ScopeTag>, seen: &mut FxHashSet<ScopeTag>) {
		for tag in key.chain().rev() {
			if seen.insert(tag.clone()) {
				out.push(tag.clone());
			}
		}
		// Parents declared by other keys for anything on this chain.
		if let Some(nearest) = key.chain().next_back() {
			self.push_ancestors(nearest, out, seen);
		}
	}

	/// Breadth-first walk over graph parents, appending unseen tags.
	fn push_ancestors(&self, tag: &str, out: &mut Vec<ScopeTag>, seen: &mut FxHashSet<ScopeTag>) {
		let mut visited: FxHashSet<&str> = FxHashSet::default();
		visited.insert(tag);
		let mut queue: VecDeque<&ScopeTag> = self.parents_of(tag).iter().collect();
		while let Some(next) = queue.pop_front() {
			if !visited.insert(next.as_str()) {
				continue;
			}
			if seen.insert(next.clone()) {
				out.push(next.clone());
			}
			queue.extend(self.parents_of(next));
		}
	}
}

fn validate<K: Key>(key: &K, services_configured: bool) -> Result<KeyScopes> {
	let descriptor = key.scope();
	let invalid = |reason| ScopeError::InvalidParentScopeList {
		key: format!("{key:?}"),
		reason,
	};

	if descriptor.tag.as_ref().is_some_and(|t| t.is_empty()) {
		return Err(invalid("scope tag is empty"));
	}

	let declared = match descriptor.parents {
		ParentScopes::NotDeclared => TagList::new(),
		ParentScopes::Missing => return Err(invalid("parent scope list is missing")),
		ParentScopes::Declared(parents) => parents,
	};

	// Repeats keep their first position; a key naming its own scope as a
	// parent already has it.
	let mut parents = TagList::with_capacity(declared.len());
	for parent in declared {
		if parent.is_empty() {
			return Err(invalid("parent scope tag is empty"));
		}
		if descriptor.tag.as_ref() == Some(&parent) || parents.contains(&parent) {
			continue;
		}
		parents.push(parent);
	}

	if !parents.is_empty() && !services_configured {
		return Err(ScopeError::NoScopedServicesConfigured {
			key: format!("{key:?}"),
		});
	}

	Ok(KeyScopes {
		parents,
		tag: descriptor.tag,
	})
}
