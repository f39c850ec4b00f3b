//! Scope requirements declared by navigation keys.
//!
//! A key may own a scope (its *implicit* scope, alive exactly while the key
//! is in history) and may request *explicit parent* scopes that outlive it as
//! long as any requester remains. Keys report both through a
//! [`ScopeDescriptor`] which the scope engine resolves once per transition.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

/// Name of a scope.
///
/// Cheap to clone; compares and hashes like the underlying string so maps
/// keyed by `ScopeTag` can be queried with `&str`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeTag(Arc<str>);

impl ScopeTag {
	pub fn new(tag: impl AsRef<str>) -> Self {
		Self(Arc::from(tag.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Deref for ScopeTag {
	type Target = str;

	fn deref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for ScopeTag {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for ScopeTag {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for ScopeTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for ScopeTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ScopeTag {
	fn from(tag: &str) -> Self {
		Self(Arc::from(tag))
	}
}

impl From<String> for ScopeTag {
	fn from(tag: String) -> Self {
		Self(Arc::from(tag))
	}
}

impl From<&String> for ScopeTag {
	fn from(tag: &String) -> Self {
		Self::from(tag.as_str())
	}
}

impl Serialize for ScopeTag {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for ScopeTag {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self::from)
	}
}

impl PartialEq<str> for ScopeTag {
	fn eq(&self, other: &str) -> bool {
		&*self.0 == other
	}
}

impl PartialEq<&str> for ScopeTag {
	fn eq(&self, other: &&str) -> bool {
		&*self.0 == *other
	}
}

/// Explicit parent scopes requested by a key.
///
/// Declared lists are ordered outermost ancestor first: in `["app", "flow"]`
/// the key's own scope sits directly under `flow`, which sits under `app`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentScopes {
	/// The key does not take part in explicit parent scoping.
	#[default]
	NotDeclared,
	/// The key requests these ancestors, outermost first. May be empty.
	Declared(SmallVec<[ScopeTag; 4]>),
	/// The key claims to declare parents but could not produce a list.
	///
	/// Rejected when scopes are first resolved.
	Missing,
}

impl ParentScopes {
	pub fn declared<I, T>(parents: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<ScopeTag>,
	{
		Self::Declared(parents.into_iter().map(Into::into).collect())
	}

	/// Returns the declared list, or an empty slice when nothing is declared.
	pub fn as_slice(&self) -> &[ScopeTag] {
		match self {
			Self::Declared(parents) => parents,
			Self::NotDeclared | Self::Missing => &[],
		}
	}

	pub fn is_declared(&self) -> bool {
		!matches!(self, Self::NotDeclared)
	}
}

/// Scope requirements of one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeDescriptor {
	/// The key's own scope, if it has one.
	pub tag: Option<ScopeTag>,
	/// Explicit ancestors of the key's scope.
	pub parents: ParentScopes,
}

impl ScopeDescriptor {
	/// A key without any scope.
	pub fn none() -> Self {
		Self::default()
	}

	/// A key that owns the scope `tag`.
	pub fn scoped(tag: impl Into<ScopeTag>) -> Self {
		Self {
			tag: Some(tag.into()),
			parents: ParentScopes::NotDeclared,
		}
	}

	/// Adds explicit parent scopes, outermost first.
	pub fn with_parents<I, T>(mut self, parents: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<ScopeTag>,
	{
		self.parents = ParentScopes::declared(parents);
		self
	}

	/// Marks the parent list as unavailable.
	pub fn with_missing_parents(mut self) -> Self {
		self.parents = ParentScopes::Missing;
		self
	}

	/// Returns true if the key requires any scope at all.
	pub fn is_scoped(&self) -> bool {
		self.tag.is_some() || !self.parents.as_slice().is_empty()
	}
}

/// A navigation entry.
///
/// Keys are opaque to the back-stack: equality is caller-defined, and the
/// only thing the core asks of a key is its [`ScopeDescriptor`]. Keys must
/// never change their descriptor while they are part of a history.
pub trait Key: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
	/// Scope requirements of this key. Defaults to no scope.
	fn scope(&self) -> ScopeDescriptor {
		ScopeDescriptor::none()
	}
}

impl Key for String {}

impl Key for &'static str {}
