//! Error types for scope resolution and service lookup.

use scopestack_history::ScopeTag;
use thiserror::Error;

/// Errors raised while resolving scopes or looking up services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
	/// A key declared a parent list that cannot be used.
	#[error("invalid parent scope list for key {key}: {reason}")]
	InvalidParentScopeList {
		/// Debug rendering of the offending key.
		key: String,
		/// What was wrong with the list.
		reason: &'static str,
	},

	/// A key declared parent scopes but no service provider is installed.
	#[error("key {key} declares parent scopes but no scoped services provider is configured")]
	NoScopedServicesConfigured {
		/// Debug rendering of the offending key.
		key: String,
	},

	/// A service name was bound twice while building one scope.
	#[error("service '{name}' is already bound in scope '{scope}'")]
	DuplicateService {
		/// The scope being built.
		scope: ScopeTag,
		/// The repeated service name.
		name: String,
	},

	/// No reachable scope holds a service under this name.
	#[error("service '{name}' not found{}", scope.as_ref().map(|s| format!(" from scope '{s}'")).unwrap_or_default())]
	ServiceNotFound {
		/// The scope the search started from, if any.
		scope: Option<ScopeTag>,
		/// The requested service name.
		name: String,
	},

	/// The scope is not part of the current graph.
	#[error("scope '{0}' does not exist")]
	ScopeNotFound(ScopeTag),

	/// A service exists under the name but has a different type.
	#[error("service '{name}' in scope '{scope}' is not a {expected}")]
	ServiceTypeMismatch {
		/// The scope holding the service.
		scope: ScopeTag,
		/// The requested service name.
		name: String,
		/// Type name that was asked for.
		expected: &'static str,
	},
}

/// Result type for scope operations.
pub type Result<T> = std::result::Result<T, ScopeError>;
