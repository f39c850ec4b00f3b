//! Error types for the back-stack.

use scopestack_scopes::ScopeError;
use thiserror::Error;

use crate::dispatcher::TransitionId;

/// Errors returned by [`Backstack`](crate::Backstack) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackstackError {
	/// A navigation or query needs an initial history first.
	#[error("back-stack is not initialized, call setup() first")]
	NotInitialized,

	/// Configuration can no longer change once the back-stack is set up.
	#[error("back-stack is already initialized")]
	AlreadyInitialized,

	/// `setup` was called again with a different initial history.
	#[error("back-stack was already set up with a different initial history")]
	ConflictingSetup,

	/// The persistence tag changed after setup.
	#[error("persistence tag cannot change after setup (was {current:?}, got {requested:?})")]
	ConflictingPersistenceTag {
		/// Tag in effect.
		current: Option<String>,
		/// Tag that was requested.
		requested: Option<String>,
	},

	/// A history must hold at least one key.
	#[error("history must not be empty")]
	EmptyHistory,

	/// Completion was signalled for a transition that is not in flight.
	#[error("transition {0} is not in flight")]
	UnknownTransition(TransitionId),

	/// Saved state belongs to a differently tagged back-stack.
	#[error("saved state has persistence tag {found:?}, expected {expected:?}")]
	PersistenceTagMismatch {
		/// Tag configured on this back-stack.
		expected: Option<String>,
		/// Tag found in the saved state.
		found: Option<String>,
	},

	/// Scope resolution or service binding failed.
	#[error(transparent)]
	Scope(#[from] ScopeError),
}

/// Errors loading a [`BackstackConfig`](crate::BackstackConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The TOML document could not be parsed.
	#[error("invalid back-stack config: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Result type for back-stack operations.
pub type Result<T> = std::result::Result<T, BackstackError>;
