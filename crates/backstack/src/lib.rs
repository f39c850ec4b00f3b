//! Navigation back-stack with scoped service lifecycles.
//!
//! A [`Backstack`] holds an immutable [`History`] of caller-defined keys and
//! moves between histories through two-phase transitions: navigation is
//! queued, the next transition is handed to a [`StateChanger`], and nothing
//! is committed until its [`Completion`] fires. Every key may require
//! scopes; their services are built before the state changer runs and are
//! activated, inactivated and destroyed when the transition commits.
//!
//! ```ignore
//! let backstack = Backstack::new();
//! backstack.set_scoped_services(|binder: &mut ServiceBinder<'_>| -> scopestack_scopes::Result<()> {
//!     binder.add("model", Arc::new(Model::for_scope(binder.scope_tag())))?;
//!     Ok(())
//! })?;
//! backstack.setup(History::single(Screen::Home))?;
//! backstack.set_state_changer(|change: StateChange<Screen>, done: Completion<Screen>| {
//!     render(change.new_history());
//!     done.complete().ok();
//! })?;
//! ```

mod backstack;
mod config;
mod dispatcher;
mod error;
mod persistence;
mod state_change;

pub use backstack::Backstack;
pub use config::BackstackConfig;
pub use dispatcher::{DispatchPhase, Navigation, TransitionId};
pub use error::{BackstackError, ConfigError, Result};
pub use persistence::SavedState;
pub use scopestack_history::{Direction, History, HistoryBuilder, Key, ParentScopes, ScopeDescriptor, ScopeTag};
pub use scopestack_scopes::{
	Activated, LifecycleBatch, LifecycleStage, Registered, ScopeError, ScopeEvent, ScopeGraph, ScopeRegistry,
	ScopedServices, Service, ServiceBinder,
};
pub use state_change::{Completion, CompletionListener, ListenerId, StateChange, StateChanger};
