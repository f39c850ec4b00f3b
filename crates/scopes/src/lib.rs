//! Scope resolution and scoped service lifecycle.
//!
//! * [`ScopeGraph`] resolves which scopes a history needs and in which order
//!   they register, look up and tear down.
//! * [`ScopeRegistry`] owns the live scopes and their services, producing
//!   [`LifecycleBatch`]es of callbacks for the caller to dispatch.
//! * [`ScopedServices`] is the application hook that binds services into a
//!   scope through a [`ServiceBinder`].

mod binder;
mod error;
mod graph;
mod lifecycle;
mod registry;
mod service;

pub use binder::{ScopedServices, ServiceBinder};
pub use error::{Result, ScopeError};
pub use graph::ScopeGraph;
pub use lifecycle::{LifecycleBatch, LifecycleStage, ScopeEvent};
pub use registry::ScopeRegistry;
pub use service::{Activated, Registered, Service};
