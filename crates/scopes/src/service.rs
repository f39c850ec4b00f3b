//! Type-erased scoped services and their optional lifecycle capabilities.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use scopestack_history::ScopeTag;

/// Observer for a service entering and leaving the registry.
///
/// `on_service_registered` fires once the service's scope is built, before
/// the state changer sees the transition that introduced it.
/// `on_service_unregistered` fires when the scope is destroyed.
pub trait Registered: Send + Sync {
	fn on_service_registered(&self, scope: &ScopeTag);
	fn on_service_unregistered(&self, scope: &ScopeTag);
}

/// Observer for a service's scope joining or leaving the active chain.
pub trait Activated: Send + Sync {
	fn on_scope_active(&self, scope: &ScopeTag);
	fn on_scope_inactive(&self, scope: &ScopeTag);
}

/// A service bound into a scope.
///
/// Holds the service as `Arc<dyn Any>` and, optionally, the same instance
/// viewed through its lifecycle capabilities. Cloning shares the instance.
#[derive(Clone)]
pub struct Service {
	value: Arc<dyn Any + Send + Sync>,
	type_name: &'static str,
	registered: Option<Arc<dyn Registered>>,
	activated: Option<Arc<dyn Activated>>,
}

impl Service {
	/// Wraps a service without lifecycle callbacks.
	pub fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
		Self {
			value,
			type_name: type_name::<T>(),
			registered: None,
			activated: None,
		}
	}

	/// Wraps a service that observes registration.
	pub fn registered<T: Registered + Any>(value: Arc<T>) -> Self {
		let registered: Arc<dyn Registered> = value.clone();
		Self {
			registered: Some(registered),
			..Self::new(value)
		}
	}

	/// Wraps a service that observes activation.
	pub fn activated<T: Activated + Any>(value: Arc<T>) -> Self {
		let activated: Arc<dyn Activated> = value.clone();
		Self {
			activated: Some(activated),
			..Self::new(value)
		}
	}

	/// Wraps a service that observes both registration and activation.
	pub fn observing<T: Registered + Activated + Any>(value: Arc<T>) -> Self {
		let registered: Arc<dyn Registered> = value.clone();
		let activated: Arc<dyn Activated> = value.clone();
		Self {
			registered: Some(registered),
			activated: Some(activated),
			..Self::new(value)
		}
	}

	/// Type name of the wrapped value.
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn is<T: Any>(&self) -> bool {
		self.value.is::<T>()
	}

	/// Returns the wrapped value if it is a `T`.
	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		Arc::clone(&self.value).downcast::<T>().ok()
	}

	/// Returns true if both handles point at the same instance.
	pub fn same_instance(&self, other: &Service) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
	}

	pub(crate) fn as_registered(&self) -> Option<&Arc<dyn Registered>> {
		self.registered.as_ref()
	}

	pub(crate) fn as_activated(&self) -> Option<&Arc<dyn Activated>> {
		self.activated.as_ref()
	}
}

impl<T: Any + Send + Sync> From<Arc<T>> for Service {
	fn from(value: Arc<T>) -> Self {
		Self::new(value)
	}
}

impl fmt::Debug for Service {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Service")
			.field("type", &self.type_name)
			.field("registered", &self.registered.is_some())
			.field("activated", &self.activated.is_some())
			.finish()
	}
}
