//! Binding services into a freshly created scope.

use std::any::{Any, type_name};
use std::sync::Arc;

use scopestack_history::ScopeTag;

use crate::error::{Result, ScopeError};
use crate::graph::ScopeGraph;
use crate::registry::{ScopeMap, ServiceMap};
use crate::service::Service;

/// Provider of scoped services.
///
/// Called exactly once per scope when the scope first becomes reachable.
/// The binder is only valid for the duration of the call. Implementations
/// must not call back into the back-stack that owns the registry.
pub trait ScopedServices: Send + Sync {
	fn bind_services(&self, binder: &mut ServiceBinder<'_>) -> Result<()>;
}

impl<F> ScopedServices for F
where
	F: Fn(&mut ServiceBinder<'_>) -> Result<()> + Send + Sync,
{
	fn bind_services(&self, binder: &mut ServiceBinder<'_>) -> Result<()> {
		self(binder)
	}
}

/// Write access to the scope being built, plus read access to its live
/// ancestors.
pub struct ServiceBinder<'a> {
	scope: &'a ScopeTag,
	services: &'a mut ServiceMap,
	alive: &'a ScopeMap,
	graph: &'a ScopeGraph,
}

impl<'a> ServiceBinder<'a> {
	pub(crate) fn new(
		scope: &'a ScopeTag,
		services: &'a mut ServiceMap,
		alive: &'a ScopeMap,
		graph: &'a ScopeGraph,
	) -> Self {
		Self {
			scope,
			services,
			alive,
			graph,
		}
	}

	/// Tag of the scope being built.
	pub fn scope_tag(&self) -> &ScopeTag {
		self.scope
	}

	/// Binds `service` under `name` in the current scope.
	///
	/// # Errors
	///
	/// Returns [`ScopeError::DuplicateService`] if `name` is already bound.
	pub fn add(&mut self, name: impl Into<String>, service: impl Into<Service>) -> Result<&mut Self> {
		let name = name.into();
		if self.services.contains_key(name.as_str()) {
			return Err(ScopeError::DuplicateService {
				scope: self.scope.clone(),
				name,
			});
		}
		self.services.insert(name.into_boxed_str(), service.into());
		Ok(self)
	}

	/// Binds the service already registered as `existing` under `alias` too.
	///
	/// Lifecycle callbacks still fire once for the shared instance.
	pub fn rebind(&mut self, alias: impl Into<String>, existing: &str) -> Result<&mut Self> {
		let service = self
			.services
			.get(existing)
			.cloned()
			.ok_or_else(|| ScopeError::ServiceNotFound {
				scope: Some(self.scope.clone()),
				name: existing.to_owned(),
			})?;
		self.add(alias, service)
	}

	/// Returns true if `name` is bound in the current scope.
	pub fn has(&self, name: &str) -> bool {
		self.services.contains_key(name)
	}

	/// Gets a service bound in the current scope.
	pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
		let service = self.services.get(name).ok_or_else(|| ScopeError::ServiceNotFound {
			scope: Some(self.scope.clone()),
			name: name.to_owned(),
		})?;
		downcast(service, self.scope, name)
	}

	/// Returns true if `name` resolves from the current scope or a live
	/// ancestor.
	pub fn can_find(&self, name: &str) -> bool {
		self.find(name).is_some()
	}

	/// Looks `name` up in the current scope, then in live scopes along the
	/// lookup chain of the current scope.
	pub fn lookup<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
		let (scope, service) = self.find(name).ok_or_else(|| ScopeError::ServiceNotFound {
			scope: Some(self.scope.clone()),
			name: name.to_owned(),
		})?;
		downcast(service, scope, name)
	}

	fn find(&self, name: &str) -> Option<(&ScopeTag, &Service)> {
		if let Some(service) = self.services.get(name) {
			return Some((self.scope, service));
		}
		let chain = self.graph.scope_lookup_chain(self.scope).ok()?;
		chain.iter().skip(1).find_map(|tag| {
			let (tag, entry) = self.alive.get_key_value(tag.as_str())?;
			entry.services.get(name).map(|service| (tag, service))
		})
	}
}

pub(crate) fn downcast<T: Any + Send + Sync>(service: &Service, scope: &ScopeTag, name: &str) -> Result<Arc<T>> {
	service.downcast::<T>().ok_or_else(|| ScopeError::ServiceTypeMismatch {
		scope: scope.clone(),
		name: name.to_owned(),
		expected: type_name::<T>(),
	})
}
