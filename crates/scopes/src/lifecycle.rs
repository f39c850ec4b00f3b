//! Deferred lifecycle callbacks.
//!
//! The registry never invokes service callbacks itself. Mutating operations
//! return a [`LifecycleBatch`] that the owner dispatches once it has released
//! its own locks, so callbacks are free to query or navigate.

use std::fmt;

use scopestack_history::ScopeTag;

use crate::service::Service;

/// Which callback an event delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
	/// [`Registered::on_service_registered`](crate::Registered::on_service_registered)
	Registered,
	/// [`Activated::on_scope_active`](crate::Activated::on_scope_active)
	Active,
	/// [`Activated::on_scope_inactive`](crate::Activated::on_scope_inactive)
	Inactive,
	/// [`Registered::on_service_unregistered`](crate::Registered::on_service_unregistered)
	Unregistered,
}

/// One pending callback.
#[derive(Clone)]
pub struct ScopeEvent {
	pub stage: LifecycleStage,
	pub scope: ScopeTag,
	/// Name the service was first bound under in `scope`.
	pub name: Box<str>,
	service: Service,
}

impl ScopeEvent {
	/// Builds an event if `service` has the capability `stage` targets.
	pub(crate) fn for_service(stage: LifecycleStage, scope: &ScopeTag, name: &str, service: &Service) -> Option<Self> {
		let capable = match stage {
			LifecycleStage::Registered | LifecycleStage::Unregistered => service.as_registered().is_some(),
			LifecycleStage::Active | LifecycleStage::Inactive => service.as_activated().is_some(),
		};
		capable.then(|| Self {
			stage,
			scope: scope.clone(),
			name: name.into(),
			service: service.clone(),
		})
	}

	pub fn service(&self) -> &Service {
		&self.service
	}

	/// Invokes the callback.
	pub fn dispatch(&self) {
		match self.stage {
			LifecycleStage::Registered => {
				if let Some(s) = self.service.as_registered() {
					s.on_service_registered(&self.scope);
				}
			}
			LifecycleStage::Active => {
				if let Some(s) = self.service.as_activated() {
					s.on_scope_active(&self.scope);
				}
			}
			LifecycleStage::Inactive => {
				if let Some(s) = self.service.as_activated() {
					s.on_scope_inactive(&self.scope);
				}
			}
			LifecycleStage::Unregistered => {
				if let Some(s) = self.service.as_registered() {
					s.on_service_unregistered(&self.scope);
				}
			}
		}
	}
}

impl fmt::Debug for ScopeEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}({}/{})", self.stage, self.scope, self.name)
	}
}

/// Ordered list of pending callbacks.
#[derive(Debug, Clone, Default)]
#[must_use = "lifecycle callbacks only run when the batch is dispatched"]
pub struct LifecycleBatch {
	events: Vec<ScopeEvent>,
}

impl LifecycleBatch {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn push(&mut self, event: Option<ScopeEvent>) {
		self.events.extend(event);
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, ScopeEvent> {
		self.events.iter()
	}

	/// Runs every callback in order.
	pub fn dispatch(self) {
		for event in &self.events {
			event.dispatch();
		}
	}
}

impl<'a> IntoIterator for &'a LifecycleBatch {
	type Item = &'a ScopeEvent;
	type IntoIter = std::slice::Iter<'a, ScopeEvent>;

	fn into_iter(self) -> Self::IntoIter {
		self.events.iter()
	}
}
