//! Live scopes and the services bound into them.
//!
//! The registry keeps scopes in registration order. Scopes are created from
//! a resolved [`ScopeGraph`] before a transition is handed to the state
//! changer, and reconciled against that graph once the transition commits.
//! Every mutation yields a [`LifecycleBatch`] instead of invoking callbacks.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use scopestack_history::ScopeTag;
use smallvec::SmallVec;
use tracing::trace;

use crate::binder::{ScopedServices, ServiceBinder, downcast};
use crate::error::{Result, ScopeError};
use crate::graph::ScopeGraph;
use crate::lifecycle::{LifecycleBatch, LifecycleStage, ScopeEvent};
use crate::service::Service;

pub(crate) type ServiceMap = IndexMap<Box<str>, Service, FxBuildHasher>;
pub(crate) type ScopeMap = IndexMap<ScopeTag, ScopeEntry, FxBuildHasher>;

#[derive(Debug, Default)]
pub(crate) struct ScopeEntry {
	pub(crate) services: ServiceMap,
	/// Every parent the scope was given by a graph built while it was alive.
	parents: SmallVec<[ScopeTag; 4]>,
}

impl ScopeEntry {
	/// Services in bind order, skipping aliases of an instance already seen.
	fn distinct(&self) -> Vec<(&str, &Service)> {
		let mut out: Vec<(&str, &Service)> = Vec::with_capacity(self.services.len());
		for (name, service) in &self.services {
			if !out.iter().any(|(_, seen)| seen.same_instance(service)) {
				out.push((&**name, service));
			}
		}
		out
	}

	fn events(&self, stage: LifecycleStage, scope: &ScopeTag, reverse: bool, batch: &mut LifecycleBatch) {
		let mut services = self.distinct();
		if reverse {
			services.reverse();
		}
		for (name, service) in services {
			batch.push(ScopeEvent::for_service(stage, scope, name, service));
		}
	}
}

/// Registry of live scopes.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
	scopes: ScopeMap,
	/// Graph of the most recently built history.
	graph: ScopeGraph,
	/// Active chain of the committed history, ancestors first.
	active: Vec<ScopeTag>,
}

impl ScopeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates every scope of `graph` that is not alive yet, parents first,
	/// letting `provider` bind services into each.
	///
	/// All or nothing: if the provider fails, scopes created by this call are
	/// dropped again and no callback is produced.
	///
	/// # Errors
	///
	/// Propagates the first error returned by the provider.
	pub fn build_scopes(&mut self, graph: &ScopeGraph, provider: Option<&dyn ScopedServices>) -> Result<LifecycleBatch> {
		let rollback = self.scopes.len();
		let mut built: Vec<ScopeTag> = Vec::new();

		for tag in build_order(graph, &self.scopes) {
			let mut services = ServiceMap::default();
			if let Some(provider) = provider {
				let mut binder = ServiceBinder::new(tag, &mut services, &self.scopes, graph);
				if let Err(err) = provider.bind_services(&mut binder) {
					self.scopes.truncate(rollback);
					return Err(err);
				}
			}
			trace!(scope = %tag, services = services.len(), "scope built");
			self.scopes.insert(
				tag.clone(),
				ScopeEntry {
					services,
					parents: SmallVec::new(),
				},
			);
			built.push(tag.clone());
		}

		for tag in graph.scopes() {
			if let Some(entry) = self.scopes.get_mut(tag) {
				for parent in graph.parents_of(tag) {
					if !entry.parents.contains(parent) {
						entry.parents.push(parent.clone());
					}
				}
			}
		}

		let mut batch = LifecycleBatch::new();
		for tag in &built {
			if let Some(entry) = self.scopes.get(tag) {
				entry.events(LifecycleStage::Registered, tag, false, &mut batch);
			}
		}
		self.graph = graph.clone();
		Ok(batch)
	}

	/// Reconciles live scopes with the committed `graph`.
	///
	/// Scopes entering the active chain are activated first (chain order),
	/// then scopes leaving it are inactivated (reverse chain order), then
	/// every scope the graph no longer reaches is destroyed, children before
	/// their parents and most recently registered first otherwise.
	pub fn reconcile(&mut self, graph: ScopeGraph) -> LifecycleBatch {
		let mut batch = LifecycleBatch::new();
		let active = graph.active_chain();

		for tag in active.iter().filter(|t| !self.active.contains(t)) {
			if let Some(entry) = self.scopes.get(tag) {
				trace!(scope = %tag, "scope activated");
				entry.events(LifecycleStage::Active, tag, false, &mut batch);
			}
		}
		for tag in self.active.iter().rev().filter(|t| !active.contains(t)) {
			if let Some(entry) = self.scopes.get(tag) {
				trace!(scope = %tag, "scope inactivated");
				entry.events(LifecycleStage::Inactive, tag, true, &mut batch);
			}
		}

		let doomed: Vec<usize> = self
			.scopes
			.keys()
			.enumerate()
			.filter(|(_, tag)| !graph.contains(tag))
			.map(|(index, _)| index)
			.collect();
		self.destroy(doomed, &mut batch);
		self.scopes.retain(|tag, _| graph.contains(tag));

		self.active = active;
		self.graph = graph;
		batch
	}

	/// Tears down every scope: the active chain is inactivated, then all
	/// scopes are destroyed, children before their parents.
	pub fn finalize(&mut self) -> LifecycleBatch {
		let mut batch = LifecycleBatch::new();
		for tag in self.active.iter().rev() {
			if let Some(entry) = self.scopes.get(tag) {
				entry.events(LifecycleStage::Inactive, tag, true, &mut batch);
			}
		}
		self.destroy((0..self.scopes.len()).collect(), &mut batch);
		self.scopes.clear();
		self.active.clear();
		self.graph = ScopeGraph::empty();
		batch
	}

	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}

	pub fn has_scope(&self, tag: &str) -> bool {
		self.scopes.contains_key(tag)
	}

	pub fn has_service(&self, tag: &str, name: &str) -> bool {
		self.scopes.get(tag).is_some_and(|entry| entry.services.contains_key(name))
	}

	/// Gets the service bound under `name` in scope `tag`.
	pub fn service<T: Any + Send + Sync>(&self, tag: &str, name: &str) -> Result<Arc<T>> {
		let (scope, service) = self.entry(tag, name)?;
		downcast(service, scope, name)
	}

	/// Like [`service`](Self::service) without the type check.
	pub fn service_any(&self, tag: &str, name: &str) -> Result<Service> {
		self.entry(tag, name).map(|(_, service)| service.clone())
	}

	/// Looks `name` up along the lookup chain of the top key.
	pub fn lookup_service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
		let chain = self.graph.lookup_chain();
		let (scope, service) = self.find(&chain, name).ok_or_else(|| ScopeError::ServiceNotFound {
			scope: None,
			name: name.to_owned(),
		})?;
		downcast(service, scope, name)
	}

	pub fn can_find_service(&self, name: &str) -> bool {
		self.find(&self.graph.lookup_chain(), name).is_some()
	}

	/// Looks `name` up starting at scope `tag`.
	///
	/// # Errors
	///
	/// Returns [`ScopeError::ScopeNotFound`] if `tag` is not reachable and
	/// [`ScopeError::ServiceNotFound`] if nothing along its chain binds
	/// `name`.
	pub fn lookup_from_scope<T: Any + Send + Sync>(&self, tag: &str, name: &str) -> Result<Arc<T>> {
		let chain = self.graph.scope_lookup_chain(tag)?;
		let (scope, service) = self.find(&chain, name).ok_or_else(|| ScopeError::ServiceNotFound {
			scope: Some(ScopeTag::from(tag)),
			name: name.to_owned(),
		})?;
		downcast(service, scope, name)
	}

	pub fn can_find_from_scope(&self, tag: &str, name: &str) -> bool {
		self.graph
			.scope_lookup_chain(tag)
			.is_ok_and(|chain| self.find(&chain, name).is_some())
	}

	/// Active chain of the committed history, ancestors first.
	pub fn active_scopes(&self) -> &[ScopeTag] {
		&self.active
	}

	/// Live scopes in registration order.
	pub fn scope_tags(&self) -> impl DoubleEndedIterator<Item = &ScopeTag> + ExactSizeIterator {
		self.scopes.keys()
	}

	/// Service names bound in scope `tag`, in bind order.
	pub fn service_names(&self, tag: &str) -> Vec<&str> {
		self.scopes
			.get(tag)
			.map(|entry| entry.services.keys().map(|k| &**k).collect())
			.unwrap_or_default()
	}

	pub fn graph(&self) -> &ScopeGraph {
		&self.graph
	}

	fn entry(&self, tag: &str, name: &str) -> Result<(&ScopeTag, &Service)> {
		let (scope, entry) = self
			.scopes
			.get_key_value(tag)
			.ok_or_else(|| ScopeError::ScopeNotFound(ScopeTag::from(tag)))?;
		let service = entry.services.get(name).ok_or_else(|| ScopeError::ServiceNotFound {
			scope: Some(scope.clone()),
			name: name.to_owned(),
		})?;
		Ok((scope, service))
	}

	fn find(&self, chain: &[ScopeTag], name: &str) -> Option<(&ScopeTag, &Service)> {
		chain.iter().find_map(|tag| {
			let (tag, entry) = self.scopes.get_key_value(tag.as_str())?;
			entry.services.get(name).map(|service| (tag, service))
		})
	}

	/// Queues unregistration of the scopes at `doomed`, given as ascending
	/// registration indices.
	///
	/// A scope goes only once none of the remaining doomed scopes lists it as
	/// a parent; among those the most recently registered goes first. Cycles
	/// fall back to reverse registration order.
	fn destroy(&self, mut doomed: Vec<usize>, batch: &mut LifecycleBatch) {
		while !doomed.is_empty() {
			let ready = doomed
				.iter()
				.rposition(|&index| !doomed.iter().any(|&other| self.is_parent(index, other)))
				.unwrap_or(doomed.len() - 1);
			let index = doomed.remove(ready);
			if let Some((tag, entry)) = self.scopes.get_index(index) {
				trace!(scope = %tag, "scope destroyed");
				entry.events(LifecycleStage::Unregistered, tag, true, batch);
			}
		}
	}

	fn is_parent(&self, parent: usize, child: usize) -> bool {
		match (self.scopes.get_index(parent), self.scopes.get_index(child)) {
			(Some((tag, _)), Some((_, entry))) => entry.parents.contains(tag),
			_ => false,
		}
	}
}

/// Scopes of `graph` that are not alive yet, parents before children and in
/// discovery order otherwise.
fn build_order<'g>(graph: &'g ScopeGraph, alive: &ScopeMap) -> Vec<&'g ScopeTag> {
	let mut pending: Vec<&ScopeTag> = graph.scopes().filter(|tag| !alive.contains_key(tag.as_str())).collect();
	let mut order = Vec::with_capacity(pending.len());
	while !pending.is_empty() {
		let ready = pending
			.iter()
			.position(|tag| !graph.parents_of(tag.as_str()).iter().any(|parent| pending.contains(&parent)))
			.unwrap_or(0);
		order.push(pending.remove(ready));
	}
	order
}
