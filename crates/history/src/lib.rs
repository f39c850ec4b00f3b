//! Navigation keys and history snapshots.
//!
//! This crate holds the leaf data types shared by the scope engine and the
//! back-stack core:
//!
//! * [`Key`]: caller-defined navigation entry, exposing its scope requirements
//!   through a [`ScopeDescriptor`].
//! * [`History`]: immutable, cheaply cloned snapshot of keys, newest last.
//! * [`Direction`]: informational hint attached to every history change.

mod direction;
mod history;
mod scope;

pub use direction::Direction;
pub use history::{History, HistoryBuilder};
pub use scope::{Key, ParentScopes, ScopeDescriptor, ScopeTag};
