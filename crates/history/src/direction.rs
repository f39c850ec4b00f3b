use std::fmt;

use serde::{Deserialize, Serialize};

/// Navigation direction attached to a history change.
///
/// Purely a hint for whoever renders the change (animations, ordering of
/// view swaps). Scope resolution never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	/// A new key was pushed on top.
	Forward,
	/// Keys were removed from the top.
	Backward,
	/// The history was swapped without a clear direction.
	Replace,
}

impl Direction {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Forward => "forward",
			Self::Backward => "backward",
			Self::Replace => "replace",
		}
	}
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
