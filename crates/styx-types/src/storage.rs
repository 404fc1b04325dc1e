//! Storage-related types for the settlement system.

use std::str::FromStr;

/// Storage namespaces for persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Interned addresses keyed by decimal index.
	Addresses,
	/// Settlement records keyed by settlement id.
	Settlements,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Addresses => "addresses",
			StorageKey::Settlements => "settlements",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Addresses, Self::Settlements].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"addresses" => Ok(Self::Addresses),
			"settlements" => Ok(Self::Settlements),
			_ => Err(()),
		}
	}
}
