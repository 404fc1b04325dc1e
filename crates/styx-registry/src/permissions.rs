//! Keeper allow-list and venue bindings.

use crate::RegistryError;
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Highest id in either venue namespace.
const MAX_VENUE_ID: u8 = 0x7f;

/// Target and implementation kind bound to an adapter id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterRegistration {
	pub target: Address,
	pub kind: String,
}

/// Read-only view of the permission state used by the engine.
#[async_trait]
pub trait PermissionRegistry: Send + Sync {
	async fn is_keeper(&self, caller: Address) -> bool;

	async fn adapter_for(&self, id: u8) -> Option<AdapterRegistration>;

	async fn aggregator_for(&self, id: u8) -> Option<Address>;
}

/// Permission state held in memory, mutated by admin calls.
#[derive(Default)]
pub struct MemoryPermissions {
	keepers: RwLock<HashSet<Address>>,
	adapters: RwLock<HashMap<u8, AdapterRegistration>>,
	aggregators: RwLock<HashMap<u8, Address>>,
}

impl MemoryPermissions {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn set_keeper(&self, keeper: Address, allowed: bool) {
		let mut keepers = self.keepers.write().await;
		if allowed {
			keepers.insert(keeper);
		} else {
			keepers.remove(&keeper);
		}
		tracing::info!(%keeper, allowed, "Keeper updated");
	}

	/// Binds or, with `None`, unbinds an adapter id.
	pub async fn set_adapter(
		&self,
		id: u8,
		registration: Option<AdapterRegistration>,
	) -> Result<(), RegistryError> {
		if id > MAX_VENUE_ID {
			return Err(RegistryError::VenueIdOutOfRange(id));
		}
		let mut adapters = self.adapters.write().await;
		match registration {
			Some(registration) => {
				tracing::info!(id, target = %registration.target, kind = %registration.kind, "Adapter bound");
				adapters.insert(id, registration);
			},
			None => {
				adapters.remove(&id);
			},
		}
		Ok(())
	}

	pub async fn set_aggregator(&self, id: u8, target: Option<Address>) -> Result<(), RegistryError> {
		if id > MAX_VENUE_ID {
			return Err(RegistryError::VenueIdOutOfRange(id));
		}
		let mut aggregators = self.aggregators.write().await;
		match target {
			Some(target) => {
				tracing::info!(id, %target, "Aggregator bound");
				aggregators.insert(id, target);
			},
			None => {
				aggregators.remove(&id);
			},
		}
		Ok(())
	}
}

#[async_trait]
impl PermissionRegistry for MemoryPermissions {
	async fn is_keeper(&self, caller: Address) -> bool {
		self.keepers.read().await.contains(&caller)
	}

	async fn adapter_for(&self, id: u8) -> Option<AdapterRegistration> {
		self.adapters.read().await.get(&id).cloned()
	}

	async fn aggregator_for(&self, id: u8) -> Option<Address> {
		self.aggregators.read().await.get(&id).copied()
	}
}
