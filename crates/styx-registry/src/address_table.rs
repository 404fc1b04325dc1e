//! Append-only address interning.

use crate::RegistryError;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use styx_storage::StorageService;
use styx_types::{AddressIndex, StorageKey};
use tokio::sync::RwLock;

/// Bijection between addresses and wire indices.
#[async_trait]
pub trait AddressTable: Send + Sync {
	/// Returns the existing index of `address`, or assigns the next one.
	async fn register(&self, address: Address) -> Result<AddressIndex, RegistryError>;

	async fn lookup(&self, address: Address) -> Result<AddressIndex, RegistryError>;

	async fn address_of(&self, index: AddressIndex) -> Result<Address, RegistryError>;

	async fn len(&self) -> usize;
}

#[derive(Default)]
struct Entries {
	by_address: HashMap<Address, AddressIndex>,
	addresses: Vec<Address>,
}

/// In-memory table, optionally written through to storage.
pub struct InternTable {
	entries: RwLock<Entries>,
	storage: Option<Arc<StorageService>>,
	capacity: usize,
}

impl Default for InternTable {
	fn default() -> Self {
		Self::new()
	}
}

impl InternTable {
	pub fn new() -> Self {
		Self {
			entries: RwLock::new(Entries::default()),
			storage: None,
			capacity: AddressIndex::MAX as usize + 1,
		}
	}

	/// Caps the table below the wire limit.
	pub fn with_capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity.min(AddressIndex::MAX as usize + 1);
		self
	}

	/// Restores a persisted table and writes new registrations through to
	/// `storage`. Stored indices must be contiguous from zero.
	pub async fn load(storage: Arc<StorageService>) -> Result<Self, RegistryError> {
		let mut stored: Vec<(u32, Address)> = Vec::new();
		for (id, address) in storage
			.retrieve_all::<Address>(StorageKey::Addresses.as_str())
			.await
			.map_err(|e| RegistryError::Storage(e.to_string()))?
		{
			let index = id
				.parse::<u32>()
				.map_err(|_| RegistryError::Corrupt(format!("bad index key '{}'", id)))?;
			stored.push((index, address));
		}
		stored.sort_by_key(|(index, _)| *index);

		let mut entries = Entries::default();
		for (expected, (index, address)) in stored.into_iter().enumerate() {
			if index as usize != expected {
				return Err(RegistryError::Corrupt(format!(
					"missing index {}",
					expected
				)));
			}
			let index = AddressIndex::new(index).ok_or(RegistryError::TableFull)?;
			if entries.by_address.insert(address, index).is_some() {
				return Err(RegistryError::Corrupt(format!(
					"duplicate address {}",
					address
				)));
			}
			entries.addresses.push(address);
		}
		tracing::info!(entries = entries.addresses.len(), "Loaded address table");

		Ok(Self {
			entries: RwLock::new(entries),
			storage: Some(storage),
			capacity: AddressIndex::MAX as usize + 1,
		})
	}

	/// All entries in index order.
	pub async fn entries(&self) -> Vec<(AddressIndex, Address)> {
		let entries = self.entries.read().await;
		entries
			.addresses
			.iter()
			.filter_map(|address| entries.by_address.get(address).map(|i| (*i, *address)))
			.collect()
	}
}

#[async_trait]
impl AddressTable for InternTable {
	async fn register(&self, address: Address) -> Result<AddressIndex, RegistryError> {
		if let Some(index) = self.entries.read().await.by_address.get(&address) {
			return Ok(*index);
		}

		let mut entries = self.entries.write().await;
		// raced with another registration of the same address
		if let Some(index) = entries.by_address.get(&address) {
			return Ok(*index);
		}
		let next = entries.addresses.len();
		if next >= self.capacity {
			return Err(RegistryError::TableFull);
		}
		let index = AddressIndex::new(next as u32).ok_or(RegistryError::TableFull)?;

		if let Some(storage) = &self.storage {
			storage
				.store(
					StorageKey::Addresses.as_str(),
					&index.value().to_string(),
					&address,
				)
				.await
				.map_err(|e| RegistryError::Storage(e.to_string()))?;
		}
		entries.by_address.insert(address, index);
		entries.addresses.push(address);
		tracing::info!(%address, %index, "Registered address");
		Ok(index)
	}

	async fn lookup(&self, address: Address) -> Result<AddressIndex, RegistryError> {
		self.entries
			.read()
			.await
			.by_address
			.get(&address)
			.copied()
			.ok_or(RegistryError::UnknownAddress(address))
	}

	async fn address_of(&self, index: AddressIndex) -> Result<Address, RegistryError> {
		self.entries
			.read()
			.await
			.addresses
			.get(index.value() as usize)
			.copied()
			.ok_or(RegistryError::UnknownIndex(index))
	}

	async fn len(&self) -> usize {
		self.entries.read().await.addresses.len()
	}
}
