//! Registries consulted by the swap engine.
//!
//! The address table maps token addresses to the 24-bit indices carried on
//! the wire. The permission registry answers which callers may relay signed
//! instructions and which venue ids are bound to which targets.

use thiserror::Error;

pub mod address_table;
pub mod permissions;

pub use address_table::{AddressTable, InternTable};
pub use permissions::{AdapterRegistration, MemoryPermissions, PermissionRegistry};

use alloy_primitives::Address;
use styx_types::AddressIndex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
	#[error("Unknown address: {0}")]
	UnknownAddress(Address),
	#[error("Unknown index: {0}")]
	UnknownIndex(AddressIndex),
	#[error("Address table is full")]
	TableFull,
	#[error("Venue id out of range: {0}")]
	VenueIdOutOfRange(u8),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Corrupt address table: {0}")]
	Corrupt(String),
}
