//! Common types module for the Styx settlement system.
//!
//! This module defines the primitives shared by the codec, the registries,
//! the signature-transfer authority and the execution engine, so every
//! component agrees on index widths, venue encoding and settlement records.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Settlement records and engine events.
pub mod events;
/// Wire-level primitives: address indices, slippage tiers, venues.
pub mod primitives;
/// Base trait for self-registering implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// EIP-712 hashing helpers.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use events::*;
pub use primitives::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use validation::*;
