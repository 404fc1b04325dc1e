//! Settlement record lookup.

use super::storage_error;
use styx_core::SwapEngine;
use styx_types::{APIError, SettlementRecord, StorageKey};

pub async fn get_settlement_by_id(
	id: &str,
	engine: &SwapEngine,
) -> Result<SettlementRecord, APIError> {
	engine
		.storage()
		.retrieve(StorageKey::Settlements.as_str(), id)
		.await
		.map_err(storage_error)
}
