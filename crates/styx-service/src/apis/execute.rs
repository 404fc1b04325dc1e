//! Instruction relay endpoint.

use super::{storage_error, swap_error};
use alloy_primitives::Address;
use styx_core::{Call, SwapEngine};
use styx_types::{APIError, ExecuteRequest, ExecuteResponse, StorageKey};
use uuid::Uuid;

/// Runs `request` through the engine as `relayer` and stores the settlement
/// record.
pub async fn process_execute_request(
	request: ExecuteRequest,
	engine: &SwapEngine,
	relayer: Option<Address>,
) -> Result<ExecuteResponse, APIError> {
	let Some(caller) = relayer else {
		return Err(APIError::InternalServerError {
			error_type: "relayer_not_configured".to_string(),
			message: "The service has no relayer account to submit as".to_string(),
		});
	};
	let call = Call {
		caller,
		value: request.value,
		timestamp: chrono::Utc::now().timestamp().max(0) as u64,
		data: request.data,
	};
	let record = engine.execute(call).await.map_err(swap_error)?;

	let settlement_id = Uuid::new_v4().to_string();
	engine
		.storage()
		.store(StorageKey::Settlements.as_str(), &settlement_id, &record)
		.await
		.map_err(|e| {
			tracing::error!(%settlement_id, error = %e, "Settled but failed to store record");
			storage_error(e)
		})?;

	Ok(ExecuteResponse {
		settlement_id,
		record,
	})
}
