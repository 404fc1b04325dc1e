//! Address table endpoints.

use super::registry_error;
use alloy_primitives::Address;
use styx_core::SwapEngine;
use styx_registry::AddressTable;
use styx_types::{APIError, AddressIndex, RegisterTokenRequest, TokenResponse};

/// Resolves a decimal index path segment.
pub async fn get_token(index: &str, engine: &SwapEngine) -> Result<TokenResponse, APIError> {
	let index = index
		.parse::<u32>()
		.ok()
		.and_then(AddressIndex::new)
		.ok_or_else(|| APIError::BadRequest {
			error_type: "invalid_index".to_string(),
			message: format!("'{}' is not a token index", index),
		})?;
	let address = engine
		.tokens()
		.address_of(index)
		.await
		.map_err(registry_error)?;
	Ok(TokenResponse { index, address })
}

/// Interns an address, returning its existing index if already present.
pub async fn register_token(
	request: RegisterTokenRequest,
	engine: &SwapEngine,
) -> Result<TokenResponse, APIError> {
	if request.address == Address::ZERO {
		return Err(APIError::BadRequest {
			error_type: "invalid_address".to_string(),
			message: "cannot register the zero address".to_string(),
		});
	}
	let index = engine
		.tokens()
		.register(request.address)
		.await
		.map_err(registry_error)?;
	tracing::info!(address = %request.address, %index, "Registered token");
	Ok(TokenResponse {
		index,
		address: request.address,
	})
}
