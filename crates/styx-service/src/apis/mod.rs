//! HTTP handlers for the Styx API.

pub mod codec;
pub mod execute;
pub mod quote;
pub mod settlements;
pub mod tokens;

use styx_core::SwapError;
use styx_registry::RegistryError;
use styx_storage::StorageError;
use styx_types::APIError;

/// Maps an engine rejection onto the API envelope. Malformed instructions
/// are client errors; every other rejection is a refused swap.
pub(crate) fn swap_error(err: SwapError) -> APIError {
	if err.is_malformed() {
		return APIError::BadRequest {
			error_type: err.code().to_string(),
			message: err.to_string(),
		};
	}
	APIError::UnprocessableEntity {
		error_type: err.code().to_string(),
		message: err.to_string(),
		details: None,
	}
}

pub(crate) fn registry_error(err: RegistryError) -> APIError {
	match err {
		RegistryError::UnknownAddress(_) | RegistryError::UnknownIndex(_) => APIError::NotFound {
			error_type: "unknown_token".to_string(),
			message: err.to_string(),
		},
		RegistryError::TableFull | RegistryError::VenueIdOutOfRange(_) => {
			APIError::UnprocessableEntity {
				error_type: "registry_rejected".to_string(),
				message: err.to_string(),
				details: None,
			}
		},
		RegistryError::Storage(_) | RegistryError::Corrupt(_) => APIError::InternalServerError {
			error_type: "registry_error".to_string(),
			message: err.to_string(),
		},
	}
}

pub(crate) fn storage_error(err: StorageError) -> APIError {
	match err {
		StorageError::NotFound => APIError::NotFound {
			error_type: "not_found".to_string(),
			message: err.to_string(),
		},
		other => APIError::InternalServerError {
			error_type: "storage_error".to_string(),
			message: other.to_string(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use styx_codec::CodecError;

	#[test]
	fn test_status_mapping() {
		assert_eq!(swap_error(SwapError::Decode(CodecError::Empty)).status_code(), 400);
		assert_eq!(swap_error(SwapError::Reentrancy).status_code(), 422);
		assert_eq!(storage_error(StorageError::NotFound).status_code(), 404);
		assert_eq!(
			storage_error(StorageError::Backend("disk".into())).status_code(),
			500
		);
		assert_eq!(registry_error(RegistryError::TableFull).status_code(), 422);
	}
}
