//! API types for the Styx HTTP API.
//!
//! Request and response bodies for the relay, codec and registry endpoints,
//! plus the error envelope shared by every handler.

use crate::{AddressIndex, SettlementRecord};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request to execute an instruction blob.
///
/// The instruction is submitted as the service's configured relayer; the
/// body cannot name a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
	/// Native value attached to the call, paid by the relayer.
	#[serde(default, with = "u256_serde")]
	pub value: U256,
	/// Packed instruction followed by the trailing payload.
	pub data: Bytes,
}

/// Response for a settled instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
	/// Identifier under which the settlement record is stored.
	pub settlement_id: String,
	pub record: SettlementRecord,
}

/// Request carrying a raw instruction blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeRequest {
	pub data: Bytes,
}

/// Response carrying an encoded instruction blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeResponse {
	pub data: Bytes,
	/// Size of the encoded blob in bytes.
	pub length: usize,
}

/// Off-chain quote request against a registered adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
	pub adapter_id: u8,
	pub token_in: Address,
	pub token_out: Address,
	#[serde(with = "u256_serde")]
	pub amount_in: U256,
}

/// Quote response.
///
/// `amount_in` is the value after compression, which is the figure a signer
/// must put in the transfer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
	#[serde(with = "u256_serde")]
	pub amount_in: U256,
	pub compressed_amount_in: u64,
	#[serde(with = "u256_serde")]
	pub amount_out: U256,
}

/// Request to intern an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTokenRequest {
	pub address: Address,
}

/// An interned address and its index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	pub index: AddressIndex,
	pub address: Address,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable error code.
	pub error: String,
	/// Human readable message.
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// API errors with their HTTP status.
#[derive(Debug)]
pub enum APIError {
	/// Malformed request (400).
	BadRequest { error_type: String, message: String },
	/// Well-formed request rejected by the engine (422).
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Unknown resource (404).
	NotFound { error_type: String, message: String },
	/// Internal server error (500).
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

/// Serde module for U256 as a decimal string.
pub mod u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		U256::from_str_radix(&s, 10).map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_execute_request_defaults_value() {
		let json = r#"{"data":"0x0102"}"#;
		let request: ExecuteRequest = serde_json::from_str(json).unwrap();
		assert_eq!(request.value, U256::ZERO);
		assert_eq!(request.data.len(), 2);
	}

	#[test]
	fn test_api_error_status() {
		let err = APIError::UnprocessableEntity {
			error_type: "slippage_exceeded".to_string(),
			message: "output below floor".to_string(),
			details: None,
		};
		assert_eq!(err.status_code(), 422);
		assert_eq!(err.to_error_response().error, "slippage_exceeded");
	}
}
