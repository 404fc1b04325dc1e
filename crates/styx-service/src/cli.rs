//! Offline codec commands.
//!
//! These run without configuration or an engine and print their result to
//! stdout.

use alloy_primitives::{Bytes, U256};
use styx_codec::{compress, decode, encode, uncompress, CompressedAmount, Instruction};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("Invalid input: {0}")]
	Input(String),
	#[error(transparent)]
	Codec(#[from] styx_codec::CodecError),
	#[error(transparent)]
	Compress(#[from] styx_codec::CompressError),
}

/// Encodes instruction JSON to `0x` hex.
pub fn encode_json(json: &str) -> Result<String, CliError> {
	let instruction: Instruction =
		serde_json::from_str(json).map_err(|e| CliError::Input(e.to_string()))?;
	let data = encode(&instruction)?;
	Ok(data.to_string())
}

/// Decodes `0x` hex to pretty instruction JSON.
pub fn decode_hex(data: &str) -> Result<String, CliError> {
	let bytes: Bytes = data
		.parse()
		.map_err(|e| CliError::Input(format!("{}", e)))?;
	let instruction = decode(&bytes)?;
	serde_json::to_string_pretty(&instruction).map_err(|e| CliError::Input(e.to_string()))
}

/// Compresses a decimal amount; reports the raw value and the amount it
/// stands for.
pub fn compress_amount(amount: &str) -> Result<String, CliError> {
	let amount =
		U256::from_str_radix(amount, 10).map_err(|e| CliError::Input(e.to_string()))?;
	let compressed = compress(amount)?;
	let exact = uncompress(compressed);
	let mut out = format!(
		"raw: {}\nmantissa: {}\nexponent: {}\namount: {}",
		compressed.to_raw(),
		compressed.mantissa(),
		compressed.exponent(),
		exact
	);
	if exact != amount {
		out.push_str(&format!("\nrounded down by: {}", amount - exact));
	}
	Ok(out)
}

pub fn uncompress_raw(raw: u64) -> String {
	uncompress(CompressedAmount::from_raw(raw)).to_string()
}
