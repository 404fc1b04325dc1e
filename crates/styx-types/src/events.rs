//! Event types published by the execution engine.
//!
//! Every invocation ends in exactly one event: `Settled` carrying the
//! settlement record, or `Aborted` carrying the rejection reason. Consumers
//! subscribe through the engine's event bus.

use crate::api::u256_serde;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Record emitted once per successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
	/// Gross input amount pulled from the signer or attached as value.
	#[serde(with = "u256_serde")]
	pub amount_in: U256,
	/// Output amount the signer asked for.
	#[serde(with = "u256_serde")]
	pub requested_amount_out: U256,
	/// Output amount delivered to the beneficiary.
	#[serde(with = "u256_serde")]
	pub actual_amount_out: U256,
	pub token_in: Address,
	pub token_out: Address,
	pub beneficiary: Address,
}

/// Events published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwapEvent {
	/// An instruction settled and its output reached the beneficiary.
	Settled(SettlementRecord),
	/// An instruction was rejected and every effect was rolled back.
	Aborted {
		/// Caller that submitted the instruction.
		caller: Address,
		/// Stable error code of the rejection.
		code: String,
		/// Human readable reason.
		reason: String,
	},
}
