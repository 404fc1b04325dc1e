//! Per-invocation view of a decoded instruction with its tokens resolved.

use crate::SwapError;
use alloy_primitives::{Address, U256};
use styx_codec::{uncompress, CodecError, Instruction};
use styx_permit::SwapWitness;
use styx_types::{InstructionMode, NATIVE_ASSET};

/// A decoded instruction whose indices have been resolved through the
/// address table.
#[derive(Debug, Clone)]
pub(crate) struct SwapContext {
	pub instruction: Instruction,
	pub token_in: Address,
	/// As signed; may be the native sentinel.
	pub token_out: Address,
	pub requested_out: U256,
	pub wrapped_native: Address,
}

impl SwapContext {
	pub fn new(
		instruction: Instruction,
		token_in: Address,
		token_out: Address,
		wrapped_native: Address,
	) -> Self {
		let requested_out = uncompress(instruction.amount_out);
		Self {
			instruction,
			token_in,
			token_out,
			requested_out,
			wrapped_native,
		}
	}

	/// Token the venue is paid in. Attached value is wrapped before dispatch.
	pub fn venue_token_in(&self) -> Address {
		if self.instruction.mode() == InstructionMode::NativeIn {
			self.wrapped_native
		} else {
			self.token_in
		}
	}

	/// Token the venue pays out in. Native output arrives wrapped.
	pub fn venue_token_out(&self) -> Address {
		if self.pays_native() {
			self.wrapped_native
		} else {
			self.token_out
		}
	}

	pub fn pays_native(&self) -> bool {
		self.token_out == NATIVE_ASSET
	}

	pub fn beneficiary(&self) -> Address {
		self.instruction.beneficiary
	}

	/// Swap parameters the signer committed to.
	pub fn witness(&self) -> Result<SwapWitness, SwapError> {
		let venue = self.instruction.venue;
		let adapter_id = venue
			.to_byte()
			.ok_or(SwapError::Decode(CodecError::VenueOutOfRange(venue)))?;
		Ok(SwapWitness {
			beneficiary: self.instruction.beneficiary,
			token_out: self.token_out,
			amount_out: self.requested_out,
			fee_bps: self.instruction.fee_bps,
			slippage_tier: self.instruction.slippage_tier.value(),
			adapter_id,
		})
	}
}
