//! Instruction wire format.
//!
//! Every header starts with the same 91 bits:
//!
//! | field      | bits |
//! |------------|------|
//! | mode       | 2    |
//! | tier       | 3    |
//! | venue      | 8    |
//! | fee bps    | 14   |
//! | amount out | 64   |
//!
//! followed by the mode-specific fields and zero padding up to the next byte.
//! Explicit and balance-of headers are followed by a compact signature; the
//! remaining bytes are the venue payload.

use crate::bits::{BitReader, BitWriter};
use crate::compress::CompressedAmount;
use crate::signature::{CompactSignature, COMPACT_SIGNATURE_LEN};
use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use styx_types::{AddressIndex, InstructionMode, SlippageTier, Venue, BPS_DENOMINATOR};
use thiserror::Error;

const VENUE_BITS: u32 = 8;
const FEE_BITS: u32 = 14;
const AMOUNT_BITS: u32 = 64;
const NONCE_BITS: u32 = 40;
const DEADLINE_BITS: u32 = 32;
const PADDING_BITS: u32 = 5;

/// Largest nonce a signed header can carry.
pub const MAX_NONCE: u64 = (1 << NONCE_BITS) - 1;

pub const EXPLICIT_HEADER_LEN: usize = 55;
pub const BALANCE_OF_HEADER_LEN: usize = 47;
pub const NATIVE_IN_HEADER_LEN: usize = 38;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
	#[error("Empty instruction")]
	Empty,
	#[error("Invalid instruction mode: {0}")]
	InvalidMode(u8),
	#[error("Instruction truncated: need {needed} bytes, got {got}")]
	Truncated { needed: usize, got: usize },
	#[error("Fee out of range: {0} bps")]
	FeeOutOfRange(u16),
	#[error("Non-zero header padding")]
	NonZeroPadding,
	#[error("Venue id out of range: {0}")]
	VenueOutOfRange(Venue),
	#[error("Nonce out of range: {0}")]
	NonceOutOfRange(u64),
}

/// Mode-specific part of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InstructionKind {
	Explicit {
		amount_in: CompressedAmount,
		nonce: u64,
		deadline: u32,
		signature: CompactSignature,
	},
	BalanceOf {
		nonce: u64,
		deadline: u32,
		signature: CompactSignature,
	},
	NativeIn,
}

/// A decoded swap instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
	pub kind: InstructionKind,
	pub slippage_tier: SlippageTier,
	pub venue: Venue,
	pub fee_bps: u16,
	pub amount_out: CompressedAmount,
	pub token_in: AddressIndex,
	pub token_out: AddressIndex,
	pub beneficiary: Address,
	#[serde(default)]
	pub payload: Bytes,
}

/// Nonce, deadline and signature of a relayed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedParts {
	pub nonce: u64,
	pub deadline: u32,
	pub signature: CompactSignature,
}

impl Instruction {
	pub fn mode(&self) -> InstructionMode {
		match self.kind {
			InstructionKind::Explicit { .. } => InstructionMode::Explicit,
			InstructionKind::BalanceOf { .. } => InstructionMode::BalanceOf,
			InstructionKind::NativeIn => InstructionMode::NativeIn,
		}
	}

	pub fn signed_parts(&self) -> Option<SignedParts> {
		match self.kind {
			InstructionKind::Explicit {
				nonce,
				deadline,
				signature,
				..
			}
			| InstructionKind::BalanceOf {
				nonce,
				deadline,
				signature,
			} => Some(SignedParts {
				nonce,
				deadline,
				signature,
			}),
			InstructionKind::NativeIn => None,
		}
	}
}

/// Fixed header length of `mode`, excluding signature and payload.
pub fn header_len(mode: InstructionMode) -> usize {
	match mode {
		InstructionMode::Explicit => EXPLICIT_HEADER_LEN,
		InstructionMode::BalanceOf => BALANCE_OF_HEADER_LEN,
		InstructionMode::NativeIn => NATIVE_IN_HEADER_LEN,
	}
}

fn signature_len(mode: InstructionMode) -> usize {
	if mode.is_relayed() {
		COMPACT_SIGNATURE_LEN
	} else {
		0
	}
}

/// Serializes an instruction. Fails only on values the fixed-width fields
/// cannot hold.
pub fn encode(instruction: &Instruction) -> Result<Bytes, CodecError> {
	if instruction.fee_bps > BPS_DENOMINATOR {
		return Err(CodecError::FeeOutOfRange(instruction.fee_bps));
	}
	let venue = instruction
		.venue
		.to_byte()
		.ok_or(CodecError::VenueOutOfRange(instruction.venue))?;
	if let Some(parts) = instruction.signed_parts() {
		if parts.nonce > MAX_NONCE {
			return Err(CodecError::NonceOutOfRange(parts.nonce));
		}
	}

	let mode = instruction.mode();
	let mut w = BitWriter::with_capacity(header_len(mode));
	w.write(mode.tag() as u64, InstructionMode::BITS);
	w.write(instruction.slippage_tier.value() as u64, SlippageTier::BITS);
	w.write(venue as u64, VENUE_BITS);
	w.write(instruction.fee_bps as u64, FEE_BITS);
	w.write(instruction.amount_out.to_raw(), AMOUNT_BITS);

	if let InstructionKind::Explicit { amount_in, .. } = instruction.kind {
		w.write(amount_in.to_raw(), AMOUNT_BITS);
	}
	w.write(instruction.token_in.value() as u64, AddressIndex::BITS);
	w.write(instruction.token_out.value() as u64, AddressIndex::BITS);
	w.write_bytes(instruction.beneficiary.as_slice());
	if let Some(parts) = instruction.signed_parts() {
		w.write(parts.nonce, NONCE_BITS);
		w.write(parts.deadline as u64, DEADLINE_BITS);
	}
	w.write(0, PADDING_BITS);
	debug_assert_eq!(w.bit_len(), header_len(mode) * 8);

	let mut out = w.finish();
	if let Some(parts) = instruction.signed_parts() {
		out.extend_from_slice(&parts.signature.to_bytes());
	}
	out.extend_from_slice(&instruction.payload);
	Ok(Bytes::from(out))
}

/// Parses an instruction. The payload is everything after the header and
/// signature, possibly empty.
pub fn decode(data: &[u8]) -> Result<Instruction, CodecError> {
	let first = *data.first().ok_or(CodecError::Empty)?;
	let tag = first >> 6;
	let mode = InstructionMode::from_tag(tag).ok_or(CodecError::InvalidMode(tag))?;

	let header = header_len(mode);
	let needed = header + signature_len(mode);
	if data.len() < needed {
		return Err(CodecError::Truncated {
			needed,
			got: data.len(),
		});
	}

	let truncated = || CodecError::Truncated {
		needed,
		got: data.len(),
	};
	let mut r = BitReader::new(&data[..header]);
	r.read(InstructionMode::BITS).ok_or_else(truncated)?;
	let tier = r.read(SlippageTier::BITS).ok_or_else(truncated)?;
	let slippage_tier = SlippageTier::from_bits(tier as u8);
	let venue = Venue::from_byte(r.read(VENUE_BITS).ok_or_else(truncated)? as u8);
	let fee_bps = r.read(FEE_BITS).ok_or_else(truncated)? as u16;
	if fee_bps > BPS_DENOMINATOR {
		return Err(CodecError::FeeOutOfRange(fee_bps));
	}
	let amount_out = CompressedAmount::from_raw(r.read(AMOUNT_BITS).ok_or_else(truncated)?);

	let amount_in = match mode {
		InstructionMode::Explicit => Some(CompressedAmount::from_raw(
			r.read(AMOUNT_BITS).ok_or_else(truncated)?,
		)),
		_ => None,
	};
	let mut index = || -> Result<AddressIndex, CodecError> {
		let raw = r.read(AddressIndex::BITS).ok_or_else(truncated)?;
		Ok(AddressIndex::from_bits(raw as u32))
	};
	let token_in = index()?;
	let token_out = index()?;
	let beneficiary = Address::from(r.read_bytes::<20>().ok_or_else(truncated)?);

	let signed = if mode.is_relayed() {
		let nonce = r.read(NONCE_BITS).ok_or_else(truncated)?;
		let deadline = r.read(DEADLINE_BITS).ok_or_else(truncated)? as u32;
		let signature = CompactSignature::from_slice(&data[header..needed]).ok_or_else(truncated)?;
		Some(SignedParts {
			nonce,
			deadline,
			signature,
		})
	} else {
		None
	};

	if r.read(PADDING_BITS).ok_or_else(truncated)? != 0 {
		return Err(CodecError::NonZeroPadding);
	}

	let kind = match (mode, amount_in, signed) {
		(InstructionMode::Explicit, Some(amount_in), Some(parts)) => InstructionKind::Explicit {
			amount_in,
			nonce: parts.nonce,
			deadline: parts.deadline,
			signature: parts.signature,
		},
		(InstructionMode::BalanceOf, None, Some(parts)) => InstructionKind::BalanceOf {
			nonce: parts.nonce,
			deadline: parts.deadline,
			signature: parts.signature,
		},
		(InstructionMode::NativeIn, None, None) => InstructionKind::NativeIn,
		_ => return Err(CodecError::InvalidMode(tag)),
	};

	Ok(Instruction {
		kind,
		slippage_tier,
		venue,
		fee_bps,
		amount_out,
		token_in,
		token_out,
		beneficiary,
		payload: Bytes::copy_from_slice(&data[needed..]),
	})
}
