//! Wire-level primitives shared across the settlement pipeline.
//!
//! Address indices, slippage tiers and venues are the small integers that
//! replace wide values inside a packed instruction. Their bit widths are part
//! of the wire contract and are declared here so the codec, the registries
//! and the engine cannot drift apart.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel address standing for the chain's native asset.
pub const NATIVE_ASSET: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Denominator for all basis-point quantities.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Instruction modes understood by the codec and the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionMode {
	/// Amount in is carried as a compressed field and pulled with a signed order.
	Explicit,
	/// Amount in is the signer's full balance at execution time.
	BalanceOf,
	/// Amount in is the native value attached to the call.
	NativeIn,
}

impl InstructionMode {
	/// Width of the mode field in bits.
	pub const BITS: u32 = 2;

	/// Returns the wire tag for this mode.
	pub fn tag(&self) -> u8 {
		match self {
			InstructionMode::Explicit => 0,
			InstructionMode::BalanceOf => 1,
			InstructionMode::NativeIn => 2,
		}
	}

	/// Parses a wire tag. Tag 3 is reserved and rejected.
	pub fn from_tag(tag: u8) -> Option<Self> {
		match tag {
			0 => Some(InstructionMode::Explicit),
			1 => Some(InstructionMode::BalanceOf),
			2 => Some(InstructionMode::NativeIn),
			_ => None,
		}
	}

	/// Whether the instruction carries a compact signature and must be
	/// submitted by an allow-listed keeper.
	pub fn is_relayed(&self) -> bool {
		!matches!(self, InstructionMode::NativeIn)
	}
}

/// Index of an interned address.
///
/// Indices occupy 24 bits on the wire, so the table holds at most 2^24 entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AddressIndex(u32);

impl AddressIndex {
	/// Width of an index on the wire.
	pub const BITS: u32 = 24;
	/// Largest representable index.
	pub const MAX: u32 = (1 << Self::BITS) - 1;

	/// Creates an index, returning `None` if it does not fit in 24 bits.
	pub fn new(value: u32) -> Option<Self> {
		(value <= Self::MAX).then_some(Self(value))
	}

	/// Takes the low 24 bits of `bits`.
	pub fn from_bits(bits: u32) -> Self {
		Self(bits & Self::MAX)
	}

	pub fn value(&self) -> u32 {
		self.0
	}
}

impl TryFrom<u32> for AddressIndex {
	type Error = String;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		Self::new(value).ok_or_else(|| format!("address index {} exceeds 24 bits", value))
	}
}

impl From<AddressIndex> for u32 {
	fn from(index: AddressIndex) -> Self {
		index.0
	}
}

impl fmt::Display for AddressIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Slippage tolerance in basis points, indexed by tier.
const SLIPPAGE_TOLERANCE_BPS: [u16; 8] = [50, 100, 200, 500, 1000, 1500, 2000, 3000];

/// Index into the fixed slippage tolerance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlippageTier(u8);

impl SlippageTier {
	/// Width of a tier on the wire.
	pub const BITS: u32 = 3;

	pub fn new(tier: u8) -> Option<Self> {
		((tier as usize) < SLIPPAGE_TOLERANCE_BPS.len()).then_some(Self(tier))
	}

	/// Takes the low three bits of `bits`. Every three-bit value is a tier.
	pub fn from_bits(bits: u8) -> Self {
		Self(bits & ((1 << Self::BITS) - 1))
	}

	pub fn value(&self) -> u8 {
		self.0
	}

	/// Tolerated output shortfall in basis points.
	pub fn tolerance_bps(&self) -> u16 {
		SLIPPAGE_TOLERANCE_BPS[self.0 as usize]
	}
}

impl TryFrom<u8> for SlippageTier {
	type Error = String;

	fn try_from(tier: u8) -> Result<Self, Self::Error> {
		Self::new(tier).ok_or_else(|| format!("slippage tier {} out of range", tier))
	}
}

impl From<SlippageTier> for u8 {
	fn from(tier: SlippageTier) -> Self {
		tier.0
	}
}

/// Swap venue selected by the instruction's `adapterId` byte.
///
/// The high bit of the byte selects the aggregator path; the low seven bits
/// are the id within that namespace. The signed witness commits to the whole
/// byte, so the path cannot be switched after signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
	/// A registered adapter invoked through its swap entry point.
	Adapter(u8),
	/// An external aggregator receiving the trailing payload verbatim.
	Aggregator(u8),
}

impl Venue {
	const AGGREGATOR_FLAG: u8 = 0x80;

	/// Builds a venue from the wire byte.
	pub fn from_byte(byte: u8) -> Self {
		if byte & Self::AGGREGATOR_FLAG != 0 {
			Venue::Aggregator(byte & !Self::AGGREGATOR_FLAG)
		} else {
			Venue::Adapter(byte)
		}
	}

	/// Returns the wire byte, or `None` if the id exceeds seven bits.
	pub fn to_byte(&self) -> Option<u8> {
		match *self {
			Venue::Adapter(id) if id < Self::AGGREGATOR_FLAG => Some(id),
			Venue::Aggregator(id) if id < Self::AGGREGATOR_FLAG => Some(id | Self::AGGREGATOR_FLAG),
			_ => None,
		}
	}
}

impl fmt::Display for Venue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Venue::Adapter(id) => write!(f, "adapter:{}", id),
			Venue::Aggregator(id) => write!(f, "aggregator:{}", id),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_venue_byte_mapping() {
		assert_eq!(Venue::from_byte(0x00), Venue::Adapter(0));
		assert_eq!(Venue::from_byte(0x7f), Venue::Adapter(0x7f));
		assert_eq!(Venue::from_byte(0x80), Venue::Aggregator(0));
		assert_eq!(Venue::from_byte(0xff), Venue::Aggregator(0x7f));

		for byte in 0..=u8::MAX {
			assert_eq!(Venue::from_byte(byte).to_byte(), Some(byte));
		}
		assert_eq!(Venue::Adapter(0x80).to_byte(), None);
	}

	#[test]
	fn test_index_bounds() {
		assert!(AddressIndex::new(AddressIndex::MAX).is_some());
		assert!(AddressIndex::new(AddressIndex::MAX + 1).is_none());
		assert_eq!(
			AddressIndex::from_bits(0xff00_0001),
			AddressIndex::new(1).unwrap()
		);
		assert_eq!(AddressIndex::from_bits(AddressIndex::MAX).value(), AddressIndex::MAX);
	}

	#[test]
	fn test_slippage_table() {
		assert_eq!(SlippageTier::new(3).unwrap().tolerance_bps(), 500);
		assert!(SlippageTier::new(8).is_none());
		assert_eq!(SlippageTier::from_bits(0b1111_1101).value(), 0b101);
		for bits in 0..8u8 {
			assert_eq!(Some(SlippageTier::from_bits(bits)), SlippageTier::new(bits));
		}
	}

	#[test]
	fn test_mode_tags() {
		for mode in [
			InstructionMode::Explicit,
			InstructionMode::BalanceOf,
			InstructionMode::NativeIn,
		] {
			assert_eq!(InstructionMode::from_tag(mode.tag()), Some(mode));
		}
		assert_eq!(InstructionMode::from_tag(3), None);
		assert!(!InstructionMode::NativeIn.is_relayed());
	}
}
