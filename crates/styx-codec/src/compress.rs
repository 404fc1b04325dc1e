//! Lossy decimal compression of token amounts.
//!
//! A compressed amount is a 64-bit word holding a 59-bit mantissa and a
//! 5-bit base-10 exponent (`mantissa << 5 | exponent`), representing
//! `mantissa * 10^exponent`. Compression rounds toward zero, so the value
//! that is signed and settled must always be re-derived with [`uncompress`].

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the mantissa in bits.
pub const MANTISSA_BITS: u32 = 59;
/// Width of the exponent in bits.
pub const EXPONENT_BITS: u32 = 5;
/// Largest mantissa.
pub const MAX_MANTISSA: u64 = (1 << MANTISSA_BITS) - 1;
/// Largest exponent.
pub const MAX_EXPONENT: u8 = (1 << EXPONENT_BITS) - 1;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompressError {
	/// The amount exceeds `MAX_MANTISSA * 10^MAX_EXPONENT`.
	#[error("Amount too large to compress: {0}")]
	AmountTooLarge(U256),
}

/// A `mantissa * 10^exponent` amount packed into 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressedAmount(u64);

impl CompressedAmount {
	/// Every 64-bit word is a valid compressed amount.
	pub const fn from_raw(raw: u64) -> Self {
		Self(raw)
	}

	pub const fn to_raw(&self) -> u64 {
		self.0
	}

	/// Builds an amount from its parts, rejecting out-of-range components.
	pub fn from_parts(mantissa: u64, exponent: u8) -> Option<Self> {
		if mantissa > MAX_MANTISSA || exponent > MAX_EXPONENT {
			return None;
		}
		Some(Self(mantissa << EXPONENT_BITS | exponent as u64))
	}

	pub const fn mantissa(&self) -> u64 {
		self.0 >> EXPONENT_BITS
	}

	pub const fn exponent(&self) -> u8 {
		(self.0 & MAX_EXPONENT as u64) as u8
	}
}

/// Largest amount that compresses without error.
pub fn max_representable() -> U256 {
	U256::from(MAX_MANTISSA) * U256::from(10u64).pow(U256::from(MAX_EXPONENT))
}

/// Compresses `amount`, keeping as many significant digits as the mantissa
/// allows. The result never exceeds the input.
pub fn compress(amount: U256) -> Result<CompressedAmount, CompressError> {
	let max_mantissa = U256::from(MAX_MANTISSA);
	let ten = U256::from(10u64);

	let mut mantissa = amount;
	let mut exponent = 0u8;
	while mantissa > max_mantissa {
		if exponent == MAX_EXPONENT {
			return Err(CompressError::AmountTooLarge(amount));
		}
		mantissa /= ten;
		exponent += 1;
	}

	Ok(CompressedAmount(
		mantissa.to::<u64>() << EXPONENT_BITS | exponent as u64,
	))
}

/// Expands a compressed amount to `mantissa * 10^exponent`.
pub fn uncompress(amount: CompressedAmount) -> U256 {
	U256::from(amount.mantissa()) * U256::from(10u64).pow(U256::from(amount.exponent()))
}

/// Rounds `amount` down to the nearest value the wire can carry.
pub fn representable(amount: U256) -> Result<U256, CompressError> {
	compress(amount).map(uncompress)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn ether(n: u64) -> U256 {
		U256::from(n) * U256::from(10u64).pow(U256::from(18))
	}

	#[test]
	fn test_small_amounts_are_exact() {
		for x in [0u64, 1, 9, 10, 12_345, MAX_MANTISSA] {
			let c = compress(U256::from(x)).unwrap();
			assert_eq!(c.exponent(), 0);
			assert_eq!(uncompress(c), U256::from(x));
		}
	}

	#[test]
	fn test_round_ether_amounts_are_exact() {
		let amount = ether(100);
		let c = compress(amount).unwrap();
		assert_eq!(uncompress(c), amount);
		assert_eq!(c.exponent(), 3);
	}

	#[test]
	fn test_rounds_down() {
		let amount = U256::from(MAX_MANTISSA) + U256::from(7u64);
		let c = compress(amount).unwrap();
		assert_eq!(c.exponent(), 1);
		assert!(uncompress(c) < amount);
		assert_eq!(uncompress(c), amount / U256::from(10u64) * U256::from(10u64));
	}

	#[test]
	fn test_overflow_boundary() {
		let max = max_representable();
		assert_eq!(representable(max).unwrap(), max);
		assert_eq!(
			compress(max + U256::from(10u64).pow(U256::from(MAX_EXPONENT))),
			Err(CompressError::AmountTooLarge(
				max + U256::from(10u64).pow(U256::from(MAX_EXPONENT))
			))
		);
		assert!(compress(U256::MAX).is_err());
	}

	#[test]
	fn test_parts() {
		let c = CompressedAmount::from_parts(MAX_MANTISSA, MAX_EXPONENT).unwrap();
		assert_eq!(c.to_raw(), u64::MAX);
		assert_eq!(CompressedAmount::from_raw(u64::MAX), c);
		assert!(CompressedAmount::from_parts(MAX_MANTISSA + 1, 0).is_none());
		assert!(CompressedAmount::from_parts(1, MAX_EXPONENT + 1).is_none());
	}

	proptest! {
		#[test]
		fn prop_compression_is_bounded(base in any::<u128>(), shift in 0u32..=38) {
			let x = U256::from(base) * U256::from(10u64).pow(U256::from(shift));
			match compress(x) {
				Ok(c) => {
					let u = uncompress(c);
					prop_assert!(u <= x);
					if c.exponent() > 0 {
						// the mantissa keeps at least 16 significant digits
						prop_assert!(c.mantissa() >= 10u64.pow(16));
						prop_assert!((x - u) * U256::from(10u64).pow(U256::from(16)) < x);
					} else {
						prop_assert_eq!(u, x);
					}
				}
				Err(CompressError::AmountTooLarge(v)) => {
					prop_assert_eq!(v, x);
					prop_assert!(x > max_representable());
				}
			}
		}
	}
}
