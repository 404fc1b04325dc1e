//! Fee and slippage arithmetic in basis points.

use alloy_primitives::U256;
use styx_types::{SlippageTier, BPS_DENOMINATOR};

/// Splits `amount` into `(fee, remainder)` with `fee = floor(amount * bps / 10000)`.
///
/// The product is formed from quotient and remainder so it cannot overflow
/// for any `U256` input and `bps <= 10000`.
pub fn split_fee(amount: U256, fee_bps: u16) -> (U256, U256) {
	let denominator = U256::from(BPS_DENOMINATOR);
	let bps = U256::from(fee_bps.min(BPS_DENOMINATOR));
	let fee = (amount / denominator) * bps + (amount % denominator) * bps / denominator;
	(fee, amount - fee)
}

/// Smallest output accepted for `requested` at `tier`:
/// `ceil(requested * (10000 - tolerance) / 10000)`.
pub fn min_amount_out(requested: U256, tier: SlippageTier) -> U256 {
	let denominator = U256::from(BPS_DENOMINATOR);
	let keep = U256::from(BPS_DENOMINATOR - tier.tolerance_bps());
	let whole = (requested / denominator) * keep;
	let part = (requested % denominator) * keep;
	whole + (part + denominator - U256::from(1u8)) / denominator
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn tier(value: u8) -> SlippageTier {
		SlippageTier::new(value).unwrap()
	}

	#[test]
	fn test_fee_exact() {
		let amount = U256::from(100u64) * U256::from(10u64).pow(U256::from(18u8));
		let (fee, rest) = split_fee(amount, 1000);
		assert_eq!(fee, U256::from(10u64) * U256::from(10u64).pow(U256::from(18u8)));
		assert_eq!(rest, U256::from(90u64) * U256::from(10u64).pow(U256::from(18u8)));
	}

	#[test]
	fn test_fee_rounds_down_and_handles_max() {
		assert_eq!(split_fee(U256::from(9999u64), 1), (U256::ZERO, U256::from(9999u64)));
		assert_eq!(split_fee(U256::from(10_001u64), 1).0, U256::from(1u8));

		let (fee, rest) = split_fee(U256::MAX, 10_000);
		assert_eq!(fee, U256::MAX);
		assert_eq!(rest, U256::ZERO);
		assert_eq!(split_fee(U256::MAX, 0), (U256::ZERO, U256::MAX));
	}

	#[test]
	fn test_min_out_rounds_up() {
		// 5% tier
		assert_eq!(min_amount_out(U256::from(200u64), tier(3)), U256::from(190u64));
		// 0.5% off 1001 leaves 995.995
		assert_eq!(min_amount_out(U256::from(1001u64), tier(0)), U256::from(996u64));
		assert_eq!(min_amount_out(U256::ZERO, tier(7)), U256::ZERO);
		assert!(min_amount_out(U256::MAX, tier(0)) < U256::MAX);
	}

	proptest! {
		#[test]
		fn prop_fee_matches_wide_formula(amount in any::<u128>(), bps in 0u16..=10_000) {
			let (fee, rest) = split_fee(U256::from(amount), bps);
			let expected = U256::from(amount) * U256::from(bps) / U256::from(10_000u16);
			prop_assert_eq!(fee, expected);
			prop_assert_eq!(fee + rest, U256::from(amount));
		}

		#[test]
		fn prop_min_out_matches_wide_formula(requested in any::<u128>(), t in 0u8..8) {
			let tier = tier(t);
			let keep = U256::from(10_000 - tier.tolerance_bps());
			let expected = (U256::from(requested) * keep + U256::from(9_999u16)) / U256::from(10_000u16);
			prop_assert_eq!(min_amount_out(U256::from(requested), tier), expected);
		}
	}
}
