//! Constant-product pool adapter.
//!
//! Reserves are the target's ledger balances of the two pool tokens. The
//! engine transfers the input before calling `swap`, so the pre-trade input
//! reserve is the current balance minus `amount_in`.

use crate::{parse_address, AdapterError, SwapAdapter, SwapRequest};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use styx_ledger::Ledger;
use styx_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
	BPS_DENOMINATOR,
};

const DEFAULT_FEE_BPS: u16 = 30;

pub struct ConstantProductAdapter {
	ledger: Arc<Ledger>,
	target: Address,
	tokens: (Address, Address),
	fee_bps: u16,
}

impl ConstantProductAdapter {
	pub fn new(
		ledger: Arc<Ledger>,
		target: Address,
		tokens: (Address, Address),
		fee_bps: u16,
	) -> Self {
		Self {
			ledger,
			target,
			tokens,
			fee_bps: fee_bps.min(BPS_DENOMINATOR),
		}
	}

	fn check_pair(&self, token_in: Address, token_out: Address) -> Result<(), AdapterError> {
		let (a, b) = self.tokens;
		if (token_in, token_out) == (a, b) || (token_in, token_out) == (b, a) {
			Ok(())
		} else {
			Err(AdapterError::UnsupportedPair {
				token_in,
				token_out,
			})
		}
	}

	/// `reserve_out * in_after_fee / (reserve_in + in_after_fee)`.
	fn amount_out(
		&self,
		reserve_in: U256,
		reserve_out: U256,
		amount_in: U256,
	) -> Result<U256, AdapterError> {
		let denominator = U256::from(BPS_DENOMINATOR);
		let overflow = || AdapterError::Failed("reserve overflow".into());
		let in_after_fee = amount_in
			.checked_mul(U256::from(BPS_DENOMINATOR - self.fee_bps))
			.ok_or_else(overflow)?;
		let numerator = in_after_fee
			.checked_mul(reserve_out)
			.ok_or_else(overflow)?;
		let divisor = reserve_in
			.checked_mul(denominator)
			.and_then(|r| r.checked_add(in_after_fee))
			.ok_or_else(overflow)?;
		if divisor.is_zero() {
			return Ok(U256::ZERO);
		}
		Ok(numerator / divisor)
	}
}

#[async_trait]
impl SwapAdapter for ConstantProductAdapter {
	fn kind(&self) -> &str {
		Registry::NAME
	}

	fn target(&self) -> Address {
		self.target
	}

	async fn quote(
		&self,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> Result<U256, AdapterError> {
		self.check_pair(token_in, token_out)?;
		let reserve_in = self.ledger.balance_of(token_in, self.target).await;
		let reserve_out = self.ledger.balance_of(token_out, self.target).await;
		self.amount_out(reserve_in, reserve_out, amount_in)
	}

	async fn swap(&self, request: &SwapRequest) -> Result<U256, AdapterError> {
		self.check_pair(request.token_in, request.token_out)?;
		let balance_in = self.ledger.balance_of(request.token_in, self.target).await;
		let reserve_in = balance_in.checked_sub(request.amount_in).ok_or(
			AdapterError::InsufficientLiquidity {
				token: request.token_in,
				available: balance_in,
				required: request.amount_in,
			},
		)?;
		let reserve_out = self.ledger.balance_of(request.token_out, self.target).await;
		let amount_out = self.amount_out(reserve_in, reserve_out, request.amount_in)?;

		self.ledger
			.transfer(request.token_out, self.target, request.recipient, amount_out)
			.await?;
		tracing::debug!(
			%reserve_in,
			%reserve_out,
			amount_in = %request.amount_in,
			%amount_out,
			"Constant-product swap"
		);
		Ok(amount_out)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ConstantProductSchema)
	}
}

pub struct ConstantProductSchema;

impl ConfigSchema for ConstantProductSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new("target", FieldType::Address),
				Field::new("token_a", FieldType::Address),
				Field::new("token_b", FieldType::Address),
			],
			vec![Field::new(
				"fee_bps",
				FieldType::Integer {
					min: Some(0),
					max: Some(BPS_DENOMINATOR as i64 - 1),
				},
			)],
		)
		.validate(config)
	}
}

/// Required configuration: `target`, `token_a`, `token_b`.
/// Optional: `fee_bps` (default 30).
pub fn create_adapter(
	config: &toml::Value,
	ledger: &Arc<Ledger>,
) -> Result<Box<dyn SwapAdapter>, AdapterError> {
	ConstantProductSchema
		.validate(config)
		.map_err(|e| AdapterError::Configuration(e.to_string()))?;
	let fee_bps = config
		.get("fee_bps")
		.and_then(|v| v.as_integer())
		.map(|v| v as u16)
		.unwrap_or(DEFAULT_FEE_BPS);
	Ok(Box::new(ConstantProductAdapter::new(
		ledger.clone(),
		parse_address(config, "target")?,
		(
			parse_address(config, "token_a")?,
			parse_address(config, "token_b")?,
		),
		fee_bps,
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "constant_product";
	type Factory = crate::AdapterFactory;

	fn factory() -> Self::Factory {
		create_adapter
	}
}

impl crate::AdapterRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const WETH: Address = Address::repeat_byte(0xee);
	const POOL: Address = Address::repeat_byte(0x9f);
	const TOKEN_A: Address = Address::repeat_byte(0x0a);
	const TOKEN_B: Address = Address::repeat_byte(0x0b);
	const ENGINE: Address = Address::repeat_byte(0xe0);

	async fn pool(fee_bps: u16) -> (Arc<Ledger>, ConstantProductAdapter) {
		let ledger = Arc::new(Ledger::new(WETH));
		ledger.mint(TOKEN_A, POOL, U256::from(1_000u64)).await.unwrap();
		ledger.mint(TOKEN_B, POOL, U256::from(1_000u64)).await.unwrap();
		let adapter = ConstantProductAdapter::new(ledger.clone(), POOL, (TOKEN_A, TOKEN_B), fee_bps);
		(ledger, adapter)
	}

	#[tokio::test]
	async fn test_quote_without_fee() {
		let (_, adapter) = pool(0).await;
		// 1000 * 1000 / (1000 + 1000)
		assert_eq!(
			adapter.quote(TOKEN_A, TOKEN_B, U256::from(1_000u64)).await.unwrap(),
			U256::from(500u64)
		);
	}

	#[tokio::test]
	async fn test_swap_matches_quote_and_keeps_invariant() {
		let (ledger, adapter) = pool(30).await;
		let amount_in = U256::from(100u64);
		let quoted = adapter.quote(TOKEN_B, TOKEN_A, amount_in).await.unwrap();

		ledger.mint(TOKEN_B, ENGINE, amount_in).await.unwrap();
		ledger.transfer(TOKEN_B, ENGINE, POOL, amount_in).await.unwrap();
		let out = adapter
			.swap(&SwapRequest {
				token_in: TOKEN_B,
				token_out: TOKEN_A,
				amount_in,
				recipient: ENGINE,
				payload: Default::default(),
			})
			.await
			.unwrap();
		assert_eq!(out, quoted);
		assert_eq!(ledger.balance_of(TOKEN_A, ENGINE).await, out);

		let k_after = ledger.balance_of(TOKEN_A, POOL).await * ledger.balance_of(TOKEN_B, POOL).await;
		assert!(k_after >= U256::from(1_000_000u64));
	}

	#[tokio::test]
	async fn test_rejects_foreign_pair() {
		let (_, adapter) = pool(30).await;
		assert!(matches!(
			adapter.quote(TOKEN_A, WETH, U256::from(1u64)).await,
			Err(AdapterError::UnsupportedPair { .. })
		));
	}
}
