//! Adapter that pays out at a configured fixed rate from its own inventory.

use crate::{ensure_liquidity, parse_address, AdapterError, SwapAdapter, SwapRequest};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use styx_ledger::Ledger;
use styx_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};

/// Pays `amount_in * numerator / denominator` of any requested output token.
pub struct FixedRateAdapter {
	ledger: Arc<Ledger>,
	target: Address,
	numerator: U256,
	denominator: U256,
}

impl FixedRateAdapter {
	pub fn new(ledger: Arc<Ledger>, target: Address, numerator: u64, denominator: u64) -> Self {
		Self {
			ledger,
			target,
			numerator: U256::from(numerator),
			denominator: U256::from(denominator.max(1)),
		}
	}

	fn output_for(&self, amount_in: U256) -> Result<U256, AdapterError> {
		amount_in
			.checked_mul(self.numerator)
			.map(|scaled| scaled / self.denominator)
			.ok_or_else(|| AdapterError::Failed("rate overflow".into()))
	}
}

#[async_trait]
impl SwapAdapter for FixedRateAdapter {
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
		if token_in == token_out {
			return Err(AdapterError::UnsupportedPair {
				token_in,
				token_out,
			});
		}
		self.output_for(amount_in)
	}

	async fn swap(&self, request: &SwapRequest) -> Result<U256, AdapterError> {
		let amount_out = self
			.quote(request.token_in, request.token_out, request.amount_in)
			.await?;
		ensure_liquidity(&self.ledger, request.token_out, self.target, amount_out).await?;
		self.ledger
			.transfer(request.token_out, self.target, request.recipient, amount_out)
			.await?;
		tracing::debug!(
			amount_in = %request.amount_in,
			amount_out = %amount_out,
			"Fixed-rate swap"
		);
		Ok(amount_out)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FixedRateSchema)
	}
}

pub struct FixedRateSchema;

impl ConfigSchema for FixedRateSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let positive = || FieldType::Integer {
			min: Some(1),
			max: None,
		};
		Schema::new(
			vec![
				Field::new("target", FieldType::Address),
				Field::new("numerator", positive()),
				Field::new("denominator", positive()),
			],
			vec![],
		)
		.validate(config)
	}
}

/// Required configuration:
/// - `target`: address the adapter is deployed at
/// - `numerator`, `denominator`: output per unit of input
pub fn create_adapter(
	config: &toml::Value,
	ledger: &Arc<Ledger>,
) -> Result<Box<dyn SwapAdapter>, AdapterError> {
	FixedRateSchema
		.validate(config)
		.map_err(|e| AdapterError::Configuration(e.to_string()))?;
	let integer = |field: &str| {
		config
			.get(field)
			.and_then(|v| v.as_integer())
			.map(|v| v as u64)
			.unwrap_or(1)
	};
	Ok(Box::new(FixedRateAdapter::new(
		ledger.clone(),
		parse_address(config, "target")?,
		integer("numerator"),
		integer("denominator"),
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "fixed_rate";
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
	const TARGET: Address = Address::repeat_byte(0xad);
	const TOKEN_A: Address = Address::repeat_byte(0x0a);
	const TOKEN_B: Address = Address::repeat_byte(0x0b);
	const ENGINE: Address = Address::repeat_byte(0xe0);

	#[tokio::test]
	async fn test_swap_pays_from_inventory() {
		let ledger = Arc::new(Ledger::new(WETH));
		ledger.mint(TOKEN_B, TARGET, U256::from(1_000u64)).await.unwrap();
		let adapter = FixedRateAdapter::new(ledger.clone(), TARGET, 2, 1);

		assert_eq!(
			adapter.quote(TOKEN_A, TOKEN_B, U256::from(90u64)).await.unwrap(),
			U256::from(180u64)
		);
		let out = adapter
			.swap(&SwapRequest {
				token_in: TOKEN_A,
				token_out: TOKEN_B,
				amount_in: U256::from(90u64),
				recipient: ENGINE,
				payload: Default::default(),
			})
			.await
			.unwrap();
		assert_eq!(out, U256::from(180u64));
		assert_eq!(ledger.balance_of(TOKEN_B, ENGINE).await, U256::from(180u64));
	}

	#[tokio::test]
	async fn test_insufficient_inventory() {
		let ledger = Arc::new(Ledger::new(WETH));
		let adapter = FixedRateAdapter::new(ledger, TARGET, 1, 1);
		let result = adapter
			.swap(&SwapRequest {
				token_in: TOKEN_A,
				token_out: TOKEN_B,
				amount_in: U256::from(1u64),
				recipient: ENGINE,
				payload: Default::default(),
			})
			.await;
		assert!(matches!(
			result,
			Err(AdapterError::InsufficientLiquidity { .. })
		));
	}

	#[test]
	fn test_factory_validates_config() {
		let ledger = Arc::new(Ledger::new(WETH));
		let good = toml::Value::Table(
			toml::from_str::<toml::Table>(
				"target = \"0xadadadadadadadadadadadadadadadadadadadad\"\nnumerator = 3\ndenominator = 2",
			)
			.unwrap(),
		);
		let adapter = create_adapter(&good, &ledger).unwrap();
		assert_eq!(adapter.kind(), "fixed_rate");
		assert_eq!(adapter.target(), TARGET);

		let bad = toml::Value::Table(
			toml::from_str::<toml::Table>(
				"target = \"0xadadadadadadadadadadadadadadadadadadadad\"\nnumerator = 0\ndenominator = 2",
			)
			.unwrap(),
		);
		assert!(matches!(
			create_adapter(&bad, &ledger),
			Err(AdapterError::Configuration(_))
		));
	}
}
