//! Request-for-quote aggregator.
//!
//! The payload is an ABI-encoded `fillQuote` call. The maker, whose inventory
//! sits at the aggregator's target, pulls `sellAmount` from the caller under
//! the caller's allowance and pays `buyAmount` back, provided the quote is no
//! better for the taker than the maker's configured rate.

use crate::{ensure_liquidity, parse_address, AdapterError, Aggregator};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use std::sync::Arc;
use styx_ledger::Ledger;
use styx_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};

sol! {
	function fillQuote(address sellToken, address buyToken, uint256 sellAmount, uint256 buyAmount);
}

/// ABI-encodes a `fillQuote` payload.
pub fn encode_fill_quote(
	sell_token: Address,
	buy_token: Address,
	sell_amount: U256,
	buy_amount: U256,
) -> Bytes {
	fillQuoteCall {
		sellToken: sell_token,
		buyToken: buy_token,
		sellAmount: sell_amount,
		buyAmount: buy_amount,
	}
	.abi_encode()
	.into()
}

pub struct RfqAggregator {
	ledger: Arc<Ledger>,
	target: Address,
	numerator: U256,
	denominator: U256,
}

impl RfqAggregator {
	pub fn new(ledger: Arc<Ledger>, target: Address, numerator: u64, denominator: u64) -> Self {
		Self {
			ledger,
			target,
			numerator: U256::from(numerator),
			denominator: U256::from(denominator.max(1)),
		}
	}
}

#[async_trait]
impl Aggregator for RfqAggregator {
	fn kind(&self) -> &str {
		Registry::NAME
	}

	fn target(&self) -> Address {
		self.target
	}

	async fn forward(&self, caller: Address, payload: &Bytes) -> Result<(), AdapterError> {
		let call = fillQuoteCall::abi_decode(payload)
			.map_err(|e| AdapterError::InvalidPayload(e.to_string()))?;

		let max_buy = call
			.sellAmount
			.checked_mul(self.numerator)
			.map(|v| v / self.denominator)
			.ok_or_else(|| AdapterError::InvalidPayload("sell amount overflow".into()))?;
		if call.buyAmount > max_buy {
			return Err(AdapterError::Failed(format!(
				"quote {} exceeds maker rate {}",
				call.buyAmount, max_buy
			)));
		}
		ensure_liquidity(&self.ledger, call.buyToken, self.target, call.buyAmount).await?;

		self.ledger
			.transfer_from(call.sellToken, self.target, caller, self.target, call.sellAmount)
			.await?;
		self.ledger
			.transfer(call.buyToken, self.target, caller, call.buyAmount)
			.await?;

		tracing::debug!(
			%caller,
			sell_amount = %call.sellAmount,
			buy_amount = %call.buyAmount,
			"Filled RFQ quote"
		);
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RfqSchema)
	}
}

pub struct RfqSchema;

impl ConfigSchema for RfqSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let positive = || FieldType::Integer {
			min: Some(1),
			max: None,
		};
		Schema::new(
			vec![Field::new("target", FieldType::Address)],
			vec![
				Field::new("numerator", positive()),
				Field::new("denominator", positive()),
			],
		)
		.validate(config)
	}
}

/// Required configuration: `target`.
/// Optional: `numerator` / `denominator`, the best rate the maker fills at
/// (default 1/1).
pub fn create_aggregator(
	config: &toml::Value,
	ledger: &Arc<Ledger>,
) -> Result<Box<dyn Aggregator>, AdapterError> {
	RfqSchema
		.validate(config)
		.map_err(|e| AdapterError::Configuration(e.to_string()))?;
	let integer = |field: &str| {
		config
			.get(field)
			.and_then(|v| v.as_integer())
			.map(|v| v as u64)
			.unwrap_or(1)
	};
	Ok(Box::new(RfqAggregator::new(
		ledger.clone(),
		parse_address(config, "target")?,
		integer("numerator"),
		integer("denominator"),
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "rfq";
	type Factory = crate::AggregatorFactory;

	fn factory() -> Self::Factory {
		create_aggregator
	}
}

impl crate::AggregatorRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const WETH: Address = Address::repeat_byte(0xee);
	const MAKER: Address = Address::repeat_byte(0x4f);
	const SELL: Address = Address::repeat_byte(0x0a);
	const BUY: Address = Address::repeat_byte(0x0b);
	const ENGINE: Address = Address::repeat_byte(0xe0);

	async fn setup() -> (Arc<Ledger>, RfqAggregator) {
		let ledger = Arc::new(Ledger::new(WETH));
		ledger.mint(SELL, ENGINE, U256::from(100u64)).await.unwrap();
		ledger.mint(BUY, MAKER, U256::from(1_000u64)).await.unwrap();
		let aggregator = RfqAggregator::new(ledger.clone(), MAKER, 2, 1);
		(ledger, aggregator)
	}

	#[tokio::test]
	async fn test_fill_uses_allowance() {
		let (ledger, aggregator) = setup().await;
		ledger.approve(SELL, ENGINE, MAKER, U256::from(100u64)).await;

		let payload = encode_fill_quote(SELL, BUY, U256::from(100u64), U256::from(190u64));
		aggregator.forward(ENGINE, &payload).await.unwrap();

		assert_eq!(ledger.balance_of(SELL, MAKER).await, U256::from(100u64));
		assert_eq!(ledger.balance_of(BUY, ENGINE).await, U256::from(190u64));
		assert_eq!(ledger.allowance(SELL, ENGINE, MAKER).await, U256::ZERO);
	}

	#[tokio::test]
	async fn test_fill_without_allowance_fails() {
		let (_, aggregator) = setup().await;
		let payload = encode_fill_quote(SELL, BUY, U256::from(100u64), U256::from(190u64));
		assert!(matches!(
			aggregator.forward(ENGINE, &payload).await,
			Err(AdapterError::Ledger(_))
		));
	}

	#[tokio::test]
	async fn test_rejects_bad_payloads() {
		let (ledger, aggregator) = setup().await;
		ledger.approve(SELL, ENGINE, MAKER, U256::MAX).await;

		assert!(matches!(
			aggregator.forward(ENGINE, &Bytes::from(vec![1, 2, 3])).await,
			Err(AdapterError::InvalidPayload(_))
		));
		let greedy = encode_fill_quote(SELL, BUY, U256::from(100u64), U256::from(201u64));
		assert!(matches!(
			aggregator.forward(ENGINE, &greedy).await,
			Err(AdapterError::Failed(_))
		));
	}
}
