//! Swap venues for the Styx settlement system.
//!
//! Two venue shapes exist. A [`SwapAdapter`] is handed its input up front and
//! sends the output to the recipient when `swap` is called. An
//! [`Aggregator`] is approved for the input and receives the instruction
//! payload verbatim, pulling and paying out as the payload directs.
//!
//! Implementations are created from TOML through named factories and are
//! looked up by the address they are deployed at.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use styx_ledger::{Ledger, LedgerError};
use styx_types::{ConfigSchema, ImplementationRegistry};
use thiserror::Error;

pub mod implementations {
	pub mod constant_product;
	pub mod fixed_rate;
	pub mod rfq;
}

#[derive(Debug, Error)]
pub enum AdapterError {
	#[error("Unsupported pair {token_in} -> {token_out}")]
	UnsupportedPair { token_in: Address, token_out: Address },
	#[error("Insufficient liquidity of {token}: have {available}, need {required}")]
	InsufficientLiquidity {
		token: Address,
		available: U256,
		required: U256,
	},
	#[error("Invalid payload: {0}")]
	InvalidPayload(String),
	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Venue failed: {0}")]
	Failed(String),
}

/// A swap the engine asks an adapter to perform. The input has already been
/// transferred to the adapter's target.
#[derive(Debug, Clone)]
pub struct SwapRequest {
	pub token_in: Address,
	pub token_out: Address,
	pub amount_in: U256,
	pub recipient: Address,
	pub payload: Bytes,
}

#[async_trait]
pub trait SwapAdapter: Send + Sync {
	/// Configuration name of the implementation.
	fn kind(&self) -> &str;

	/// Address the adapter is deployed at and holds its inventory under.
	fn target(&self) -> Address;

	/// Output for `amount_in` at the current state, without side effects.
	async fn quote(
		&self,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> Result<U256, AdapterError>;

	/// Sends the output to `request.recipient` and returns the amount sent.
	async fn swap(&self, request: &SwapRequest) -> Result<U256, AdapterError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

#[async_trait]
pub trait Aggregator: Send + Sync {
	fn kind(&self) -> &str;

	fn target(&self) -> Address;

	/// Executes `payload` on behalf of `caller`, who has approved the
	/// aggregator's target for the input.
	async fn forward(&self, caller: Address, payload: &Bytes) -> Result<(), AdapterError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

pub type AdapterFactory =
	fn(&toml::Value, &Arc<Ledger>) -> Result<Box<dyn SwapAdapter>, AdapterError>;

pub type AggregatorFactory =
	fn(&toml::Value, &Arc<Ledger>) -> Result<Box<dyn Aggregator>, AdapterError>;

pub trait AdapterRegistry: ImplementationRegistry<Factory = AdapterFactory> {}

pub trait AggregatorRegistry: ImplementationRegistry<Factory = AggregatorFactory> {}

pub fn get_all_adapter_implementations() -> Vec<(&'static str, AdapterFactory)> {
	use implementations::{constant_product, fixed_rate};

	vec![
		(fixed_rate::Registry::NAME, fixed_rate::Registry::factory()),
		(
			constant_product::Registry::NAME,
			constant_product::Registry::factory(),
		),
	]
}

pub fn get_all_aggregator_implementations() -> Vec<(&'static str, AggregatorFactory)> {
	use implementations::rfq;

	vec![(rfq::Registry::NAME, rfq::Registry::factory())]
}

/// Reads a required address field from an implementation's config table.
pub fn parse_address(config: &toml::Value, field: &str) -> Result<Address, AdapterError> {
	let raw = config
		.get(field)
		.and_then(|v| v.as_str())
		.ok_or_else(|| AdapterError::Configuration(format!("missing '{}'", field)))?;
	raw.parse()
		.map_err(|e| AdapterError::Configuration(format!("invalid '{}': {}", field, e)))
}

/// Fails unless `holder` has at least `required` of `token`.
pub(crate) async fn ensure_liquidity(
	ledger: &Ledger,
	token: Address,
	holder: Address,
	required: U256,
) -> Result<(), AdapterError> {
	let available = ledger.balance_of(token, holder).await;
	if available < required {
		return Err(AdapterError::InsufficientLiquidity {
			token,
			available,
			required,
		});
	}
	Ok(())
}

/// Deployed venues, keyed by target address.
#[derive(Default)]
pub struct VenueService {
	adapters: HashMap<Address, Arc<dyn SwapAdapter>>,
	aggregators: HashMap<Address, Arc<dyn Aggregator>>,
}

impl VenueService {
	pub fn new() -> Self {
		Self::default()
	}

	/// Deploys an adapter, replacing any venue already at its target.
	pub fn add_adapter(&mut self, adapter: Arc<dyn SwapAdapter>) {
		tracing::debug!(target_address = %adapter.target(), kind = adapter.kind(), "Adapter deployed");
		self.adapters.insert(adapter.target(), adapter);
	}

	pub fn add_aggregator(&mut self, aggregator: Arc<dyn Aggregator>) {
		tracing::debug!(target_address = %aggregator.target(), kind = aggregator.kind(), "Aggregator deployed");
		self.aggregators.insert(aggregator.target(), aggregator);
	}

	/// The adapter at `target`, if its implementation is `kind`.
	pub fn adapter_at(&self, target: Address, kind: &str) -> Option<Arc<dyn SwapAdapter>> {
		self.adapters
			.get(&target)
			.filter(|adapter| adapter.kind() == kind)
			.cloned()
	}

	pub fn aggregator_at(&self, target: Address) -> Option<Arc<dyn Aggregator>> {
		self.aggregators.get(&target).cloned()
	}

	pub fn adapter_count(&self) -> usize {
		self.adapters.len()
	}

	pub fn aggregator_count(&self) -> usize {
		self.aggregators.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::fixed_rate::FixedRateAdapter;

	#[test]
	fn test_factories_are_named() {
		let adapters: Vec<_> = get_all_adapter_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(adapters, vec!["fixed_rate", "constant_product"]);
		assert_eq!(get_all_aggregator_implementations()[0].0, "rfq");
	}

	#[test]
	fn test_lookup_checks_kind() {
		let ledger = Arc::new(Ledger::new(Address::repeat_byte(0xee)));
		let target = Address::repeat_byte(1);
		let mut venues = VenueService::new();
		venues.add_adapter(Arc::new(FixedRateAdapter::new(ledger, target, 1, 1)));

		assert!(venues.adapter_at(target, "fixed_rate").is_some());
		assert!(venues.adapter_at(target, "constant_product").is_none());
		assert!(venues.adapter_at(Address::repeat_byte(2), "fixed_rate").is_none());
		assert!(venues.aggregator_at(target).is_none());
	}

	#[test]
	fn test_parse_address() {
		let config = toml::Value::Table(
			toml::from_str::<toml::Table>(
				"target = \"0x1111111111111111111111111111111111111111\"\nbad = \"0x12\"",
			)
			.unwrap(),
		);
		assert_eq!(
			parse_address(&config, "target").unwrap(),
			Address::repeat_byte(0x11)
		);
		assert!(parse_address(&config, "bad").is_err());
		assert!(parse_address(&config, "missing").is_err());
	}
}
