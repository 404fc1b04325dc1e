//! Builder pattern for constructing swap engines.
//!
//! Composes a [`SwapEngine`] from configuration and named factories: the
//! primary storage backend, then the ledger genesis, the address table,
//! the permission registry, the signature-transfer authority and every
//! configured adapter and aggregator.

use crate::engine::{event_bus::EventBus, SwapEngine};
use std::collections::HashMap;
use std::sync::Arc;
use styx_adapters::{AdapterFactory, AggregatorFactory, VenueService};
use styx_config::Config;
use styx_ledger::Ledger;
use styx_permit::SignatureTransfer;
use styx_registry::{AdapterRegistration, AddressTable, InternTable, MemoryPermissions};
use styx_storage::{StorageFactory, StorageService};
use styx_types::NATIVE_ASSET;
use thiserror::Error;

/// Capacity of the engine's event channel.
const EVENT_CAPACITY: usize = 1000;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, keyed by implementation name.
#[derive(Default)]
pub struct StyxFactories {
	pub storage_factories: HashMap<String, StorageFactory>,
	pub adapter_factories: HashMap<String, AdapterFactory>,
	pub aggregator_factories: HashMap<String, AggregatorFactory>,
}

impl StyxFactories {
	/// Every implementation shipped with the workspace.
	pub fn all() -> Self {
		Self {
			storage_factories: collect(styx_storage::get_all_implementations()),
			adapter_factories: collect(styx_adapters::get_all_adapter_implementations()),
			aggregator_factories: collect(styx_adapters::get_all_aggregator_implementations()),
		}
	}
}

fn collect<F>(implementations: Vec<(&'static str, F)>) -> HashMap<String, F> {
	implementations
		.into_iter()
		.map(|(name, factory)| {
			tracing::debug!(implementation = name, "Registered factory");
			(name.to_string(), factory)
		})
		.collect()
}

/// Builder for constructing a SwapEngine with pluggable implementations.
pub struct SwapEngineBuilder {
	config: Config,
}

impl SwapEngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub async fn build(self, factories: StyxFactories) -> Result<SwapEngine, BuilderError> {
		let config = &self.config;

		let storage = self.build_storage(&factories)?;

		let ledger = Arc::new(Ledger::new(config.engine.wrapped_native));
		self.apply_genesis(&ledger).await?;

		let tokens = InternTable::load(storage.clone())
			.await
			.map_err(|e| BuilderError::Config(format!("Failed to load address table: {}", e)))?;
		for token in &config.registry.tokens {
			let index = tokens.register(*token).await.map_err(|e| {
				BuilderError::Config(format!("Failed to register token {}: {}", token, e))
			})?;
			tracing::debug!(%token, %index, "Interned token");
		}
		tracing::info!(component = "registry", entries = tokens.len().await, "Loaded");

		let permissions = Arc::new(MemoryPermissions::new());
		for keeper in &config.registry.keepers {
			permissions.set_keeper(*keeper, true).await;
		}

		let venues = self.build_venues(&factories, &ledger, &permissions).await?;

		let authority = SignatureTransfer::new(
			ledger.clone(),
			config.engine.chain_id,
			config.engine.permit2,
		);
		tracing::info!(
			component = "authority",
			chain_id = config.engine.chain_id,
			verifying_contract = %config.engine.permit2,
			"Loaded"
		);

		Ok(SwapEngine::new(
			config.engine.address,
			ledger,
			Arc::new(tokens),
			permissions,
			Arc::new(authority),
			Arc::new(venues),
			storage,
			EventBus::new(EVENT_CAPACITY),
		))
	}

	fn build_storage(&self, factories: &StyxFactories) -> Result<Arc<StorageService>, BuilderError> {
		let primary = &self.config.storage.primary;
		let settings = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
			})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", primary))
		})?;

		match factory(settings) {
			Ok(backend) => {
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				Ok(Arc::new(StorageService::new(backend)))
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary,
					error = %e,
					"Failed to create storage implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary, e
				)))
			},
		}
	}

	async fn apply_genesis(&self, ledger: &Ledger) -> Result<(), BuilderError> {
		let genesis = &self.config.ledger;
		for balance in &genesis.balances {
			let minted = if balance.token == NATIVE_ASSET {
				ledger.mint_native(balance.holder, balance.amount).await
			} else {
				ledger
					.mint(balance.token, balance.holder, balance.amount)
					.await
			};
			minted.map_err(|e| BuilderError::Config(format!("Invalid genesis balance: {}", e)))?;
		}
		for approval in &genesis.approvals {
			ledger
				.approve(
					approval.token,
					approval.owner,
					approval.spender,
					approval.amount,
				)
				.await;
		}
		tracing::info!(
			component = "ledger",
			balances = genesis.balances.len(),
			approvals = genesis.approvals.len(),
			"Loaded"
		);
		Ok(())
	}

	async fn build_venues(
		&self,
		factories: &StyxFactories,
		ledger: &Arc<Ledger>,
		permissions: &MemoryPermissions,
	) -> Result<VenueService, BuilderError> {
		let mut venues = VenueService::new();

		for venue in &self.config.adapters {
			let factory = factories.adapter_factories.get(&venue.kind).ok_or_else(|| {
				BuilderError::Config(format!("Unknown adapter implementation '{}'", venue.kind))
			})?;
			let adapter = factory(&venue.settings_value(), ledger).map_err(|e| {
				tracing::error!(component = "adapter", id = venue.id, kind = %venue.kind, error = %e, "Failed to create adapter");
				BuilderError::Config(format!("Failed to create adapter {}: {}", venue.id, e))
			})?;
			let registration = AdapterRegistration {
				target: adapter.target(),
				kind: venue.kind.clone(),
			};
			permissions
				.set_adapter(venue.id, Some(registration))
				.await
				.map_err(|e| BuilderError::Config(e.to_string()))?;
			tracing::info!(component = "adapter", id = venue.id, kind = %venue.kind, target = %adapter.target(), "Loaded");
			venues.add_adapter(Arc::from(adapter));
		}

		for venue in &self.config.aggregators {
			let factory = factories
				.aggregator_factories
				.get(&venue.kind)
				.ok_or_else(|| {
					BuilderError::Config(format!(
						"Unknown aggregator implementation '{}'",
						venue.kind
					))
				})?;
			let aggregator = factory(&venue.settings_value(), ledger).map_err(|e| {
				tracing::error!(component = "aggregator", id = venue.id, kind = %venue.kind, error = %e, "Failed to create aggregator");
				BuilderError::Config(format!("Failed to create aggregator {}: {}", venue.id, e))
			})?;
			permissions
				.set_aggregator(venue.id, Some(aggregator.target()))
				.await
				.map_err(|e| BuilderError::Config(e.to_string()))?;
			tracing::info!(component = "aggregator", id = venue.id, kind = %venue.kind, target = %aggregator.target(), "Loaded");
			venues.add_aggregator(Arc::from(aggregator));
		}

		tracing::info!(
			component = "venues",
			adapters = venues.adapter_count(),
			aggregators = venues.aggregator_count(),
			"Loaded"
		);
		Ok(venues)
	}
}
