//! Coordination engine for the coordinator server.
//!
//! [`Coordinator`] owns the per-chain registry, the Order and Transaction
//! stores, and the event bus, and drives the approval state machine for
//! every `request_transaction` and `soft_cancels` call. Construction goes
//! through [`CoordinatorBuilder`], which wires a storage backend and builds
//! one [`ChainBundle`] per configured chain before the coordinator ever
//! serves a request.

pub mod approval;
pub mod event_bus;
pub mod request_locks;

use coordinator_account::FeeRecipientKeyring;
use coordinator_chain::implementations::evm::alloy::{
	AlloyApprovalHashBuilder, AlloyChainOracle, AlloySignatureVerifier,
};
use coordinator_chain::{ChainBundle, ChainRegistry};
use coordinator_config::Config;
use coordinator_storage::{OrderStore, StorageService, TransactionStore};
use coordinator_types::api::ConfigurationResponse;
use coordinator_types::Address;
use event_bus::EventBus;
use request_locks::RequestLocks;
use std::collections::HashMap;
use thiserror::Error;

/// Channel capacity for each chain's event bus. Generous enough that a
/// WebSocket subscriber reading at a normal pace never drops an event under
/// ordinary load; a subscriber that falls this far behind is slow enough
/// that dropping its oldest events is the right tradeoff.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur while building a [`Coordinator`].
#[derive(Debug, Error)]
pub enum CoordinatorError {
	/// The configuration referenced an unknown or misconfigured resource.
	#[error("configuration error: {0}")]
	Config(String),
}

/// Owns every piece of shared state the approval state machine touches, and
/// the logic that drives it.
pub struct Coordinator {
	config: Config,
	chains: ChainRegistry,
	order_store: OrderStore,
	transaction_store: TransactionStore,
	event_bus: EventBus,
	request_locks: RequestLocks,
}

impl Coordinator {
	/// The shared event bus, for subscribing a new WebSocket listener.
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// The `GET /v2/configuration` response.
	pub fn configuration_response(&self) -> ConfigurationResponse {
		ConfigurationResponse {
			expiration_duration_seconds: self.config.expiration_duration_seconds,
			selective_delay_ms: self.config.selective_delay_ms,
			supported_chain_ids: self.chains.supported_chain_ids(),
		}
	}

	/// Whether `address` is on the taker-contract allowlist, whose fills are
	/// aggregated by `txOrigin` rather than by `takerAddress`.
	fn is_whitelisted_taker_contract(&self, address: &Address) -> bool {
		self.config
			.taker_contract_whitelist
			.iter()
			.any(|whitelisted| address.eq_ignore_case(&Address::new(whitelisted)))
	}
}

/// Builds a [`Coordinator`] from a [`Config`], wiring a storage backend
/// looked up from `coordinator-storage`'s implementation registry and one
/// live [`ChainBundle`] per configured chain.
pub struct CoordinatorBuilder {
	config: Config,
}

impl CoordinatorBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	fn build_storage(&self) -> Result<StorageService, CoordinatorError> {
		let primary = &self.config.storage.primary;
		let factory = coordinator_storage::get_all_implementations()
			.into_iter()
			.find(|(name, _)| name == primary)
			.map(|(_, factory)| factory)
			.ok_or_else(|| CoordinatorError::Config(format!("unknown storage backend '{}'", primary)))?;

		let backend_config = self.config.storage.implementations.get(primary).ok_or_else(|| {
			CoordinatorError::Config(format!("no configuration section for storage backend '{}'", primary))
		})?;

		let backend = factory(backend_config).map_err(|e| {
			CoordinatorError::Config(format!("failed to create storage backend '{}': {}", primary, e))
		})?;
		backend
			.config_schema()
			.validate(backend_config)
			.map_err(|e| CoordinatorError::Config(format!("invalid configuration for storage backend '{}': {}", primary, e)))?;

		Ok(StorageService::new(backend))
	}

	fn contract_address(
		chain_id: u64,
		addresses: &HashMap<String, String>,
		key: &str,
	) -> Result<Address, CoordinatorError> {
		addresses
			.get(key)
			.map(|s| Address::new(s))
			.ok_or_else(|| {
				CoordinatorError::Config(format!(
					"chain {} is missing contract_addresses.{}",
					chain_id, key
				))
			})
	}

	fn build_chain_bundle(
		chain_id: u64,
		settings: &coordinator_config::ChainSettingsConfig,
	) -> Result<ChainBundle, CoordinatorError> {
		let exchange_address = Self::contract_address(chain_id, &settings.contract_addresses, "exchange")?;
		let coordinator_address =
			Self::contract_address(chain_id, &settings.contract_addresses, "coordinator")?;

		let oracle = AlloyChainOracle::new(&settings.rpc_url, exchange_address.clone(), chain_id)
			.map_err(|e| CoordinatorError::Config(format!("chain {}: {}", chain_id, e)))?;

		let fee_recipients = FeeRecipientKeyring::from_configs(
			settings
				.fee_recipients
				.iter()
				.map(|fr| (fr.address.clone(), fr.private_key.clone())),
		)
		.map_err(|e| CoordinatorError::Config(format!("chain {} fee recipients: {}", chain_id, e)))?;

		if fee_recipients.is_empty() {
			return Err(CoordinatorError::Config(format!(
				"chain {} has no fee recipients configured",
				chain_id
			)));
		}

		Ok(ChainBundle {
			chain_id,
			exchange_address,
			coordinator_address,
			decoder: Box::new(oracle.clone()),
			oracle: Box::new(oracle),
			approval_hash_builder: Box::new(AlloyApprovalHashBuilder { chain_id }),
			signature_verifier: Box::new(AlloySignatureVerifier),
			fee_recipients,
		})
	}

	/// Builds the coordinator. Every configured chain must construct
	/// successfully; a misconfigured chain is a startup failure, not a
	/// skip-and-continue (unlike a solver's pluggable service registry, a
	/// coordinator serving the wrong set of chains is a correctness bug, not
	/// a degraded mode).
	pub fn build(self) -> Result<Coordinator, CoordinatorError> {
		let storage = self.build_storage()?;
		let order_store = OrderStore::new(storage.clone());
		let transaction_store = TransactionStore::new(storage);

		let mut chains = HashMap::new();
		for (chain_id, settings) in &self.config.chains {
			let bundle = Self::build_chain_bundle(*chain_id, settings)?;
			tracing::info!(chain_id = %chain_id, fee_recipients = %settings.fee_recipients.len(), "chain bundle loaded");
			chains.insert(*chain_id, bundle);
		}

		Ok(Coordinator {
			config: self.config,
			chains: ChainRegistry::new(chains),
			order_store,
			transaction_store,
			event_bus: EventBus::new(EVENT_BUS_CAPACITY),
			request_locks: RequestLocks::new(),
		})
	}
}
