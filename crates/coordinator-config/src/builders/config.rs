//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing `Config` instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{ChainSettingsConfig, Config, FeeRecipientConfig, StorageConfig};
use coordinator_types::SecretString;
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Provides an easy way to create test configurations with sensible
/// defaults: a single chain with a single fee recipient, zero selective
/// delay, and an in-memory storage backend.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	http_port: u16,
	selective_delay_ms: u64,
	expiration_duration_seconds: u64,
	chains: HashMap<u64, ChainSettingsConfig>,
	storage_primary: String,
	storage_cleanup_interval_seconds: u64,
	taker_contract_whitelist: Vec<String>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for
	/// testing: chain id 1, fee recipient at a fixed test address, no
	/// selective delay.
	pub fn new() -> Self {
		let mut chains = HashMap::new();
		chains.insert(
			1,
			ChainSettingsConfig {
				rpc_url: "http://localhost:8545".to_string(),
				fee_recipients: vec![FeeRecipientConfig {
					address: "0x1234567890123456789012345678901234567890".to_string(),
					private_key: SecretString::from(
						"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8",
					),
				}],
				contract_addresses: HashMap::new(),
			},
		);
		Self {
			http_port: 3000,
			selective_delay_ms: 0,
			expiration_duration_seconds: 3600,
			chains,
			storage_primary: "memory".to_string(),
			storage_cleanup_interval_seconds: 60,
			taker_contract_whitelist: Vec::new(),
		}
	}

	/// Sets the HTTP port.
	pub fn http_port(mut self, port: u16) -> Self {
		self.http_port = port;
		self
	}

	/// Sets the selective delay, in milliseconds.
	pub fn selective_delay_ms(mut self, ms: u64) -> Self {
		self.selective_delay_ms = ms;
		self
	}

	/// Sets the approval expiration duration, in seconds.
	pub fn expiration_duration_seconds(mut self, seconds: u64) -> Self {
		self.expiration_duration_seconds = seconds;
		self
	}

	/// Replaces the chain registry entirely.
	pub fn chains(mut self, chains: HashMap<u64, ChainSettingsConfig>) -> Self {
		self.chains = chains;
		self
	}

	/// Sets the primary storage implementation name.
	pub fn storage_primary(mut self, primary: String) -> Self {
		self.storage_primary = primary;
		self
	}

	/// Sets the storage cleanup interval in seconds.
	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	/// Sets the taker-contract allowlist.
	pub fn taker_contract_whitelist(mut self, whitelist: Vec<String>) -> Self {
		self.taker_contract_whitelist = whitelist;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), toml::Value::Table(Default::default()));
		Config {
			http_port: self.http_port,
			selective_delay_ms: self.selective_delay_ms,
			expiration_duration_seconds: self.expiration_duration_seconds,
			chains: self.chains,
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			taker_contract_whitelist: self.taker_contract_whitelist,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_builder_produces_valid_config() {
		let config = ConfigBuilder::new().build();
		assert_eq!(config.chains.len(), 1);
		assert_eq!(config.storage.primary, "memory");
	}
}
