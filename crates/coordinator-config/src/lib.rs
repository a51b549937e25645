//! Configuration module for the coordinator server.
//!
//! This module provides structures and utilities for managing coordinator
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are properly set before the
//! coordinator starts handling requests.

pub mod builders;
pub mod loader;

pub use loader::ConfigLoader;

use coordinator_types::SecretString;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the coordinator.
///
/// Contains every section required for the coordinator to run: the HTTP
/// server, the approval state machine's timing parameters, the per-chain
/// registry, and the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// TCP port the HTTP server binds to.
	pub http_port: u16,
	/// Milliseconds to sleep between a fill request's pre-delay validation
	/// and its re-validation. May be 0.
	pub selective_delay_ms: u64,
	/// Seconds added to "now" to compute a granted approval's expiration.
	pub expiration_duration_seconds: u64,
	/// Per-chain settings, keyed by chain id.
	pub chains: HashMap<u64, ChainSettingsConfig>,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Taker addresses whose fill accounting is aggregated by `txOrigin`
	/// rather than by `takerAddress`.
	#[serde(default)]
	pub taker_contract_whitelist: Vec<String>,
}

/// A single chain's settings: RPC endpoint, fee-recipient keyring, and any
/// contract-address overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainSettingsConfig {
	/// JSON-RPC endpoint used for order-state reads and signature
	/// verification.
	pub rpc_url: String,
	/// Fee-recipient identities this coordinator instance holds on this
	/// chain.
	pub fee_recipients: Vec<FeeRecipientConfig>,
	/// Overrides for well-known contract addresses (exchange, asset
	/// proxies). Raw TOML so different chain implementations can define
	/// their own keys.
	#[serde(default)]
	pub contract_addresses: HashMap<String, String>,
}

/// A fee-recipient identity: an address and the private key that signs on
/// its behalf.
///
/// The address-matches-private-key invariant is checked by
/// `coordinator-account` at startup rather than here, since deriving an
/// address from a key requires a signing implementation this crate does
/// not depend on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeRecipientConfig {
	/// The fee-recipient's address as it appears on orders.
	pub address: String,
	/// Hex-encoded private key for this identity. Redacted in `Debug` and
	/// `Serialize` output; the raw bytes are zeroed on drop.
	pub private_key: SecretString,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	pub cleanup_interval_seconds: u64,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable
/// `VAR_NAME`. Supports default values with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(*start..*end, &value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file at the specified path.
	///
	/// Environment variables can be referenced using:
	/// - `${VAR_NAME}` - Required environment variable
	/// - `${VAR_NAME:-default}` - With default value if not set
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let resolved = resolve_env_vars(&content)?;
		resolved.parse()
	}

	/// Validates the configuration to ensure all required fields are
	/// properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"At least one chain must be configured".into(),
			));
		}

		for (chain_id, chain) in &self.chains {
			if chain.rpc_url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Chain {} must have an rpc_url",
					chain_id
				)));
			}
			if chain.fee_recipients.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Chain {} must have at least one fee recipient",
					chain_id
				)));
			}
			for fee_recipient in &chain.fee_recipients {
				if fee_recipient.address.is_empty() {
					return Err(ConfigError::Validation(format!(
						"Chain {} has a fee recipient with an empty address",
						chain_id
					)));
				}
				if fee_recipient.private_key.expose_secret().is_empty() {
					return Err(ConfigError::Validation(format!(
						"Chain {} has a fee recipient with an empty private key",
						chain_id
					)));
				}
			}
		}

		if self.expiration_duration_seconds == 0 {
			return Err(ConfigError::Validation(
				"expiration_duration_seconds must be greater than 0".into(),
			));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
