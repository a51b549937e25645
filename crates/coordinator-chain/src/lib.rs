//! Chain registry and oracle capability traits for the coordinator server.
//!
//! The coordinator never submits its own transactions; the five oracle
//! capabilities here (decode, order state, balances/allowances, approval
//! hashing, signature verification) are everything it needs to read from and
//! reason about a chain before signing an approval. Each chain the
//! coordinator serves gets one immutable [`ChainBundle`], built once at
//! startup and looked up by chain id thereafter.

use alloy_primitives::U256;
use async_trait::async_trait;
use coordinator_account::FeeRecipientKeyring;
use coordinator_types::address::Digest32;
use coordinator_types::api::SignedMetaTx;
use coordinator_types::order::{DecodedCall, Order};
use coordinator_types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod fake;
}

/// Errors that can occur while consulting a chain's oracles.
#[derive(Debug, Error)]
pub enum ChainError {
	/// Error communicating with the chain's RPC endpoint.
	#[error("network error: {0}")]
	Network(String),
	/// Calldata did not decode as a recognized exchange function call.
	#[error("calldata decoding failed: {0}")]
	Decoding(String),
	/// Malformed or inconsistent chain configuration.
	#[error("chain configuration error: {0}")]
	Configuration(String),
	/// No chain bundle is registered under this chain id.
	#[error("unsupported chain id: {0}")]
	UnsupportedChain(u64),
}

/// On-chain fill state for a single order, as reported by the exchange
/// contract's own bookkeeping (independent of anything the coordinator has
/// granted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRelevantState {
	pub order_hash: Digest32,
	pub taker_asset_filled_amount: U256,
}

/// Balance and allowance snapshot for one order's maker and taker sides,
/// maker-asset-units and taker-asset-units alike, plus both fee assets.
///
/// Read fresh on every approval decision; the fill-allocation engine treats
/// this as a snapshot valid only for the duration of that one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBalancesAndAllowances {
	pub order_hash: Digest32,
	pub maker_asset_balance: U256,
	pub maker_asset_allowance: U256,
	pub taker_asset_balance: U256,
	pub taker_asset_allowance: U256,
	pub maker_fee_balance: U256,
	pub maker_fee_allowance: U256,
	pub taker_fee_balance: U256,
	pub taker_fee_allowance: U256,
}

/// Decodes a meta-transaction's `data` field into a recognized exchange
/// function call.
#[async_trait]
pub trait OrderDecoder: Send + Sync {
	async fn decode_calldata(&self, data: &str) -> Result<DecodedCall, ChainError>;
}

/// Reads order-relevant and balance/allowance state from the chain.
#[async_trait]
pub trait OrderStateOracle: Send + Sync {
	/// On-chain filled amount for each order, used to bound how much of an
	/// order the fill-allocation engine may still grant.
	async fn get_order_relevant_states(
		&self,
		orders: &[Order],
	) -> Result<Vec<OrderRelevantState>, ChainError>;

	/// Balance/allowance snapshot for each order, used to bound allocation by
	/// what the maker and (if bound) taker can actually settle.
	async fn get_batch_balances_and_allowances(
		&self,
		orders: &[Order],
	) -> Result<Vec<OrderBalancesAndAllowances>, ChainError>;
}

/// Builds the 32-byte digest a fee recipient signs to approve a
/// meta-transaction.
#[async_trait]
pub trait ApprovalHashBuilder: Send + Sync {
	async fn build_approval_hash(
		&self,
		meta_tx: &SignedMetaTx,
		tx_origin: &Address,
		coordinator_address: &Address,
		approval_expiration_time_seconds: u64,
	) -> Result<[u8; 32], ChainError>;
}

/// Verifies that a signature over a meta-transaction hash was produced by
/// the claimed signer.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
	async fn verify_meta_tx_signature(
		&self,
		signer_address: &Address,
		meta_tx_hash: &Digest32,
		signature: &str,
	) -> Result<bool, ChainError>;
}

/// The full set of capabilities and identities the coordinator needs for one
/// chain. Constructed once at startup; read-only for the life of the
/// process.
pub struct ChainBundle {
	pub chain_id: u64,
	pub exchange_address: Address,
	pub coordinator_address: Address,
	pub decoder: Box<dyn OrderDecoder>,
	pub oracle: Box<dyn OrderStateOracle>,
	pub approval_hash_builder: Box<dyn ApprovalHashBuilder>,
	pub signature_verifier: Box<dyn SignatureVerifier>,
	pub fee_recipients: FeeRecipientKeyring,
}

/// Maps chain ids to their [`ChainBundle`]s.
///
/// Populated once at startup from configuration and never mutated
/// afterward; every request handler reaches a chain's oracles only through
/// this lookup.
pub struct ChainRegistry {
	chains: HashMap<u64, Arc<ChainBundle>>,
}

impl ChainRegistry {
	pub fn new(chains: HashMap<u64, ChainBundle>) -> Self {
		Self {
			chains: chains
				.into_iter()
				.map(|(id, bundle)| (id, Arc::new(bundle)))
				.collect(),
		}
	}

	/// Looks up the bundle for a chain id, or `UnsupportedChain` if the
	/// coordinator was not configured to serve it.
	pub fn get(&self, chain_id: u64) -> Result<Arc<ChainBundle>, ChainError> {
		self.chains
			.get(&chain_id)
			.cloned()
			.ok_or(ChainError::UnsupportedChain(chain_id))
	}

	/// The chain ids this coordinator instance serves.
	pub fn supported_chain_ids(&self) -> Vec<u64> {
		self.chains.keys().copied().collect()
	}
}
