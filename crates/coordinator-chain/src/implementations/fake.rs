//! Scripted, in-memory oracle implementations for tests.
//!
//! Configured at construction with exactly the answers a test wants a chain
//! to give; no RPC, no real EVM. Mirrors the in-memory storage backend's
//! idiom of a `RwLock`-guarded map standing in for an external system.

use crate::{
	ApprovalHashBuilder, ChainError, OrderBalancesAndAllowances, OrderDecoder, OrderRelevantState,
	OrderStateOracle, SignatureVerifier,
};
use async_trait::async_trait;
use coordinator_types::address::Digest32;
use coordinator_types::api::SignedMetaTx;
use coordinator_types::order::{DecodedCall, Order};
use coordinator_types::utils::{
	compute_coordinator_approval_struct_hash, compute_domain_hash, compute_final_digest,
	hash_meta_transaction, COORDINATOR_APPROVAL_DOMAIN_NAME,
};
use coordinator_types::Address;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

/// Scripted calldata decoder: returns whatever [`DecodedCall`] was registered
/// for a given `data` string, or an error for anything else.
pub struct FakeOrderDecoder {
	scripts: RwLock<HashMap<String, DecodedCall>>,
}

impl FakeOrderDecoder {
	pub fn new() -> Self {
		Self {
			scripts: RwLock::new(HashMap::new()),
		}
	}

	/// Registers the decoded call to return for a given calldata string.
	pub fn script(&self, data: &str, call: DecodedCall) {
		self.scripts.write().unwrap().insert(data.to_string(), call);
	}
}

impl Default for FakeOrderDecoder {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderDecoder for FakeOrderDecoder {
	async fn decode_calldata(&self, data: &str) -> Result<DecodedCall, ChainError> {
		self.scripts
			.read()
			.unwrap()
			.get(data)
			.cloned()
			.ok_or_else(|| ChainError::Decoding(format!("no script registered for {}", data)))
	}
}

/// Scripted order-state oracle: returns whatever fill amounts and
/// balance/allowance snapshots were registered per order hash, defaulting to
/// zero-filled and zero-balance for anything not explicitly scripted.
pub struct FakeOrderStateOracle {
	relevant_states: RwLock<HashMap<String, alloy_primitives::U256>>,
	balances: RwLock<HashMap<String, OrderBalancesAndAllowances>>,
}

impl FakeOrderStateOracle {
	pub fn new() -> Self {
		Self {
			relevant_states: RwLock::new(HashMap::new()),
			balances: RwLock::new(HashMap::new()),
		}
	}

	/// Scripts the on-chain filled amount reported for an order hash.
	pub fn script_filled_amount(&self, order_hash: &Digest32, amount: alloy_primitives::U256) {
		self.relevant_states
			.write()
			.unwrap()
			.insert(order_hash.as_str().to_string(), amount);
	}

	/// Scripts the balance/allowance snapshot returned for an order hash.
	pub fn script_balances(&self, snapshot: OrderBalancesAndAllowances) {
		self.balances
			.write()
			.unwrap()
			.insert(snapshot.order_hash.as_str().to_string(), snapshot);
	}
}

impl Default for FakeOrderStateOracle {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderStateOracle for FakeOrderStateOracle {
	async fn get_order_relevant_states(
		&self,
		orders: &[Order],
	) -> Result<Vec<OrderRelevantState>, ChainError> {
		let states = self.relevant_states.read().unwrap();
		Ok(orders
			.iter()
			.map(|order| {
				let order_hash = coordinator_types::utils::hash_order(order);
				let filled = states
					.get(order_hash.as_str())
					.copied()
					.unwrap_or(alloy_primitives::U256::ZERO);
				OrderRelevantState {
					order_hash,
					taker_asset_filled_amount: filled,
				}
			})
			.collect())
	}

	async fn get_batch_balances_and_allowances(
		&self,
		orders: &[Order],
	) -> Result<Vec<OrderBalancesAndAllowances>, ChainError> {
		let balances = self.balances.read().unwrap();
		Ok(orders
			.iter()
			.map(|order| {
				let order_hash = coordinator_types::utils::hash_order(order);
				balances
					.get(order_hash.as_str())
					.cloned()
					.unwrap_or(OrderBalancesAndAllowances {
						order_hash,
						maker_asset_balance: alloy_primitives::U256::ZERO,
						maker_asset_allowance: alloy_primitives::U256::ZERO,
						taker_asset_balance: alloy_primitives::U256::ZERO,
						taker_asset_allowance: alloy_primitives::U256::ZERO,
						maker_fee_balance: alloy_primitives::U256::ZERO,
						maker_fee_allowance: alloy_primitives::U256::ZERO,
						taker_fee_balance: alloy_primitives::U256::ZERO,
						taker_fee_allowance: alloy_primitives::U256::ZERO,
					})
			})
			.collect())
	}
}

/// Real EIP-712 approval hashing with no chain dependency; deterministic
/// crypto has no need of a script.
pub struct FakeApprovalHashBuilder {
	pub chain_id: u64,
}

#[async_trait]
impl ApprovalHashBuilder for FakeApprovalHashBuilder {
	async fn build_approval_hash(
		&self,
		meta_tx: &SignedMetaTx,
		tx_origin: &Address,
		coordinator_address: &Address,
		approval_expiration_time_seconds: u64,
	) -> Result<[u8; 32], ChainError> {
		let transaction_hash = hash_meta_transaction(meta_tx);
		let transaction_hash_bytes = transaction_hash
			.to_bytes()
			.map_err(|e| ChainError::Decoding(format!("bad transaction hash: {}", e)))?;

		let coordinator = alloy_primitives::Address::from_str(coordinator_address.as_str())
			.map_err(|e| ChainError::Configuration(format!("bad coordinator address: {}", e)))?;
		let origin = alloy_primitives::Address::from_str(tx_origin.as_str())
			.map_err(|e| ChainError::Decoding(format!("bad tx origin: {}", e)))?;

		let struct_hash = compute_coordinator_approval_struct_hash(
			&alloy_primitives::B256::from(transaction_hash_bytes),
			&origin,
			&coordinator,
			approval_expiration_time_seconds,
		);
		let domain_hash =
			compute_domain_hash(COORDINATOR_APPROVAL_DOMAIN_NAME, self.chain_id, &coordinator);
		let digest = compute_final_digest(&domain_hash, &struct_hash);
		Ok(digest.0)
	}
}

/// Scripted signature verifier: returns whatever verdict was registered for
/// a `(signer, digest, signature)` triple, defaulting to `true` so tests that
/// don't care about signature validity don't need to script every call.
pub struct FakeSignatureVerifier {
	verdicts: RwLock<HashMap<(String, String, String), bool>>,
}

impl FakeSignatureVerifier {
	pub fn new() -> Self {
		Self {
			verdicts: RwLock::new(HashMap::new()),
		}
	}

	pub fn script(&self, signer_address: &Address, meta_tx_hash: &Digest32, signature: &str, verdict: bool) {
		self.verdicts.write().unwrap().insert(
			(
				signer_address.as_str().to_string(),
				meta_tx_hash.as_str().to_string(),
				signature.to_string(),
			),
			verdict,
		);
	}
}

impl Default for FakeSignatureVerifier {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SignatureVerifier for FakeSignatureVerifier {
	async fn verify_meta_tx_signature(
		&self,
		signer_address: &Address,
		meta_tx_hash: &Digest32,
		signature: &str,
	) -> Result<bool, ChainError> {
		let key = (
			signer_address.as_str().to_string(),
			meta_tx_hash.as_str().to_string(),
			signature.to_string(),
		);
		Ok(self.verdicts.read().unwrap().get(&key).copied().unwrap_or(true))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;

	fn sample_order() -> Order {
		Order {
			sender_address: Address::new("0xcccccccccccccccccccccccccccccccccccccccc"),
			maker_address: Address::new("0x1111111111111111111111111111111111111111"),
			taker_address: Address::new("0x0000000000000000000000000000000000000000"),
			fee_recipient_address: Address::new("0x2222222222222222222222222222222222222222"),
			maker_asset_data: "0xf47261b0".to_string(),
			taker_asset_data: "0xf47261b0".to_string(),
			maker_fee_asset_data: "0x".to_string(),
			taker_fee_asset_data: "0x".to_string(),
			maker_asset_amount: U256::from(1_000u64),
			taker_asset_amount: U256::from(2_000u64),
			maker_fee: U256::ZERO,
			taker_fee: U256::ZERO,
			salt: U256::from(1u64),
			expiration_time_seconds: U256::from(9_999_999_999u64),
			exchange_address: Address::new("0x3333333333333333333333333333333333333333"),
			chain_id: 1,
		}
	}

	#[tokio::test]
	async fn unscripted_relevant_state_defaults_to_unfilled() {
		let oracle = FakeOrderStateOracle::new();
		let order = sample_order();
		let states = oracle.get_order_relevant_states(&[order]).await.unwrap();
		assert_eq!(states[0].taker_asset_filled_amount, U256::ZERO);
	}

	#[tokio::test]
	async fn scripted_relevant_state_is_returned() {
		let oracle = FakeOrderStateOracle::new();
		let order = sample_order();
		let order_hash = coordinator_types::utils::hash_order(&order);
		oracle.script_filled_amount(&order_hash, U256::from(500u64));
		let states = oracle.get_order_relevant_states(&[order]).await.unwrap();
		assert_eq!(states[0].taker_asset_filled_amount, U256::from(500u64));
	}

	#[tokio::test]
	async fn decoder_rejects_unscripted_calldata() {
		let decoder = FakeOrderDecoder::new();
		let err = decoder.decode_calldata("0xdeadbeef").await.unwrap_err();
		assert!(matches!(err, ChainError::Decoding(_)));
	}

	#[tokio::test]
	async fn unscripted_signature_verdict_defaults_true() {
		let verifier = FakeSignatureVerifier::new();
		let addr = Address::new("0x1111111111111111111111111111111111111111");
		let hash = Digest32::from_bytes([1u8; 32]);
		let ok = verifier.verify_meta_tx_signature(&addr, &hash, "0xsig").await.unwrap();
		assert!(ok);
	}

	#[tokio::test]
	async fn scripted_signature_verdict_is_honored() {
		let verifier = FakeSignatureVerifier::new();
		let addr = Address::new("0x1111111111111111111111111111111111111111");
		let hash = Digest32::from_bytes([1u8; 32]);
		verifier.script(&addr, &hash, "0xsig", false);
		let ok = verifier.verify_meta_tx_signature(&addr, &hash, "0xsig").await.unwrap();
		assert!(!ok);
	}
}
