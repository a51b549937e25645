//! The approval state machine: `requestApproval` and `listSoftCancelled`.
//!
//! `request_transaction` walks a signed meta-transaction through schema
//! validation, chain lookup, decoding, in-scope filtering, replay and
//! signature checks, and finally a class-specific dispatch to either the
//! cancel-family or the fill-family path. Everything here is read from and
//! written to the Order store, the Transaction store, and the event bus;
//! there is no other shared state.

use crate::Coordinator;
use alloy_primitives::U256;
use coordinator_chain::{ChainBundle, ChainError};
use coordinator_fill::FillCandidate;
use coordinator_storage::{FillKey, FindOptions, StorageError, TransactionStoreError};
use coordinator_types::address::Digest32;
use coordinator_types::api::{
	CoordinatorApiError, RequestTransactionRequest, RequestTransactionResponse, SoftCancelsRequest,
	SoftCancelsResponse,
};
use coordinator_types::events::CoordinatorEvent;
use coordinator_types::order::{DecodedCall, Order, OrderFill, TransactionRecord};
use coordinator_types::GeneralErrorCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_seconds() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the Unix epoch")
		.as_secs()
}

fn storage_err(e: StorageError) -> CoordinatorApiError {
	CoordinatorApiError::Configuration { reason: e.to_string() }
}

fn chain_err(e: ChainError) -> CoordinatorApiError {
	match e {
		ChainError::UnsupportedChain(chain_id) => CoordinatorApiError::UnsupportedChain { chain_id },
		ChainError::Decoding(_) => CoordinatorApiError::DecodingFailed,
		ChainError::Network(_) | ChainError::Configuration(_) => {
			CoordinatorApiError::Configuration { reason: e.to_string() }
		}
	}
}

/// A request's in-scope orders plus, for fill-one/fill-batch calls, the
/// caller-supplied fill amounts filtered to the same subset.
struct InScope {
	orders: Vec<Order>,
	taker_asset_fill_amounts: Option<Vec<U256>>,
}

fn filter_in_scope(chain: &ChainBundle, decoded: &DecodedCall) -> InScope {
	let mask: Vec<bool> = decoded
		.orders
		.iter()
		.map(|order| chain.fee_recipients.holds(&order.fee_recipient_address))
		.collect();

	let orders = decoded
		.orders
		.iter()
		.zip(&mask)
		.filter(|(_, in_scope)| **in_scope)
		.map(|(order, _)| order.clone())
		.collect();

	let taker_asset_fill_amounts = decoded.taker_asset_fill_amounts.as_ref().map(|amounts| {
		amounts
			.iter()
			.zip(&mask)
			.filter(|(_, in_scope)| **in_scope)
			.map(|(amount, _)| *amount)
			.collect()
	});

	InScope { orders, taker_asset_fill_amounts }
}

async fn build_candidates(
	chain: &ChainBundle,
	orders: &[Order],
) -> Result<Vec<FillCandidate>, CoordinatorApiError> {
	let relevant = chain
		.oracle
		.get_order_relevant_states(orders)
		.await
		.map_err(chain_err)?;
	let balances = chain
		.oracle
		.get_batch_balances_and_allowances(orders)
		.await
		.map_err(chain_err)?;

	Ok(orders
		.iter()
		.zip(relevant)
		.zip(balances)
		.map(|((order, relevant), balances)| FillCandidate {
			order: order.clone(),
			order_hash: relevant.order_hash,
			on_chain_filled: relevant.taker_asset_filled_amount,
			balances,
		})
		.collect())
}

/// Picks which identity a fill's accounting is keyed by: the allowlisted
/// smart-contract wallet's declared origin, or the taker itself.
fn fill_key<'a>(
	coordinator: &Coordinator,
	signer_address: &'a coordinator_types::Address,
	tx_origin: &'a coordinator_types::Address,
) -> FillKey<'a> {
	if coordinator.is_whitelisted_taker_contract(signer_address) {
		FillKey::TxOrigin(tx_origin)
	} else {
		FillKey::Taker(signer_address)
	}
}

/// Approval Signer (§4.4): dedupes in-scope orders' fee recipients,
/// preserving first-seen order, signs the given digest with each, and
/// returns the signatures in that same order.
async fn sign_for_fee_recipients(
	chain: &ChainBundle,
	orders: &[Order],
	digest: &[u8; 32],
) -> Result<Vec<String>, CoordinatorApiError> {
	let mut seen = Vec::new();
	for order in orders {
		if !seen.contains(&order.fee_recipient_address) {
			seen.push(order.fee_recipient_address.clone());
		}
	}

	let mut signatures = Vec::with_capacity(seen.len());
	for recipient in &seen {
		let signature = chain
			.fee_recipients
			.sign(recipient, digest)
			.await
			.map_err(|e| CoordinatorApiError::Configuration { reason: e.to_string() })?;
		signatures.push(signature);
	}
	Ok(signatures)
}

impl Coordinator {
	/// `POST /v2/request_transaction?chainId=<url_chain_id>`.
	pub async fn request_transaction(
		&self,
		url_chain_id: u64,
		request: RequestTransactionRequest,
	) -> Result<RequestTransactionResponse, CoordinatorApiError> {
		// S1: schema validation beyond what serde already enforces. The
		// meta-transaction's own domain must agree with the chain the
		// caller is addressing; a mismatch here is ambiguous enough that
		// rejecting rather than guessing is the right call.
		if request.signed_transaction.domain.chain_id != url_chain_id {
			return Err(CoordinatorApiError::SchemaViolation {
				field: "signedTransaction.domain.chainId".to_string(),
				code: GeneralErrorCode::IncorrectFormat,
				reason: "domain.chainId does not match the chainId query parameter".to_string(),
			});
		}

		// S2
		let chain = self.chains.get(url_chain_id).map_err(chain_err)?;

		// S3
		let decoded = chain
			.decoder
			.decode_calldata(&request.signed_transaction.data)
			.await
			.map_err(chain_err)?;

		// S5
		let in_scope = filter_in_scope(&chain, &decoded);
		if in_scope.orders.is_empty() {
			return Err(CoordinatorApiError::NoCoordinatorOrdersIncluded);
		}

		// S6
		let transaction_hash = coordinator_types::utils::hash_meta_transaction(&request.signed_transaction);
		if self
			.transaction_store
			.find_by_hash(&transaction_hash)
			.await
			.map_err(storage_err)?
			.is_some()
		{
			return Err(CoordinatorApiError::TransactionAlreadyUsed);
		}

		// S7
		let signature_valid = chain
			.signature_verifier
			.verify_meta_tx_signature(
				&request.signed_transaction.signer_address,
				&transaction_hash,
				&request.signed_transaction.signature,
			)
			.await
			.map_err(chain_err)?;
		if !signature_valid {
			return Err(CoordinatorApiError::InvalidMetaTxSignature);
		}

		// S8
		if decoded.class.is_cancel() {
			self.handle_cancel(&chain, &request, &decoded.function_name, in_scope, transaction_hash)
				.await
		} else {
			self.handle_fill(&chain, &request, &decoded, in_scope, transaction_hash).await
		}
	}

	async fn handle_cancel(
		&self,
		chain: &Arc<ChainBundle>,
		request: &RequestTransactionRequest,
		function_name: &str,
		in_scope: InScope,
		transaction_hash: Digest32,
	) -> Result<RequestTransactionResponse, CoordinatorApiError> {
		let signer = &request.signed_transaction.signer_address;
		for order in &in_scope.orders {
			if !order.maker_address.eq_ignore_case(signer) {
				return Err(CoordinatorApiError::OnlyMakerMayCancel);
			}
		}

		let order_hashes: Vec<Digest32> = in_scope
			.orders
			.iter()
			.map(coordinator_storage::OrderStore::hash_of)
			.collect();

		for order_hash in &order_hashes {
			self.order_store.soft_cancel(order_hash).await.map_err(storage_err)?;
		}

		self.event_bus
			.publish(
				chain.chain_id,
				CoordinatorEvent::CancelRequestAccepted {
					order_hashes: order_hashes.clone(),
					tx_origin: request.tx_origin.clone(),
					transaction_hash: transaction_hash.clone(),
				},
			)
			.ok();

		let outstanding = self
			.transaction_store
			.find_by_orders_and_taker(&order_hashes, None, FindOptions { unexpired_only: true }, now_seconds())
			.await
			.map_err(storage_err)?;

		let relevant: std::collections::HashSet<Digest32> = order_hashes.iter().cloned().collect();
		let mut outstanding_fill_signatures = Vec::new();
		for record in &outstanding {
			for fill in &record.order_fills {
				if relevant.contains(&fill.order_hash) {
					outstanding_fill_signatures.push(coordinator_types::api::OutstandingFillSignature {
						order_hash: fill.order_hash.clone(),
						approval_signatures: record.signatures.clone(),
						expiration_time_seconds: record.expiration_time_seconds,
						taker_asset_fill_amount: fill.taker_asset_fill_amount,
					});
				}
			}
		}

		let digest = chain
			.approval_hash_builder
			.build_approval_hash(&request.signed_transaction, &request.tx_origin, &chain.coordinator_address, 0)
			.await
			.map_err(chain_err)?;
		let cancellation_signatures = sign_for_fee_recipients(chain, &in_scope.orders, &digest).await?;

		let record = TransactionRecord {
			transaction_hash,
			tx_origin: request.tx_origin.clone(),
			taker_address: signer.clone(),
			signatures: cancellation_signatures.clone(),
			expiration_time_seconds: 0,
			order_fills: order_hashes
				.iter()
				.map(|h| OrderFill { order_hash: h.clone(), taker_asset_fill_amount: U256::ZERO })
				.collect(),
			created_at: now_seconds(),
		};
		self.transaction_store.create(&record).await.map_err(|e| match e {
			TransactionStoreError::AlreadyExists => {
				CoordinatorApiError::Configuration { reason: "cancel acknowledgement already recorded".to_string() }
			}
			TransactionStoreError::Storage(e) => storage_err(e),
		})?;

		tracing::info!(function = %function_name, orders = %order_hashes.len(), "cancel request accepted");

		Ok(RequestTransactionResponse::cancel(outstanding_fill_signatures, cancellation_signatures))
	}

	async fn handle_fill(
		&self,
		chain: &Arc<ChainBundle>,
		request: &RequestTransactionRequest,
		decoded: &DecodedCall,
		in_scope: InScope,
		transaction_hash: Digest32,
	) -> Result<RequestTransactionResponse, CoordinatorApiError> {
		let signer = &request.signed_transaction.signer_address;

		// S8a
		let candidates = build_candidates(chain, &in_scope.orders).await?;
		let fills = coordinator_fill::allocate(
			decoded.class,
			&candidates,
			in_scope.taker_asset_fill_amounts.as_deref(),
			decoded.market_sell_taker_asset_amount,
			decoded.market_buy_maker_asset_amount,
		)
		.map_err(|e| CoordinatorApiError::Configuration { reason: format!("fill allocation: {}", e) })?;

		let order_hashes: Vec<Digest32> = candidates.iter().map(|c| c.order_hash.clone()).collect();
		let amount_by_hash: HashMap<Digest32, U256> =
			candidates.iter().map(|c| (c.order_hash.clone(), c.order.taker_asset_amount)).collect();

		let key = fill_key(self, signer, &request.tx_origin);
		let lock_key = match key {
			FillKey::Taker(a) => a.as_str().to_string(),
			FillKey::TxOrigin(a) => a.as_str().to_string(),
		};
		let mutex = self.request_locks.mutex_for(chain.chain_id, &lock_key);
		let _guard = mutex.lock().await;

		self.validate_fills(&order_hashes, &fills, &amount_by_hash, key).await?;

		// S8c
		self.event_bus
			.publish(chain.chain_id, CoordinatorEvent::FillRequestReceived { transaction_hash: transaction_hash.clone() })
			.ok();

		// S8d
		if self.config.selective_delay_ms > 0 {
			tokio::time::sleep(std::time::Duration::from_millis(self.config.selective_delay_ms)).await;
			// S8e
			self.validate_fills(&order_hashes, &fills, &amount_by_hash, key).await?;
		}

		// S8f
		let now = now_seconds();
		let approval_expiration = now + self.config.expiration_duration_seconds;
		if request.signed_transaction.expiration_time_seconds > U256::from(approval_expiration) {
			return Err(CoordinatorApiError::TransactionExpirationTooHigh);
		}

		// S8g
		let digest = chain
			.approval_hash_builder
			.build_approval_hash(&request.signed_transaction, &request.tx_origin, &chain.coordinator_address, approval_expiration)
			.await
			.map_err(chain_err)?;
		let signatures = sign_for_fee_recipients(chain, &in_scope.orders, &digest).await?;

		let record = TransactionRecord {
			transaction_hash: transaction_hash.clone(),
			tx_origin: request.tx_origin.clone(),
			taker_address: signer.clone(),
			signatures: signatures.clone(),
			expiration_time_seconds: approval_expiration,
			order_fills: fills.clone(),
			created_at: now,
		};
		self.transaction_store.create(&record).await.map_err(|e| match e {
			TransactionStoreError::AlreadyExists => {
				CoordinatorApiError::Configuration { reason: "transaction hash already recorded".to_string() }
			}
			TransactionStoreError::Storage(e) => storage_err(e),
		})?;

		self.event_bus
			.publish(
				chain.chain_id,
				CoordinatorEvent::FillRequestAccepted {
					function_name: decoded.function_name.clone(),
					orders: in_scope.orders.clone(),
					tx_origin: request.tx_origin.clone(),
					signed_transaction: request.signed_transaction.clone(),
					approval_signatures: signatures.clone(),
					approval_expiration_time_seconds: approval_expiration,
				},
			)
			.ok();

		Ok(RequestTransactionResponse::fill(signatures, approval_expiration))
	}

	/// Pre-delay (S8b) and post-delay (S8e) validation: no in-scope order may
	/// be soft-cancelled, and no order's cumulative fill under this taker key
	/// may exceed its `takerAssetAmount` (I4).
	async fn validate_fills(
		&self,
		order_hashes: &[Digest32],
		fills: &[OrderFill],
		amount_by_hash: &HashMap<Digest32, U256>,
		key: FillKey<'_>,
	) -> Result<(), CoordinatorApiError> {
		let soft_cancelled = self.order_store.find_soft_cancelled(order_hashes).await.map_err(storage_err)?;

		let sums = self
			.transaction_store
			.per_order_fill_sum(order_hashes, key, FindOptions { unexpired_only: true }, now_seconds())
			.await
			.map_err(storage_err)?;

		let mut exceeded = Vec::new();
		for fill in fills {
			let previous = sums.get(&fill.order_hash).copied().unwrap_or(U256::ZERO);
			let limit = amount_by_hash.get(&fill.order_hash).copied().unwrap_or(U256::ZERO);
			if previous.saturating_add(fill.taker_asset_fill_amount) > limit {
				exceeded.push(fill.order_hash.clone());
			}
		}

		if !soft_cancelled.is_empty() || !exceeded.is_empty() {
			return Err(CoordinatorApiError::FillNotAllowed { soft_cancelled, exceeded });
		}
		Ok(())
	}

	/// `POST /v2/soft_cancels?chainId=<chain_id>`: a pure read from the Order
	/// store, not a mutation.
	pub async fn soft_cancels(
		&self,
		chain_id: u64,
		request: SoftCancelsRequest,
	) -> Result<SoftCancelsResponse, CoordinatorApiError> {
		self.chains.get(chain_id).map_err(chain_err)?;
		let order_hashes = self
			.order_store
			.find_soft_cancelled(&request.order_hashes)
			.await
			.map_err(storage_err)?;
		Ok(SoftCancelsResponse { order_hashes })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event_bus::EventBus;
	use crate::request_locks::RequestLocks;
	use alloy_signer::Signer;
	use alloy_signer_local::PrivateKeySigner;
	use coordinator_account::FeeRecipientKeyring;
	use coordinator_chain::implementations::fake::{
		FakeApprovalHashBuilder, FakeOrderDecoder, FakeOrderStateOracle, FakeSignatureVerifier,
	};
	use coordinator_chain::{ChainRegistry, OrderBalancesAndAllowances};
	use coordinator_config::ConfigBuilder;
	use coordinator_storage::implementations::memory::MemoryStorage;
	use coordinator_storage::{OrderStore, TransactionStore};
	use coordinator_types::api::{SignedMetaTx, SignedMetaTxDomain};
	use coordinator_types::SecretString;
	use coordinator_types::order::FunctionClass;
	use coordinator_types::Address;
	use std::time::Duration;

	const CHAIN_ID: u64 = 1;
	const EXCHANGE: &str = "0x3333333333333333333333333333333333333333";
	const COORDINATOR_ADDR: &str = "0x9999999999999999999999999999999999999999";
	// Arbitrary secp256k1 scalars used only to exercise signing and address
	// derivation; not tied to any funded account.
	const FEE_RECIPIENT_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690";
	const OTHER_FEE_RECIPIENT_KEY: &str = "0x47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926";
	const MAKER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff8";
	const TAKER_ADDRESS: &str = "0x4444444444444444444444444444444444444444";
	const ORIGIN_ADDRESS: &str = "0x5555555555555555555555555555555555555555";

	fn derive_address(key: &str) -> Address {
		let signer: PrivateKeySigner = key.parse().unwrap();
		Address::new(signer.address().to_string())
	}

	fn sample_order(maker: &Address, fee_recipient: &Address, salt: u64, maker_amount: u64, taker_amount: u64) -> Order {
		Order {
			sender_address: Address::new(COORDINATOR_ADDR),
			maker_address: maker.clone(),
			taker_address: Address::new("0x0000000000000000000000000000000000000000"),
			fee_recipient_address: fee_recipient.clone(),
			maker_asset_data: "0xf47261b0".to_string(),
			taker_asset_data: "0xf47261b0".to_string(),
			maker_fee_asset_data: "0x".to_string(),
			taker_fee_asset_data: "0x".to_string(),
			maker_asset_amount: U256::from(maker_amount),
			taker_asset_amount: U256::from(taker_amount),
			maker_fee: U256::ZERO,
			taker_fee: U256::ZERO,
			salt: U256::from(salt),
			expiration_time_seconds: U256::from(9_999_999_999u64),
			exchange_address: Address::new(EXCHANGE),
			chain_id: CHAIN_ID,
		}
	}

	fn unlimited_balances(order_hash: Digest32) -> OrderBalancesAndAllowances {
		OrderBalancesAndAllowances {
			order_hash,
			maker_asset_balance: U256::MAX,
			maker_asset_allowance: U256::MAX,
			taker_asset_balance: U256::MAX,
			taker_asset_allowance: U256::MAX,
			maker_fee_balance: U256::ZERO,
			maker_fee_allowance: U256::ZERO,
			taker_fee_balance: U256::ZERO,
			taker_fee_allowance: U256::ZERO,
		}
	}

	fn meta_tx(data: &str, signer: &Address, salt: u64, expiration: u64) -> SignedMetaTx {
		SignedMetaTx {
			signer_address: signer.clone(),
			salt: U256::from(salt),
			expiration_time_seconds: U256::from(expiration),
			gas_price: U256::ZERO,
			data: data.to_string(),
			domain: SignedMetaTxDomain { chain_id: CHAIN_ID, verifying_contract: Address::new(EXCHANGE) },
			signature: "0xsig".to_string(),
		}
	}

	fn request(data: &str, signer: &Address, salt: u64, expiration: u64) -> RequestTransactionRequest {
		RequestTransactionRequest {
			signed_transaction: meta_tx(data, signer, salt, expiration),
			tx_origin: Address::new(ORIGIN_ADDRESS),
		}
	}

	/// Builds a `Coordinator` by hand from scripted chain doubles, bypassing
	/// `CoordinatorBuilder` entirely (it only wires live `Alloy*`
	/// implementations).
	fn build_coordinator(
		decoder: FakeOrderDecoder,
		oracle: FakeOrderStateOracle,
		verifier: FakeSignatureVerifier,
		selective_delay_ms: u64,
	) -> Coordinator {
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let other_fee_recipient = derive_address(OTHER_FEE_RECIPIENT_KEY);
		let fee_recipients = FeeRecipientKeyring::from_configs([
			(fee_recipient.as_str().to_string(), SecretString::from(FEE_RECIPIENT_KEY)),
			(
				other_fee_recipient.as_str().to_string(),
				SecretString::from(OTHER_FEE_RECIPIENT_KEY),
			),
		])
		.unwrap();

		let bundle = ChainBundle {
			chain_id: CHAIN_ID,
			exchange_address: Address::new(EXCHANGE),
			coordinator_address: Address::new(COORDINATOR_ADDR),
			decoder: Box::new(decoder),
			oracle: Box::new(oracle),
			approval_hash_builder: Box::new(FakeApprovalHashBuilder { chain_id: CHAIN_ID }),
			signature_verifier: Box::new(verifier),
			fee_recipients,
		};
		let mut chains = HashMap::new();
		chains.insert(CHAIN_ID, bundle);

		let storage = coordinator_storage::StorageService::new(Box::new(MemoryStorage::new()));
		let config = ConfigBuilder::new()
			.selective_delay_ms(selective_delay_ms)
			.expiration_duration_seconds(3600)
			.build();

		Coordinator {
			config,
			chains: ChainRegistry::new(chains),
			order_store: OrderStore::new(storage.clone()),
			transaction_store: TransactionStore::new(storage),
			event_bus: EventBus::new(16),
			request_locks: RequestLocks::new(),
		}
	}

	#[tokio::test]
	async fn fill_one_happy_path_grants_one_signature_per_fee_recipient() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order.clone()],
				taker_asset_fill_amounts: Some(vec![U256::from(500u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);

		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		let response = coordinator
			.request_transaction(CHAIN_ID, request("0xfill1", &taker, 1, 100))
			.await
			.unwrap();

		assert_eq!(response.signatures.unwrap().len(), 1);
		assert_eq!(response.expiration_time_seconds.unwrap(), 3600);
	}

	#[tokio::test]
	async fn fill_request_accepted_event_carries_the_full_signed_transaction() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order.clone()],
				taker_asset_fill_amounts: Some(vec![U256::from(500u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);

		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		let mut events = coordinator.event_bus.subscribe(CHAIN_ID);
		let sent_request = request("0xfill1", &taker, 1, 100);

		coordinator
			.request_transaction(CHAIN_ID, sent_request.clone())
			.await
			.unwrap();

		loop {
			match events.recv().await.unwrap() {
				CoordinatorEvent::FillRequestAccepted { signed_transaction, .. } => {
					assert_eq!(signed_transaction.data, sent_request.signed_transaction.data);
					assert_eq!(signed_transaction.signature, sent_request.signed_transaction.signature);
					break;
				}
				_ => continue,
			}
		}
	}

	#[tokio::test]
	async fn batch_touching_two_fee_recipients_yields_two_signatures() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let other_fee_recipient = derive_address(OTHER_FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);

		let order_a = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_b = sample_order(&maker, &other_fee_recipient, 2, 1_000, 2_000);
		let hash_a = OrderStore::hash_of(&order_a);
		let hash_b = OrderStore::hash_of(&order_b);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xbatch1",
			DecodedCall {
				function_name: "batchFillOrders".to_string(),
				class: FunctionClass::FillBatch,
				orders: vec![order_a, order_b],
				taker_asset_fill_amounts: Some(vec![U256::from(500u64), U256::from(500u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);

		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(hash_a));
		oracle.script_balances(unlimited_balances(hash_b));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		let response = coordinator
			.request_transaction(CHAIN_ID, request("0xbatch1", &taker, 1, 100))
			.await
			.unwrap();

		assert_eq!(response.signatures.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn replayed_meta_transaction_is_rejected() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order],
				taker_asset_fill_amounts: Some(vec![U256::from(100u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		let req = request("0xfill1", &taker, 1, 100);
		coordinator.request_transaction(CHAIN_ID, req.clone()).await.unwrap();

		let err = coordinator.request_transaction(CHAIN_ID, req).await.unwrap_err();
		assert!(matches!(err, CoordinatorApiError::TransactionAlreadyUsed));
	}

	#[tokio::test]
	async fn fill_exceeding_taker_asset_amount_is_rejected() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order],
				taker_asset_fill_amounts: Some(vec![U256::from(3_000u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash.clone()));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		let err = coordinator
			.request_transaction(CHAIN_ID, request("0xfill1", &taker, 1, 100))
			.await
			.unwrap_err();

		match err {
			CoordinatorApiError::FillNotAllowed { exceeded, soft_cancelled } => {
				assert_eq!(exceeded, vec![order_hash]);
				assert!(soft_cancelled.is_empty());
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[tokio::test]
	async fn fill_of_a_soft_cancelled_order_is_rejected() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xcancel1",
			DecodedCall {
				function_name: "cancelOrder".to_string(),
				class: FunctionClass::CancelOne,
				orders: vec![order.clone()],
				taker_asset_fill_amounts: None,
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order],
				taker_asset_fill_amounts: Some(vec![U256::from(100u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash.clone()));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		coordinator
			.request_transaction(CHAIN_ID, request("0xcancel1", &maker, 1, 0))
			.await
			.unwrap();

		let err = coordinator
			.request_transaction(CHAIN_ID, request("0xfill1", &taker, 2, 100))
			.await
			.unwrap_err();

		match err {
			CoordinatorApiError::FillNotAllowed { soft_cancelled, .. } => {
				assert_eq!(soft_cancelled, vec![order_hash]);
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[tokio::test]
	async fn cancel_signed_by_a_non_maker_is_rejected() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let not_the_maker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xcancel1",
			DecodedCall {
				function_name: "cancelOrder".to_string(),
				class: FunctionClass::CancelOne,
				orders: vec![order],
				taker_asset_fill_amounts: None,
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		let err = coordinator
			.request_transaction(CHAIN_ID, request("0xcancel1", &not_the_maker, 1, 0))
			.await
			.unwrap_err();

		assert!(matches!(err, CoordinatorApiError::OnlyMakerMayCancel));
	}

	#[tokio::test]
	async fn batch_cancel_only_soft_cancels_orders_in_scope() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let outside_fee_recipient = Address::new("0x7777777777777777777777777777777777777777");

		let in_scope_order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let out_of_scope_order = sample_order(&maker, &outside_fee_recipient, 2, 1_000, 2_000);
		let in_scope_hash = OrderStore::hash_of(&in_scope_order);
		let out_of_scope_hash = OrderStore::hash_of(&out_of_scope_order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xbatchcancel1",
			DecodedCall {
				function_name: "batchCancelOrders".to_string(),
				class: FunctionClass::CancelBatch,
				orders: vec![in_scope_order, out_of_scope_order],
				taker_asset_fill_amounts: None,
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		coordinator
			.request_transaction(CHAIN_ID, request("0xbatchcancel1", &maker, 1, 0))
			.await
			.unwrap();

		let cancelled = coordinator
			.order_store
			.find_soft_cancelled(&[in_scope_hash.clone(), out_of_scope_hash])
			.await
			.unwrap();
		assert_eq!(cancelled, vec![in_scope_hash]);
	}

	#[tokio::test]
	async fn cancel_returns_outstanding_fill_signatures_from_any_taker() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order.clone()],
				taker_asset_fill_amounts: Some(vec![U256::from(100u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		decoder.script(
			"0xcancel1",
			DecodedCall {
				function_name: "cancelOrder".to_string(),
				class: FunctionClass::CancelOne,
				orders: vec![order],
				taker_asset_fill_amounts: None,
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash.clone()));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		coordinator
			.request_transaction(CHAIN_ID, request("0xfill1", &taker, 1, 100))
			.await
			.unwrap();

		let response = coordinator
			.request_transaction(CHAIN_ID, request("0xcancel1", &maker, 1, 0))
			.await
			.unwrap();

		let outstanding = response.outstanding_fill_signatures.unwrap();
		assert_eq!(outstanding.len(), 1);
		assert_eq!(outstanding[0].order_hash, order_hash);
		assert_eq!(outstanding[0].taker_asset_fill_amount, U256::from(100u64));
		assert_eq!(response.cancellation_signatures.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn expiration_above_the_granted_window_is_rejected() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order],
				taker_asset_fill_amounts: Some(vec![U256::from(100u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);
		let err = coordinator
			.request_transaction(CHAIN_ID, request("0xfill1", &taker, 1, 999_999_999_999))
			.await
			.unwrap_err();

		assert!(matches!(err, CoordinatorApiError::TransactionExpirationTooHigh));
	}

	#[tokio::test]
	async fn chain_id_mismatch_between_url_and_domain_is_a_schema_violation() {
		let taker = Address::new(TAKER_ADDRESS);
		let decoder = FakeOrderDecoder::new();
		let oracle = FakeOrderStateOracle::new();
		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);

		let mut req = request("0xfill1", &taker, 1, 100);
		req.signed_transaction.domain.chain_id = 2;

		let err = coordinator.request_transaction(CHAIN_ID, req).await.unwrap_err();
		match err {
			CoordinatorApiError::SchemaViolation { field, .. } => {
				assert_eq!(field, "signedTransaction.domain.chainId");
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[tokio::test]
	async fn unsupported_chain_is_reported() {
		let taker = Address::new(TAKER_ADDRESS);
		let decoder = FakeOrderDecoder::new();
		let oracle = FakeOrderStateOracle::new();
		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 0);

		let mut req = request("0xfill1", &taker, 1, 100);
		req.signed_transaction.domain.chain_id = 999;

		let err = coordinator.request_transaction(999, req).await.unwrap_err();
		assert!(matches!(err, CoordinatorApiError::UnsupportedChain { chain_id: 999 }));
	}

	#[tokio::test]
	async fn invalid_signature_is_rejected() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order],
				taker_asset_fill_amounts: Some(vec![U256::from(100u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash));

		let req = request("0xfill1", &taker, 1, 100);
		let tx_hash = coordinator_types::utils::hash_meta_transaction(&req.signed_transaction);
		let verifier = FakeSignatureVerifier::new();
		verifier.script(&taker, &tx_hash, "0xsig", false);

		let coordinator = build_coordinator(decoder, oracle, verifier, 0);
		let err = coordinator.request_transaction(CHAIN_ID, req).await.unwrap_err();
		assert!(matches!(err, CoordinatorApiError::InvalidMetaTxSignature));
	}

	#[tokio::test]
	async fn soft_cancel_during_the_selective_delay_preempts_the_fill() {
		let maker = derive_address(MAKER_KEY);
		let fee_recipient = derive_address(FEE_RECIPIENT_KEY);
		let taker = Address::new(TAKER_ADDRESS);
		let order = sample_order(&maker, &fee_recipient, 1, 1_000, 2_000);
		let order_hash = OrderStore::hash_of(&order);

		let decoder = FakeOrderDecoder::new();
		decoder.script(
			"0xfill1",
			DecodedCall {
				function_name: "fillOrder".to_string(),
				class: FunctionClass::FillOne,
				orders: vec![order.clone()],
				taker_asset_fill_amounts: Some(vec![U256::from(100u64)]),
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		decoder.script(
			"0xcancel1",
			DecodedCall {
				function_name: "cancelOrder".to_string(),
				class: FunctionClass::CancelOne,
				orders: vec![order],
				taker_asset_fill_amounts: None,
				market_sell_taker_asset_amount: None,
				market_buy_maker_asset_amount: None,
			},
		);
		let oracle = FakeOrderStateOracle::new();
		oracle.script_balances(unlimited_balances(order_hash.clone()));

		let coordinator = build_coordinator(decoder, oracle, FakeSignatureVerifier::new(), 200);

		let fill_fut = coordinator.request_transaction(CHAIN_ID, request("0xfill1", &taker, 1, 100));
		let cancel_fut = async {
			tokio::time::sleep(Duration::from_millis(20)).await;
			coordinator
				.request_transaction(CHAIN_ID, request("0xcancel1", &maker, 1, 0))
				.await
		};

		let (fill_result, cancel_result) = tokio::join!(fill_fut, cancel_fut);
		cancel_result.unwrap();

		match fill_result.unwrap_err() {
			CoordinatorApiError::FillNotAllowed { soft_cancelled, .. } => {
				assert_eq!(soft_cancelled, vec![order_hash]);
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}
}
