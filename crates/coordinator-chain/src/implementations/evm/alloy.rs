//! Alloy-backed, RPC-live implementations of the chain oracle traits.
//!
//! Decodes 0x v2 exchange calldata via generated ABI bindings, reads
//! order/balance/allowance state with raw `eth_call`s the same way the
//! teacher's delivery provider read ERC-20 balances, and builds/verifies
//! EIP-712 approval digests by reusing the coordinator's own hashing
//! primitives.

use crate::{
	ApprovalHashBuilder, ChainError, OrderBalancesAndAllowances, OrderDecoder,
	OrderRelevantState, OrderStateOracle, SignatureVerifier,
};
use alloy_primitives::{Address as AlloyAddress, Bytes, Signature, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use coordinator_types::address::Digest32;
use coordinator_types::api::SignedMetaTx;
use coordinator_types::order::{DecodedCall, FunctionClass, Order};
use coordinator_types::utils::{
	compute_coordinator_approval_struct_hash, compute_domain_hash, compute_final_digest,
	hash_meta_transaction, COORDINATOR_APPROVAL_DOMAIN_NAME,
};
use coordinator_types::Address;
use std::str::FromStr;
use std::sync::Arc;

sol! {
	#[derive(Debug)]
	struct LibOrder {
		address makerAddress;
		address takerAddress;
		address feeRecipientAddress;
		address senderAddress;
		uint256 makerAssetAmount;
		uint256 takerAssetAmount;
		uint256 makerFee;
		uint256 takerFee;
		uint256 expirationTimeSeconds;
		uint256 salt;
		bytes makerAssetData;
		bytes takerAssetData;
		bytes makerFeeAssetData;
		bytes takerFeeAssetData;
	}

	#[derive(Debug)]
	struct OrderInfo {
		uint8 orderStatus;
		bytes32 orderHash;
		uint256 orderTakerAssetFilledAmount;
	}

	function fillOrder(LibOrder order, uint256 takerAssetFillAmount, bytes signature);
	function fillOrKillOrder(LibOrder order, uint256 takerAssetFillAmount, bytes signature);
	function batchFillOrders(LibOrder[] orders, uint256[] takerAssetFillAmounts, bytes[] signatures);
	function batchFillOrKillOrders(LibOrder[] orders, uint256[] takerAssetFillAmounts, bytes[] signatures);
	function batchFillOrdersNoThrow(LibOrder[] orders, uint256[] takerAssetFillAmounts, bytes[] signatures);
	function marketSellOrdersFillOrKill(LibOrder[] orders, uint256 takerAssetFillAmount, bytes[] signatures);
	function marketSellOrdersNoThrow(LibOrder[] orders, uint256 takerAssetFillAmount, bytes[] signatures);
	function marketBuyOrdersFillOrKill(LibOrder[] orders, uint256 makerAssetFillAmount, bytes[] signatures);
	function marketBuyOrdersNoThrow(LibOrder[] orders, uint256 makerAssetFillAmount, bytes[] signatures);
	function cancelOrder(LibOrder order);
	function batchCancelOrders(LibOrder[] orders);

	function getOrderInfo(LibOrder order) returns (OrderInfo memory orderInfo);
}

fn decode_hex(data: &str) -> Result<Vec<u8>, ChainError> {
	let stripped = data.strip_prefix("0x").unwrap_or(data);
	hex::decode(stripped).map_err(|e| ChainError::Decoding(format!("bad hex: {}", e)))
}

fn convert_order(order: &LibOrder, exchange_address: &Address, chain_id: u64) -> Order {
	Order {
		sender_address: Address::new(&order.senderAddress.to_string()),
		maker_address: Address::new(&order.makerAddress.to_string()),
		taker_address: Address::new(&order.takerAddress.to_string()),
		fee_recipient_address: Address::new(&order.feeRecipientAddress.to_string()),
		maker_asset_data: format!("0x{}", hex::encode(&order.makerAssetData)),
		taker_asset_data: format!("0x{}", hex::encode(&order.takerAssetData)),
		maker_fee_asset_data: format!("0x{}", hex::encode(&order.makerFeeAssetData)),
		taker_fee_asset_data: format!("0x{}", hex::encode(&order.takerFeeAssetData)),
		maker_asset_amount: order.makerAssetAmount,
		taker_asset_amount: order.takerAssetAmount,
		maker_fee: order.makerFee,
		taker_fee: order.takerFee,
		salt: order.salt,
		expiration_time_seconds: order.expirationTimeSeconds,
		exchange_address: exchange_address.clone(),
		chain_id,
	}
}

/// Extracts the ERC-20 token address from 0x-protocol ERC20Proxy asset data
/// (`0xf47261b0` selector followed by the token address, left-padded to a
/// 32-byte word). Returns `None` for empty asset data (no fee asset set).
fn erc20_token_address(asset_data: &str) -> Result<Option<AlloyAddress>, ChainError> {
	let bytes = decode_hex(asset_data)?;
	if bytes.is_empty() {
		return Ok(None);
	}
	if bytes.len() < 36 {
		return Err(ChainError::Decoding(
			"asset data too short for ERC20Proxy encoding".to_string(),
		));
	}
	Ok(Some(AlloyAddress::from_slice(&bytes[16..36])))
}

/// Live, RPC-backed implementation of every chain oracle trait for a single
/// EVM-compatible chain. Cheaply cloneable: the underlying provider is
/// `Arc`-wrapped, so one instance can back both the `OrderDecoder` and the
/// `OrderStateOracle` trait objects a chain bundle needs.
#[derive(Clone)]
pub struct AlloyChainOracle {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	exchange_address: Address,
	chain_id: u64,
}

impl AlloyChainOracle {
	pub fn new(
		rpc_url: &str,
		exchange_address: Address,
		chain_id: u64,
	) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::Configuration(format!("invalid RPC URL: {}", e)))?;
		let provider = ProviderBuilder::new().on_http(url);
		Ok(Self {
			provider: Arc::new(provider),
			exchange_address,
			chain_id,
		})
	}

	fn exchange_alloy_address(&self) -> Result<AlloyAddress, ChainError> {
		AlloyAddress::from_str(self.exchange_address.as_str())
			.map_err(|e| ChainError::Configuration(format!("invalid exchange address: {}", e)))
	}

	async fn eth_call(&self, to: AlloyAddress, data: Vec<u8>) -> Result<Bytes, ChainError> {
		let request = TransactionRequest::default().to(to).input(data.into());
		self.provider
			.call(&request)
			.await
			.map_err(|e| ChainError::Network(format!("eth_call failed: {}", e)))
	}

	async fn erc20_balance(&self, token: AlloyAddress, owner: AlloyAddress) -> Result<U256, ChainError> {
		// balanceOf(address) selector.
		let mut call_data = vec![0x70, 0xa0, 0x82, 0x31];
		call_data.extend_from_slice(&[0u8; 12]);
		call_data.extend_from_slice(owner.as_slice());
		let result = self.eth_call(token, call_data).await?;
		if result.len() < 32 {
			return Err(ChainError::Network("short balanceOf response".to_string()));
		}
		Ok(U256::from_be_slice(&result[..32]))
	}

	async fn erc20_allowance(
		&self,
		token: AlloyAddress,
		owner: AlloyAddress,
		spender: AlloyAddress,
	) -> Result<U256, ChainError> {
		// allowance(address,address) selector.
		let mut call_data = vec![0xdd, 0x62, 0xed, 0x3e];
		call_data.extend_from_slice(&[0u8; 12]);
		call_data.extend_from_slice(owner.as_slice());
		call_data.extend_from_slice(&[0u8; 12]);
		call_data.extend_from_slice(spender.as_slice());
		let result = self.eth_call(token, call_data).await?;
		if result.len() < 32 {
			return Err(ChainError::Network("short allowance response".to_string()));
		}
		Ok(U256::from_be_slice(&result[..32]))
	}

	async fn balance_and_allowance(
		&self,
		asset_data: &str,
		owner: AlloyAddress,
		spender: AlloyAddress,
	) -> Result<(U256, U256), ChainError> {
		match erc20_token_address(asset_data)? {
			None => Ok((U256::ZERO, U256::ZERO)),
			Some(token) => {
				let balance = self.erc20_balance(token, owner).await?;
				let allowance = self.erc20_allowance(token, owner, spender).await?;
				Ok((balance, allowance))
			}
		}
	}
}

#[async_trait]
impl OrderDecoder for AlloyChainOracle {
	async fn decode_calldata(&self, data: &str) -> Result<DecodedCall, ChainError> {
		let bytes = decode_hex(data)?;
		if bytes.len() < 4 {
			return Err(ChainError::Decoding("calldata shorter than a selector".to_string()));
		}
		let exchange = &self.exchange_address;
		let chain_id = self.chain_id;
		let selector: [u8; 4] = bytes[..4].try_into().unwrap();

		macro_rules! decoded {
			($fn_name:literal, $class:expr, $orders:expr) => {
				Ok(DecodedCall {
					function_name: $fn_name.to_string(),
					class: $class,
					orders: $orders,
					taker_asset_fill_amounts: None,
					market_sell_taker_asset_amount: None,
					market_buy_maker_asset_amount: None,
				})
			};
		}

		if selector == fillOrderCall::SELECTOR {
			let call = fillOrderCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let mut out = decoded!(
				"fillOrder",
				FunctionClass::FillOne,
				vec![convert_order(&call.order, exchange, chain_id)]
			)?;
			out.taker_asset_fill_amounts = Some(vec![call.takerAssetFillAmount]);
			return Ok(out);
		}
		if selector == fillOrKillOrderCall::SELECTOR {
			let call = fillOrKillOrderCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let mut out = decoded!(
				"fillOrKillOrder",
				FunctionClass::FillOne,
				vec![convert_order(&call.order, exchange, chain_id)]
			)?;
			out.taker_asset_fill_amounts = Some(vec![call.takerAssetFillAmount]);
			return Ok(out);
		}
		if selector == batchFillOrdersCall::SELECTOR {
			let call = batchFillOrdersCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			let mut out = decoded!("batchFillOrders", FunctionClass::FillBatch, orders)?;
			out.taker_asset_fill_amounts = Some(call.takerAssetFillAmounts);
			return Ok(out);
		}
		if selector == batchFillOrKillOrdersCall::SELECTOR {
			let call = batchFillOrKillOrdersCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			let mut out = decoded!("batchFillOrKillOrders", FunctionClass::FillBatch, orders)?;
			out.taker_asset_fill_amounts = Some(call.takerAssetFillAmounts);
			return Ok(out);
		}
		if selector == batchFillOrdersNoThrowCall::SELECTOR {
			let call = batchFillOrdersNoThrowCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			let mut out = decoded!("batchFillOrdersNoThrow", FunctionClass::FillBatch, orders)?;
			out.taker_asset_fill_amounts = Some(call.takerAssetFillAmounts);
			return Ok(out);
		}
		if selector == marketSellOrdersFillOrKillCall::SELECTOR {
			let call = marketSellOrdersFillOrKillCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			let mut out = decoded!("marketSellOrdersFillOrKill", FunctionClass::MarketSell, orders)?;
			out.market_sell_taker_asset_amount = Some(call.takerAssetFillAmount);
			return Ok(out);
		}
		if selector == marketSellOrdersNoThrowCall::SELECTOR {
			let call = marketSellOrdersNoThrowCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			let mut out = decoded!("marketSellOrdersNoThrow", FunctionClass::MarketSell, orders)?;
			out.market_sell_taker_asset_amount = Some(call.takerAssetFillAmount);
			return Ok(out);
		}
		if selector == marketBuyOrdersFillOrKillCall::SELECTOR {
			let call = marketBuyOrdersFillOrKillCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			let mut out = decoded!("marketBuyOrdersFillOrKill", FunctionClass::MarketBuy, orders)?;
			out.market_buy_maker_asset_amount = Some(call.makerAssetFillAmount);
			return Ok(out);
		}
		if selector == marketBuyOrdersNoThrowCall::SELECTOR {
			let call = marketBuyOrdersNoThrowCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			let mut out = decoded!("marketBuyOrdersNoThrow", FunctionClass::MarketBuy, orders)?;
			out.market_buy_maker_asset_amount = Some(call.makerAssetFillAmount);
			return Ok(out);
		}
		if selector == cancelOrderCall::SELECTOR {
			let call = cancelOrderCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			return decoded!(
				"cancelOrder",
				FunctionClass::CancelOne,
				vec![convert_order(&call.order, exchange, chain_id)]
			);
		}
		if selector == batchCancelOrdersCall::SELECTOR {
			let call = batchCancelOrdersCall::abi_decode(&bytes, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			let orders = call.orders.iter().map(|o| convert_order(o, exchange, chain_id)).collect();
			return decoded!("batchCancelOrders", FunctionClass::CancelBatch, orders);
		}

		Err(ChainError::Decoding(format!(
			"unrecognized function selector 0x{}",
			hex::encode(selector)
		)))
	}
}

#[async_trait]
impl OrderStateOracle for AlloyChainOracle {
	async fn get_order_relevant_states(
		&self,
		orders: &[Order],
	) -> Result<Vec<OrderRelevantState>, ChainError> {
		let exchange = self.exchange_alloy_address()?;
		let mut states = Vec::with_capacity(orders.len());
		for order in orders {
			let sol_order = to_lib_order(order)?;
			let call = getOrderInfoCall { order: sol_order };
			let result = self.eth_call(exchange, call.abi_encode()).await?;
			let decoded = getOrderInfoCall::abi_decode_returns(&result, true)
				.map_err(|e| ChainError::Decoding(e.to_string()))?;
			states.push(OrderRelevantState {
				order_hash: Digest32::from_bytes(decoded.orderInfo.orderHash.0),
				taker_asset_filled_amount: decoded.orderInfo.orderTakerAssetFilledAmount,
			});
		}
		Ok(states)
	}

	async fn get_batch_balances_and_allowances(
		&self,
		orders: &[Order],
	) -> Result<Vec<OrderBalancesAndAllowances>, ChainError> {
		let exchange = self.exchange_alloy_address()?;
		let mut out = Vec::with_capacity(orders.len());
		for order in orders {
			let maker = AlloyAddress::from_str(order.maker_address.as_str())
				.map_err(|e| ChainError::Decoding(format!("bad maker address: {}", e)))?;
			let taker = AlloyAddress::from_str(order.taker_address.as_str())
				.map_err(|e| ChainError::Decoding(format!("bad taker address: {}", e)))?;

			let (maker_asset_balance, maker_asset_allowance) = self
				.balance_and_allowance(&order.maker_asset_data, maker, exchange)
				.await?;
			let (taker_asset_balance, taker_asset_allowance) = self
				.balance_and_allowance(&order.taker_asset_data, taker, exchange)
				.await?;
			let (maker_fee_balance, maker_fee_allowance) = self
				.balance_and_allowance(&order.maker_fee_asset_data, maker, exchange)
				.await?;
			let (taker_fee_balance, taker_fee_allowance) = self
				.balance_and_allowance(&order.taker_fee_asset_data, taker, exchange)
				.await?;

			out.push(OrderBalancesAndAllowances {
				order_hash: coordinator_types::utils::hash_order(order),
				maker_asset_balance,
				maker_asset_allowance,
				taker_asset_balance,
				taker_asset_allowance,
				maker_fee_balance,
				maker_fee_allowance,
				taker_fee_balance,
				taker_fee_allowance,
			});
		}
		Ok(out)
	}
}

fn to_lib_order(order: &Order) -> Result<LibOrder, ChainError> {
	let addr = |a: &Address| -> Result<AlloyAddress, ChainError> {
		AlloyAddress::from_str(a.as_str()).map_err(|e| ChainError::Decoding(e.to_string()))
	};
	Ok(LibOrder {
		makerAddress: addr(&order.maker_address)?,
		takerAddress: addr(&order.taker_address)?,
		feeRecipientAddress: addr(&order.fee_recipient_address)?,
		senderAddress: addr(&order.sender_address)?,
		makerAssetAmount: order.maker_asset_amount,
		takerAssetAmount: order.taker_asset_amount,
		makerFee: order.maker_fee,
		takerFee: order.taker_fee,
		expirationTimeSeconds: order.expiration_time_seconds,
		salt: order.salt,
		makerAssetData: Bytes::from(decode_hex(&order.maker_asset_data)?),
		takerAssetData: Bytes::from(decode_hex(&order.taker_asset_data)?),
		makerFeeAssetData: Bytes::from(decode_hex(&order.maker_fee_asset_data)?),
		takerFeeAssetData: Bytes::from(decode_hex(&order.taker_fee_asset_data)?),
	})
}

/// EIP-712 approval builder reusing the shared coordinator hashing helpers.
pub struct AlloyApprovalHashBuilder {
	pub chain_id: u64,
}

#[async_trait]
impl ApprovalHashBuilder for AlloyApprovalHashBuilder {
	async fn build_approval_hash(
		&self,
		meta_tx: &SignedMetaTx,
		tx_origin: &Address,
		coordinator_address: &Address,
		approval_expiration_time_seconds: u64,
	) -> Result<[u8; 32], ChainError> {
		let transaction_hash = hash_meta_transaction(meta_tx);
		let transaction_hash_bytes: [u8; 32] = transaction_hash
			.to_bytes()
			.map_err(|e| ChainError::Decoding(format!("bad transaction hash: {}", e)))?;

		let coordinator = AlloyAddress::from_str(coordinator_address.as_str())
			.map_err(|e| ChainError::Configuration(format!("bad coordinator address: {}", e)))?;
		let origin = AlloyAddress::from_str(tx_origin.as_str())
			.map_err(|e| ChainError::Decoding(format!("bad tx origin: {}", e)))?;

		let struct_hash = compute_coordinator_approval_struct_hash(
			&B256::from(transaction_hash_bytes),
			&origin,
			&coordinator,
			approval_expiration_time_seconds,
		);
		let domain_hash = compute_domain_hash(COORDINATOR_APPROVAL_DOMAIN_NAME, self.chain_id, &coordinator);
		let digest = compute_final_digest(&domain_hash, &struct_hash);
		Ok(digest.0)
	}
}

/// Recovers the signer from an ECDSA signature over a prehashed digest, the
/// same shape the coordinator verifies taker meta-transaction signatures
/// with (65 raw `r||s||v` bytes, no 0x-protocol type byte appended).
pub struct AlloySignatureVerifier;

#[async_trait]
impl SignatureVerifier for AlloySignatureVerifier {
	async fn verify_meta_tx_signature(
		&self,
		signer_address: &Address,
		meta_tx_hash: &Digest32,
		signature: &str,
	) -> Result<bool, ChainError> {
		let bytes = decode_hex(signature)?;
		if bytes.len() < 65 {
			return Err(ChainError::Decoding("signature shorter than 65 bytes".to_string()));
		}
		let sig = Signature::from_raw(&bytes[..65])
			.map_err(|e| ChainError::Decoding(format!("malformed signature: {}", e)))?;
		let digest_bytes: [u8; 32] = meta_tx_hash
			.to_bytes()
			.map_err(|e| ChainError::Decoding(format!("bad digest: {}", e)))?;
		let recovered = sig
			.recover_address_from_prehash(&B256::from(digest_bytes))
			.map_err(|e| ChainError::Decoding(format!("signature recovery failed: {}", e)))?;
		let expected = AlloyAddress::from_str(signer_address.as_str())
			.map_err(|e| ChainError::Decoding(format!("bad signer address: {}", e)))?;
		Ok(recovered == expected)
	}
}

