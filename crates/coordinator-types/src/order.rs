//! Order, meta-transaction, and transaction-record types for the coordinator.
//!
//! An [`Order`] is never created by the coordinator; it is reconstructed
//! from decoded calldata on every request. [`OrderRecord`] and
//! [`TransactionRecord`] are the two tables the coordinator owns and
//! mutates.

use crate::Address;
use crate::address::Digest32;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A 0x-protocol limit order, reconstructed from decoded calldata and
/// enriched with the exchange address and chain id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Address allowed to relay fills on the maker's behalf; for an order to
	/// be in scope of any coordinator it must equal that coordinator's own
	/// address.
	pub sender_address: Address,
	/// The order's maker.
	pub maker_address: Address,
	/// Address of the only taker allowed to fill this order, or the zero
	/// address if unbound.
	pub taker_address: Address,
	/// Address credited with the order's fees; determines which
	/// coordinator instance an order belongs to.
	pub fee_recipient_address: Address,
	/// Asset data the maker is selling, ABI-encoded per the exchange's
	/// asset-proxy format.
	pub maker_asset_data: String,
	/// Asset data the taker is selling.
	pub taker_asset_data: String,
	/// Asset data the maker fee is denominated in.
	pub maker_fee_asset_data: String,
	/// Asset data the taker fee is denominated in.
	pub taker_fee_asset_data: String,
	/// Total maker asset amount for a full fill.
	pub maker_asset_amount: U256,
	/// Total taker asset amount for a full fill.
	pub taker_asset_amount: U256,
	/// Maker fee amount for a full fill.
	pub maker_fee: U256,
	/// Taker fee amount for a full fill.
	pub taker_fee: U256,
	/// Order uniqueness salt.
	pub salt: U256,
	/// Unix timestamp after which the order can no longer be filled.
	pub expiration_time_seconds: U256,
	/// Address of the exchange contract this order targets.
	pub exchange_address: Address,
	/// Chain id this order lives on.
	pub chain_id: u64,
}

/// The recognized 0x exchange function families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionClass {
	/// `fillOrder`, `fillOrKillOrder`: single order, single taker-fill amount.
	FillOne,
	/// `batchFillOrders`, `batchFillOrKillOrders`, `batchFillOrdersNoThrow`:
	/// parallel orders and taker-fill amounts.
	FillBatch,
	/// `marketSellOrdersFillOrKill`, `marketSellOrdersNoThrow`: orders plus
	/// an aggregate taker-asset amount.
	MarketSell,
	/// `marketBuyOrdersFillOrKill`, `marketBuyOrdersNoThrow`: orders plus an
	/// aggregate maker-asset amount.
	MarketBuy,
	/// `cancelOrder`: single order.
	CancelOne,
	/// `batchCancelOrders`: parallel orders.
	CancelBatch,
}

impl FunctionClass {
	/// Whether this class belongs to the fill family (vs. the cancel family).
	pub fn is_fill(&self) -> bool {
		matches!(
			self,
			FunctionClass::FillOne
				| FunctionClass::FillBatch
				| FunctionClass::MarketSell
				| FunctionClass::MarketBuy
		)
	}

	/// Whether this class belongs to the cancel family.
	pub fn is_cancel(&self) -> bool {
		!self.is_fill()
	}
}

/// The result of decoding a meta-transaction's calldata.
#[derive(Debug, Clone)]
pub struct DecodedCall {
	/// The exchange function this calldata invokes.
	pub function_name: String,
	/// The classification of that function.
	pub class: FunctionClass,
	/// The orders referenced by the call, in call order.
	pub orders: Vec<Order>,
	/// Per-order taker-fill amounts as given verbatim by the caller
	/// (fill-one / fill-batch only; `None` for market-sell, market-buy, and
	/// cancel calls, whose allocations are derived by the fill-allocation
	/// engine rather than read off the call).
	pub taker_asset_fill_amounts: Option<Vec<U256>>,
	/// Aggregate taker-asset amount requested (market-sell only).
	pub market_sell_taker_asset_amount: Option<U256>,
	/// Aggregate maker-asset amount requested (market-buy only).
	pub market_buy_maker_asset_amount: Option<U256>,
}

/// Persisted soft-cancel flag for an order.
///
/// Created lazily on first mutation. Once `soft_cancelled` is set it is
/// never cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderRecord {
	/// The order's deterministic hash.
	pub order_hash: Digest32,
	/// Whether the maker has soft-cancelled this order off-chain.
	pub soft_cancelled: bool,
}

impl OrderRecord {
	/// A fresh, not-yet-cancelled record.
	pub fn new(order_hash: Digest32) -> Self {
		Self {
			order_hash,
			soft_cancelled: false,
		}
	}
}

/// A single order's allocation within a granted transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderFill {
	/// The order this allocation applies to.
	pub order_hash: Digest32,
	/// The taker-asset amount allocated to this order.
	pub taker_asset_fill_amount: U256,
}

/// A granted approval or cancel acknowledgement.
///
/// Created atomically once an approval is granted or a cancel request is
/// acknowledged; immutable thereafter; expires passively by wall clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
	/// Digest of the signed meta-transaction. Unique across all records.
	pub transaction_hash: Digest32,
	/// The transaction's declared origin, used for allowlisted
	/// smart-contract taker accounting.
	pub tx_origin: Address,
	/// The meta-transaction's signer / taker.
	pub taker_address: Address,
	/// Ordered approval signatures, one per distinct in-scope fee-recipient.
	pub signatures: Vec<String>,
	/// Approval expiration. `0` is the cancel-family sentinel: never used
	/// as an approval, only as a cancel acknowledgement.
	pub expiration_time_seconds: u64,
	/// Orders this record applies to, each with its own fill amount.
	pub order_fills: Vec<OrderFill>,
	/// Wall-clock creation time, Unix seconds.
	pub created_at: u64,
}

impl TransactionRecord {
	/// Whether this record is still unexpired as of `now`.
	///
	/// Cancel-family records (`expiration_time_seconds == 0`) are never
	/// counted as unexpired approvals; they only exist as cancel
	/// acknowledgements.
	pub fn is_unexpired(&self, now: u64) -> bool {
		self.expiration_time_seconds > 0 && self.expiration_time_seconds >= now
	}

	/// The order hashes this record touches.
	pub fn order_hashes(&self) -> Vec<Digest32> {
		self.order_fills.iter().map(|f| f.order_hash.clone()).collect()
	}

	/// The taker-asset fill amount allocated to a specific order, if any.
	pub fn fill_amount_for(&self, order_hash: &Digest32) -> Option<U256> {
		self.order_fills
			.iter()
			.find(|f| &f.order_hash == order_hash)
			.map(|f| f.taker_asset_fill_amount)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hash(s: &str) -> Digest32 {
		Digest32(s.to_string())
	}

	#[test]
	fn function_class_family_split() {
		assert!(FunctionClass::FillOne.is_fill());
		assert!(FunctionClass::MarketBuy.is_fill());
		assert!(FunctionClass::CancelOne.is_cancel());
		assert!(FunctionClass::CancelBatch.is_cancel());
		assert!(!FunctionClass::MarketSell.is_cancel());
	}

	#[test]
	fn cancel_sentinel_is_never_unexpired() {
		let record = TransactionRecord {
			transaction_hash: hash("0xaa"),
			tx_origin: Address::new("0x1"),
			taker_address: Address::new("0x2"),
			signatures: vec![],
			expiration_time_seconds: 0,
			order_fills: vec![],
			created_at: 0,
		};
		assert!(!record.is_unexpired(0));
		assert!(!record.is_unexpired(u64::MAX));
	}

	#[test]
	fn fill_amount_lookup() {
		let record = TransactionRecord {
			transaction_hash: hash("0xaa"),
			tx_origin: Address::new("0x1"),
			taker_address: Address::new("0x2"),
			signatures: vec!["0xsig".to_string()],
			expiration_time_seconds: 1_000,
			order_fills: vec![OrderFill {
				order_hash: hash("0xbb"),
				taker_asset_fill_amount: U256::from(42u64),
			}],
			created_at: 0,
		};
		assert_eq!(record.fill_amount_for(&hash("0xbb")), Some(U256::from(42u64)));
		assert_eq!(record.fill_amount_for(&hash("0xcc")), None);
		assert!(record.is_unexpired(500));
		assert!(!record.is_unexpired(2_000));
	}
}
