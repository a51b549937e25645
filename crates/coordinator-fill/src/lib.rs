//! Fill-allocation engine for the coordinator server.
//!
//! Given a batch of orders and the on-chain state the chain's oracles
//! report for them, computes how much of each order's taker asset a
//! meta-transaction may be granted an approval for. The arithmetic is
//! arbitrary-precision (`U256`) throughout and every division floors, since
//! an order's exchange rate is rarely an integer ratio.

use alloy_primitives::U256;
use coordinator_chain::OrderBalancesAndAllowances;
use coordinator_types::address::Digest32;
use coordinator_types::order::{FunctionClass, Order, OrderFill};
use thiserror::Error;

/// Errors the fill-allocation engine can report. These are caller
/// programming errors (mismatched input shapes), not business-rule
/// rejections — those are the approval state machine's `FillNotAllowed`
/// territory.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FillError {
	#[error("{orders} orders but {amounts} taker-fill amounts")]
	MismatchedLengths { orders: usize, amounts: usize },
	#[error("fill-one/fill-batch calls require explicit per-order taker-fill amounts")]
	MissingFillAmounts,
	#[error("market-sell/market-buy calls require an aggregate fill amount")]
	MissingMarketAmount,
	#[error("{0:?} is not a fill-family function class")]
	NotAFillClass(FunctionClass),
}

/// One order's full context for allocation: its fields, its canonical hash,
/// its on-chain filled amount, and its current balance/allowance snapshot.
#[derive(Debug, Clone)]
pub struct FillCandidate {
	pub order: Order,
	pub order_hash: Digest32,
	pub on_chain_filled: U256,
	pub balances: OrderBalancesAndAllowances,
}

/// Converts an amount denominated in maker-asset units to taker-asset units
/// at an order's exchange rate, flooring. Returns zero for a degenerate
/// zero-maker-amount order rather than dividing by zero.
fn convert_maker_to_taker(maker_units: U256, order: &Order) -> U256 {
	if order.maker_asset_amount.is_zero() {
		return U256::ZERO;
	}
	maker_units
		.saturating_mul(order.taker_asset_amount)
		.wrapping_div(order.maker_asset_amount)
}

/// Converts an amount denominated in taker-asset units to maker-asset units
/// at an order's exchange rate, flooring.
fn convert_taker_to_maker(taker_units: U256, order: &Order) -> U256 {
	if order.taker_asset_amount.is_zero() {
		return U256::ZERO;
	}
	taker_units
		.saturating_mul(order.maker_asset_amount)
		.wrapping_div(order.taker_asset_amount)
}

/// Scales a fee-side balance/allowance bound into taker-asset units:
/// `bound * takerAssetAmount / fee`, flooring. Callers only invoke this when
/// the fee is known nonzero.
fn fee_bound_in_taker_units(bound: U256, taker_asset_amount: U256, fee: U256) -> U256 {
	bound.saturating_mul(taker_asset_amount).wrapping_div(fee)
}

/// The zero address, used to detect an order with no bound taker.
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Computes the remaining fillable taker-asset amount for one order: the
/// minimum of on-chain remaining capacity, the taker's own balance/allowance
/// (if the order binds a taker), the maker's balance/allowance converted to
/// taker units, and both fee-side balance/allowance bounds (if either fee is
/// nonzero).
pub fn remaining_fillable_taker_amount(candidate: &FillCandidate) -> U256 {
	let order = &candidate.order;
	let mut remaining = order
		.taker_asset_amount
		.saturating_sub(candidate.on_chain_filled);

	if order.taker_address.as_str() != ZERO_ADDRESS {
		let taker_bound = candidate
			.balances
			.taker_asset_balance
			.min(candidate.balances.taker_asset_allowance);
		remaining = remaining.min(taker_bound);
	}

	let maker_bound = candidate
		.balances
		.maker_asset_balance
		.min(candidate.balances.maker_asset_allowance);
	remaining = remaining.min(convert_maker_to_taker(maker_bound, order));

	if !order.taker_fee.is_zero() {
		let taker_fee_bound = candidate
			.balances
			.taker_fee_balance
			.min(candidate.balances.taker_fee_allowance);
		remaining = remaining.min(fee_bound_in_taker_units(
			taker_fee_bound,
			order.taker_asset_amount,
			order.taker_fee,
		));
	}

	if !order.maker_fee.is_zero() {
		let maker_fee_bound = candidate
			.balances
			.maker_fee_balance
			.min(candidate.balances.maker_fee_allowance);
		remaining = remaining.min(fee_bound_in_taker_units(
			maker_fee_bound,
			order.taker_asset_amount,
			order.maker_fee,
		));
	}

	remaining
}

/// Greedily allocates a market-sell request across candidates in the order
/// they were received, consuming `min(remainingRequested, remainingFillable)`
/// from each until the request is exhausted or candidates run out. Orders
/// that end up with a zero allocation are omitted.
pub fn allocate_market_sell(candidates: &[FillCandidate], requested_taker_amount: U256) -> Vec<OrderFill> {
	let mut remaining_requested = requested_taker_amount;
	let mut fills = Vec::new();

	for candidate in candidates {
		if remaining_requested.is_zero() {
			break;
		}
		let fillable = remaining_fillable_taker_amount(candidate);
		let allocation = remaining_requested.min(fillable);
		if allocation.is_zero() {
			continue;
		}
		fills.push(OrderFill {
			order_hash: candidate.order_hash.clone(),
			taker_asset_fill_amount: allocation,
		});
		remaining_requested -= allocation;
	}

	fills
}

/// Allocates a market-buy request, working in maker-asset units: for each
/// candidate, converts the outstanding maker-asset request to taker units at
/// that order's rate, clamps by its remaining fillable taker amount, records
/// the taker-side allocation, and deducts the realized maker-side amount
/// before moving to the next candidate.
pub fn allocate_market_buy(candidates: &[FillCandidate], requested_maker_amount: U256) -> Vec<OrderFill> {
	let mut remaining_maker_requested = requested_maker_amount;
	let mut fills = Vec::new();

	for candidate in candidates {
		if remaining_maker_requested.is_zero() {
			break;
		}
		let fillable_taker = remaining_fillable_taker_amount(candidate);
		let taker_equivalent = convert_maker_to_taker(remaining_maker_requested, &candidate.order);
		let taker_allocation = taker_equivalent.min(fillable_taker);
		if taker_allocation.is_zero() {
			continue;
		}
		fills.push(OrderFill {
			order_hash: candidate.order_hash.clone(),
			taker_asset_fill_amount: taker_allocation,
		});
		let maker_realized = convert_taker_to_maker(taker_allocation, &candidate.order);
		remaining_maker_requested = remaining_maker_requested.saturating_sub(maker_realized);
	}

	fills
}

/// Pairs order hashes with caller-supplied taker-fill amounts verbatim, for
/// fill-one and fill-batch calls, where the coordinator does not reallocate.
fn allocate_verbatim(order_hashes: &[Digest32], amounts: &[U256]) -> Result<Vec<OrderFill>, FillError> {
	if order_hashes.len() != amounts.len() {
		return Err(FillError::MismatchedLengths {
			orders: order_hashes.len(),
			amounts: amounts.len(),
		});
	}
	Ok(order_hashes
		.iter()
		.cloned()
		.zip(amounts.iter().copied())
		.map(|(order_hash, taker_asset_fill_amount)| OrderFill {
			order_hash,
			taker_asset_fill_amount,
		})
		.collect())
}

/// Dispatches to the right allocation strategy for a decoded call's function
/// class. `taker_asset_fill_amounts`/`market_sell_taker_asset_amount`/
/// `market_buy_maker_asset_amount` mirror the corresponding fields on a
/// decoded call; the caller passes through whichever one the class expects.
pub fn allocate(
	class: FunctionClass,
	candidates: &[FillCandidate],
	taker_asset_fill_amounts: Option<&[U256]>,
	market_sell_taker_asset_amount: Option<U256>,
	market_buy_maker_asset_amount: Option<U256>,
) -> Result<Vec<OrderFill>, FillError> {
	match class {
		FunctionClass::FillOne | FunctionClass::FillBatch => {
			let amounts = taker_asset_fill_amounts.ok_or(FillError::MissingFillAmounts)?;
			let hashes: Vec<Digest32> = candidates.iter().map(|c| c.order_hash.clone()).collect();
			allocate_verbatim(&hashes, amounts)
		}
		FunctionClass::MarketSell => {
			let requested = market_sell_taker_asset_amount.ok_or(FillError::MissingMarketAmount)?;
			Ok(allocate_market_sell(candidates, requested))
		}
		FunctionClass::MarketBuy => {
			let requested = market_buy_maker_asset_amount.ok_or(FillError::MissingMarketAmount)?;
			Ok(allocate_market_buy(candidates, requested))
		}
		other => Err(FillError::NotAFillClass(other)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use coordinator_types::Address;

	fn order(maker_amount: u64, taker_amount: u64, taker_fee: u64, maker_fee: u64) -> Order {
		Order {
			sender_address: Address::new("0xcccccccccccccccccccccccccccccccccccccccc"),
			maker_address: Address::new("0x1111111111111111111111111111111111111111"),
			taker_address: Address::new(ZERO_ADDRESS),
			fee_recipient_address: Address::new("0x2222222222222222222222222222222222222222"),
			maker_asset_data: "0xf47261b0".to_string(),
			taker_asset_data: "0xf47261b0".to_string(),
			maker_fee_asset_data: "0xf47261b0".to_string(),
			taker_fee_asset_data: "0xf47261b0".to_string(),
			maker_asset_amount: U256::from(maker_amount),
			taker_asset_amount: U256::from(taker_amount),
			maker_fee: U256::from(maker_fee),
			taker_fee: U256::from(taker_fee),
			salt: U256::from(1u64),
			expiration_time_seconds: U256::from(9_999_999_999u64),
			exchange_address: Address::new("0x3333333333333333333333333333333333333333"),
			chain_id: 1,
		}
	}

	fn unlimited_balances(order_hash: Digest32) -> OrderBalancesAndAllowances {
		let max = U256::MAX;
		OrderBalancesAndAllowances {
			order_hash,
			maker_asset_balance: max,
			maker_asset_allowance: max,
			taker_asset_balance: max,
			taker_asset_allowance: max,
			maker_fee_balance: max,
			maker_fee_allowance: max,
			taker_fee_balance: max,
			taker_fee_allowance: max,
		}
	}

	fn hash(s: &str) -> Digest32 {
		Digest32::from_bytes({
			let mut b = [0u8; 32];
			b[0] = s.as_bytes()[0];
			b
		})
	}

	#[test]
	fn remaining_fillable_bounded_by_on_chain_fill() {
		let o = order(1_000, 1_000, 0, 0);
		let candidate = FillCandidate {
			order_hash: hash("a"),
			on_chain_filled: U256::from(400u64),
			balances: unlimited_balances(hash("a")),
			order: o,
		};
		assert_eq!(remaining_fillable_taker_amount(&candidate), U256::from(600u64));
	}

	#[test]
	fn remaining_fillable_bounded_by_maker_balance() {
		let o = order(1_000, 2_000, 0, 0);
		let mut balances = unlimited_balances(hash("a"));
		balances.maker_asset_balance = U256::from(100u64);
		balances.maker_asset_allowance = U256::from(100u64);
		let candidate = FillCandidate {
			order_hash: hash("a"),
			on_chain_filled: U256::ZERO,
			balances,
			order: o,
		};
		// 100 maker units * 2000/1000 taker-per-maker = 200 taker units
		assert_eq!(remaining_fillable_taker_amount(&candidate), U256::from(200u64));
	}

	#[test]
	fn remaining_fillable_bounded_by_taker_fee() {
		let o = order(1_000, 1_000, 100, 0);
		let mut balances = unlimited_balances(hash("a"));
		balances.taker_fee_balance = U256::from(10u64);
		balances.taker_fee_allowance = U256::from(10u64);
		let candidate = FillCandidate {
			order_hash: hash("a"),
			on_chain_filled: U256::ZERO,
			balances,
			order: o,
		};
		// 10 fee units * 1000 taker / 100 fee = 100 taker units
		assert_eq!(remaining_fillable_taker_amount(&candidate), U256::from(100u64));
	}

	#[test]
	fn market_sell_consumes_greedily_until_exhausted() {
		let candidates = vec![
			FillCandidate {
				order_hash: hash("a"),
				on_chain_filled: U256::ZERO,
				balances: unlimited_balances(hash("a")),
				order: order(1_000, 1_000, 0, 0),
			},
			FillCandidate {
				order_hash: hash("b"),
				on_chain_filled: U256::ZERO,
				balances: unlimited_balances(hash("b")),
				order: order(1_000, 1_000, 0, 0),
			},
		];
		let fills = allocate_market_sell(&candidates, U256::from(1_500u64));
		assert_eq!(fills.len(), 2);
		assert_eq!(fills[0].taker_asset_fill_amount, U256::from(1_000u64));
		assert_eq!(fills[1].taker_asset_fill_amount, U256::from(500u64));
	}

	#[test]
	fn market_sell_skips_orders_once_request_exhausted() {
		let candidates = vec![
			FillCandidate {
				order_hash: hash("a"),
				on_chain_filled: U256::ZERO,
				balances: unlimited_balances(hash("a")),
				order: order(1_000, 1_000, 0, 0),
			},
			FillCandidate {
				order_hash: hash("b"),
				on_chain_filled: U256::ZERO,
				balances: unlimited_balances(hash("b")),
				order: order(1_000, 1_000, 0, 0),
			},
		];
		let fills = allocate_market_sell(&candidates, U256::from(1_000u64));
		assert_eq!(fills.len(), 1);
		assert_eq!(fills[0].order_hash, hash("a"));
	}

	#[test]
	fn market_buy_converts_maker_request_to_taker_units() {
		let candidates = vec![FillCandidate {
			order_hash: hash("a"),
			on_chain_filled: U256::ZERO,
			balances: unlimited_balances(hash("a")),
			order: order(2_000, 1_000, 0, 0),
		}];
		// requesting 1000 maker units at a 2:1 maker:taker rate -> 500 taker units
		let fills = allocate_market_buy(&candidates, U256::from(1_000u64));
		assert_eq!(fills.len(), 1);
		assert_eq!(fills[0].taker_asset_fill_amount, U256::from(500u64));
	}

	#[test]
	fn verbatim_allocation_rejects_length_mismatch() {
		let err = allocate(
			FunctionClass::FillBatch,
			&[FillCandidate {
				order_hash: hash("a"),
				on_chain_filled: U256::ZERO,
				balances: unlimited_balances(hash("a")),
				order: order(1_000, 1_000, 0, 0),
			}],
			Some(&[U256::from(1u64), U256::from(2u64)]),
			None,
			None,
		)
		.unwrap_err();
		assert!(matches!(err, FillError::MismatchedLengths { orders: 1, amounts: 2 }));
	}

	#[test]
	fn cancel_class_is_rejected_by_allocate() {
		let err = allocate(FunctionClass::CancelOne, &[], None, None, None).unwrap_err();
		assert!(matches!(err, FillError::NotAFillClass(FunctionClass::CancelOne)));
	}
}
